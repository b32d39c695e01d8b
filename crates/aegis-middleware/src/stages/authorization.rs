//! Access rules, the terminal decision, and its audit event.
//!
//! Rules are `(path pattern, requirement)` pairs checked in order; the first
//! matching pattern decides. Paths no rule matches fall back to the default
//! requirement, `Authenticated` unless changed.
//!
//! Every decision, allow or deny, is published to the audit sink and
//! recorded as an [`AuthorizationOutcome`] extension.
//!
//! # Example
//!
//! ```
//! use aegis_middleware::stages::{AccessRule, AuthorizationMiddleware, Requirement};
//! use aegis_middleware::AuditPublisher;
//!
//! let authz = AuthorizationMiddleware::new(AuditPublisher::default())
//!     .rule(AccessRule::new("/api/auth/login", Requirement::PermitAll))
//!     .rule(AccessRule::new("/api/admin/**", Requirement::authority("ROLE_ADMIN")))
//!     .default_requirement(Requirement::Authenticated);
//! assert_eq!(authz.requirement_for("/api/admin/users"), &Requirement::authority("ROLE_ADMIN"));
//! assert_eq!(authz.requirement_for("/api/orders"), &Requirement::Authenticated);
//! ```

use crate::audit::{AuditDecision, AuditEvent, AuditPublisher};
use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::path::PathPattern;
use crate::types::{Request, Response, ResponseExt};
use aegis_core::{AuthState, CallerIdentity, Clock, SystemClock};
use http::StatusCode;
use std::fmt;
use std::sync::Arc;

/// What a caller needs to reach a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Anyone, including anonymous callers.
    PermitAll,
    /// Any authenticated caller.
    Authenticated,
    /// An authenticated caller holding this authority.
    Authority(String),
    /// An authenticated caller holding at least one of these.
    AnyAuthority(Vec<String>),
    /// Nobody.
    DenyAll,
}

impl Requirement {
    /// Shorthand for [`Requirement::Authority`].
    pub fn authority(authority: impl Into<String>) -> Self {
        Self::Authority(authority.into())
    }

    /// Shorthand for [`Requirement::AnyAuthority`].
    pub fn any_authority<I, S>(authorities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AnyAuthority(authorities.into_iter().map(Into::into).collect())
    }

    /// Checks `identity`, returning the denial reason on failure.
    pub fn evaluate(&self, identity: &CallerIdentity) -> Result<(), String> {
        match self {
            Self::PermitAll => Ok(()),
            Self::DenyAll => Err("access to this resource is disabled".to_string()),
            _ if identity.is_anonymous() => Err("authentication required".to_string()),
            Self::Authenticated => Ok(()),
            Self::Authority(authority) if identity.has_authority(authority) => Ok(()),
            Self::Authority(authority) => Err(format!("missing authority {authority}")),
            Self::AnyAuthority(authorities)
                if authorities.iter().any(|a| identity.has_authority(a)) =>
            {
                Ok(())
            }
            Self::AnyAuthority(authorities) => {
                Err(format!("missing any of authorities {}", authorities.join(", ")))
            }
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PermitAll => f.write_str("permitAll"),
            Self::Authenticated => f.write_str("authenticated"),
            Self::Authority(a) => write!(f, "hasAuthority('{a}')"),
            Self::AnyAuthority(list) => {
                let quoted: Vec<String> = list.iter().map(|a| format!("'{a}'")).collect();
                write!(f, "hasAnyAuthority({})", quoted.join(","))
            }
            Self::DenyAll => f.write_str("denyAll"),
        }
    }
}

/// A path pattern and what it requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRule {
    /// Paths the rule covers.
    pub pattern: PathPattern,
    /// What those paths require.
    pub requirement: Requirement,
}

impl AccessRule {
    /// Creates a rule.
    pub fn new(pattern: impl Into<PathPattern>, requirement: Requirement) -> Self {
        Self {
            pattern: pattern.into(),
            requirement,
        }
    }
}

/// The decision recorded for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationOutcome {
    /// Allow or deny.
    pub decision: AuditDecision,
    /// The requirement that was checked.
    pub requirement: Requirement,
    /// Why the request was denied.
    pub reason: Option<String>,
}

/// Rules permitting login and refresh under `base_path`.
#[must_use]
pub fn default_rules(base_path: &str) -> Vec<AccessRule> {
    let base = base_path.trim_end_matches('/');
    vec![
        AccessRule::new(format!("{base}/login"), Requirement::PermitAll),
        AccessRule::new(format!("{base}/refresh"), Requirement::PermitAll),
    ]
}

/// The `authorization` stage.
#[derive(Debug, Clone)]
pub struct AuthorizationMiddleware {
    rules: Vec<AccessRule>,
    default_requirement: Requirement,
    publisher: AuditPublisher,
    clock: Arc<dyn Clock>,
}

impl AuthorizationMiddleware {
    /// Creates the stage with no rules and an `Authenticated` default.
    #[must_use]
    pub fn new(publisher: AuditPublisher) -> Self {
        Self {
            rules: Vec::new(),
            default_requirement: Requirement::Authenticated,
            publisher,
            clock: Arc::new(SystemClock),
        }
    }

    /// Appends a rule.
    #[must_use]
    pub fn rule(mut self, rule: AccessRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Appends several rules.
    #[must_use]
    pub fn rules(mut self, rules: impl IntoIterator<Item = AccessRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Sets the requirement for paths no rule matches.
    #[must_use]
    pub fn default_requirement(mut self, requirement: Requirement) -> Self {
        self.default_requirement = requirement;
        self
    }

    /// Sets the clock used for audit timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the requirement that applies to `path`.
    #[must_use]
    pub fn requirement_for(&self, path: &str) -> &Requirement {
        self.rules
            .iter()
            .find(|r| r.pattern.matches(path))
            .map_or(&self.default_requirement, |r| &r.requirement)
    }

    fn decide(&self, ctx: &mut MiddlewareContext, path: &str) -> AuthorizationOutcome {
        if ctx.auth_state() == AuthState::Unauthenticated {
            let resolved = if ctx.identity().is_anonymous() {
                AuthState::Anonymous
            } else {
                AuthState::Authenticated
            };
            ctx.advance_auth_state(resolved);
        }

        let requirement = self.requirement_for(path).clone();
        let capability = requirement.to_string();
        let now = self.clock.now();
        let (event, outcome) = match requirement.evaluate(ctx.identity()) {
            Ok(()) => (
                AuditEvent::allow(ctx.identity(), path, capability, now),
                AuthorizationOutcome {
                    decision: AuditDecision::Allow,
                    requirement,
                    reason: None,
                },
            ),
            Err(reason) => (
                AuditEvent::deny(ctx.identity(), path, capability, reason.clone(), now),
                AuthorizationOutcome {
                    decision: AuditDecision::Deny,
                    requirement,
                    reason: Some(reason),
                },
            ),
        };

        self.publisher.publish(&event);
        let allowed = outcome.decision == AuditDecision::Allow;
        aegis_telemetry::record_authorization(allowed);
        ctx.advance_auth_state(if allowed {
            AuthState::Allowed
        } else {
            AuthState::Denied
        });
        outcome
    }
}

impl Middleware for AuthorizationMiddleware {
    fn name(&self) -> &str {
        "authorization"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let path = request.uri().path().to_string();
            let outcome = self.decide(ctx, &path);
            let decision = outcome.decision;
            ctx.set_extension(outcome);

            if decision == AuditDecision::Allow {
                return next.run(ctx, request).await;
            }

            if ctx.identity().is_anonymous() {
                Response::json_error_at(
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHORIZED",
                    "Authentication required",
                    &path,
                )
            } else {
                Response::json_error_at(StatusCode::FORBIDDEN, "ACCESS_DENIED", "Access denied", &path)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> CallerIdentity {
        CallerIdentity::authenticated("admin", vec!["ROLE_ADMIN".into(), "ROLE_USER".into()])
    }

    #[test]
    fn test_requirement_evaluation() {
        let anonymous = CallerIdentity::Anonymous;
        let user = CallerIdentity::authenticated("user001", vec!["ROLE_USER".into()]);

        assert!(Requirement::PermitAll.evaluate(&anonymous).is_ok());
        assert!(Requirement::Authenticated.evaluate(&anonymous).is_err());
        assert!(Requirement::Authenticated.evaluate(&user).is_ok());
        assert!(Requirement::authority("ROLE_ADMIN").evaluate(&user).is_err());
        assert!(Requirement::authority("ROLE_ADMIN").evaluate(&admin()).is_ok());
        assert!(Requirement::any_authority(["ROLE_OPS", "ROLE_USER"])
            .evaluate(&user)
            .is_ok());
        assert!(Requirement::DenyAll.evaluate(&admin()).is_err());
    }

    #[test]
    fn test_capability_rendering() {
        assert_eq!(Requirement::authority("ROLE_ADMIN").to_string(), "hasAuthority('ROLE_ADMIN')");
        assert_eq!(
            Requirement::any_authority(["A", "B"]).to_string(),
            "hasAnyAuthority('A','B')"
        );
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let authz = AuthorizationMiddleware::new(AuditPublisher::default())
            .rule(AccessRule::new("/api/admin/health", Requirement::PermitAll))
            .rule(AccessRule::new("/api/admin/**", Requirement::authority("ROLE_ADMIN")));
        assert_eq!(authz.requirement_for("/api/admin/health"), &Requirement::PermitAll);
        assert_eq!(
            authz.requirement_for("/api/admin/users"),
            &Requirement::authority("ROLE_ADMIN")
        );
    }

    #[test]
    fn test_default_rules() {
        let authz =
            AuthorizationMiddleware::new(AuditPublisher::default()).rules(default_rules("/api/auth/"));
        assert_eq!(authz.requirement_for("/api/auth/login"), &Requirement::PermitAll);
        assert_eq!(authz.requirement_for("/api/auth/refresh"), &Requirement::PermitAll);
        assert_eq!(authz.requirement_for("/api/auth/logout"), &Requirement::Authenticated);
    }

    #[test]
    fn test_decide_advances_state_from_unauthenticated() {
        let authz = AuthorizationMiddleware::new(AuditPublisher::default());
        let mut ctx = MiddlewareContext::new();
        let outcome = authz.decide(&mut ctx, "/api/orders");
        assert_eq!(outcome.decision, AuditDecision::Deny);
        assert_eq!(ctx.auth_state(), AuthState::Denied);
    }
}
