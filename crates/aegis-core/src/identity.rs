//! Request-scoped caller identity and authentication state.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Principal reported for callers without a verified identity.
pub const ANONYMOUS_PRINCIPAL: &str = "anonymous";

/// A unique identifier for each request, using UUID v7.
///
/// # Example
///
/// ```
/// use aegis_core::RequestId;
///
/// let a = RequestId::new();
/// let b = RequestId::new();
/// assert_ne!(a, b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new time-ordered request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// The principal attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallerIdentity {
    /// No verified identity.
    #[default]
    Anonymous,
    /// Identity established from a verified credential.
    Authenticated {
        /// The subject identifier.
        subject_id: String,
        /// Authorities granted to the subject.
        authorities: Vec<String>,
    },
}

impl CallerIdentity {
    /// Creates an anonymous identity.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self::Anonymous
    }

    /// Creates an authenticated identity.
    #[must_use]
    pub fn authenticated(subject_id: impl Into<String>, authorities: Vec<String>) -> Self {
        Self::Authenticated {
            subject_id: subject_id.into(),
            authorities,
        }
    }

    /// Returns true for [`CallerIdentity::Anonymous`].
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// Returns the subject identifier of an authenticated caller.
    #[must_use]
    pub fn subject_id(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated { subject_id, .. } => Some(subject_id),
        }
    }

    /// Returns the caller's authorities. Anonymous callers have none.
    #[must_use]
    pub fn authorities(&self) -> &[String] {
        match self {
            Self::Anonymous => &[],
            Self::Authenticated { authorities, .. } => authorities,
        }
    }

    /// Returns true if the caller holds `authority`.
    #[must_use]
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities().iter().any(|a| a == authority)
    }

    /// Returns an identifier suitable for logs and audit events.
    ///
    /// Never empty: anonymous callers are reported as [`ANONYMOUS_PRINCIPAL`].
    #[must_use]
    pub fn log_id(&self) -> &str {
        self.subject_id().unwrap_or(ANONYMOUS_PRINCIPAL)
    }
}

/// Authentication state of a single request.
///
/// ```text
/// Unauthenticated ─┬─> Authenticated ─┬─> Allowed
///                  └─> Anonymous ─────┴─> Denied
/// ```
///
/// `Allowed` and `Denied` are terminal. No state is revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthState {
    /// No identity resolution has happened yet.
    #[default]
    Unauthenticated,
    /// A valid credential was presented.
    Authenticated,
    /// No credential, or an invalid one.
    Anonymous,
    /// Authorization permitted the request.
    Allowed,
    /// Authorization rejected the request.
    Denied,
}

impl AuthState {
    /// Returns true if the state machine may move from `self` to `next`.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Unauthenticated, Self::Authenticated | Self::Anonymous)
                | (Self::Authenticated | Self::Anonymous, Self::Allowed | Self::Denied)
        )
    }

    /// Returns true for `Allowed` and `Denied`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Allowed | Self::Denied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_log_id_is_sentinel() {
        assert_eq!(CallerIdentity::anonymous().log_id(), ANONYMOUS_PRINCIPAL);
        assert_eq!(CallerIdentity::default().log_id(), "anonymous");
    }

    #[test]
    fn test_authenticated_identity() {
        let identity = CallerIdentity::authenticated(
            "admin",
            vec!["ROLE_ADMIN".into(), "ROLE_USER".into()],
        );
        assert!(!identity.is_anonymous());
        assert_eq!(identity.subject_id(), Some("admin"));
        assert_eq!(identity.log_id(), "admin");
        assert!(identity.has_authority("ROLE_USER"));
        assert!(!identity.has_authority("ROLE_ROOT"));
    }

    #[test]
    fn test_state_machine_forward_edges() {
        use AuthState::*;
        assert!(Unauthenticated.can_advance_to(Authenticated));
        assert!(Unauthenticated.can_advance_to(Anonymous));
        assert!(Authenticated.can_advance_to(Allowed));
        assert!(Authenticated.can_advance_to(Denied));
        assert!(Anonymous.can_advance_to(Allowed));
        assert!(Anonymous.can_advance_to(Denied));
    }

    #[test]
    fn test_state_machine_rejects_revisits() {
        use AuthState::*;
        assert!(!Authenticated.can_advance_to(Anonymous));
        assert!(!Anonymous.can_advance_to(Authenticated));
        assert!(!Allowed.can_advance_to(Denied));
        assert!(!Denied.can_advance_to(Allowed));
        assert!(!Unauthenticated.can_advance_to(Allowed));
        assert!(Allowed.is_terminal());
        assert!(!Anonymous.is_terminal());
    }

    #[test]
    fn test_request_ids_are_unique() {
        let ids: std::collections::HashSet<_> = (0..100).map(|_| RequestId::new()).collect();
        assert_eq!(ids.len(), 100);
    }
}
