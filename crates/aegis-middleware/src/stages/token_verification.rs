//! Bearer token resolution.
//!
//! Reads `Authorization: Bearer <token>`, verifies it with the
//! [`TokenManager`], and attaches the caller identity and [`Claims`] to the
//! context. A missing or bad token leaves the caller anonymous, unless the
//! stage is told to reject bad tokens outright. Skipped paths are passed
//! through anonymous without looking at the header.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::path::PathPattern;
use crate::types::{Request, Response, ResponseExt};
use aegis_core::{AuthState, CallerIdentity};
use aegis_telemetry::logging::fields::{REQUEST_ID, SUBJECT_ID};
use aegis_token::{Claims, TokenManager};
use http::header::AUTHORIZATION;
use http::StatusCode;
use std::sync::Arc;

/// Returns the bearer token from the `Authorization` header.
///
/// The scheme is matched case-insensitively. Blank tokens count as absent.
///
/// ```
/// use aegis_middleware::stages::extract_bearer;
/// use bytes::Bytes;
/// use http_body_util::Full;
///
/// let request = http::Request::builder()
///     .header("Authorization", "Bearer abc.def.ghi")
///     .body(Full::new(Bytes::new()))
///     .unwrap();
/// assert_eq!(extract_bearer(&request), Some("abc.def.ghi"));
/// ```
#[must_use]
pub fn extract_bearer(request: &Request) -> Option<&str> {
    let value = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// The `token_verification` stage.
#[derive(Debug, Clone)]
pub struct TokenVerificationMiddleware {
    manager: Arc<TokenManager>,
    reject_invalid_tokens: bool,
    skip: Vec<PathPattern>,
}

impl TokenVerificationMiddleware {
    /// Creates the stage. Bad tokens fall back to anonymous.
    #[must_use]
    pub fn new(manager: Arc<TokenManager>) -> Self {
        Self {
            manager,
            reject_invalid_tokens: false,
            skip: Vec::new(),
        }
    }

    /// Leaves requests matching `patterns` unverified, such as the login
    /// and refresh routes.
    #[must_use]
    pub fn skip_paths<I, P>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathPattern>,
    {
        self.skip.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Answers bad tokens with 401 instead of falling back to anonymous.
    #[must_use]
    pub fn reject_invalid_tokens(mut self, reject: bool) -> Self {
        self.reject_invalid_tokens = reject;
        self
    }
}

impl Middleware for TokenVerificationMiddleware {
    fn name(&self) -> &str {
        "token_verification"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            if self.skip.iter().any(|p| p.matches(request.uri().path())) {
                ctx.advance_auth_state(AuthState::Anonymous);
                return next.run(ctx, request).await;
            }

            let parsed = extract_bearer(&request).map(|token| self.manager.parse(token));

            match parsed {
                Some(Ok(claims)) => {
                    tracing::debug!(
                        { REQUEST_ID } = %ctx.request_id(),
                        { SUBJECT_ID } = %claims.sub,
                        "Bearer token accepted"
                    );
                    ctx.set_identity(CallerIdentity::authenticated(
                        claims.sub.clone(),
                        claims.authority_list(),
                    ));
                    ctx.set_extension::<Claims>(claims);
                    ctx.advance_auth_state(AuthState::Authenticated);
                }
                Some(Err(e)) => {
                    tracing::debug!(
                        { REQUEST_ID } = %ctx.request_id(),
                        code = e.code(),
                        error = %e,
                        "Bearer token rejected"
                    );
                    if self.reject_invalid_tokens {
                        return Response::json_error_at(
                            StatusCode::UNAUTHORIZED,
                            e.code(),
                            e.public_message(),
                            request.uri().path(),
                        );
                    }
                    ctx.advance_auth_state(AuthState::Anonymous);
                }
                None => {
                    ctx.advance_auth_state(AuthState::Anonymous);
                }
            }

            next.run(ctx, request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::Full;

    fn with_authorization(value: &str) -> Request {
        http::Request::builder()
            .header(AUTHORIZATION, value)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[test]
    fn test_extract_bearer_variants() {
        assert_eq!(extract_bearer(&with_authorization("bearer t0k")), Some("t0k"));
        assert_eq!(extract_bearer(&with_authorization("Bearer   ")), None);
        assert_eq!(extract_bearer(&with_authorization("Basic dXNlcjpwdw==")), None);
        assert_eq!(extract_bearer(&with_authorization("Bearer")), None);

        let bare = http::Request::builder()
            .body(Full::new(Bytes::new()))
            .unwrap();
        assert_eq!(extract_bearer(&bare), None);
    }
}
