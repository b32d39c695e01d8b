//! Double-submit cookie CSRF protection.
//!
//! Safe methods pass and are handed a token cookie if they lack one.
//! Unsafe methods must echo that cookie in a request header.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::path::PathPattern;
use crate::types::{Request, Response, ResponseExt};
use aegis_telemetry::logging::fields::REQUEST_ID;
use http::header::{HeaderValue, COOKIE, SET_COOKIE};
use http::{Method, StatusCode};
use uuid::Uuid;

/// Default request header carrying the token.
pub const DEFAULT_CSRF_HEADER: &str = "X-CSRF-TOKEN";

/// Default cookie carrying the token.
pub const DEFAULT_CSRF_COOKIE: &str = "XSRF-TOKEN";

/// CSRF settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfConfig {
    /// Request header that must echo the cookie.
    pub header_name: String,
    /// Cookie holding the token.
    pub cookie_name: String,
    /// Paths exempt from the check.
    pub ignored_paths: Vec<PathPattern>,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            header_name: DEFAULT_CSRF_HEADER.to_string(),
            cookie_name: DEFAULT_CSRF_COOKIE.to_string(),
            ignored_paths: Vec::new(),
        }
    }
}

impl CsrfConfig {
    /// Adds an exempt path pattern.
    #[must_use]
    pub fn ignore(mut self, pattern: impl Into<PathPattern>) -> Self {
        self.ignored_paths.push(pattern.into());
        self
    }
}

/// The `csrf` stage.
#[derive(Debug, Clone, Default)]
pub struct CsrfMiddleware {
    config: CsrfConfig,
}

impl CsrfMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new(config: CsrfConfig) -> Self {
        Self { config }
    }

    /// Returns the settings.
    #[must_use]
    pub fn config(&self) -> &CsrfConfig {
        &self.config
    }

    fn is_safe(method: &Method) -> bool {
        matches!(
            *method,
            Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
        )
    }

    fn is_ignored(&self, path: &str) -> bool {
        self.config.ignored_paths.iter().any(|p| p.matches(path))
    }

    fn cookie_token(&self, request: &Request) -> Option<String> {
        request
            .headers()
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.config.cookie_name)
            .map(|(_, value)| value.to_string())
            .filter(|value| !value.is_empty())
    }

    fn header_token<'r>(&self, request: &'r Request) -> Option<&'r str> {
        request
            .headers()
            .get(self.config.header_name.as_str())
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
    }

    fn issue_cookie(&self, response: &mut Response) {
        let cookie = format!("{}={}; Path=/; SameSite=Lax", self.config.cookie_name, Uuid::new_v4());
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => tracing::warn!(error = %e, "Invalid CSRF cookie name"),
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl Middleware for CsrfMiddleware {
    fn name(&self) -> &str {
        "csrf"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let cookie = self.cookie_token(&request);

            if Self::is_safe(request.method()) {
                let mut response = next.run(ctx, request).await;
                if cookie.is_none() {
                    self.issue_cookie(&mut response);
                }
                return response;
            }

            let path = request.uri().path().to_string();
            if self.is_ignored(&path) {
                return next.run(ctx, request).await;
            }

            let valid = match (self.header_token(&request), cookie.as_deref()) {
                (Some(header), Some(cookie)) => constant_time_eq(header.as_bytes(), cookie.as_bytes()),
                _ => false,
            };
            if !valid {
                tracing::debug!(
                    { REQUEST_ID } = %ctx.request_id(),
                    path = %path,
                    "CSRF token missing or mismatched"
                );
                return Response::json_error_at(
                    StatusCode::FORBIDDEN,
                    "INVALID_CSRF_TOKEN",
                    "Invalid or missing CSRF token",
                    &path,
                );
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

    fn request(method: Method, path: &str, cookie: Option<&str>, header: Option<&str>) -> Request {
        let mut builder = http::Request::builder().method(method).uri(path);
        if let Some(c) = cookie {
            builder = builder.header(COOKIE, format!("session=abc; XSRF-TOKEN={c}"));
        }
        if let Some(h) = header {
            builder = builder.header(DEFAULT_CSRF_HEADER, h);
        }
        builder.body(Full::new(Bytes::new())).unwrap()
    }

    #[test]
    fn test_reads_cookie_among_others() {
        let csrf = CsrfMiddleware::default();
        let req = request(Method::POST, "/", Some("tok-1"), None);
        assert_eq!(csrf.cookie_token(&req).as_deref(), Some("tok-1"));
        assert_eq!(csrf.cookie_token(&request(Method::POST, "/", None, None)), None);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let csrf = CsrfMiddleware::default();
        let req = http::Request::builder()
            .method(Method::POST)
            .uri("/")
            .header("x-csrf-token", "tok-1")
            .body(Full::new(Bytes::new()))
            .unwrap();
        assert_eq!(csrf.header_token(&req), Some("tok-1"));
    }

    #[test]
    fn test_ignored_paths() {
        let csrf = CsrfMiddleware::new(CsrfConfig::default().ignore("/api/auth/login"));
        assert!(csrf.is_ignored("/api/auth/login"));
        assert!(!csrf.is_ignored("/api/orders"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }

    #[test]
    fn test_issued_cookie_shape() {
        let csrf = CsrfMiddleware::default();
        let mut response = Response::empty(StatusCode::OK);
        csrf.issue_cookie(&mut response);
        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("XSRF-TOKEN="));
        assert!(cookie.contains("Path=/"));
    }
}
