//! Cross-origin resource sharing.
//!
//! Answers preflight requests directly and decorates ordinary responses
//! for allowed origins. Requests from other origins pass through without
//! CORS headers, leaving the browser to block them.
//!
//! # Example
//!
//! ```
//! use aegis_middleware::stages::CorsMiddleware;
//! use http::Method;
//! use std::time::Duration;
//!
//! let cors = CorsMiddleware::builder()
//!     .allow_origin("https://app.example.com")
//!     .allow_methods([Method::GET, Method::POST])
//!     .allow_headers(["Content-Type", "Authorization"])
//!     .expose_headers(["X-Request-Id"])
//!     .max_age(Duration::from_secs(600))
//!     .build();
//! assert!(cors.config().allow_credentials);
//! ```

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response, ResponseExt};
use http::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS,
    ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, ORIGIN,
    VARY,
};
use http::{Method, StatusCode};
use indexmap::IndexSet;
use std::time::Duration;

const WILDCARD: &str = "*";

/// Default preflight cache lifetime.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(1800);

/// Origins permitted to make cross-origin requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    /// Any origin.
    Any,
    /// Only the listed origins. Empty refuses every cross-origin request.
    List(IndexSet<String>),
}

impl Default for AllowedOrigins {
    fn default() -> Self {
        Self::List(IndexSet::new())
    }
}

impl AllowedOrigins {
    /// Returns true if `origin` is allowed.
    #[must_use]
    pub fn is_allowed(&self, origin: &str) -> bool {
        match self {
            Self::Any => true,
            Self::List(origins) => origins.contains(origin),
        }
    }

    /// Returns true if any origin is allowed.
    #[must_use]
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

/// Cross-origin policy.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Allowed origins.
    pub allowed_origins: AllowedOrigins,
    /// Allowed methods.
    pub allowed_methods: IndexSet<Method>,
    /// Allowed request headers, lowercase. `*` allows any.
    pub allowed_headers: IndexSet<String>,
    /// Response headers exposed to scripts.
    pub exposed_headers: IndexSet<String>,
    /// Whether credentials may accompany requests.
    pub allow_credentials: bool,
    /// Preflight cache lifetime.
    pub max_age: Option<Duration>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: AllowedOrigins::default(),
            allowed_methods: [
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ]
            .into_iter()
            .collect(),
            allowed_headers: std::iter::once(WILDCARD.to_string()).collect(),
            exposed_headers: IndexSet::new(),
            allow_credentials: true,
            max_age: Some(DEFAULT_MAX_AGE),
        }
    }
}

impl CorsConfig {
    fn allows_any_header(&self) -> bool {
        self.allowed_headers.contains(WILDCARD)
    }

    fn origin_header(&self, origin: &str) -> Option<HeaderValue> {
        if self.allowed_origins.is_any() && !self.allow_credentials {
            Some(HeaderValue::from_static(WILDCARD))
        } else {
            HeaderValue::from_str(origin).ok()
        }
    }
}

/// Builder for [`CorsMiddleware`].
#[derive(Debug, Clone, Default)]
pub struct CorsBuilder {
    config: CorsConfig,
}

impl CorsBuilder {
    /// Allows one origin. `*` allows any.
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        let origin = origin.into();
        if origin == WILDCARD {
            self.config.allowed_origins = AllowedOrigins::Any;
        } else if let AllowedOrigins::List(origins) = &mut self.config.allowed_origins {
            origins.insert(origin);
        }
        self
    }

    /// Allows several origins.
    #[must_use]
    pub fn allow_origins<I, S>(self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        origins.into_iter().fold(self, |b, o| b.allow_origin(o))
    }

    /// Replaces the allowed methods.
    #[must_use]
    pub fn allow_methods<I>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        self.config.allowed_methods = methods.into_iter().collect();
        self
    }

    /// Replaces the allowed request headers.
    #[must_use]
    pub fn allow_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_headers = headers
            .into_iter()
            .map(|h| h.into().to_ascii_lowercase())
            .collect();
        self
    }

    /// Replaces the exposed response headers.
    #[must_use]
    pub fn expose_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.exposed_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    /// Sets whether credentials are allowed.
    #[must_use]
    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.config.allow_credentials = allow;
        self
    }

    /// Sets the preflight cache lifetime.
    #[must_use]
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.config.max_age = Some(max_age);
        self
    }

    /// Builds the stage.
    ///
    /// Credentials are switched off when any origin is allowed.
    #[must_use]
    pub fn build(mut self) -> CorsMiddleware {
        if self.config.allowed_origins.is_any() && self.config.allow_credentials {
            tracing::warn!("CORS allows any origin; disabling credentials");
            self.config.allow_credentials = false;
        }
        CorsMiddleware {
            config: self.config,
        }
    }
}

/// The `cors` stage.
#[derive(Debug, Clone)]
pub struct CorsMiddleware {
    config: CorsConfig,
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        CorsBuilder::default().build()
    }
}

impl CorsMiddleware {
    /// Starts a builder from the default policy.
    #[must_use]
    pub fn builder() -> CorsBuilder {
        CorsBuilder::default()
    }

    /// Returns the effective policy.
    #[must_use]
    pub fn config(&self) -> &CorsConfig {
        &self.config
    }

    fn origin(request: &Request) -> Option<&str> {
        request.headers().get(ORIGIN).and_then(|v| v.to_str().ok())
    }

    fn is_preflight(request: &Request) -> bool {
        request.method() == Method::OPTIONS
            && request.headers().contains_key(ORIGIN)
            && request.headers().contains_key(ACCESS_CONTROL_REQUEST_METHOD)
    }

    fn handle_preflight(&self, request: &Request) -> Response {
        let Some(origin) = Self::origin(request) else {
            return Self::rejected("Invalid CORS origin");
        };
        if !self.config.allowed_origins.is_allowed(origin) {
            tracing::debug!(origin, "CORS preflight rejected: origin");
            return Self::rejected("Origin not allowed");
        }

        let method = request
            .headers()
            .get(ACCESS_CONTROL_REQUEST_METHOD)
            .and_then(|v| v.to_str().ok())
            .and_then(|m| Method::from_bytes(m.trim().as_bytes()).ok());
        let Some(method) = method.filter(|m| self.config.allowed_methods.contains(m)) else {
            tracing::debug!(origin, "CORS preflight rejected: method");
            return Self::rejected("Method not allowed");
        };

        let requested_headers = request
            .headers()
            .get(ACCESS_CONTROL_REQUEST_HEADERS)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let requested: Vec<String> = requested_headers
            .split(',')
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        if !self.config.allows_any_header()
            && !requested.iter().all(|h| self.config.allowed_headers.contains(h))
        {
            tracing::debug!(origin, headers = requested_headers, "CORS preflight rejected: headers");
            return Self::rejected("Headers not allowed");
        }

        let mut response = Response::empty(StatusCode::NO_CONTENT);
        let headers = response.headers_mut();
        if let Some(value) = self.config.origin_header(origin) {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }

        let methods: Vec<&str> = self.config.allowed_methods.iter().map(Method::as_str).collect();
        if let Ok(value) = HeaderValue::from_str(&methods.join(", ")) {
            headers.insert(ACCESS_CONTROL_ALLOW_METHODS, value);
        }
        tracing::trace!(origin, method = %method, "CORS preflight accepted");

        let allow_headers = if self.config.allows_any_header() {
            requested.join(", ")
        } else {
            self.config
                .allowed_headers
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        };
        if !allow_headers.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&allow_headers) {
                headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, value);
            }
        }

        if self.config.allow_credentials {
            headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
        if let Some(max_age) = self.config.max_age {
            headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from(max_age.as_secs()));
        }
        headers.insert(
            VARY,
            HeaderValue::from_static(
                "Origin, Access-Control-Request-Method, Access-Control-Request-Headers",
            ),
        );
        response
    }

    fn rejected(message: &str) -> Response {
        Response::json_error(StatusCode::FORBIDDEN, "CORS_REJECTED", message)
    }

    fn decorate(&self, response: &mut Response, origin: &str) {
        let headers = response.headers_mut();
        if let Some(value) = self.config.origin_header(origin) {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
        if self.config.allow_credentials {
            headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
        if !self.config.exposed_headers.is_empty() {
            let exposed = self
                .config
                .exposed_headers
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");
            if let Ok(value) = HeaderValue::from_str(&exposed) {
                headers.insert(ACCESS_CONTROL_EXPOSE_HEADERS, value);
            }
        }
        headers.append(VARY, HeaderValue::from_static("Origin"));
    }
}

impl Middleware for CorsMiddleware {
    fn name(&self) -> &str {
        "cors"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            if Self::is_preflight(&request) {
                return self.handle_preflight(&request);
            }

            let origin = Self::origin(&request)
                .filter(|o| self.config.allowed_origins.is_allowed(o))
                .map(String::from);
            let mut response = next.run(ctx, request).await;
            if let Some(origin) = origin {
                self.decorate(&mut response, &origin);
            }
            response
        })
    }
}
