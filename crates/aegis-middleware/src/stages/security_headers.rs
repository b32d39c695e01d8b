//! Browser hardening headers.
//!
//! Headers already set by the handler are left alone. HSTS is only sent
//! over HTTPS, directly or behind a proxy reporting `X-Forwarded-Proto`.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use http::header::{
    HeaderName, HeaderValue, CONTENT_SECURITY_POLICY, STRICT_TRANSPORT_SECURITY,
    X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS, X_XSS_PROTECTION,
};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Default HSTS lifetime: one year.
pub const DEFAULT_HSTS_MAX_AGE: Duration = Duration::from_secs(31_536_000);

/// Default policy used when CSP is switched on without one.
pub const DEFAULT_CSP_POLICY: &str = "default-src 'self'";

/// `X-Frame-Options` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameOptions {
    /// Never frame.
    #[default]
    Deny,
    /// Frame only from the same origin.
    SameOrigin,
}

impl FrameOptions {
    /// Returns the header value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deny => "DENY",
            Self::SameOrigin => "SAMEORIGIN",
        }
    }
}

impl fmt::Display for FrameOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrameOptions {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DENY" => Ok(Self::Deny),
            "SAMEORIGIN" => Ok(Self::SameOrigin),
            other => Err(format!("unsupported frame option: {other}")),
        }
    }
}

/// `Strict-Transport-Security` settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HstsConfig {
    /// How long browsers remember to use HTTPS.
    pub max_age: Duration,
    /// Apply to subdomains too.
    pub include_subdomains: bool,
    /// Request preload-list inclusion.
    pub preload: bool,
}

impl Default for HstsConfig {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_HSTS_MAX_AGE,
            include_subdomains: true,
            preload: false,
        }
    }
}

impl HstsConfig {
    /// Renders the header value.
    #[must_use]
    pub fn header_value(&self) -> String {
        let mut value = format!("max-age={}", self.max_age.as_secs());
        if self.include_subdomains {
            value.push_str("; includeSubDomains");
        }
        if self.preload {
            value.push_str("; preload");
        }
        value
    }
}

/// Which headers to add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityHeadersConfig {
    /// `X-Frame-Options`, or none.
    pub frame_options: Option<FrameOptions>,
    /// Send `X-Content-Type-Options: nosniff`.
    pub content_type_options: bool,
    /// Send `X-XSS-Protection: 1; mode=block`.
    pub xss_protection: bool,
    /// HSTS, or none.
    pub hsts: Option<HstsConfig>,
    /// `Content-Security-Policy`, or none.
    pub content_security_policy: Option<String>,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            frame_options: Some(FrameOptions::Deny),
            content_type_options: true,
            xss_protection: true,
            hsts: Some(HstsConfig::default()),
            content_security_policy: None,
        }
    }
}

/// The `security_headers` stage.
#[derive(Debug, Clone)]
pub struct SecurityHeadersMiddleware {
    headers: Vec<(HeaderName, HeaderValue)>,
    hsts: Option<HeaderValue>,
}

impl Default for SecurityHeadersMiddleware {
    fn default() -> Self {
        Self::new(&SecurityHeadersConfig::default())
    }
}

impl SecurityHeadersMiddleware {
    /// Creates the stage, rendering header values once.
    ///
    /// A CSP policy that is not a valid header value is dropped with a warning.
    #[must_use]
    pub fn new(config: &SecurityHeadersConfig) -> Self {
        let mut headers = Vec::new();
        if let Some(frame) = config.frame_options {
            headers.push((X_FRAME_OPTIONS, HeaderValue::from_static(frame.as_str())));
        }
        if config.content_type_options {
            headers.push((X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")));
        }
        if config.xss_protection {
            headers.push((X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block")));
        }
        if let Some(policy) = &config.content_security_policy {
            match HeaderValue::from_str(policy) {
                Ok(value) => headers.push((CONTENT_SECURITY_POLICY, value)),
                Err(e) => tracing::warn!(error = %e, "Ignoring invalid Content-Security-Policy"),
            }
        }
        let hsts = config
            .hsts
            .and_then(|h| HeaderValue::from_str(&h.header_value()).ok());
        Self { headers, hsts }
    }

    fn is_secure(request: &Request) -> bool {
        request.uri().scheme_str() == Some("https")
            || request
                .headers()
                .get(X_FORWARDED_PROTO)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.eq_ignore_ascii_case("https"))
    }
}

impl Middleware for SecurityHeadersMiddleware {
    fn name(&self) -> &str {
        "security_headers"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let secure = Self::is_secure(&request);
            let mut response = next.run(ctx, request).await;
            let headers = response.headers_mut();
            for (name, value) in &self.headers {
                headers.entry(name).or_insert_with(|| value.clone());
            }
            if secure {
                if let Some(hsts) = &self.hsts {
                    headers
                        .entry(STRICT_TRANSPORT_SECURITY)
                        .or_insert_with(|| hsts.clone());
                }
            }
            response
        })
    }
}
