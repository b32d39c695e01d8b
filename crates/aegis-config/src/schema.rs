//! Configuration schema types.
//!
//! Every section rejects unknown fields and fills missing ones from its
//! `Default`, so a file only needs to name what it changes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

// ---------------------------------------------------------------------------
// auth
// ---------------------------------------------------------------------------

/// Authentication settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthSection {
    /// Bearer token issuance and verification.
    #[serde(default)]
    pub token: TokenSection,

    /// Development subject seeding.
    #[serde(default)]
    pub bootstrap: BootstrapSection,
}

/// Token manager settings.
///
/// # Example
///
/// ```
/// use aegis_config::TokenSection;
///
/// let token = TokenSection::default();
/// assert!(!token.enabled);
/// assert_eq!(token.ttl_secs, 3600);
/// assert_eq!(token.algorithm, "HS256");
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenSection {
    /// Issue and verify bearer tokens.
    #[serde(default)]
    pub enabled: bool,

    /// Base64 signing secret.
    #[serde(default)]
    pub secret: Option<String>,

    /// Token lifetime in seconds.
    #[serde(default = "default_token_ttl")]
    pub ttl_secs: u64,

    /// HMAC algorithm name.
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Expected `iss` claim.
    #[serde(default)]
    pub issuer: Option<String>,

    /// Accepted `aud` claims.
    #[serde(default)]
    pub audience: Vec<String>,

    /// Answer bad tokens with 401 rather than treating the caller as anonymous.
    #[serde(default)]
    pub reject_invalid_tokens: bool,
}

impl Default for TokenSection {
    fn default() -> Self {
        Self {
            enabled: false,
            secret: None,
            ttl_secs: default_token_ttl(),
            algorithm: default_algorithm(),
            issuer: None,
            audience: Vec::new(),
            reject_invalid_tokens: false,
        }
    }
}

impl fmt::Debug for TokenSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSection")
            .field("enabled", &self.enabled)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("ttl_secs", &self.ttl_secs)
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("reject_invalid_tokens", &self.reject_invalid_tokens)
            .finish()
    }
}

impl TokenSection {
    /// Returns the token lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

fn default_token_ttl() -> u64 {
    3600
}

fn default_algorithm() -> String {
    "HS256".to_string()
}

/// Development subject seeding.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BootstrapSection {
    /// Seed the built-in development subjects.
    #[serde(default)]
    pub enabled: bool,

    /// Permit seeding when the environment is `production`.
    #[serde(default)]
    pub allow_in_production: bool,

    /// Password overrides keyed by username.
    #[serde(default)]
    pub passwords: BTreeMap<String, String>,
}

impl fmt::Debug for BootstrapSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapSection")
            .field("enabled", &self.enabled)
            .field("allow_in_production", &self.allow_in_production)
            .field("passwords", &self.passwords.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// network
// ---------------------------------------------------------------------------

/// Browser-facing protections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkSection {
    /// Cross-origin resource sharing.
    #[serde(default)]
    pub cors: CorsSection,

    /// Double-submit CSRF protection.
    #[serde(default)]
    pub csrf: CsrfSection,

    /// Browser hardening headers.
    #[serde(default)]
    pub headers: HeadersSection,
}

/// CORS settings.
///
/// With no origins configured every cross-origin request is refused.
/// Credentials are allowed unless an origin is `*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsSection {
    /// Run the CORS stage.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Allowed origins; `*` allows any.
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// Allowed methods.
    #[serde(default = "default_cors_methods")]
    pub allowed_methods: Vec<String>,

    /// Allowed request headers; `*` allows any.
    #[serde(default = "default_cors_headers")]
    pub allowed_headers: Vec<String>,

    /// Response headers exposed to scripts.
    #[serde(default)]
    pub exposed_headers: Vec<String>,

    /// Preflight cache lifetime in seconds.
    #[serde(default = "default_cors_max_age")]
    pub max_age_secs: u64,
}

impl Default for CorsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: Vec::new(),
            allowed_methods: default_cors_methods(),
            allowed_headers: default_cors_headers(),
            exposed_headers: Vec::new(),
            max_age_secs: default_cors_max_age(),
        }
    }
}

impl CorsSection {
    /// Whether credentialed requests are allowed.
    #[must_use]
    pub fn allow_credentials(&self) -> bool {
        !self.allowed_origins.iter().any(|o| o == "*")
    }

    /// Returns the preflight cache lifetime.
    #[must_use]
    pub const fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

fn default_cors_methods() -> Vec<String> {
    ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_cors_headers() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_cors_max_age() -> u64 {
    1800
}

/// CSRF settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CsrfSection {
    /// Run the CSRF stage.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Header that must echo the cookie.
    #[serde(default = "default_csrf_header")]
    pub header_name: String,

    /// Cookie carrying the token.
    #[serde(default = "default_csrf_cookie")]
    pub cookie_name: String,

    /// Exempt paths; a trailing `/**` matches a whole subtree.
    #[serde(default = "default_csrf_ignored_paths")]
    pub ignored_paths: Vec<String>,
}

impl Default for CsrfSection {
    fn default() -> Self {
        Self {
            enabled: true,
            header_name: default_csrf_header(),
            cookie_name: default_csrf_cookie(),
            ignored_paths: default_csrf_ignored_paths(),
        }
    }
}

fn default_csrf_header() -> String {
    "X-CSRF-TOKEN".to_string()
}

fn default_csrf_cookie() -> String {
    "XSRF-TOKEN".to_string()
}

fn default_csrf_ignored_paths() -> Vec<String> {
    vec![
        format!("{DEFAULT_BASE_PATH}/login"),
        format!("{DEFAULT_BASE_PATH}/refresh"),
    ]
}

/// Response header settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeadersSection {
    /// Run the security headers stage.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// `DENY` or `SAMEORIGIN`.
    #[serde(default = "default_frame_options")]
    pub frame_options: String,

    /// Send `X-Content-Type-Options: nosniff`.
    #[serde(default = "default_true")]
    pub content_type_options: bool,

    /// Send `X-XSS-Protection`.
    #[serde(default = "default_true")]
    pub xss_protection: bool,

    /// HSTS lifetime in seconds; 0 disables HSTS.
    #[serde(default = "default_hsts_max_age")]
    pub hsts_max_age_secs: u64,

    /// Add `includeSubDomains` to HSTS.
    #[serde(default = "default_true")]
    pub hsts_include_subdomains: bool,

    /// Add `preload` to HSTS.
    #[serde(default)]
    pub hsts_preload: bool,

    /// Send `Content-Security-Policy`.
    #[serde(default)]
    pub csp_enabled: bool,

    /// The policy sent when CSP is enabled.
    #[serde(default = "default_csp_policy")]
    pub csp_policy: String,
}

impl Default for HeadersSection {
    fn default() -> Self {
        Self {
            enabled: true,
            frame_options: default_frame_options(),
            content_type_options: true,
            xss_protection: true,
            hsts_max_age_secs: default_hsts_max_age(),
            hsts_include_subdomains: true,
            hsts_preload: false,
            csp_enabled: false,
            csp_policy: default_csp_policy(),
        }
    }
}

fn default_frame_options() -> String {
    "DENY".to_string()
}

fn default_hsts_max_age() -> u64 {
    31_536_000
}

fn default_csp_policy() -> String {
    "default-src 'self'".to_string()
}

// ---------------------------------------------------------------------------
// endpoints
// ---------------------------------------------------------------------------

/// Base path of the authentication endpoints.
pub const DEFAULT_BASE_PATH: &str = "/api/auth";

/// Login, logout and refresh endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointsSection {
    /// Serve the endpoints.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path prefix; must start with `/`.
    #[serde(default = "default_base_path")]
    pub base_path: String,
}

impl Default for EndpointsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            base_path: default_base_path(),
        }
    }
}

fn default_base_path() -> String {
    DEFAULT_BASE_PATH.to_string()
}

// ---------------------------------------------------------------------------
// telemetry
// ---------------------------------------------------------------------------

/// Logging and metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    /// Log output.
    #[serde(default)]
    pub logging: LoggingSection,

    /// Prometheus export.
    #[serde(default)]
    pub metrics: MetricsSection,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable.
    Pretty,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Install a subscriber.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive, e.g. `info` or `aegis_auth=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include file and line.
    #[serde(default)]
    pub include_location: bool,

    /// Service name attached to log lines.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            include_location: false,
            service_name: default_service_name(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "aegis".to_string()
}

/// Metrics settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Install the Prometheus recorder.
    #[serde(default)]
    pub enabled: bool,

    /// Scrape listener address.
    #[serde(default = "default_metrics_addr")]
    pub addr: String,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_metrics_addr(),
        }
    }
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_true() -> bool {
    true
}
