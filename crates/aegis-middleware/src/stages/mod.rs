//! Built-in pipeline stages.

mod authorization;
mod cors;
mod csrf;
mod security_headers;
mod token_verification;

pub use authorization::{
    default_rules, AccessRule, AuthorizationMiddleware, AuthorizationOutcome, Requirement,
};
pub use cors::{AllowedOrigins, CorsBuilder, CorsConfig, CorsMiddleware, DEFAULT_MAX_AGE};
pub use csrf::{CsrfConfig, CsrfMiddleware, DEFAULT_CSRF_COOKIE, DEFAULT_CSRF_HEADER};
pub use security_headers::{
    FrameOptions, HstsConfig, SecurityHeadersConfig, SecurityHeadersMiddleware,
    DEFAULT_CSP_POLICY, DEFAULT_HSTS_MAX_AGE,
};
pub use token_verification::{extract_bearer, TokenVerificationMiddleware};
