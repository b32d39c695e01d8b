//! Typed configuration for Aegis.
//!
//! - TOML and JSON files
//! - Environment variable overrides (`AEGIS__SECTION__KEY`)
//! - Strict parsing that fails on unknown fields
//! - Layering: defaults, then file, then environment
//!
//! The root type is [`SecurityConfig`]:
//!
//! - [`AuthSection`]: token manager and development subjects
//! - [`NetworkSection`]: CORS, CSRF and response headers
//! - [`EndpointsSection`]: login, logout and refresh
//! - [`TelemetrySection`]: logging and metrics
//!
//! # Example
//!
//! ```no_run
//! use aegis_config::ConfigLoader;
//!
//! # fn main() -> Result<(), aegis_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_dotenv()?
//!     .with_file("aegis.toml")?
//!     .with_env()
//!     .load()?;
//! println!("Auth endpoints at {}", config.endpoints.base_path);
//! # Ok(())
//! # }
//! ```
//!
//! # File format
//!
//! ```toml
//! environment = "production"
//!
//! [auth.token]
//! enabled = true
//! secret = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY="
//! ttl_secs = 3600
//! algorithm = "HS256"
//!
//! [network.cors]
//! allowed_origins = ["https://app.example.com"]
//!
//! [network.headers]
//! csp_enabled = true
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//! ```

#![doc(html_root_url = "https://docs.rs/aegis-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{SecurityConfig, SecurityConfigBuilder, PRODUCTION};
pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::{
    AuthSection, BootstrapSection, CorsSection, CsrfSection, EndpointsSection, HeadersSection,
    LogFormat, LoggingSection, MetricsSection, NetworkSection, TelemetrySection, TokenSection,
    DEFAULT_BASE_PATH,
};
