//! Startup errors.

use aegis_config::ConfigError;
use aegis_core::AegisError;
use aegis_middleware::AssemblyError;
use aegis_telemetry::TelemetryError;
use aegis_token::TokenConfigError;
use thiserror::Error;

/// Why a [`Security`](crate::Security) could not be built.
///
/// Every variant is fatal: the service should refuse to start.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// The configuration did not load or validate.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The Token Manager refused its settings.
    #[error(transparent)]
    Token(#[from] TokenConfigError),

    /// A stage plugin could not be placed.
    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    /// Logging or metrics could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// Provider registration, bootstrap or another domain fault.
    #[error(transparent)]
    Core(#[from] AegisError),
}

/// Result type for building a [`Security`](crate::Security).
pub type SecurityResult<T> = Result<T, SecurityError>;
