//! Observability for Aegis: structured logging and Prometheus counters.
//!
//! - **Logging**: JSON or pretty output through `tracing-subscriber`
//! - **Metrics**: counters through the `metrics` facade, exported in
//!   Prometheus format
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `aegis_authentication_total` | Counter | `provider`, `outcome` |
//! | `aegis_tokens_issued_total` | Counter | - |
//! | `aegis_token_verification_total` | Counter | `outcome` |
//! | `aegis_authorization_decisions_total` | Counter | `decision` |
//! | `aegis_audit_publish_failures_total` | Counter | - |
//!
//! Recording helpers are no-ops until a recorder is installed, so library
//! code can call them unconditionally.
//!
//! # Example
//!
//! ```rust,ignore
//! use aegis_telemetry::{init_telemetry, TelemetryConfig};
//!
//! init_telemetry(&TelemetryConfig::default())?;
//! ```

#![doc(html_root_url = "https://docs.rs/aegis-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{
    init_metrics, record_audit_failure, record_authentication, record_authorization,
    record_token_issued, record_token_verification, render_metrics, MetricsConfig,
};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Configuration for both telemetry subsystems.
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Logging configuration.
    pub logging: LogConfig,
    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

/// Initializes logging, then metrics.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_telemetry_is_noop() {
        let config = TelemetryConfig {
            logging: LogConfig {
                enabled: false,
                ..LogConfig::default()
            },
            metrics: MetricsConfig {
                enabled: false,
                ..MetricsConfig::default()
            },
        };
        assert!(init_telemetry(&config).is_ok());
    }
}
