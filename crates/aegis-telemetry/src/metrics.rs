//! Prometheus counters for authentication and authorization.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Counter: authentication attempts by provider and outcome.
pub const AUTHENTICATION_TOTAL: &str = "aegis_authentication_total";
/// Counter: tokens issued, including refreshes.
pub const TOKENS_ISSUED_TOTAL: &str = "aegis_tokens_issued_total";
/// Counter: bearer token verification attempts by outcome.
pub const TOKEN_VERIFICATION_TOTAL: &str = "aegis_token_verification_total";
/// Counter: authorization decisions.
pub const AUTHORIZATION_DECISIONS_TOTAL: &str = "aegis_authorization_decisions_total";
/// Counter: audit events a sink failed to accept.
pub const AUDIT_PUBLISH_FAILURES_TOTAL: &str = "aegis_audit_publish_failures_total";

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Address of the Prometheus scrape listener (e.g. `"0.0.0.0:9090"`).
    pub addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Installs the Prometheus recorder and its HTTP listener.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidAddress` for an unparsable address and
/// `TelemetryError::MetricsInit` if the recorder cannot be installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", config.addr)))?;

    let handle = PrometheusBuilder::new()
        .with_http_listener(addr)
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);
    register_metric_descriptions();

    Ok(())
}

/// Renders metrics in Prometheus text format, if a recorder is installed.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(
        AUTHENTICATION_TOTAL,
        "Authentication attempts by provider and outcome"
    );
    describe_counter!(TOKENS_ISSUED_TOTAL, "Bearer tokens issued");
    describe_counter!(
        TOKEN_VERIFICATION_TOTAL,
        "Bearer token verifications by outcome"
    );
    describe_counter!(
        AUTHORIZATION_DECISIONS_TOTAL,
        "Authorization decisions by result"
    );
    describe_counter!(
        AUDIT_PUBLISH_FAILURES_TOTAL,
        "Audit events that could not be published"
    );
}

/// Records an authentication attempt.
///
/// `outcome` is `"success"` or a failure code such as `"INVALID_PASSWORD"`.
pub fn record_authentication(provider: &str, outcome: &str) {
    counter!(
        AUTHENTICATION_TOTAL,
        "provider" => provider.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Records an issued token.
pub fn record_token_issued() {
    counter!(TOKENS_ISSUED_TOTAL).increment(1);
}

/// Records a token verification, e.g. `"valid"`, `"expired"`, `"malformed"`.
pub fn record_token_verification(outcome: &str) {
    counter!(TOKEN_VERIFICATION_TOTAL, "outcome" => outcome.to_string()).increment(1);
}

/// Records an authorization decision.
pub fn record_authorization(allowed: bool) {
    let decision = if allowed { "allow" } else { "deny" };
    counter!(AUTHORIZATION_DECISIONS_TOTAL, "decision" => decision).increment(1);
}

/// Records an audit publishing failure.
pub fn record_audit_failure() {
    counter!(AUDIT_PUBLISH_FAILURES_TOTAL).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_disabled() {
        let config = MetricsConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.addr, "0.0.0.0:9090");
    }

    #[test]
    fn test_invalid_address_rejected() {
        let config = MetricsConfig {
            enabled: true,
            addr: "nowhere".to_string(),
        };
        assert!(matches!(
            init_metrics(&config),
            Err(TelemetryError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_record_functions_without_recorder() {
        record_authentication("username-password", "success");
        record_token_issued();
        record_token_verification("expired");
        record_authorization(false);
        record_audit_failure();
    }
}
