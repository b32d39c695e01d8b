//! The root [`SecurityConfig`] and its builder.

use serde::{Deserialize, Serialize};

use crate::{
    AuthSection, ConfigError, EndpointsSection, LogFormat, NetworkSection, TelemetrySection,
};

const HTTP_METHODS: [&str; 9] = [
    "GET", "HEAD", "POST", "PUT", "DELETE", "PATCH", "OPTIONS", "TRACE", "CONNECT",
];
const ALGORITHMS: [&str; 3] = ["HS256", "HS384", "HS512"];
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Name of the production environment.
pub const PRODUCTION: &str = "production";

/// Complete security configuration.
///
/// Load it with [`ConfigLoader`](crate::ConfigLoader), or start from
/// [`SecurityConfig::development`] / [`SecurityConfig::production`].
///
/// # Example
///
/// ```
/// use aegis_config::SecurityConfig;
///
/// let config = SecurityConfig::default();
/// assert_eq!(config.environment, "development");
/// assert!(config.network.cors.enabled);
/// assert!(!config.auth.token.enabled);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SecurityConfig {
    /// Deployment environment, e.g. `development` or `production`.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Tokens and development subjects.
    #[serde(default)]
    pub auth: AuthSection,

    /// CORS, CSRF and response headers.
    #[serde(default)]
    pub network: NetworkSection,

    /// Login, logout and refresh endpoints.
    #[serde(default)]
    pub endpoints: EndpointsSection,

    /// Logging and metrics.
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            auth: AuthSection::default(),
            network: NetworkSection::default(),
            endpoints: EndpointsSection::default(),
            telemetry: TelemetrySection::default(),
        }
    }
}

fn default_environment() -> String {
    "development".to_string()
}

impl SecurityConfig {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> SecurityConfigBuilder {
        SecurityConfigBuilder::new()
    }

    /// Whether the environment is `production` (case-insensitive).
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case(PRODUCTION)
    }

    /// Checks that the settings are usable together.
    ///
    /// # Errors
    ///
    /// Returns the first problem found:
    /// - a CORS method that is not an HTTP method
    /// - frame options other than `DENY` or `SAMEORIGIN`
    /// - CSP enabled with an empty policy
    /// - CSRF enabled with an empty header or cookie name
    /// - tokens enabled without a secret, with a zero TTL, or with an unknown algorithm
    /// - development subjects seeded in production without opt-in
    /// - an endpoint base path not starting with `/`
    /// - an unknown log level or a bad metrics address
    pub fn validate(&self) -> Result<(), ConfigError> {
        let cors = &self.network.cors;
        if let Some(method) = cors
            .allowed_methods
            .iter()
            .find(|m| !HTTP_METHODS.contains(&m.to_ascii_uppercase().as_str()))
        {
            return Err(ConfigError::invalid_value(
                "network.cors.allowed_methods",
                format!("{method} is not an HTTP method"),
            ));
        }

        let headers = &self.network.headers;
        if !["DENY", "SAMEORIGIN"].contains(&headers.frame_options.to_ascii_uppercase().as_str()) {
            return Err(ConfigError::invalid_value(
                "network.headers.frame_options",
                format!("expected DENY or SAMEORIGIN, got {}", headers.frame_options),
            ));
        }
        if headers.csp_enabled && headers.csp_policy.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "network.headers.csp_policy",
                "must not be empty when CSP is enabled",
            ));
        }

        let csrf = &self.network.csrf;
        if csrf.enabled && csrf.header_name.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "network.csrf.header_name",
                "must not be empty",
            ));
        }
        if csrf.enabled && csrf.cookie_name.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "network.csrf.cookie_name",
                "must not be empty",
            ));
        }

        let token = &self.auth.token;
        if token.enabled && token.secret.as_deref().map_or(true, |s| s.trim().is_empty()) {
            return Err(ConfigError::missing_field("auth.token.secret"));
        }
        if token.ttl_secs == 0 {
            return Err(ConfigError::invalid_value(
                "auth.token.ttl_secs",
                "must be greater than 0",
            ));
        }
        if !ALGORITHMS.contains(&token.algorithm.to_ascii_uppercase().as_str()) {
            return Err(ConfigError::invalid_value(
                "auth.token.algorithm",
                format!("unsupported algorithm {}", token.algorithm),
            ));
        }

        let bootstrap = &self.auth.bootstrap;
        if bootstrap.enabled && self.is_production() && !bootstrap.allow_in_production {
            return Err(ConfigError::validation_error(
                "auth.bootstrap.enabled seeds development subjects; set auth.bootstrap.allow_in_production to use it in production",
            ));
        }

        if !self.endpoints.base_path.starts_with('/') {
            return Err(ConfigError::invalid_value(
                "endpoints.base_path",
                "must start with '/'",
            ));
        }

        let logging = &self.telemetry.logging;
        if !LOG_LEVELS.contains(&logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::invalid_value(
                "telemetry.logging.level",
                format!("unknown level {}", logging.level),
            ));
        }

        let metrics = &self.telemetry.metrics;
        if metrics.enabled && metrics.addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "telemetry.metrics.addr",
                format!("invalid socket address: {}", metrics.addr),
            ));
        }

        Ok(())
    }

    /// Local development preset.
    ///
    /// Pretty debug logs, development subjects seeded, HSTS off.
    ///
    /// ```
    /// use aegis_config::SecurityConfig;
    ///
    /// let config = SecurityConfig::development();
    /// assert!(config.auth.bootstrap.enabled);
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.environment = "development".to_string();
        config.auth.bootstrap.enabled = true;
        config.network.headers.hsts_max_age_secs = 0;
        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = LogFormat::Pretty;
        config.telemetry.logging.include_location = true;
        config
    }

    /// Production preset.
    ///
    /// JSON logs, no development subjects, CSP on, invalid tokens rejected.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.environment = PRODUCTION.to_string();
        config.auth.bootstrap.enabled = false;
        config.auth.token.reject_invalid_tokens = true;
        config.network.headers.csp_enabled = true;
        config.telemetry.logging.level = "info".to_string();
        config.telemetry.logging.format = LogFormat::Json;
        config
    }
}

/// Builder for [`SecurityConfig`].
#[derive(Debug, Default)]
pub struct SecurityConfigBuilder {
    config: SecurityConfig,
}

impl SecurityConfigBuilder {
    /// Starts from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the environment.
    #[must_use]
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.config.environment = environment.into();
        self
    }

    /// Sets the auth section.
    #[must_use]
    pub fn auth(mut self, auth: AuthSection) -> Self {
        self.config.auth = auth;
        self
    }

    /// Sets the network section.
    #[must_use]
    pub fn network(mut self, network: NetworkSection) -> Self {
        self.config.network = network;
        self
    }

    /// Sets the endpoints section.
    #[must_use]
    pub fn endpoints(mut self, endpoints: EndpointsSection) -> Self {
        self.config.endpoints = endpoints;
        self
    }

    /// Sets the telemetry section.
    #[must_use]
    pub fn telemetry(mut self, telemetry: TelemetrySection) -> Self {
        self.config.telemetry = telemetry;
        self
    }

    /// Returns the configuration without validating it.
    #[must_use]
    pub fn build(self) -> SecurityConfig {
        self.config
    }

    /// Returns the configuration if it validates.
    pub fn build_validated(self) -> Result<SecurityConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BootstrapSection, HeadersSection, TokenSection};

    #[test]
    fn test_default_config_validates() {
        assert!(SecurityConfig::default().validate().is_ok());
        assert!(SecurityConfig::development().validate().is_ok());
        assert!(SecurityConfig::production().validate().is_ok());
    }

    #[test]
    fn test_rejects_unknown_cors_method() {
        let mut config = SecurityConfig::default();
        config.network.cors.allowed_methods.push("FETCH".to_string());
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "network.cors.allowed_methods"));
    }

    #[test]
    fn test_cors_methods_case_insensitive() {
        let mut config = SecurityConfig::default();
        config.network.cors.allowed_methods = vec!["get".into(), "patch".into()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_frame_options() {
        let config = SecurityConfig::builder()
            .network(NetworkSection {
                headers: HeadersSection {
                    frame_options: "ALLOW-FROM https://a.example".into(),
                    ..HeadersSection::default()
                },
                ..NetworkSection::default()
            })
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_csp_when_enabled() {
        let mut config = SecurityConfig::default();
        config.network.headers.csp_policy = "  ".into();
        assert!(config.validate().is_ok());
        config.network.headers.csp_enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_csrf_header() {
        let mut config = SecurityConfig::default();
        config.network.csrf.header_name = String::new();
        assert!(config.validate().is_err());
        config.network.csrf.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_token_rules() {
        let mut config = SecurityConfig::default();
        config.auth.token.enabled = true;
        assert!(matches!(config.validate(), Err(ConfigError::MissingField { .. })));

        config.auth.token.secret = Some("c2VjcmV0".into());
        assert!(config.validate().is_ok());

        config.auth.token.ttl_secs = 0;
        assert!(config.validate().is_err());

        config.auth.token.ttl_secs = 60;
        config.auth.token.algorithm = "RS256".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bootstrap_in_production_needs_opt_in() {
        let mut bootstrap = BootstrapSection {
            enabled: true,
            ..BootstrapSection::default()
        };
        let config = SecurityConfig::builder()
            .environment("Production")
            .auth(AuthSection {
                token: TokenSection::default(),
                bootstrap: bootstrap.clone(),
            })
            .build();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        bootstrap.allow_in_production = true;
        let config = SecurityConfig::builder()
            .environment("production")
            .auth(AuthSection {
                token: TokenSection::default(),
                bootstrap,
            })
            .build_validated();
        assert!(config.is_ok());
    }

    #[test]
    fn test_rejects_relative_base_path() {
        let mut config = SecurityConfig::default();
        config.endpoints.base_path = "api/auth".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_metrics_addr_only_when_enabled() {
        let mut config = SecurityConfig::default();
        config.telemetry.metrics.addr = "not-an-addr".into();
        assert!(config.validate().is_ok());
        config.telemetry.metrics.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_deserialization() {
        let toml = r#"
            environment = "production"

            [auth.token]
            enabled = true
            secret = "c2VjcmV0"
            ttl_secs = 900

            [network.cors]
            allowed_origins = ["https://app.example"]

            [network.headers]
            csp_enabled = true
        "#;
        let config: SecurityConfig = toml::from_str(toml).unwrap();
        assert!(config.is_production());
        assert_eq!(config.auth.token.ttl_secs, 900);
        assert_eq!(config.network.cors.allowed_origins, ["https://app.example"]);
        assert_eq!(config.network.cors.max_age_secs, 1800);
        assert!(config.network.csrf.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<SecurityConfig, _> = toml::from_str("[network.cors]\norigins = []");
        assert!(result.is_err());
        let result: Result<SecurityConfig, _> = toml::from_str("[server]\nport = 80");
        assert!(result.is_err());
    }
}
