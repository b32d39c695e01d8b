//! Layered configuration loading.
//!
//! Layers apply in call order and a later layer replaces what an earlier one
//! set. Environment overrides always apply last, at [`ConfigLoader::load`].
//!
//! Environment variables take the form `{PREFIX}__{SECTION}__{KEY}`, for
//! example `AEGIS__AUTH__TOKEN__SECRET` or `AEGIS__NETWORK__CORS__ALLOWED_ORIGINS`.
//! List values are comma separated. Unknown keys are ignored.

use std::env;
use std::fs;
use std::path::Path;

use crate::{ConfigError, LogFormat, SecurityConfig};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "AEGIS";

/// Builds a [`SecurityConfig`] from defaults, files, strings and the environment.
///
/// # Example
///
/// ```no_run
/// use aegis_config::ConfigLoader;
///
/// # fn main() -> Result<(), aegis_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_optional_file("aegis.toml")?
///     .with_env_prefix("AEGIS")
///     .load()?;
/// println!("CORS enabled: {}", config.network.cors.enabled);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: SecurityConfig,
    env_prefix: Option<String>,
    file_loaded: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader holding the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: SecurityConfig::default(),
            env_prefix: None,
            file_loaded: false,
        }
    }

    /// Resets to [`SecurityConfig::default`].
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = SecurityConfig::default();
        self
    }

    /// Resets to [`SecurityConfig::development`].
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = SecurityConfig::development();
        self
    }

    /// Resets to [`SecurityConfig::production`].
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = SecurityConfig::production();
        self
    }

    /// Loads a TOML or JSON file, chosen by extension.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing, unreadable, or does not parse.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        self.config = Self::parse_file(&content, path)?;
        self.file_loaded = true;
        Ok(self)
    }

    /// Like [`with_file`](Self::with_file), but a missing file is skipped.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Parses configuration from a string in `toml` or `json` format.
    ///
    /// ```
    /// use aegis_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[endpoints]\nbase_path = \"/auth\"", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    /// assert_eq!(config.endpoints.base_path, "/auth");
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_ascii_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            other => {
                return Err(ConfigError::validation_error(format!(
                    "unsupported configuration format: {other}"
                )))
            }
        };
        Ok(self)
    }

    /// Enables environment overrides under `prefix`, uppercased.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Enables environment overrides under [`DEFAULT_ENV_PREFIX`].
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_env_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Loads a `.env` file from the working directory into the process
    /// environment. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::Dotenv(e.to_string())),
        }
    }

    /// Whether a configuration file was loaded.
    #[must_use]
    pub fn file_loaded(&self) -> bool {
        self.file_loaded
    }

    /// Applies environment overrides and validates.
    pub fn load(self) -> Result<SecurityConfig, ConfigError> {
        let config = self.load_unvalidated()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies environment overrides without validating.
    pub fn load_unvalidated(mut self) -> Result<SecurityConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix, env::vars())?;
        }
        Ok(self.config)
    }

    fn parse_file(content: &str, path: &Path) -> Result<SecurityConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("toml")
            .to_ascii_lowercase();
        match extension.as_str() {
            "json" => Ok(serde_json::from_str(content)?),
            "toml" => Ok(toml::from_str(content)?),
            other => Err(ConfigError::validation_error(format!(
                "unsupported configuration file extension: {other}"
            ))),
        }
    }

    fn apply_env_overrides<I>(&mut self, prefix: &str, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let marker = format!("{prefix}__");
        for (key, value) in vars.into_iter().filter(|(k, _)| k.starts_with(&marker)) {
            self.apply_env_var(&key, &value, &marker)?;
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, marker: &str) -> Result<(), ConfigError> {
        let Some(path) = key.strip_prefix(marker) else {
            return Ok(());
        };
        let parts: Vec<&str> = path.split("__").collect();
        let c = &mut self.config;

        match parts.as_slice() {
            ["ENVIRONMENT"] => c.environment = value.to_string(),

            // auth.token
            ["AUTH", "TOKEN", "ENABLED"] => c.auth.token.enabled = bool_var(key, value)?,
            ["AUTH", "TOKEN", "SECRET"] => c.auth.token.secret = Some(value.to_string()),
            ["AUTH", "TOKEN", "TTL_SECS"] => c.auth.token.ttl_secs = u64_var(key, value)?,
            ["AUTH", "TOKEN", "ALGORITHM"] => c.auth.token.algorithm = value.to_uppercase(),
            ["AUTH", "TOKEN", "ISSUER"] => c.auth.token.issuer = Some(value.to_string()),
            ["AUTH", "TOKEN", "AUDIENCE"] => c.auth.token.audience = list_var(value),
            ["AUTH", "TOKEN", "REJECT_INVALID_TOKENS"] => {
                c.auth.token.reject_invalid_tokens = bool_var(key, value)?;
            }

            // auth.bootstrap
            ["AUTH", "BOOTSTRAP", "ENABLED"] => c.auth.bootstrap.enabled = bool_var(key, value)?,
            ["AUTH", "BOOTSTRAP", "ALLOW_IN_PRODUCTION"] => {
                c.auth.bootstrap.allow_in_production = bool_var(key, value)?;
            }
            ["AUTH", "BOOTSTRAP", "PASSWORDS", user] => {
                c.auth.bootstrap
                    .passwords
                    .insert(user.to_ascii_lowercase(), value.to_string());
            }

            // network.cors
            ["NETWORK", "CORS", "ENABLED"] => c.network.cors.enabled = bool_var(key, value)?,
            ["NETWORK", "CORS", "ALLOWED_ORIGINS"] => {
                c.network.cors.allowed_origins = list_var(value);
            }
            ["NETWORK", "CORS", "ALLOWED_METHODS"] => {
                c.network.cors.allowed_methods = list_var(value);
            }
            ["NETWORK", "CORS", "ALLOWED_HEADERS"] => {
                c.network.cors.allowed_headers = list_var(value);
            }
            ["NETWORK", "CORS", "EXPOSED_HEADERS"] => {
                c.network.cors.exposed_headers = list_var(value);
            }
            ["NETWORK", "CORS", "MAX_AGE_SECS"] => c.network.cors.max_age_secs = u64_var(key, value)?,

            // network.csrf
            ["NETWORK", "CSRF", "ENABLED"] => c.network.csrf.enabled = bool_var(key, value)?,
            ["NETWORK", "CSRF", "HEADER_NAME"] => c.network.csrf.header_name = value.to_string(),
            ["NETWORK", "CSRF", "COOKIE_NAME"] => c.network.csrf.cookie_name = value.to_string(),
            ["NETWORK", "CSRF", "IGNORED_PATHS"] => c.network.csrf.ignored_paths = list_var(value),

            // network.headers
            ["NETWORK", "HEADERS", "ENABLED"] => c.network.headers.enabled = bool_var(key, value)?,
            ["NETWORK", "HEADERS", "FRAME_OPTIONS"] => {
                c.network.headers.frame_options = value.to_uppercase();
            }
            ["NETWORK", "HEADERS", "CONTENT_TYPE_OPTIONS"] => {
                c.network.headers.content_type_options = bool_var(key, value)?;
            }
            ["NETWORK", "HEADERS", "XSS_PROTECTION"] => {
                c.network.headers.xss_protection = bool_var(key, value)?;
            }
            ["NETWORK", "HEADERS", "HSTS_MAX_AGE_SECS"] => {
                c.network.headers.hsts_max_age_secs = u64_var(key, value)?;
            }
            ["NETWORK", "HEADERS", "HSTS_INCLUDE_SUBDOMAINS"] => {
                c.network.headers.hsts_include_subdomains = bool_var(key, value)?;
            }
            ["NETWORK", "HEADERS", "HSTS_PRELOAD"] => {
                c.network.headers.hsts_preload = bool_var(key, value)?;
            }
            ["NETWORK", "HEADERS", "CSP_ENABLED"] => {
                c.network.headers.csp_enabled = bool_var(key, value)?;
            }
            ["NETWORK", "HEADERS", "CSP_POLICY"] => c.network.headers.csp_policy = value.to_string(),

            // endpoints
            ["ENDPOINTS", "ENABLED"] => c.endpoints.enabled = bool_var(key, value)?,
            ["ENDPOINTS", "BASE_PATH"] => c.endpoints.base_path = value.to_string(),

            // telemetry
            ["TELEMETRY", "LOGGING", "ENABLED"] => {
                c.telemetry.logging.enabled = bool_var(key, value)?;
            }
            ["TELEMETRY", "LOGGING", "LEVEL"] => c.telemetry.logging.level = value.to_string(),
            ["TELEMETRY", "LOGGING", "FORMAT"] => {
                c.telemetry.logging.format = match value.to_ascii_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["TELEMETRY", "LOGGING", "INCLUDE_LOCATION"] => {
                c.telemetry.logging.include_location = bool_var(key, value)?;
            }
            ["TELEMETRY", "LOGGING", "SERVICE_NAME"] => {
                c.telemetry.logging.service_name = value.to_string();
            }
            ["TELEMETRY", "METRICS", "ENABLED"] => {
                c.telemetry.metrics.enabled = bool_var(key, value)?;
            }
            ["TELEMETRY", "METRICS", "ADDR"] => c.telemetry.metrics.addr = value.to_string(),

            _ => {}
        }

        Ok(())
    }
}

fn bool_var(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

fn u64_var(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

fn list_var(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_loader_defaults() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config, SecurityConfig::default());
    }

    #[test]
    fn test_loader_presets() {
        let config = ConfigLoader::new().with_development().load().unwrap();
        assert!(config.auth.bootstrap.enabled);
        let config = ConfigLoader::new().with_production().load().unwrap();
        assert!(config.is_production());
        assert!(!config.auth.bootstrap.enabled);
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{"network": {"cors": {"allowed_origins": ["https://a.example"]}}}"#;
        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.network.cors.allowed_origins, ["https://a.example"]);
    }

    #[test]
    fn test_loader_with_string_unknown_format() {
        let result = ConfigLoader::new().with_string("", "yaml");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_loader_with_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[auth.token]\nenabled = true\nsecret = \"c2VjcmV0\"").unwrap();

        let loader = ConfigLoader::new().with_file(file.path()).unwrap();
        assert!(loader.file_loaded());
        let config = loader.load().unwrap();
        assert!(config.auth.token.enabled);
    }

    #[test]
    fn test_loader_with_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"endpoints": {{"enabled": false}}}}"#).unwrap();

        let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();
        assert!(!config.endpoints.enabled);
    }

    #[test]
    fn test_loader_file_not_found() {
        let result = ConfigLoader::new().with_file("/nonexistent/aegis.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));

        let loader = ConfigLoader::new()
            .with_optional_file("/nonexistent/aegis.toml")
            .unwrap();
        assert!(!loader.file_loaded());
    }

    #[test]
    fn test_loader_validates_on_load() {
        let loader = ConfigLoader::new()
            .with_string("[auth.token]\nenabled = true", "toml")
            .unwrap();
        assert!(matches!(loader.load(), Err(ConfigError::MissingField { .. })));

        let config = ConfigLoader::new()
            .with_string("[auth.token]\nenabled = true", "toml")
            .unwrap()
            .load_unvalidated()
            .unwrap();
        assert!(config.auth.token.enabled);
    }

    #[test]
    fn test_parse_bool() {
        for yes in ["true", "TRUE", "1", "yes", "on"] {
            assert_eq!(parse_bool(yes), Some(true));
        }
        for no in ["false", "0", "no", "Off"] {
            assert_eq!(parse_bool(no), Some(false));
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_env_overrides() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_overrides(
                "AEGIS",
                vars(&[
                    ("AEGIS__AUTH__TOKEN__ENABLED", "yes"),
                    ("AEGIS__AUTH__TOKEN__SECRET", "c2VjcmV0"),
                    ("AEGIS__AUTH__TOKEN__TTL_SECS", "600"),
                    ("AEGIS__NETWORK__CORS__ALLOWED_ORIGINS", "https://a.example, https://b.example"),
                    ("AEGIS__NETWORK__HEADERS__FRAME_OPTIONS", "sameorigin"),
                    ("AEGIS__AUTH__BOOTSTRAP__PASSWORDS__ADMIN", "s3cret"),
                    ("AEGIS__TELEMETRY__LOGGING__FORMAT", "pretty"),
                    ("OTHER__AUTH__TOKEN__ENABLED", "false"),
                    ("AEGIS__UNKNOWN__KEY", "ignored"),
                ]),
            )
            .unwrap();

        let c = &loader.config;
        assert!(c.auth.token.enabled);
        assert_eq!(c.auth.token.secret.as_deref(), Some("c2VjcmV0"));
        assert_eq!(c.auth.token.ttl_secs, 600);
        assert_eq!(
            c.network.cors.allowed_origins,
            ["https://a.example", "https://b.example"]
        );
        assert_eq!(c.network.headers.frame_options, "SAMEORIGIN");
        assert_eq!(c.auth.bootstrap.passwords.get("admin").map(String::as_str), Some("s3cret"));
        assert_eq!(c.telemetry.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_env_override_parse_errors() {
        let mut loader = ConfigLoader::new();
        let err = loader
            .apply_env_overrides("AEGIS", vars(&[("AEGIS__AUTH__TOKEN__TTL_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::EnvParseError { ref var, .. } if var == "AEGIS__AUTH__TOKEN__TTL_SECS"));

        let err = loader
            .apply_env_overrides("AEGIS", vars(&[("AEGIS__NETWORK__CSRF__ENABLED", "perhaps")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::EnvParseError { .. }));
    }

    #[test]
    fn test_env_overrides_follow_file() {
        let mut loader = ConfigLoader::new()
            .with_string("[endpoints]\nbase_path = \"/from-file\"", "toml")
            .unwrap();
        loader
            .apply_env_overrides("AEGIS", vars(&[("AEGIS__ENDPOINTS__BASE_PATH", "/from-env")]))
            .unwrap();
        assert_eq!(loader.config.endpoints.base_path, "/from-env");
    }
}
