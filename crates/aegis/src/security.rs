//! Wiring configuration, providers and stages into a running [`Security`].

use crate::endpoints::AuthEndpoints;
use crate::error::SecurityResult;
use aegis_auth::{
    seed_development_subjects, AuthenticationProvider, BcryptHasher, BootstrapOptions,
    CredentialAuthenticationProvider, InMemorySubjectStore, PasswordHasher, ProviderRegistry,
    SubjectStore, CREDENTIAL_PROVIDER_NAME,
};
use aegis_config::{
    CorsSection, CsrfSection, HeadersSection, LogFormat, SecurityConfig, TelemetrySection,
    TokenSection,
};
use aegis_core::{AegisError, AegisResult, Clock, SystemClock};
use aegis_middleware::stages::{
    default_rules, AccessRule, AuthorizationMiddleware, CorsMiddleware, CsrfConfig,
    CsrfMiddleware, FrameOptions, HstsConfig, Requirement, SecurityHeadersConfig,
    SecurityHeadersMiddleware, TokenVerificationMiddleware,
};
use aegis_middleware::{
    AuditPublisher, AuditSink, BoxFuture, BuiltinStage, MiddlewareContext, PathPattern, Pipeline,
    PipelineAssembler, Request, Response, StageDescriptor, StagePlugin,
};
use aegis_telemetry::{LogConfig, MetricsConfig, TelemetryConfig};
use aegis_token::{SigningAlgorithm, TokenManager, TokenManagerConfig};
use http::Method;
use std::fmt;
use std::sync::Arc;

/// The assembled security layer.
///
/// Built once at startup and shared across requests.
#[derive(Debug, Clone)]
pub struct Security {
    config: Arc<SecurityConfig>,
    pipeline: Pipeline,
    registry: ProviderRegistry,
    token_manager: Option<Arc<TokenManager>>,
    endpoints: AuthEndpoints,
}

impl Security {
    /// Starts building from `config`.
    #[must_use]
    pub fn builder(config: SecurityConfig) -> SecurityBuilder {
        SecurityBuilder::new(config)
    }

    /// Runs `request` through the pipeline.
    ///
    /// Requests under the endpoints' base path are answered by
    /// [`AuthEndpoints`]; everything else reaches `handler`.
    pub async fn handle<H>(&self, ctx: &mut MiddlewareContext, request: Request, handler: H) -> Response
    where
        H: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'static,
    {
        if self.endpoints.handles(request.uri().path()) {
            let endpoints = self.endpoints.clone();
            self.pipeline
                .process(ctx, request, move |ctx, request| endpoints.dispatch(ctx, request))
                .await
        } else {
            self.pipeline.process(ctx, request, handler).await
        }
    }

    /// Returns the configuration in force.
    #[must_use]
    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    /// Returns the assembled pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Returns the provider registry.
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Returns the Token Manager, if tokens are enabled.
    #[must_use]
    pub fn token_manager(&self) -> Option<&Arc<TokenManager>> {
        self.token_manager.as_ref()
    }

    /// Returns the authentication endpoints.
    #[must_use]
    pub fn endpoints(&self) -> &AuthEndpoints {
        &self.endpoints
    }
}

/// Builder for [`Security`].
///
/// # Example
///
/// ```ignore
/// let security = Security::builder(config)
///     .subject_store(Arc::new(my_store))
///     .access_rule(AccessRule::new("/api/admin/**", Requirement::authority("ROLE_ADMIN")))
///     .stage(StageDescriptor::new("rate_limit", RateLimiter::default()).before("authorization"))
///     .build()?;
/// ```
pub struct SecurityBuilder {
    config: SecurityConfig,
    store: Option<Arc<dyn SubjectStore>>,
    hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
    audit_sink: Option<Arc<dyn AuditSink>>,
    providers: Vec<Arc<dyn AuthenticationProvider>>,
    plugins: Vec<Arc<dyn StagePlugin>>,
    rules: Vec<AccessRule>,
    default_requirement: Requirement,
    init_telemetry: bool,
}

impl fmt::Debug for SecurityBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityBuilder")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("providers", &self.providers)
            .field("plugins", &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("rules", &self.rules)
            .field("default_requirement", &self.default_requirement)
            .field("init_telemetry", &self.init_telemetry)
            .finish_non_exhaustive()
    }
}

impl SecurityBuilder {
    /// Creates a builder with bcrypt hashing, the wall clock and the
    /// tracing audit sink.
    #[must_use]
    pub fn new(config: SecurityConfig) -> Self {
        Self {
            config,
            store: None,
            hasher: Arc::new(BcryptHasher::new()),
            clock: Arc::new(SystemClock),
            audit_sink: None,
            providers: Vec::new(),
            plugins: Vec::new(),
            rules: Vec::new(),
            default_requirement: Requirement::Authenticated,
            init_telemetry: false,
        }
    }

    /// Uses `store` for username/password lookups.
    #[must_use]
    pub fn subject_store(mut self, store: Arc<dyn SubjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replaces the password hasher.
    #[must_use]
    pub fn password_hasher(mut self, hasher: Arc<dyn PasswordHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Replaces the time source.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sends audit events to `sink`.
    #[must_use]
    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    /// Registers a provider ahead of the built-in username/password one.
    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn AuthenticationProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Adds a stage plugin.
    #[must_use]
    pub fn stage_plugin(mut self, plugin: Arc<dyn StagePlugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Adds a stage.
    #[must_use]
    pub fn stage(self, descriptor: StageDescriptor) -> Self {
        self.stage_plugin(Arc::new(descriptor))
    }

    /// Appends an access rule. Login and refresh stay public regardless.
    #[must_use]
    pub fn access_rule(mut self, rule: AccessRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Appends several access rules.
    #[must_use]
    pub fn access_rules(mut self, rules: impl IntoIterator<Item = AccessRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Sets the requirement for paths no rule matches.
    #[must_use]
    pub fn default_requirement(mut self, requirement: Requirement) -> Self {
        self.default_requirement = requirement;
        self
    }

    /// Installs logging and metrics from the configuration during
    /// [`build`](Self::build).
    #[must_use]
    pub fn init_telemetry(mut self, init: bool) -> Self {
        self.init_telemetry = init;
        self
    }

    /// Validates the configuration and assembles everything.
    ///
    /// # Errors
    ///
    /// Fails, and the service should not start, if:
    /// - the configuration does not validate
    /// - the token secret is missing, not base64, or too short
    /// - no subject store is injected and bootstrap is disabled
    /// - bootstrap is enabled in production without opt-in
    /// - providers collide by name
    /// - a stage plugin's target cannot be resolved
    pub fn build(self) -> SecurityResult<Security> {
        let Self {
            config,
            store,
            hasher,
            clock,
            audit_sink,
            providers,
            plugins,
            rules,
            default_requirement,
            init_telemetry,
        } = self;

        config.validate()?;
        if init_telemetry {
            aegis_telemetry::init_telemetry(&telemetry_config(&config.telemetry))?;
        }

        let token_manager = build_token_manager(&config.auth.token, Arc::clone(&clock))?;
        let store = resolve_store(&config, store, hasher.as_ref())?;
        let registry = build_registry(providers, store, hasher, Arc::clone(&clock))?;

        let publisher = audit_sink.map_or_else(AuditPublisher::default, AuditPublisher::new);
        let authorization = AuthorizationMiddleware::new(publisher)
            .with_clock(clock)
            .rules(default_rules(&config.endpoints.base_path))
            .rules(rules)
            .default_requirement(default_requirement);

        let mut assembler = PipelineAssembler::new();
        let network = &config.network;
        if network.cors.enabled {
            assembler = assembler.base_stage(
                BuiltinStage::Cors.name(),
                Arc::new(cors_stage(&network.cors)?),
            );
        }
        if network.csrf.enabled {
            assembler = assembler.base_stage(
                BuiltinStage::Csrf.name(),
                Arc::new(CsrfMiddleware::new(csrf_config(&network.csrf))),
            );
        }
        if network.headers.enabled {
            assembler = assembler.base_stage(
                BuiltinStage::SecurityHeaders.name(),
                Arc::new(SecurityHeadersMiddleware::new(&headers_config(&network.headers)?)),
            );
        }
        if let Some(manager) = &token_manager {
            assembler = assembler.base_stage(
                BuiltinStage::TokenVerification.name(),
                Arc::new(
                    TokenVerificationMiddleware::new(Arc::clone(manager))
                        .reject_invalid_tokens(config.auth.token.reject_invalid_tokens)
                        .skip_paths(unverified_paths(&config)),
                ),
            );
        }
        assembler = assembler.base_stage(BuiltinStage::Authorization.name(), Arc::new(authorization));
        for plugin in plugins {
            assembler = assembler.register(plugin);
        }
        let pipeline = assembler.assemble()?;

        let endpoints = AuthEndpoints::new(
            registry.clone(),
            token_manager.clone(),
            config.endpoints.base_path.clone(),
        )
        .enabled(config.endpoints.enabled);

        tracing::info!(
            environment = %config.environment,
            stages = ?pipeline.stage_names(),
            providers = ?registry.provider_names(),
            tokens = token_manager.is_some(),
            "Security initialized"
        );

        Ok(Security {
            config: Arc::new(config),
            pipeline,
            registry,
            token_manager,
            endpoints,
        })
    }
}

fn build_token_manager(
    section: &TokenSection,
    clock: Arc<dyn Clock>,
) -> SecurityResult<Option<Arc<TokenManager>>> {
    if !section.enabled {
        return Ok(None);
    }
    let mut token_config = TokenManagerConfig {
        secret: section.secret.clone(),
        ttl: section.ttl(),
        algorithm: section.algorithm.parse::<SigningAlgorithm>()?,
        issuer: None,
        audience: Vec::new(),
    };
    if let Some(issuer) = &section.issuer {
        token_config = token_config.with_issuer(issuer.clone());
    }
    token_config = token_config.with_audience(section.audience.iter().cloned());
    Ok(Some(Arc::new(TokenManager::with_clock(token_config, clock)?)))
}

fn resolve_store(
    config: &SecurityConfig,
    store: Option<Arc<dyn SubjectStore>>,
    hasher: &dyn PasswordHasher,
) -> AegisResult<Option<Arc<dyn SubjectStore>>> {
    let bootstrap = &config.auth.bootstrap;
    match store {
        Some(store) => {
            if bootstrap.enabled {
                tracing::warn!("A subject store was injected; development users are not seeded");
            }
            Ok(Some(store))
        }
        None if bootstrap.enabled => {
            let memory = InMemorySubjectStore::new();
            let options = BootstrapOptions {
                environment: config.environment.clone(),
                allow_in_production: bootstrap.allow_in_production,
                passwords: bootstrap
                    .passwords
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            };
            seed_development_subjects(&memory, hasher, &options)?;
            Ok(Some(Arc::new(memory)))
        }
        None => Ok(None),
    }
}

fn build_registry(
    providers: Vec<Arc<dyn AuthenticationProvider>>,
    store: Option<Arc<dyn SubjectStore>>,
    hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
) -> AegisResult<ProviderRegistry> {
    let mut builder = ProviderRegistry::builder();
    for provider in providers {
        builder = builder.register(provider)?;
    }
    builder
        .register_default_if_absent(CREDENTIAL_PROVIDER_NAME, move || {
            let store = store.ok_or_else(|| {
                AegisError::configuration(
                    "no subject store configured; inject one or enable auth.bootstrap",
                )
            })?;
            let provider: Arc<dyn AuthenticationProvider> =
                Arc::new(CredentialAuthenticationProvider::with_clock(store, hasher, clock));
            Ok(provider)
        })
        .build()
}

/// Login and refresh are answered without looking at the bearer token.
fn unverified_paths(config: &SecurityConfig) -> Vec<PathPattern> {
    if !config.endpoints.enabled {
        return Vec::new();
    }
    default_rules(&config.endpoints.base_path)
        .into_iter()
        .map(|rule| rule.pattern)
        .collect()
}

fn parse_methods(section: &CorsSection) -> AegisResult<Vec<Method>> {
    section
        .allowed_methods
        .iter()
        .map(|m| {
            Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                .map_err(|_| AegisError::configuration(format!("invalid CORS method: {m}")))
        })
        .collect()
}

fn cors_stage(section: &CorsSection) -> AegisResult<CorsMiddleware> {
    Ok(CorsMiddleware::builder()
        .allow_origins(section.allowed_origins.iter().cloned())
        .allow_methods(parse_methods(section)?)
        .allow_headers(section.allowed_headers.iter().cloned())
        .expose_headers(section.exposed_headers.iter().cloned())
        .allow_credentials(section.allow_credentials())
        .max_age(section.max_age())
        .build())
}

fn csrf_config(section: &CsrfSection) -> CsrfConfig {
    section
        .ignored_paths
        .iter()
        .fold(
            CsrfConfig {
                header_name: section.header_name.clone(),
                cookie_name: section.cookie_name.clone(),
                ignored_paths: Vec::new(),
            },
            |config, path| config.ignore(path.as_str()),
        )
}

fn headers_config(section: &HeadersSection) -> AegisResult<SecurityHeadersConfig> {
    let frame_options = section
        .frame_options
        .parse::<FrameOptions>()
        .map_err(AegisError::configuration)?;
    let hsts = (section.hsts_max_age_secs > 0).then(|| HstsConfig {
        max_age: std::time::Duration::from_secs(section.hsts_max_age_secs),
        include_subdomains: section.hsts_include_subdomains,
        preload: section.hsts_preload,
    });
    Ok(SecurityHeadersConfig {
        frame_options: Some(frame_options),
        content_type_options: section.content_type_options,
        xss_protection: section.xss_protection,
        hsts,
        content_security_policy: section.csp_enabled.then(|| section.csp_policy.clone()),
    })
}

/// Maps the telemetry section onto [`aegis_telemetry`] settings.
#[must_use]
pub fn telemetry_config(section: &TelemetrySection) -> TelemetryConfig {
    let logging = &section.logging;
    TelemetryConfig {
        logging: LogConfig {
            enabled: logging.enabled,
            level: logging.level.clone(),
            json_format: logging.format == LogFormat::Json,
            span_events: false,
            file_line_info: logging.include_location,
            thread_ids: false,
            include_target: true,
            service_name: logging.service_name.clone(),
        },
        metrics: MetricsConfig {
            enabled: section.metrics.enabled,
            addr: section.metrics.addr.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SecurityError;

    const SECRET: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";

    fn quick_bootstrap() -> SecurityConfig {
        let mut config = SecurityConfig::default();
        config.auth.bootstrap.enabled = true;
        config.auth.bootstrap.passwords.insert("admin".into(), "admin123".into());
        config.auth.bootstrap.passwords.insert("user".into(), "user123".into());
        config
    }

    fn builder(config: SecurityConfig) -> SecurityBuilder {
        Security::builder(config).password_hasher(Arc::new(BcryptHasher::with_cost(4)))
    }

    #[test]
    fn test_missing_store_is_configuration_error() {
        let err = builder(SecurityConfig::default()).build().unwrap_err();
        assert!(matches!(err, SecurityError::Core(ref e) if e.is_configuration()));
    }

    #[test]
    fn test_default_stage_order() {
        let security = builder(quick_bootstrap()).build().unwrap();
        assert_eq!(
            security.pipeline().stage_names(),
            vec!["cors", "csrf", "security_headers", "authorization"]
        );
        assert!(security.token_manager().is_none());
    }

    #[test]
    fn test_token_stage_when_enabled() {
        let mut config = quick_bootstrap();
        config.auth.token.enabled = true;
        config.auth.token.secret = Some(SECRET.into());
        config.network.cors.enabled = false;
        let security = builder(config).build().unwrap();
        assert_eq!(
            security.pipeline().stage_names(),
            vec!["csrf", "security_headers", "token_verification", "authorization"]
        );
    }

    #[test]
    fn test_weak_secret_refuses_to_start() {
        let mut config = quick_bootstrap();
        config.auth.token.enabled = true;
        config.auth.token.secret = Some("c2hvcnQ=".into());
        let err = builder(config).build().unwrap_err();
        assert!(matches!(err, SecurityError::Token(_)));
    }

    #[test]
    fn test_bootstrap_refused_in_production() {
        let mut config = quick_bootstrap();
        config.environment = "production".into();
        let err = builder(config).build().unwrap_err();
        assert!(matches!(err, SecurityError::Config(_)));
    }

    #[test]
    fn test_plugin_targeting_disabled_stage_fails() {
        let mut config = quick_bootstrap();
        config.network.csrf.enabled = false;
        let err = builder(config)
            .stage(StageDescriptor::new("audit_trail", SecurityHeadersMiddleware::default()).after("csrf"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SecurityError::Assembly(_)));
    }

    #[test]
    fn test_headers_config_mapping() {
        let section = HeadersSection {
            frame_options: "sameorigin".into(),
            hsts_max_age_secs: 0,
            csp_enabled: true,
            ..HeadersSection::default()
        };
        let mapped = headers_config(&section).unwrap();
        assert_eq!(mapped.frame_options, Some(FrameOptions::SameOrigin));
        assert!(mapped.hsts.is_none());
        assert_eq!(mapped.content_security_policy.as_deref(), Some("default-src 'self'"));
    }

    #[test]
    fn test_telemetry_mapping() {
        let mut section = TelemetrySection::default();
        section.logging.format = LogFormat::Pretty;
        section.logging.include_location = true;
        let mapped = telemetry_config(&section);
        assert!(!mapped.logging.json_format);
        assert!(mapped.logging.file_line_info);
        assert!(!mapped.metrics.enabled);
    }
}
