//! Provider registry and dispatch.

use crate::provider::AuthenticationProvider;
use aegis_core::{
    AegisError, AegisResult, AuthenticationResult, CredentialType, Credentials, FailureCode,
    Subject,
};
use aegis_telemetry::logging::fields::{PROVIDER, SUBJECT_ID};
use std::fmt;
use std::sync::Arc;

type ProviderFactory = Box<dyn FnOnce() -> AegisResult<Arc<dyn AuthenticationProvider>> + Send>;

/// An immutable, ordered set of authentication providers.
///
/// Dispatch picks the first provider, in registration order, whose
/// [`supports`](AuthenticationProvider::supports) accepts the credential type.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn AuthenticationProvider>>,
}

impl ProviderRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::new()
    }

    /// Authenticates `credentials` with the first supporting provider.
    ///
    /// # Errors
    ///
    /// Propagates provider faults. Rejected credentials are `Ok(Failure)`.
    pub async fn authenticate(&self, credentials: &Credentials) -> AegisResult<AuthenticationResult> {
        let credential_type = credentials.credential_type();
        let Some(provider) = self.provider_for(&credential_type) else {
            tracing::debug!(credential_type = %credential_type, "No provider supports credential type");
            aegis_telemetry::record_authentication("none", FailureCode::UnsupportedCredentialType.as_str());
            return Ok(AuthenticationResult::failure(
                FailureCode::UnsupportedCredentialType,
                "unsupported credential type",
            ));
        };

        let result = provider.authenticate(credentials).await;
        match &result {
            Ok(AuthenticationResult::Success { subject, .. }) => {
                tracing::debug!(
                    { PROVIDER } = provider.name(),
                    { SUBJECT_ID } = subject.subject_id(),
                    "Authentication succeeded"
                );
                aegis_telemetry::record_authentication(provider.name(), "success");
            }
            Ok(AuthenticationResult::Failure { code, message }) => {
                tracing::debug!(
                    { PROVIDER } = provider.name(),
                    code = code.as_str(),
                    reason = %message,
                    "Authentication failed"
                );
                aegis_telemetry::record_authentication(provider.name(), code.as_str());
            }
            Err(e) => {
                tracing::error!({ PROVIDER } = provider.name(), error = %e, "Authentication provider fault");
                aegis_telemetry::record_authentication(provider.name(), "error");
            }
        }
        result
    }

    /// Returns the provider that would handle `credential_type`.
    #[must_use]
    pub fn provider_for(&self, credential_type: &CredentialType) -> Option<&Arc<dyn AuthenticationProvider>> {
        self.providers.iter().find(|p| p.supports(credential_type))
    }

    /// Returns the provider registered under `name`.
    #[must_use]
    pub fn provider(&self, name: &str) -> Option<&Arc<dyn AuthenticationProvider>> {
        self.providers.iter().find(|p| p.name() == name)
    }

    /// Returns provider names in registration order.
    #[must_use]
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Loads a subject through the named provider.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no provider has that name.
    pub async fn load_subject(&self, provider: &str, username: &str) -> AegisResult<Option<Subject>> {
        let provider = self
            .provider(provider)
            .ok_or_else(|| AegisError::configuration(format!("unknown provider: {provider}")))?;
        provider.load_subject(username).await
    }

    /// Number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns true if no providers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Builder for [`ProviderRegistry`].
///
/// # Example
///
/// ```ignore
/// let registry = ProviderRegistry::builder()
///     .register(Arc::new(ldap_provider))?
///     .register_default_if_absent("username-password", || {
///         Ok(Arc::new(CredentialAuthenticationProvider::new(store, hasher)))
///     })
///     .build()?;
/// ```
#[derive(Default)]
pub struct ProviderRegistryBuilder {
    providers: Vec<Arc<dyn AuthenticationProvider>>,
    defaults: Vec<(String, ProviderFactory)>,
}

impl fmt::Debug for ProviderRegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistryBuilder")
            .field("providers", &self.providers)
            .field(
                "defaults",
                &self.defaults.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ProviderRegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the name is already registered.
    pub fn register(mut self, provider: Arc<dyn AuthenticationProvider>) -> AegisResult<Self> {
        if self.providers.iter().any(|p| p.name() == provider.name()) {
            return Err(AegisError::configuration(format!(
                "duplicate authentication provider: {}",
                provider.name()
            )));
        }
        self.providers.push(provider);
        Ok(self)
    }

    /// Registers a fallback created only if no provider named `name` has
    /// been registered by the time [`build`](Self::build) runs.
    #[must_use]
    pub fn register_default_if_absent<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: FnOnce() -> AegisResult<Arc<dyn AuthenticationProvider>> + Send + 'static,
    {
        self.defaults.push((name.into(), Box::new(factory)));
        self
    }

    /// Resolves defaults and builds the registry.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a default factory fails, produces a
    /// provider with a different name, or if no provider ends up registered.
    pub fn build(self) -> AegisResult<ProviderRegistry> {
        let Self {
            mut providers,
            defaults,
        } = self;

        for (name, factory) in defaults {
            if providers.iter().any(|p| p.name() == name) {
                tracing::debug!({ PROVIDER } = %name, "Explicit provider registered, skipping default");
                continue;
            }
            let provider = factory()?;
            if provider.name() != name {
                return Err(AegisError::configuration(format!(
                    "default provider registered as {name} reports name {}",
                    provider.name()
                )));
            }
            providers.push(provider);
        }

        if providers.is_empty() {
            return Err(AegisError::configuration(
                "no authentication providers registered",
            ));
        }

        tracing::info!(
            providers = ?providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            "Authentication providers registered"
        );
        Ok(ProviderRegistry { providers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_core::BoxFuture;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Debug)]
    struct StubProvider {
        name: &'static str,
        handles: CredentialType,
    }

    impl StubProvider {
        fn new(name: &'static str, handles: CredentialType) -> Arc<dyn AuthenticationProvider> {
            Arc::new(Self { name, handles })
        }
    }

    impl AuthenticationProvider for StubProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn supports(&self, credential_type: &CredentialType) -> bool {
            *credential_type == self.handles
        }

        fn authenticate<'a>(
            &'a self,
            _credentials: &'a Credentials,
        ) -> BoxFuture<'a, AegisResult<AuthenticationResult>> {
            let subject = Subject::builder(self.name).build();
            Box::pin(async move { Ok(AuthenticationResult::success(subject)) })
        }

        fn load_subject<'a>(
            &'a self,
            username: &'a str,
        ) -> BoxFuture<'a, AegisResult<Option<Subject>>> {
            Box::pin(async move { Ok(Some(Subject::builder(username).build())) })
        }
    }

    #[tokio::test]
    async fn test_first_supporting_provider_wins() {
        let registry = ProviderRegistry::builder()
            .register(StubProvider::new("first", CredentialType::UsernamePassword))
            .unwrap()
            .register(StubProvider::new("second", CredentialType::UsernamePassword))
            .unwrap()
            .build()
            .unwrap();

        let result = registry
            .authenticate(&Credentials::username_password("a", "b"))
            .await
            .unwrap();
        assert_eq!(result.subject().map(Subject::subject_id), Some("first"));
    }

    #[tokio::test]
    async fn test_unsupported_credential_type() {
        let registry = ProviderRegistry::builder()
            .register(StubProvider::new("pw", CredentialType::UsernamePassword))
            .unwrap()
            .build()
            .unwrap();

        let result = registry
            .authenticate(&Credentials::ApiKey { key: "k".into() })
            .await
            .unwrap();
        assert_eq!(
            result.failure_code(),
            Some(FailureCode::UnsupportedCredentialType)
        );
        if let AuthenticationResult::Failure { message, .. } = result {
            assert_eq!(message, "unsupported credential type");
        }
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = ProviderRegistry::builder()
            .register(StubProvider::new("pw", CredentialType::UsernamePassword))
            .unwrap()
            .register(StubProvider::new("pw", CredentialType::ApiKey))
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_default_does_not_override_explicit() {
        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();

        let registry = ProviderRegistry::builder()
            .register_default_if_absent("pw", move || {
                flag.store(true, Ordering::SeqCst);
                Ok(StubProvider::new("pw", CredentialType::ApiKey))
            })
            .register(StubProvider::new("pw", CredentialType::UsernamePassword))
            .unwrap()
            .build()
            .unwrap();

        assert!(!called.load(Ordering::SeqCst));
        assert_eq!(registry.provider_names(), vec!["pw"]);
        assert!(registry
            .provider_for(&CredentialType::UsernamePassword)
            .is_some());
    }

    #[test]
    fn test_default_used_when_absent() {
        let registry = ProviderRegistry::builder()
            .register_default_if_absent("fallback", || {
                Ok(StubProvider::new("fallback", CredentialType::UsernamePassword))
            })
            .build()
            .unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.provider("fallback").is_some());
    }

    #[test]
    fn test_empty_registry_is_configuration_error() {
        let err = ProviderRegistry::builder().build().unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_load_subject_by_provider_name() {
        let registry = ProviderRegistry::builder()
            .register(StubProvider::new("pw", CredentialType::UsernamePassword))
            .unwrap()
            .build()
            .unwrap();

        let subject = registry.load_subject("pw", "alice").await.unwrap();
        assert_eq!(subject.map(|s| s.subject_id().to_string()), Some("alice".into()));
        assert!(registry.load_subject("nope", "alice").await.is_err());
    }
}
