//! Username/password provider.

use crate::hasher::PasswordHasher;
use crate::provider::AuthenticationProvider;
use crate::store::SubjectStore;
use aegis_core::{
    AegisError, AegisResult, AuthenticationResult, BoxFuture, Clock, CredentialType, Credentials,
    FailureCode, Subject, SystemClock,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Name of the built-in username/password provider.
pub const CREDENTIAL_PROVIDER_NAME: &str = "username-password";

/// Authenticates usernames and passwords against a [`SubjectStore`].
///
/// On success the subject's last-active time is refreshed and written back
/// to the store.
#[derive(Debug)]
pub struct CredentialAuthenticationProvider {
    store: Arc<dyn SubjectStore>,
    hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
}

impl CredentialAuthenticationProvider {
    /// Creates a provider reading the wall clock.
    #[must_use]
    pub fn new(store: Arc<dyn SubjectStore>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self::with_clock(store, hasher, Arc::new(SystemClock))
    }

    /// Creates a provider reading time from `clock`.
    #[must_use]
    pub fn with_clock(
        store: Arc<dyn SubjectStore>,
        hasher: Arc<dyn PasswordHasher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            hasher,
            clock,
        }
    }

    async fn verify_password(&self, plain: &str, digest: &str) -> AegisResult<bool> {
        let hasher = Arc::clone(&self.hasher);
        let plain = plain.to_string();
        let digest = digest.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&plain, &digest))
            .await
            .map_err(|e| AegisError::internal_with_source("password verification task failed", e))?
    }

    async fn authenticate_password(
        &self,
        username: &str,
        password: &str,
    ) -> AegisResult<AuthenticationResult> {
        if username.is_empty() || password.is_empty() {
            return Ok(AuthenticationResult::failure(
                FailureCode::MissingCredentials,
                "username and password are required",
            ));
        }

        let Some(record) = self.store.find(username).await? else {
            return Ok(AuthenticationResult::failure(
                FailureCode::UserNotFound,
                format!("no subject named {username}"),
            ));
        };

        if !record.subject().is_active() {
            return Ok(AuthenticationResult::failure(
                FailureCode::UserInactive,
                format!("subject is {}", record.subject().status().as_str()),
            ));
        }

        if !self.verify_password(password, record.password_digest()).await? {
            return Ok(AuthenticationResult::failure(
                FailureCode::InvalidPassword,
                "password does not match",
            ));
        }

        let now = self.clock.now();
        let updated = record.subject().to_builder().last_active_time(now).build();
        self.store.save(record.with_subject(updated.clone())).await?;

        let mut details = BTreeMap::new();
        details.insert("provider".to_string(), CREDENTIAL_PROVIDER_NAME.into());
        details.insert("authenticated_at".to_string(), now.to_rfc3339().into());
        Ok(AuthenticationResult::success_with_details(updated, details))
    }
}

impl AuthenticationProvider for CredentialAuthenticationProvider {
    fn name(&self) -> &str {
        CREDENTIAL_PROVIDER_NAME
    }

    fn supports(&self, credential_type: &CredentialType) -> bool {
        matches!(credential_type, CredentialType::UsernamePassword)
    }

    fn authenticate<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, AegisResult<AuthenticationResult>> {
        Box::pin(async move {
            match credentials {
                Credentials::UsernamePassword { username, password } => {
                    self.authenticate_password(username, password).await
                }
                other => Ok(AuthenticationResult::failure(
                    FailureCode::UnsupportedCredentialType,
                    format!("unsupported credential type: {}", other.credential_type()),
                )),
            }
        })
    }

    fn load_subject<'a>(&'a self, username: &'a str) -> BoxFuture<'a, AegisResult<Option<Subject>>> {
        Box::pin(async move {
            Ok(self
                .store
                .find(username)
                .await?
                .map(crate::store::StoredSubject::into_subject))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::BcryptHasher;
    use crate::store::{InMemorySubjectStore, StoredSubject};
    use aegis_core::{ManualClock, SubjectStatus, GENERIC_FAILURE_MESSAGE};
    use chrono::{TimeZone, Utc};

    #[derive(Debug)]
    struct BrokenStore;

    impl SubjectStore for BrokenStore {
        fn find<'a>(
            &'a self,
            _username: &'a str,
        ) -> BoxFuture<'a, AegisResult<Option<StoredSubject>>> {
            Box::pin(async { Err(AegisError::store("connection refused")) })
        }

        fn save(&self, _record: StoredSubject) -> BoxFuture<'_, AegisResult<()>> {
            Box::pin(async { Err(AegisError::store("connection refused")) })
        }
    }

    struct Fixture {
        store: Arc<InMemorySubjectStore>,
        clock: Arc<ManualClock>,
        provider: CredentialAuthenticationProvider,
    }

    fn fixture() -> Fixture {
        let hasher = Arc::new(BcryptHasher::with_cost(4));
        let store = Arc::new(InMemorySubjectStore::new());
        store.insert(StoredSubject::new(
            Subject::builder("admin").role("ROLE_ADMIN").build(),
            hasher.hash("admin123").unwrap(),
        ));
        store.insert(StoredSubject::new(
            Subject::builder("locked-id")
                .username("locked")
                .status(SubjectStatus::Locked)
                .build(),
            hasher.hash("secret").unwrap(),
        ));
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 2, 1, 9, 30, 0).unwrap(),
        ));
        let provider =
            CredentialAuthenticationProvider::with_clock(store.clone(), hasher, clock.clone());
        Fixture {
            store,
            clock,
            provider,
        }
    }

    #[tokio::test]
    async fn test_success_refreshes_last_active_time() {
        let f = fixture();
        let result = f
            .provider
            .authenticate(&Credentials::username_password("admin", "admin123"))
            .await
            .unwrap();

        let AuthenticationResult::Success { subject, details } = result else {
            panic!("expected success");
        };
        assert_eq!(subject.last_active_time(), Some(f.clock.now()));
        assert_eq!(details["provider"], CREDENTIAL_PROVIDER_NAME);
        assert!(details.contains_key("authenticated_at"));

        let stored = f.store.get("admin").unwrap();
        assert_eq!(stored.subject().last_active_time(), Some(f.clock.now()));
    }

    #[tokio::test]
    async fn test_failure_codes() {
        let f = fixture();
        let cases = [
            ("admin", "wrong", FailureCode::InvalidPassword),
            ("ghost", "admin123", FailureCode::UserNotFound),
            ("locked", "secret", FailureCode::UserInactive),
            ("", "admin123", FailureCode::MissingCredentials),
            ("admin", "", FailureCode::MissingCredentials),
        ];
        for (username, password, expected) in cases {
            let result = f
                .provider
                .authenticate(&Credentials::username_password(username, password))
                .await
                .unwrap();
            assert_eq!(result.failure_code(), Some(expected), "{username}/{password}");
            assert_eq!(result.public_message(), Some(GENERIC_FAILURE_MESSAGE));
        }
    }

    #[tokio::test]
    async fn test_missing_credentials_skip_store() {
        let provider = CredentialAuthenticationProvider::new(
            Arc::new(BrokenStore),
            Arc::new(BcryptHasher::with_cost(4)),
        );
        let result = provider
            .authenticate(&Credentials::username_password("", ""))
            .await
            .unwrap();
        assert_eq!(result.failure_code(), Some(FailureCode::MissingCredentials));
    }

    #[tokio::test]
    async fn test_store_fault_is_error_not_failure() {
        let provider = CredentialAuthenticationProvider::new(
            Arc::new(BrokenStore),
            Arc::new(BcryptHasher::with_cost(4)),
        );
        let err = provider
            .authenticate(&Credentials::username_password("admin", "admin123"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "STORE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_bearer_credentials_not_supported() {
        let f = fixture();
        assert!(!f.provider.supports(&CredentialType::BearerToken));
        let result = f
            .provider
            .authenticate(&Credentials::bearer("abc"))
            .await
            .unwrap();
        assert_eq!(
            result.failure_code(),
            Some(FailureCode::UnsupportedCredentialType)
        );
    }

    #[tokio::test]
    async fn test_load_subject_and_token_defaults() {
        let f = fixture();
        let subject = f.provider.load_subject("admin").await.unwrap().unwrap();
        assert!(subject.has_role("ROLE_ADMIN"));
        assert!(f.provider.load_subject("ghost").await.unwrap().is_none());

        let now = f.clock.now();
        let token = aegis_core::Token::new("v", "admin", now, now);
        assert!(!f.provider.validate_token(&token));
        assert!(f.provider.refresh_token(&token).is_none());
    }
}
