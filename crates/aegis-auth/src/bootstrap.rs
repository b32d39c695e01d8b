//! Development users.
//!
//! Seeds an [`InMemorySubjectStore`] with an administrator and a regular
//! user so a fresh service can be exercised without an external store.
//! Refused in production unless explicitly allowed.

use crate::hasher::PasswordHasher;
use crate::store::{InMemorySubjectStore, StoredSubject};
use aegis_core::{AegisError, AegisResult, Subject};
use rand::Rng;
use std::collections::HashMap;

const PASSWORD_CHARSET: &[u8] =
    b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnpqrstuvwxyz23456789!@#$%^&*";
const GENERATED_PASSWORD_LEN: usize = 16;

/// Settings for [`seed_development_subjects`].
#[derive(Clone, Default)]
pub struct BootstrapOptions {
    /// Deployment environment name.
    pub environment: String,
    /// Permit seeding when `environment` is `production`.
    pub allow_in_production: bool,
    /// Passwords by username. Missing entries are generated.
    pub passwords: HashMap<String, String>,
}

impl std::fmt::Debug for BootstrapOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapOptions")
            .field("environment", &self.environment)
            .field("allow_in_production", &self.allow_in_production)
            .field("passwords", &self.passwords.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl BootstrapOptions {
    /// Returns true if seeding is allowed in this environment.
    #[must_use]
    pub fn is_permitted(&self) -> bool {
        !self.environment.eq_ignore_ascii_case("production") || self.allow_in_production
    }
}

fn development_subjects() -> [Subject; 2] {
    [
        Subject::builder("admin")
            .username("admin")
            .display_name("System Administrator")
            .roles(["ROLE_ADMIN", "ROLE_USER"])
            .permissions(["CREATE", "READ", "UPDATE", "DELETE"])
            .build(),
        Subject::builder("user001")
            .username("user")
            .display_name("Regular User")
            .roles(["ROLE_USER"])
            .permissions(["READ", "UPDATE"])
            .build(),
    ]
}

/// Seeds `store` with the development subjects and returns their usernames.
///
/// # Errors
///
/// Returns a configuration error when running in production without
/// `allow_in_production`, and a hashing error if a password cannot be hashed.
pub fn seed_development_subjects(
    store: &InMemorySubjectStore,
    hasher: &dyn PasswordHasher,
    options: &BootstrapOptions,
) -> AegisResult<Vec<String>> {
    if !options.is_permitted() {
        return Err(AegisError::configuration(
            "development users cannot be bootstrapped in production; \
             set auth.bootstrap.allow_in_production to override",
        ));
    }

    let mut seeded = Vec::new();
    for subject in development_subjects() {
        let username = subject.username().to_string();
        let password = match options.passwords.get(&username) {
            Some(password) if !password.is_empty() => password.clone(),
            _ => {
                let generated = generate_password(GENERATED_PASSWORD_LEN);
                tracing::warn!(
                    username = %username,
                    password = %generated,
                    "!!! DEVELOPMENT USER CREATED WITH GENERATED PASSWORD. DO NOT USE IN PRODUCTION !!!"
                );
                generated
            }
        };
        store.insert(StoredSubject::new(subject, hasher.hash(&password)?));
        seeded.push(username);
    }

    tracing::warn!(
        environment = %options.environment,
        users = ?seeded,
        "Development users bootstrapped into the in-memory store"
    );
    Ok(seeded)
}

fn generate_password(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..PASSWORD_CHARSET.len());
            char::from(PASSWORD_CHARSET[idx])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::BcryptHasher;

    fn options(environment: &str) -> BootstrapOptions {
        BootstrapOptions {
            environment: environment.to_string(),
            ..BootstrapOptions::default()
        }
    }

    #[test]
    fn test_seeds_admin_and_user() {
        let store = InMemorySubjectStore::new();
        let hasher = BcryptHasher::with_cost(4);
        let mut opts = options("development");
        opts.passwords.insert("admin".into(), "admin123".into());

        let seeded = seed_development_subjects(&store, &hasher, &opts).unwrap();
        assert_eq!(seeded, vec!["admin", "user"]);

        let admin = store.get("admin").unwrap();
        assert_eq!(admin.subject().display_name(), Some("System Administrator"));
        assert!(admin.subject().has_role("ROLE_ADMIN"));
        assert!(admin.subject().has_permission("DELETE"));
        assert!(hasher.verify("admin123", admin.password_digest()).unwrap());

        let user = store.get("user").unwrap();
        assert_eq!(user.subject().subject_id(), "user001");
        assert!(!user.subject().has_role("ROLE_ADMIN"));
        assert!(!hasher.verify("", user.password_digest()).unwrap());
    }

    #[test]
    fn test_refused_in_production() {
        let store = InMemorySubjectStore::new();
        let err = seed_development_subjects(&store, &BcryptHasher::with_cost(4), &options("production"))
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(store.is_empty());
    }

    #[test]
    fn test_production_opt_in() {
        let store = InMemorySubjectStore::new();
        let opts = BootstrapOptions {
            allow_in_production: true,
            ..options("PRODUCTION")
        };
        assert!(seed_development_subjects(&store, &BcryptHasher::with_cost(4), &opts).is_ok());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_generated_password_shape() {
        let password = generate_password(GENERATED_PASSWORD_LEN);
        assert_eq!(password.chars().count(), 16);
        assert!(password.bytes().all(|b| PASSWORD_CHARSET.contains(&b)));
    }
}
