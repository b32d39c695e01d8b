//! # Aegis Auth
//!
//! Pluggable authentication for Aegis.
//!
//! - [`AuthenticationProvider`] - the strategy interface
//! - [`ProviderRegistry`] - ordered dispatch by credential type
//! - [`CredentialAuthenticationProvider`] - username/password against a [`SubjectStore`]
//! - [`PasswordHasher`] / [`BcryptHasher`] - opaque hashing primitive
//! - [`InMemorySubjectStore`] - concurrent in-process store
//! - [`seed_development_subjects`] - opt-in development users
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(InMemorySubjectStore::new());
//! let provider = CredentialAuthenticationProvider::new(store, Arc::new(BcryptHasher::new()));
//! let registry = ProviderRegistry::builder().register(Arc::new(provider))?.build()?;
//!
//! let result = registry
//!     .authenticate(&Credentials::username_password("admin", "admin123"))
//!     .await?;
//! ```

#![doc(html_root_url = "https://docs.rs/aegis-auth/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod bootstrap;
mod credential;
mod hasher;
mod provider;
mod registry;
mod store;

pub use bootstrap::{seed_development_subjects, BootstrapOptions};
pub use credential::{CredentialAuthenticationProvider, CREDENTIAL_PROVIDER_NAME};
pub use hasher::{BcryptHasher, PasswordHasher};
pub use provider::AuthenticationProvider;
pub use registry::{ProviderRegistry, ProviderRegistryBuilder};
pub use store::{InMemorySubjectStore, StoredSubject, SubjectStore};
