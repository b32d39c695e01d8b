//! The authentication strategy interface.

use aegis_core::{
    AegisResult, AuthenticationResult, BoxFuture, CredentialType, Credentials, Subject, Token,
};
use std::fmt;

/// A pluggable authentication strategy.
///
/// Expected failures (unknown subject, wrong password, disabled account) are
/// returned as [`AuthenticationResult::Failure`]. An `Err` means something
/// other than the caller's credentials went wrong.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug)]
/// struct ApiKeyProvider { keys: HashMap<String, Subject> }
///
/// impl AuthenticationProvider for ApiKeyProvider {
///     fn name(&self) -> &str { "api-key" }
///
///     fn supports(&self, t: &CredentialType) -> bool {
///         matches!(t, CredentialType::ApiKey)
///     }
///
///     fn authenticate<'a>(&'a self, credentials: &'a Credentials)
///         -> BoxFuture<'a, AegisResult<AuthenticationResult>>
///     {
///         Box::pin(async move { /* ... */ })
///     }
///
///     fn load_subject<'a>(&'a self, id: &'a str) -> BoxFuture<'a, AegisResult<Option<Subject>>> {
///         Box::pin(async move { Ok(self.keys.values().find(|s| s.subject_id() == id).cloned()) })
///     }
/// }
/// ```
pub trait AuthenticationProvider: Send + Sync + fmt::Debug {
    /// Unique provider name.
    fn name(&self) -> &str;

    /// Returns true if this provider handles `credential_type`.
    fn supports(&self, credential_type: &CredentialType) -> bool;

    /// Authenticates the presented credentials.
    fn authenticate<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, AegisResult<AuthenticationResult>>;

    /// Loads a subject by username.
    fn load_subject<'a>(&'a self, username: &'a str) -> BoxFuture<'a, AegisResult<Option<Subject>>>;

    /// Returns true if the provider vouches for `token`.
    ///
    /// Credential-only providers do not support tokens and return `false`.
    fn validate_token(&self, _token: &Token) -> bool {
        false
    }

    /// Returns a refreshed token.
    ///
    /// Credential-only providers do not support tokens and return `None`.
    fn refresh_token(&self, _token: &Token) -> Option<Token> {
        None
    }
}
