//! Credential values and the credential-type enumeration used for provider dispatch.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of credential a caller presents.
///
/// Every provider's `supports()` switches on this enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    /// A login name and password.
    UsernamePassword,
    /// A signed bearer token.
    BearerToken,
    /// A static API key.
    ApiKey,
    /// A provider-defined credential kind.
    Custom(String),
}

impl CredentialType {
    /// Returns a stable label for logs and metrics.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::UsernamePassword => "username_password",
            Self::BearerToken => "bearer_token",
            Self::ApiKey => "api_key",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A credential presented for authentication.
///
/// The `Debug` output never contains secrets.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// A login name and password.
    UsernamePassword {
        /// The login name.
        username: String,
        /// The plaintext password.
        password: String,
    },
    /// A signed bearer token.
    BearerToken {
        /// The encoded token.
        token: String,
    },
    /// A static API key.
    ApiKey {
        /// The key material.
        key: String,
    },
    /// A provider-defined credential.
    Custom {
        /// The credential kind, matched against [`CredentialType::Custom`].
        kind: String,
        /// Opaque payload.
        payload: serde_json::Value,
    },
}

impl Credentials {
    /// Creates username/password credentials.
    #[must_use]
    pub fn username_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::UsernamePassword {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Creates bearer-token credentials.
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::BearerToken {
            token: token.into(),
        }
    }

    /// Returns the type of this credential.
    #[must_use]
    pub fn credential_type(&self) -> CredentialType {
        match self {
            Self::UsernamePassword { .. } => CredentialType::UsernamePassword,
            Self::BearerToken { .. } => CredentialType::BearerToken,
            Self::ApiKey { .. } => CredentialType::ApiKey,
            Self::Custom { kind, .. } => CredentialType::Custom(kind.clone()),
        }
    }

    /// Returns the claimed principal, if the credential names one.
    #[must_use]
    pub fn principal(&self) -> Option<&str> {
        match self {
            Self::UsernamePassword { username, .. } => Some(username),
            _ => None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UsernamePassword { username, .. } => f
                .debug_struct("UsernamePassword")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::BearerToken { .. } => f
                .debug_struct("BearerToken")
                .field("token", &"[REDACTED]")
                .finish(),
            Self::ApiKey { .. } => f.debug_struct("ApiKey").field("key", &"[REDACTED]").finish(),
            Self::Custom { kind, .. } => f
                .debug_struct("Custom")
                .field("kind", kind)
                .finish_non_exhaustive(),
        }
    }
}
