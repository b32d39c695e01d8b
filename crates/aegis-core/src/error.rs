//! Error types for Aegis.
//!
//! Aegis separates three kinds of trouble:
//!
//! | Kind | Type | Seen by the client as |
//! |---|---|---|
//! | Expected authentication outcome | [`AuthenticationResult::Failure`](crate::AuthenticationResult) | a generic 401 |
//! | Token problem | [`TokenError`] | 401 |
//! | Fault or misconfiguration | [`AegisError`] | 500, or a refusal to start |
//!
//! Authentication failures are values, not errors. An [`AegisError`] always means
//! that something other than the caller's credentials went wrong.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`AegisError`].
pub type AegisResult<T> = Result<T, AegisError>;

/// Categories of errors for classification and handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Startup configuration is missing or unsafe.
    Configuration,
    /// A backing store failed.
    Store,
    /// The password hashing primitive failed.
    Hashing,
    /// Anything else that is not the caller's fault.
    Internal,
}

impl ErrorCategory {
    /// Returns the default HTTP status code for this error category.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::Configuration | Self::Hashing | Self::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Store => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Standard error type for Aegis.
///
/// # Example
///
/// ```
/// use aegis_core::{AegisError, ErrorCategory};
///
/// let err = AegisError::configuration("signing secret is not configured");
/// assert_eq!(err.category(), ErrorCategory::Configuration);
/// ```
#[derive(Error, Debug)]
pub enum AegisError {
    /// Configuration is missing, weak, or inconsistent.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Human-readable error message.
        message: String,
    },

    /// The subject store could not be reached or returned garbage.
    #[error("Store error: {message}")]
    Store {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Password hashing failed.
    #[error("Hashing error: {message}")]
    Hashing {
        /// Human-readable error message.
        message: String,
    },

    /// Internal error.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl AegisError {
    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a store error.
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a store error with a source error.
    pub fn store_with_source(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Store {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates a hashing error.
    #[must_use]
    pub fn hashing(message: impl Into<String>) -> Self {
        Self::Hashing {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Store { .. } => ErrorCategory::Store,
            Self::Hashing { .. } => ErrorCategory::Hashing,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.category().default_status_code()
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Store { .. } => "STORE_UNAVAILABLE",
            Self::Hashing { .. } => "HASHING_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

/// Errors produced while issuing or parsing bearer tokens.
///
/// Expired and malformed tokens are kept apart because the remedy differs:
/// an expired token calls for a fresh login, a malformed one is simply rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The token's expiration time has passed.
    #[error("token has expired")]
    Expired,

    /// The token is structurally invalid or its signature does not verify.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// The token could not be signed.
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl TokenError {
    /// Returns the stable external code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Expired => "TOKEN_EXPIRED",
            Self::Malformed(_) => "INVALID_TOKEN",
            Self::Signing(_) => "TOKEN_SIGNING_FAILED",
        }
    }

    /// Returns a client-safe message for this error.
    #[must_use]
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::Expired => "Token has expired, please log in again",
            Self::Malformed(_) => "Invalid token",
            Self::Signing(_) => "Token could not be issued",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error() {
        let err = AegisError::configuration("no signing key");
        assert!(err.is_configuration());
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
        assert!(err.to_string().contains("no signing key"));
    }

    #[test]
    fn test_store_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "db down");
        let err = AegisError::store_with_source("lookup failed", io);
        assert_eq!(err.category(), ErrorCategory::Store);
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_category_status_codes() {
        assert_eq!(
            ErrorCategory::Configuration.default_status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorCategory::Hashing.default_status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_token_error_codes() {
        assert_eq!(TokenError::Expired.code(), "TOKEN_EXPIRED");
        assert_eq!(TokenError::Malformed("x".into()).code(), "INVALID_TOKEN");
        assert_ne!(
            TokenError::Expired.public_message(),
            TokenError::Malformed("x".into()).public_message()
        );
    }

    #[test]
    fn test_category_serialization() {
        let json = serde_json::to_string(&ErrorCategory::Configuration).unwrap();
        assert_eq!(json, "\"configuration\"");
    }
}
