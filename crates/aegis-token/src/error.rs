//! Token Manager construction errors.

use aegis_core::AegisError;
use thiserror::Error;

/// Reasons a Token Manager refuses to start.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenConfigError {
    /// No signing secret was configured.
    #[error("token signing secret is not configured")]
    MissingSecret,

    /// The secret is not valid base64.
    #[error("token signing secret is not valid base64: {0}")]
    InvalidSecretEncoding(String),

    /// The decoded secret is shorter than the algorithm requires.
    #[error("{algorithm} requires a signing key of at least {min_bytes} bytes, got {actual_bytes}")]
    WeakKey {
        /// Algorithm name.
        algorithm: &'static str,
        /// Minimum key length in bytes.
        min_bytes: usize,
        /// Decoded key length in bytes.
        actual_bytes: usize,
    },

    /// The configured TTL is zero.
    #[error("token TTL must be greater than zero")]
    ZeroTtl,

    /// The configured TTL does not fit in a timestamp.
    #[error("token TTL is out of range")]
    TtlOutOfRange,

    /// Unknown algorithm name.
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

impl From<TokenConfigError> for AegisError {
    fn from(err: TokenConfigError) -> Self {
        AegisError::configuration(err.to_string())
    }
}
