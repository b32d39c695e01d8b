//! Token Manager settings.

use crate::error::TokenConfigError;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default token lifetime: one hour.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// HMAC signing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SigningAlgorithm {
    /// HMAC with SHA-256.
    #[default]
    Hs256,
    /// HMAC with SHA-384.
    Hs384,
    /// HMAC with SHA-512.
    Hs512,
}

impl SigningAlgorithm {
    /// Returns the JOSE name of the algorithm.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hs256 => "HS256",
            Self::Hs384 => "HS384",
            Self::Hs512 => "HS512",
        }
    }

    /// Minimum decoded key length, in bytes.
    ///
    /// Equal to the digest size of the underlying hash.
    #[must_use]
    pub const fn min_key_len(self) -> usize {
        match self {
            Self::Hs256 => 32,
            Self::Hs384 => 48,
            Self::Hs512 => 64,
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = TokenConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HS256" => Ok(Self::Hs256),
            "HS384" => Ok(Self::Hs384),
            "HS512" => Ok(Self::Hs512),
            _ => Err(TokenConfigError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl From<SigningAlgorithm> for jsonwebtoken::Algorithm {
    fn from(alg: SigningAlgorithm) -> Self {
        match alg {
            SigningAlgorithm::Hs256 => Self::HS256,
            SigningAlgorithm::Hs384 => Self::HS384,
            SigningAlgorithm::Hs512 => Self::HS512,
        }
    }
}

/// Settings for a [`TokenManager`](crate::TokenManager).
///
/// # Example
///
/// ```
/// use aegis_token::{SigningAlgorithm, TokenManagerConfig};
/// use std::time::Duration;
///
/// let config = TokenManagerConfig::new("c2VjcmV0")
///     .with_ttl(Duration::from_secs(900))
///     .with_algorithm(SigningAlgorithm::Hs384)
///     .with_issuer("aegis");
/// assert_eq!(config.ttl.as_secs(), 900);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct TokenManagerConfig {
    /// Base64-encoded signing secret.
    pub secret: Option<String>,
    /// Token lifetime.
    pub ttl: Duration,
    /// Signing algorithm.
    pub algorithm: SigningAlgorithm,
    /// Issuer embedded in, and required of, every token.
    pub issuer: Option<String>,
    /// Audience embedded in, and required of, every token.
    pub audience: Vec<String>,
}

impl Default for TokenManagerConfig {
    fn default() -> Self {
        Self {
            secret: None,
            ttl: DEFAULT_TTL,
            algorithm: SigningAlgorithm::default(),
            issuer: None,
            audience: Vec::new(),
        }
    }
}

impl fmt::Debug for TokenManagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManagerConfig")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("ttl", &self.ttl)
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

impl TokenManagerConfig {
    /// Creates settings with the given base64 secret and defaults elsewhere.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
            ..Self::default()
        }
    }

    /// Sets the token lifetime.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the signing algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: SigningAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sets the issuer.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Sets the audience.
    #[must_use]
    pub fn with_audience<I, S>(mut self, audience: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.audience = audience.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_parsing() {
        assert_eq!("HS256".parse::<SigningAlgorithm>(), Ok(SigningAlgorithm::Hs256));
        assert_eq!("hs512".parse::<SigningAlgorithm>(), Ok(SigningAlgorithm::Hs512));
        assert!(matches!(
            "RS256".parse::<SigningAlgorithm>(),
            Err(TokenConfigError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_min_key_lengths() {
        assert_eq!(SigningAlgorithm::Hs256.min_key_len(), 32);
        assert_eq!(SigningAlgorithm::Hs384.min_key_len(), 48);
        assert_eq!(SigningAlgorithm::Hs512.min_key_len(), 64);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = TokenManagerConfig::new("super-secret-value");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret-value"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_defaults() {
        let config = TokenManagerConfig::default();
        assert!(config.secret.is_none());
        assert_eq!(config.ttl, DEFAULT_TTL);
        assert_eq!(config.algorithm, SigningAlgorithm::Hs256);
    }
}
