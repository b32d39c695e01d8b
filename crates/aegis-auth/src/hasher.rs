//! Password hashing.

use aegis_core::{AegisError, AegisResult};
use std::fmt;

/// One-way password hashing.
///
/// Implementations are synchronous and may be slow; callers on an async
/// runtime should run them on a blocking thread.
pub trait PasswordHasher: Send + Sync + fmt::Debug {
    /// Hashes a plaintext password.
    ///
    /// # Errors
    ///
    /// Returns `AegisError::Hashing` if the primitive fails.
    fn hash(&self, plain: &str) -> AegisResult<String>;

    /// Checks a plaintext password against a stored digest.
    ///
    /// A digest that cannot be parsed verifies as `false`.
    ///
    /// # Errors
    ///
    /// Returns `AegisError::Hashing` only for faults in the primitive itself.
    fn verify(&self, plain: &str, digest: &str) -> AegisResult<bool>;
}

/// bcrypt-backed hasher.
#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    /// Default work factor.
    pub const DEFAULT_COST: u32 = 10;

    /// Creates a hasher with [`BcryptHasher::DEFAULT_COST`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cost: Self::DEFAULT_COST,
        }
    }

    /// Creates a hasher with a custom work factor (4..=31).
    #[must_use]
    pub const fn with_cost(cost: u32) -> Self {
        Self { cost }
    }

    /// Returns the work factor.
    #[must_use]
    pub const fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, plain: &str) -> AegisResult<String> {
        bcrypt::hash(plain, self.cost).map_err(|e| AegisError::hashing(e.to_string()))
    }

    fn verify(&self, plain: &str, digest: &str) -> AegisResult<bool> {
        match bcrypt::verify(plain, digest) {
            Ok(matches) => Ok(matches),
            Err(e) => {
                tracing::debug!(error = %e, "Stored digest could not be verified");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = BcryptHasher::with_cost(4);
        let digest = hasher.hash("admin123").unwrap();

        assert_ne!(digest, "admin123");
        assert!(hasher.verify("admin123", &digest).unwrap());
        assert!(!hasher.verify("wrong", &digest).unwrap());
    }

    #[test]
    fn test_unparsable_digest_is_false() {
        let hasher = BcryptHasher::with_cost(4);
        assert!(!hasher.verify("admin123", "not-a-bcrypt-digest").unwrap());
    }

    #[test]
    fn test_invalid_cost_is_hashing_error() {
        let hasher = BcryptHasher::with_cost(99);
        let err = hasher.hash("x").unwrap_err();
        assert_eq!(err.error_code(), "HASHING_ERROR");
    }

    #[test]
    fn test_default_cost() {
        assert_eq!(BcryptHasher::default().cost(), 10);
    }
}
