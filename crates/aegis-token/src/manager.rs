//! Token issuance, parsing, validation and refresh.

use crate::claims::Claims;
use crate::config::{SigningAlgorithm, TokenManagerConfig};
use crate::error::TokenConfigError;
use aegis_core::{Clock, SystemClock, Token, TokenError, AUTHORITIES_CLAIM};
use aegis_telemetry::logging::fields::SUBJECT_ID;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, SubsecRound, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Issues and verifies signed bearer tokens.
///
/// The manager holds only a signing key and a clock. Construction fails when
/// the key is missing or too short for the algorithm.
///
/// # Example
///
/// ```
/// use aegis_token::{TokenManager, TokenManagerConfig};
///
/// // 32 bytes, base64-encoded
/// let secret = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";
/// let manager = TokenManager::new(TokenManagerConfig::new(secret)).unwrap();
///
/// let token = manager.issue("admin", &["ROLE_ADMIN".to_string()]).unwrap();
/// let claims = manager.parse(token.value()).unwrap();
/// assert_eq!(claims.sub, "admin");
/// assert!(manager.validate(&token));
/// ```
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    header: Header,
    validation: Validation,
    algorithm: SigningAlgorithm,
    ttl: chrono::Duration,
    issuer: Option<String>,
    audience: Vec<String>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("algorithm", &self.algorithm)
            .field("ttl", &self.ttl)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Creates a manager that reads the wall clock.
    ///
    /// # Errors
    ///
    /// Returns `TokenConfigError` if the secret is missing, not base64, or
    /// shorter than the algorithm's minimum, or if the TTL is zero.
    pub fn new(config: TokenManagerConfig) -> Result<Self, TokenConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a manager that reads time from `clock`.
    ///
    /// # Errors
    ///
    /// See [`TokenManager::new`].
    pub fn with_clock(
        config: TokenManagerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TokenConfigError> {
        let encoded = config
            .secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(TokenConfigError::MissingSecret)?;

        let key = STANDARD
            .decode(encoded)
            .map_err(|e| TokenConfigError::InvalidSecretEncoding(e.to_string()))?;

        let min_bytes = config.algorithm.min_key_len();
        if key.len() < min_bytes {
            return Err(TokenConfigError::WeakKey {
                algorithm: config.algorithm.as_str(),
                min_bytes,
                actual_bytes: key.len(),
            });
        }

        if config.ttl.is_zero() {
            return Err(TokenConfigError::ZeroTtl);
        }
        let ttl =
            chrono::Duration::from_std(config.ttl).map_err(|_| TokenConfigError::TtlOutOfRange)?;

        let algorithm = config.algorithm.into();
        let mut validation = Validation::new(algorithm);
        // Expiry is checked against the injected clock, not the system time.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        if config.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&config.audience);
        }

        tracing::debug!(
            algorithm = config.algorithm.as_str(),
            ttl_secs = config.ttl.as_secs(),
            "Token manager initialized"
        );

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&key),
            decoding_key: DecodingKey::from_secret(&key),
            header: Header::new(algorithm),
            validation,
            algorithm: config.algorithm,
            ttl,
            issuer: config.issuer,
            audience: config.audience,
            clock,
        })
    }

    /// Returns the signing algorithm.
    #[must_use]
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    /// Returns the token lifetime.
    #[must_use]
    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Issues a token for `subject` carrying `authorities`.
    ///
    /// Issued-at is truncated to whole seconds so the returned `Token`
    /// expires at exactly the instant its wire `exp` names.
    ///
    /// Authorities are joined with commas; names containing a comma or
    /// surrounding whitespace do not come back unchanged from
    /// [`parse`](Self::parse).
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if the claims cannot be signed.
    pub fn issue(&self, subject: &str, authorities: &[String]) -> Result<Token, TokenError> {
        let issued_at = self.clock.now().trunc_subsecs(0);
        let expires_at = issued_at + self.ttl;
        let joined = authorities.join(",");

        let claims = Claims {
            sub: subject.to_string(),
            authorities: joined.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Uuid::now_v7().to_string(),
        };

        let value = encode(&self.header, &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        aegis_telemetry::record_token_issued();
        tracing::debug!({ SUBJECT_ID } = subject, expires_at = %expires_at, "Token issued");

        let mut token = Token::new(value, subject, issued_at, expires_at)
            .with_audience(self.audience.iter().cloned())
            .with_claim(AUTHORITIES_CLAIM, joined)
            .with_claim("jti", claims.jti);
        if let Some(issuer) = &self.issuer {
            token = token.with_issuer(issuer.clone());
        }
        Ok(token)
    }

    /// Verifies a token's signature and expiry and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Expired` once the clock is past `exp`, and
    /// `TokenError::Malformed` for anything that does not verify.
    pub fn parse(&self, value: &str) -> Result<Claims, TokenError> {
        let result = self.parse_inner(value);
        let outcome = match &result {
            Ok(_) => "valid",
            Err(TokenError::Expired) => "expired",
            Err(_) => "malformed",
        };
        aegis_telemetry::record_token_verification(outcome);
        result
    }

    fn parse_inner(&self, value: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(value, &self.decoding_key, &self.validation)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;
        let claims = data.claims;

        let expires_at = timestamp(claims.exp)?;
        if self.clock.now() > expires_at {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// Parses a wire value back into a [`Token`].
    ///
    /// Issued-at and expiry are restored at whole-second precision.
    ///
    /// # Errors
    ///
    /// Same as [`TokenManager::parse`].
    pub fn parse_token(&self, value: &str) -> Result<Token, TokenError> {
        let claims = self.parse(value)?;
        let mut token = Token::new(value, &claims.sub, timestamp(claims.iat)?, timestamp(claims.exp)?)
            .with_audience(claims.aud)
            .with_claim(AUTHORITIES_CLAIM, claims.authorities)
            .with_claim("jti", claims.jti);
        if let Some(issuer) = claims.iss {
            token = token.with_issuer(issuer);
        }
        Ok(token)
    }

    /// Returns true while the token has not expired.
    ///
    /// The signature is not checked again: a `Token` only exists after a
    /// successful [`issue`](Self::issue) or [`parse_token`](Self::parse_token).
    #[must_use]
    pub fn validate(&self, token: &Token) -> bool {
        !token.is_expired_at(self.clock.now())
    }

    /// Issues a fresh token for the same subject and authorities.
    ///
    /// Returns `Ok(None)` if `token` has expired.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if the new token cannot be signed.
    pub fn refresh(&self, token: &Token) -> Result<Option<Token>, TokenError> {
        if !self.validate(token) {
            return Ok(None);
        }
        self.issue(token.subject(), &token.authorities()).map(Some)
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, TokenError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| TokenError::Malformed(format!("timestamp out of range: {secs}")))
}
