//! Immutable bearer token value.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Token type reported for every token Aegis issues.
pub const BEARER_TOKEN_TYPE: &str = "Bearer";

/// Name of the claim carrying the comma-joined authority list.
pub const AUTHORITIES_CLAIM: &str = "authorities";

/// A bearer token.
///
/// Tokens are immutable once constructed; refreshing produces a new token.
/// Expiry is never cached: [`Token::is_expired`] compares against the current
/// time on every call.
///
/// # Example
///
/// ```
/// use aegis_core::Token;
/// use chrono::{Duration, Utc};
///
/// let now = Utc::now();
/// let token = Token::new("abc.def.ghi", "admin", now, now + Duration::hours(1))
///     .with_claim("authorities", "ROLE_ADMIN,ROLE_USER");
///
/// assert!(!token.is_expired_at(now));
/// assert!(token.is_expired_at(now + Duration::hours(1) + Duration::milliseconds(1)));
/// assert_eq!(token.authorities(), vec!["ROLE_ADMIN", "ROLE_USER"]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    value: String,
    token_type: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    issuer: Option<String>,
    subject: String,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    audience: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    claims: BTreeMap<String, serde_json::Value>,
}

impl Token {
    /// Creates a bearer token.
    #[must_use]
    pub fn new(
        value: impl Into<String>,
        subject: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            value: value.into(),
            token_type: BEARER_TOKEN_TYPE.to_string(),
            issued_at,
            expires_at,
            issuer: None,
            subject: subject.into(),
            audience: BTreeSet::new(),
            claims: BTreeMap::new(),
        }
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

    /// Adds a claim.
    #[must_use]
    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }

    /// Returns the encoded token.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns the token type.
    #[must_use]
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Returns when the token was issued.
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Returns when the token expires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns the issuer, if any.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    /// Returns the subject the token was issued for.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the audience.
    #[must_use]
    pub fn audience(&self) -> &BTreeSet<String> {
        &self.audience
    }

    /// Returns all extra claims.
    #[must_use]
    pub fn claims(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.claims
    }

    /// Returns a single claim.
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&serde_json::Value> {
        self.claims.get(name)
    }

    /// Returns the authorities carried in the authorities claim.
    #[must_use]
    pub fn authorities(&self) -> Vec<String> {
        self.claim(AUTHORITIES_CLAIM)
            .and_then(serde_json::Value::as_str)
            .map(split_authorities)
            .unwrap_or_default()
    }

    /// Returns true if `now` is past the expiry instant.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Returns true if the token has expired, according to the wall clock.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Splits a comma-joined authority list, dropping empty entries.
///
/// Entries are trimmed, so authority names must not contain commas or
/// surrounding whitespace to survive a round trip through a token.
#[must_use]
pub fn split_authorities(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_expiry_boundary_is_exact() {
        let token = Token::new("v", "admin", at(0), at(60));
        assert!(!token.is_expired_at(at(59)));
        assert!(!token.is_expired_at(at(60)));
        assert!(token.is_expired_at(at(60) + Duration::milliseconds(1)));
    }

    #[test]
    fn test_default_type_is_bearer() {
        let token = Token::new("v", "admin", at(0), at(60));
        assert_eq!(token.token_type(), BEARER_TOKEN_TYPE);
    }

    #[test]
    fn test_empty_authorities_claim() {
        let token = Token::new("v", "admin", at(0), at(60)).with_claim(AUTHORITIES_CLAIM, "");
        assert!(token.authorities().is_empty());

        let bare = Token::new("v", "admin", at(0), at(60));
        assert!(bare.authorities().is_empty());
    }

    #[test]
    fn test_issuer_and_audience() {
        let token = Token::new("v", "admin", at(0), at(60))
            .with_issuer("aegis")
            .with_audience(["web", "mobile"]);
        assert_eq!(token.issuer(), Some("aegis"));
        assert!(token.audience().contains("web"));
        assert_eq!(token.audience().len(), 2);
    }

    #[test]
    fn test_split_authorities_trims() {
        assert_eq!(
            split_authorities("ROLE_A, ROLE_B,,"),
            vec!["ROLE_A".to_string(), "ROLE_B".to_string()]
        );
    }

    #[test]
    fn test_split_authorities_is_lossy_for_commas_and_padding() {
        let joined = [" ROLE_A ", "READ,WRITE", ""].join(",");
        assert_eq!(
            split_authorities(&joined),
            vec!["ROLE_A".to_string(), "READ".to_string(), "WRITE".to_string()]
        );
    }
}
