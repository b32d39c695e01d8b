//! Wire claims.

use aegis_core::split_authorities;
use serde::{Deserialize, Serialize};

/// Claims carried in the signed token body.
///
/// `iat` and `exp` are whole seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject the token was issued for.
    pub sub: String,

    /// Comma-joined authorities. Empty when the subject holds none.
    #[serde(default)]
    pub authorities: String,

    /// Issued-at, in seconds.
    pub iat: i64,

    /// Expiration, in seconds.
    pub exp: i64,

    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Audience.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aud: Vec<String>,

    /// Unique token id.
    pub jti: String,
}

impl Claims {
    /// Returns the authorities as a list.
    #[must_use]
    pub fn authority_list(&self) -> Vec<String> {
        split_authorities(&self.authorities)
    }
}
