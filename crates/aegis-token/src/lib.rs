//! # Aegis Token
//!
//! Signed bearer tokens for Aegis.
//!
//! [`TokenManager`] issues HMAC-signed tokens carrying a subject and a
//! comma-joined `authorities` claim, parses them back into [`Claims`], and
//! refreshes still-valid tokens. It holds no state besides its key and clock,
//! so one instance can be shared across all requests.
//!
//! Construction fails fast: a missing secret, a secret shorter than the
//! algorithm's digest size, or a zero TTL is a [`TokenConfigError`].

#![doc(html_root_url = "https://docs.rs/aegis-token/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod claims;
mod config;
mod error;
mod manager;

pub use claims::Claims;
pub use config::{SigningAlgorithm, TokenManagerConfig, DEFAULT_TTL};
pub use error::TokenConfigError;
pub use manager::TokenManager;
