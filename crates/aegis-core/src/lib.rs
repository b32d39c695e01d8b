//! # Aegis Core
//!
//! Core domain types for the Aegis security framework.
//!
//! This crate provides the foundational types shared by every other Aegis crate:
//!
//! - [`Subject`] - Immutable authenticated principal with copy-on-write builder
//! - [`Token`] - Immutable bearer token with fresh expiry evaluation
//! - [`Credentials`] / [`CredentialType`] - Tagged credential values used for provider dispatch
//! - [`AuthenticationResult`] - `Success` or `Failure`, nothing in between
//! - [`CallerIdentity`] / [`AuthState`] - Request-scoped principal and its state machine
//! - [`AegisError`] / [`TokenError`] - Error taxonomy
//! - [`Clock`] - Injectable time source
//! - [`xss`] - Output-encoding helpers

#![doc(html_root_url = "https://docs.rs/aegis-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod clock;
mod credentials;
mod error;
mod identity;
mod result;
mod subject;
mod token;
pub mod xss;

use std::future::Future;
use std::pin::Pin;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credentials::{CredentialType, Credentials};
pub use error::{AegisError, AegisResult, ErrorCategory, TokenError};
pub use identity::{AuthState, CallerIdentity, RequestId, ANONYMOUS_PRINCIPAL};
pub use result::{AuthenticationResult, FailureCode, GENERIC_FAILURE_MESSAGE};
pub use subject::{Subject, SubjectBuilder, SubjectStatus};
pub use token::{split_authorities, Token, AUTHORITIES_CLAIM, BEARER_TOKEN_TYPE};

/// A boxed, sendable future.
///
/// Used for async trait methods across the workspace.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
