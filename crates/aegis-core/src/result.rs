//! Authentication outcome.

use crate::subject::Subject;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// The only message a client ever sees for a failed login.
///
/// Unknown users, wrong passwords and disabled accounts all collapse to this
/// text so that callers cannot enumerate accounts.
pub const GENERIC_FAILURE_MESSAGE: &str = "Invalid username or password";

/// Stable codes for expected authentication failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCode {
    /// No subject with the given identifier exists.
    UserNotFound,
    /// The subject exists but is not active.
    UserInactive,
    /// The presented password does not match.
    InvalidPassword,
    /// Username or password was empty.
    MissingCredentials,
    /// No registered provider supports the credential type.
    UnsupportedCredentialType,
    /// The provider does not implement the requested operation.
    NotSupported,
}

impl FailureCode {
    /// Returns the code as it appears in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::UserInactive => "USER_INACTIVE",
            Self::InvalidPassword => "INVALID_PASSWORD",
            Self::MissingCredentials => "MISSING_CREDENTIALS",
            Self::UnsupportedCredentialType => "UNSUPPORTED_CREDENTIAL_TYPE",
            Self::NotSupported => "NOT_SUPPORTED",
        }
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an authentication attempt.
///
/// There is no partial state: the caller is either authenticated with a
/// subject, or not authenticated with a reason.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthenticationResult {
    /// The credentials were accepted.
    Success {
        /// The authenticated subject.
        subject: Subject,
        /// Provider-specific details.
        details: BTreeMap<String, serde_json::Value>,
    },
    /// The credentials were rejected.
    Failure {
        /// Internal description of the failure.
        message: String,
        /// Stable failure code.
        code: FailureCode,
    },
}

impl AuthenticationResult {
    /// Creates a success result with no details.
    #[must_use]
    pub fn success(subject: Subject) -> Self {
        Self::Success {
            subject,
            details: BTreeMap::new(),
        }
    }

    /// Creates a success result with details.
    #[must_use]
    pub fn success_with_details(
        subject: Subject,
        details: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self::Success { subject, details }
    }

    /// Creates a failure result.
    #[must_use]
    pub fn failure(code: FailureCode, message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
            code,
        }
    }

    /// Returns true for `Success`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the subject of a successful result.
    #[must_use]
    pub fn subject(&self) -> Option<&Subject> {
        match self {
            Self::Success { subject, .. } => Some(subject),
            Self::Failure { .. } => None,
        }
    }

    /// Consumes the result and returns the subject of a success.
    #[must_use]
    pub fn into_subject(self) -> Option<Subject> {
        match self {
            Self::Success { subject, .. } => Some(subject),
            Self::Failure { .. } => None,
        }
    }

    /// Returns the failure code.
    #[must_use]
    pub fn failure_code(&self) -> Option<FailureCode> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { code, .. } => Some(*code),
        }
    }

    /// Returns the message that may be shown to a client.
    ///
    /// Every failure maps to [`GENERIC_FAILURE_MESSAGE`].
    #[must_use]
    pub fn public_message(&self) -> Option<&'static str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { .. } => Some(GENERIC_FAILURE_MESSAGE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_accessors() {
        let result = AuthenticationResult::success(Subject::builder("admin").build());
        assert!(result.is_success());
        assert_eq!(result.subject().map(Subject::subject_id), Some("admin"));
        assert!(result.failure_code().is_none());
        assert!(result.public_message().is_none());
    }

    #[test]
    fn test_failures_share_public_message() {
        let not_found = AuthenticationResult::failure(FailureCode::UserNotFound, "no such user");
        let bad_pw = AuthenticationResult::failure(FailureCode::InvalidPassword, "bad password");

        assert_eq!(not_found.failure_code(), Some(FailureCode::UserNotFound));
        assert_eq!(bad_pw.failure_code(), Some(FailureCode::InvalidPassword));
        assert_eq!(not_found.public_message(), bad_pw.public_message());
    }

    #[test]
    fn test_failure_code_labels() {
        assert_eq!(FailureCode::UserInactive.to_string(), "USER_INACTIVE");
        assert_eq!(
            serde_json::to_string(&FailureCode::MissingCredentials).unwrap(),
            "\"MISSING_CREDENTIALS\""
        );
    }
}
