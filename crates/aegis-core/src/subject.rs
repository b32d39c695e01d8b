//! Authenticated principal.
//!
//! A [`Subject`] is an immutable value. State changes, such as refreshing the
//! last-active time after a login, go through [`Subject::to_builder`], which
//! clones the current instance and lets the caller override fields before
//! building a new one.

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Account status of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubjectStatus {
    /// May authenticate.
    #[default]
    Active,
    /// Deactivated by an administrator.
    Inactive,
    /// Locked, e.g. after too many failed attempts.
    Locked,
    /// Permanently disabled.
    Disabled,
}

impl SubjectStatus {
    /// Returns the status label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::Locked => "LOCKED",
            Self::Disabled => "DISABLED",
        }
    }
}

/// An authenticated principal.
///
/// # Example
///
/// ```
/// use aegis_core::{Subject, SubjectStatus};
///
/// let admin = Subject::builder("admin")
///     .username("admin")
///     .display_name("System Administrator")
///     .roles(["ROLE_ADMIN", "ROLE_USER"])
///     .permission("READ")
///     .build();
///
/// assert!(admin.is_active());
/// assert!(admin.has_role("ROLE_ADMIN"));
///
/// let locked = admin.to_builder().status(SubjectStatus::Locked).build();
/// assert!(admin.is_active());
/// assert!(!locked.is_active());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    subject_id: String,
    username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default)]
    roles: IndexSet<String>,
    #[serde(default)]
    permissions: IndexSet<String>,
    #[serde(default)]
    status: SubjectStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_active_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, serde_json::Value>,
}

impl Subject {
    /// Starts building a subject with the given identifier.
    ///
    /// The username defaults to the identifier.
    #[must_use]
    pub fn builder(subject_id: impl Into<String>) -> SubjectBuilder {
        SubjectBuilder::new(subject_id)
    }

    /// Returns a builder seeded with a copy of this subject.
    #[must_use]
    pub fn to_builder(&self) -> SubjectBuilder {
        SubjectBuilder {
            inner: self.clone(),
        }
    }

    /// Returns the stable subject identifier.
    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Returns the login name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the display name, if set.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Returns the email address, if set.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Returns the roles in insertion order.
    #[must_use]
    pub fn roles(&self) -> &IndexSet<String> {
        &self.roles
    }

    /// Returns the permissions in insertion order.
    #[must_use]
    pub fn permissions(&self) -> &IndexSet<String> {
        &self.permissions
    }

    /// Returns the account status.
    #[must_use]
    pub fn status(&self) -> SubjectStatus {
        self.status
    }

    /// Returns when the subject last authenticated.
    #[must_use]
    pub fn last_active_time(&self) -> Option<DateTime<Utc>> {
        self.last_active_time
    }

    /// Returns the free-form attributes.
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.attributes
    }

    /// Returns true if the account may authenticate.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SubjectStatus::Active
    }

    /// Returns true if the subject holds `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Returns true if the subject holds `permission`.
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Returns the authorities granted to this subject.
    ///
    /// Authorities are the roles, in insertion order.
    #[must_use]
    pub fn authorities(&self) -> Vec<String> {
        self.roles.iter().cloned().collect()
    }
}

/// Builder for [`Subject`].
#[derive(Debug, Clone)]
pub struct SubjectBuilder {
    inner: Subject,
}

impl SubjectBuilder {
    /// Creates a builder for a new active subject.
    #[must_use]
    pub fn new(subject_id: impl Into<String>) -> Self {
        let subject_id = subject_id.into();
        Self {
            inner: Subject {
                username: subject_id.clone(),
                subject_id,
                display_name: None,
                email: None,
                roles: IndexSet::new(),
                permissions: IndexSet::new(),
                status: SubjectStatus::Active,
                last_active_time: None,
                attributes: BTreeMap::new(),
            },
        }
    }

    /// Sets the login name.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.inner.username = username.into();
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.inner.display_name = Some(display_name.into());
        self
    }

    /// Sets the email address.
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.inner.email = Some(email.into());
        self
    }

    /// Adds a role. Duplicates are ignored.
    #[must_use]
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.inner.roles.insert(role.into());
        self
    }

    /// Replaces the roles.
    #[must_use]
    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a permission. Duplicates are ignored.
    #[must_use]
    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.inner.permissions.insert(permission.into());
        self
    }

    /// Replaces the permissions.
    #[must_use]
    pub fn permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the account status.
    #[must_use]
    pub fn status(mut self, status: SubjectStatus) -> Self {
        self.inner.status = status;
        self
    }

    /// Sets the last-active time.
    #[must_use]
    pub fn last_active_time(mut self, at: DateTime<Utc>) -> Self {
        self.inner.last_active_time = Some(at);
        self
    }

    /// Sets an attribute.
    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.inner.attributes.insert(key.into(), value.into());
        self
    }

    /// Builds the subject.
    #[must_use]
    pub fn build(self) -> Subject {
        self.inner
    }
}
