//! Subject persistence.

use aegis_core::{AegisResult, BoxFuture, Subject};
use dashmap::DashMap;
use std::fmt;

/// A subject together with its password digest.
#[derive(Clone, PartialEq)]
pub struct StoredSubject {
    subject: Subject,
    password_digest: String,
}

impl StoredSubject {
    /// Creates a record.
    #[must_use]
    pub fn new(subject: Subject, password_digest: impl Into<String>) -> Self {
        Self {
            subject,
            password_digest: password_digest.into(),
        }
    }

    /// Returns the subject.
    #[must_use]
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Returns the stored digest.
    #[must_use]
    pub fn password_digest(&self) -> &str {
        &self.password_digest
    }

    /// Returns a copy of this record with the subject replaced.
    #[must_use]
    pub fn with_subject(&self, subject: Subject) -> Self {
        Self {
            subject,
            password_digest: self.password_digest.clone(),
        }
    }

    /// Consumes the record and returns the subject.
    #[must_use]
    pub fn into_subject(self) -> Subject {
        self.subject
    }
}

impl fmt::Debug for StoredSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredSubject")
            .field("subject", &self.subject)
            .field("password_digest", &"[REDACTED]")
            .finish()
    }
}

/// Lookup and persistence of subjects, keyed by username.
///
/// Faults such as an unreachable database are returned as errors; a missing
/// subject is `Ok(None)`.
pub trait SubjectStore: Send + Sync + fmt::Debug {
    /// Finds a subject by username.
    fn find<'a>(&'a self, username: &'a str) -> BoxFuture<'a, AegisResult<Option<StoredSubject>>>;

    /// Inserts or replaces a subject.
    fn save(&self, record: StoredSubject) -> BoxFuture<'_, AegisResult<()>>;
}

/// A process-local store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemorySubjectStore {
    records: DashMap<String, StoredSubject>,
}

impl InMemorySubjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record.
    pub fn insert(&self, record: StoredSubject) {
        self.records
            .insert(record.subject().username().to_string(), record);
    }

    /// Returns true if a subject with `username` exists.
    #[must_use]
    pub fn contains(&self, username: &str) -> bool {
        self.records.contains_key(username)
    }

    /// Returns a copy of the record for `username`.
    #[must_use]
    pub fn get(&self, username: &str) -> Option<StoredSubject> {
        self.records.get(username).map(|r| r.value().clone())
    }

    /// Number of stored subjects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SubjectStore for InMemorySubjectStore {
    fn find<'a>(&'a self, username: &'a str) -> BoxFuture<'a, AegisResult<Option<StoredSubject>>> {
        Box::pin(async move { Ok(self.get(username)) })
    }

    fn save(&self, record: StoredSubject) -> BoxFuture<'_, AegisResult<()>> {
        Box::pin(async move {
            self.insert(record);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(username: &str) -> StoredSubject {
        StoredSubject::new(
            Subject::builder(format!("id-{username}")).username(username).build(),
            "$2b$04$digest",
        )
    }

    #[tokio::test]
    async fn test_find_and_save() {
        let store = InMemorySubjectStore::new();
        assert!(store.find("alice").await.unwrap().is_none());

        store.save(record("alice")).await.unwrap();
        let found = store.find("alice").await.unwrap().unwrap();
        assert_eq!(found.subject().subject_id(), "id-alice");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_save_replaces() {
        let store = InMemorySubjectStore::new();
        store.insert(record("bob"));

        let updated = store
            .get("bob")
            .unwrap()
            .with_subject(Subject::builder("id-bob").username("bob").role("ROLE_USER").build());
        store.save(updated).await.unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.get("bob").unwrap().subject().has_role("ROLE_USER"));
    }

    #[test]
    fn test_debug_redacts_digest() {
        let debug = format!("{:?}", record("carol"));
        assert!(!debug.contains("$2b$04$digest"));
    }
}
