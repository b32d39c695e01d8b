//! Authorization audit events.
//!
//! Every authorization decision produces one [`AuditEvent`]. Publishing is
//! fire-and-forget: [`AuditPublisher`] logs and counts sink failures and
//! never lets them reach the request.

use aegis_core::{CallerIdentity, ANONYMOUS_PRINCIPAL};
use aegis_telemetry::logging::fields::{DECISION, RESOURCE, SUBJECT_ID};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditDecision {
    /// The request was permitted.
    Allow,
    /// The request was rejected.
    Deny,
}

impl AuditDecision {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::Deny => "DENY",
        }
    }
}

impl fmt::Display for AuditDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One authorization decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Subject id, or `anonymous`. Never empty.
    pub subject: String,
    /// The resource that was requested.
    pub resource: String,
    /// The capability the resource requires.
    pub required_capability: String,
    /// Allow or deny.
    pub decision: AuditDecision,
    /// Why the request was denied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// When the decision was made.
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    /// Creates an allow event.
    pub fn allow(
        identity: &CallerIdentity,
        resource: impl Into<String>,
        required_capability: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            subject: principal(identity),
            resource: resource.into(),
            required_capability: required_capability.into(),
            decision: AuditDecision::Allow,
            reason: None,
            timestamp,
        }
    }

    /// Creates a deny event.
    pub fn deny(
        identity: &CallerIdentity,
        resource: impl Into<String>,
        required_capability: impl Into<String>,
        reason: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            subject: principal(identity),
            resource: resource.into(),
            required_capability: required_capability.into(),
            decision: AuditDecision::Deny,
            reason: Some(reason.into()),
            timestamp,
        }
    }
}

fn principal(identity: &CallerIdentity) -> String {
    match identity.subject_id() {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => ANONYMOUS_PRINCIPAL.to_string(),
    }
}

/// A sink refused or failed to record an event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("audit sink failed: {0}")]
pub struct AuditError(pub String);

/// Destination for audit events.
pub trait AuditSink: Send + Sync + fmt::Debug {
    /// Records one event.
    fn publish(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// Writes audit events to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn publish(&self, event: &AuditEvent) -> Result<(), AuditError> {
        match event.decision {
            AuditDecision::Deny => tracing::warn!(
                { SUBJECT_ID } = %event.subject,
                { RESOURCE } = %event.resource,
                capability = %event.required_capability,
                reason = event.reason.as_deref().unwrap_or_default(),
                { DECISION } = event.decision.as_str(),
                "AUDIT [AUTHORIZATION_FAILURE]"
            ),
            AuditDecision::Allow => tracing::info!(
                { SUBJECT_ID } = %event.subject,
                { RESOURCE } = %event.resource,
                capability = %event.required_capability,
                { DECISION } = event.decision.as_str(),
                "AUDIT [AUTHORIZATION_SUCCESS]"
            ),
        }
        Ok(())
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Drops all recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl AuditSink for MemoryAuditSink {
    fn publish(&self, event: &AuditEvent) -> Result<(), AuditError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Hands events to a sink and swallows failures.
#[derive(Debug, Clone)]
pub struct AuditPublisher {
    sink: Arc<dyn AuditSink>,
}

impl Default for AuditPublisher {
    fn default() -> Self {
        Self::new(Arc::new(TracingAuditSink))
    }
}

impl AuditPublisher {
    /// Creates a publisher over `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Publishes `event`. Never fails.
    pub fn publish(&self, event: &AuditEvent) {
        if let Err(e) = self.sink.publish(event) {
            tracing::warn!(
                error = %e,
                { SUBJECT_ID } = %event.subject,
                { RESOURCE } = %event.resource,
                { DECISION } = event.decision.as_str(),
                "Failed to publish audit event"
            );
            aegis_telemetry::record_audit_failure();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FailingSink;

    impl AuditSink for FailingSink {
        fn publish(&self, _event: &AuditEvent) -> Result<(), AuditError> {
            Err(AuditError("queue full".into()))
        }
    }

    #[test]
    fn test_anonymous_reported_as_sentinel() {
        let event = AuditEvent::deny(
            &CallerIdentity::Anonymous,
            "/api/orders",
            "authenticated",
            "authentication required",
            Utc::now(),
        );
        assert_eq!(event.subject, "anonymous");
        assert_eq!(event.decision, AuditDecision::Deny);
        assert_eq!(event.reason.as_deref(), Some("authentication required"));
    }

    #[test]
    fn test_allow_event_has_no_reason() {
        let identity = CallerIdentity::authenticated("admin", vec!["ROLE_ADMIN".into()]);
        let event = AuditEvent::allow(&identity, "/api/orders", "authenticated", Utc::now());
        assert_eq!(event.subject, "admin");
        assert!(event.reason.is_none());

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["decision"], "ALLOW");
        assert!(json.get("reason").is_none());
    }

    #[test]
    fn test_memory_sink_records() {
        let sink = Arc::new(MemoryAuditSink::new());
        let publisher = AuditPublisher::new(sink.clone());
        publisher.publish(&AuditEvent::allow(
            &CallerIdentity::Anonymous,
            "/health",
            "permitAll",
            Utc::now(),
        ));
        assert_eq!(sink.len(), 1);
        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_failing_sink_is_swallowed() {
        let publisher = AuditPublisher::new(Arc::new(FailingSink));
        publisher.publish(&AuditEvent::allow(
            &CallerIdentity::Anonymous,
            "/health",
            "permitAll",
            Utc::now(),
        ));
    }

    #[test]
    fn test_tracing_sink_accepts_both_decisions() {
        let sink = TracingAuditSink;
        let identity = CallerIdentity::Anonymous;
        assert!(sink
            .publish(&AuditEvent::allow(&identity, "/", "permitAll", Utc::now()))
            .is_ok());
        assert!(sink
            .publish(&AuditEvent::deny(&identity, "/", "denyAll", "denied", Utc::now()))
            .is_ok());
    }
}
