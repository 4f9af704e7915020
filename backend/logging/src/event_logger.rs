//! Session Event Logger
//!
//! Every outbound session event is mirrored to the `session_events` target
//! as a redacted audit entry. Personal values never reach the log.

use chrono::{DateTime, Utc};
use docintake_core::{DocumentKind, OutboundEvent, SessionEvent};
use serde::Serialize;
use tracing::info;

use crate::redact::{redact_fields, redact_sensitive_data};

#[derive(Debug, Serialize)]
pub struct AuditEntry {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<DocumentKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AuditEntry {
    pub fn from_outbound(outbound: &OutboundEvent) -> Self {
        let (kind, detail) = summarize(&outbound.event);
        Self {
            // Chat transports key sessions by phone number.
            session_id: redact_sensitive_data(&outbound.session_id),
            timestamp: outbound.timestamp,
            event: outbound.event.name(),
            kind,
            detail,
        }
    }
}

fn summarize(event: &SessionEvent) -> (Option<DocumentKind>, Option<String>) {
    match event {
        SessionEvent::DocumentRequested { kind } | SessionEvent::ExtractionInProgress { kind } => {
            (Some(*kind), None)
        }
        SessionEvent::DetailRequested { name } => (None, Some(name.clone())),
        SessionEvent::ValidationRejected { kind, reason, attempts_remaining } => (
            Some(*kind),
            Some(format!("{reason}; {attempts_remaining} attempt(s) left")),
        ),
        SessionEvent::WrongDocumentKind { expected, received } => {
            (Some(*expected), Some(format!("received {received}")))
        }
        SessionEvent::ExtractionSucceeded { kind, fields } => {
            let shown = serde_json::to_string(&redact_fields(fields)).unwrap_or_default();
            (Some(*kind), Some(shown))
        }
        SessionEvent::ExtractionFailed { kind, reason, attempts_remaining } => (
            Some(*kind),
            Some(format!(
                "{}; {attempts_remaining} attempt(s) left",
                redact_sensitive_data(&reason.to_string())
            )),
        ),
        SessionEvent::KindPermanentlyFailed { kind, attempts } => {
            (Some(*kind), Some(format!("after {attempts} attempt(s)")))
        }
        SessionEvent::SessionCompleted { results, details, submission } => (
            None,
            Some(format!(
                "{} document(s), {} detail(s), submission {:?}",
                results.len(),
                details.len(),
                submission
            )),
        ),
        SessionEvent::ModelUnavailable { message } => (None, Some(redact_sensitive_data(message))),
        SessionEvent::NotExpected { detail } => (None, Some(detail.clone())),
        SessionEvent::SessionCancelled | SessionEvent::SessionExpired => (None, None),
    }
}

pub struct EventLogger;

impl EventLogger {
    /// Record one outbound event.
    pub fn log_event(outbound: &OutboundEvent) {
        let entry = AuditEntry::from_outbound(outbound);
        info!(
            target: "session_events",
            session = %entry.session_id,
            event = entry.event,
            kind = ?entry.kind,
            detail = entry.detail.as_deref().unwrap_or(""),
            "Session event"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn extracted_values_are_masked() {
        let mut fields = BTreeMap::new();
        fields.insert("Name".to_string(), "TAN AH KOW".to_string());
        let outbound = OutboundEvent::new(
            "+6591234567",
            SessionEvent::ExtractionSucceeded { kind: DocumentKind::IdentityCard, fields },
        );
        let entry = AuditEntry::from_outbound(&outbound);
        assert_eq!(entry.event, "extraction_succeeded");
        assert_eq!(entry.kind, Some(DocumentKind::IdentityCard));
        let detail = entry.detail.unwrap();
        assert!(!detail.contains("TAN AH KOW"));
        assert!(!entry.session_id.contains("91234567"));
    }

    #[test]
    fn cancelled_has_no_detail() {
        let entry = AuditEntry::from_outbound(&OutboundEvent::new("s1", SessionEvent::SessionCancelled));
        assert!(entry.kind.is_none());
        assert!(entry.detail.is_none());
        EventLogger::log_event(&OutboundEvent::new("s1", SessionEvent::SessionExpired));
    }
}
