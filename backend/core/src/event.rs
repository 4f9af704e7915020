use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InferenceFailure;
use crate::types::{DocumentKind, FieldMap, KindOutcome, RawImage, SessionId, ValidationOutcome};

/// Events delivered by the chat transport into the core.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    SessionStart {
        session_id: SessionId,
    },
    ImageReceived {
        session_id: SessionId,
        kind_hint: Option<DocumentKind>,
        image: RawImage,
    },
    /// Free-text reply, used for the detail questions asked after the documents.
    TextReceived {
        session_id: SessionId,
        text: String,
    },
    CancelRequested {
        session_id: SessionId,
    },
}

impl InboundEvent {
    pub fn session_id(&self) -> &str {
        match self {
            InboundEvent::SessionStart { session_id }
            | InboundEvent::ImageReceived { session_id, .. }
            | InboundEvent::TextReceived { session_id, .. }
            | InboundEvent::CancelRequested { session_id } => session_id,
        }
    }
}

/// Result of the workbook hand-off reported with a completed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionStatus {
    Submitted,
    Failed { message: String },
}

/// Structured notifications from the core to the transport. The core never
/// renders prose; the transport decides how each event is worded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    DocumentRequested {
        kind: DocumentKind,
    },
    DetailRequested {
        name: String,
    },
    ValidationRejected {
        kind: DocumentKind,
        reason: ValidationOutcome,
        attempts_remaining: u32,
    },
    WrongDocumentKind {
        expected: DocumentKind,
        received: DocumentKind,
    },
    ExtractionInProgress {
        kind: DocumentKind,
    },
    ExtractionSucceeded {
        kind: DocumentKind,
        fields: FieldMap,
    },
    ExtractionFailed {
        kind: DocumentKind,
        reason: InferenceFailure,
        attempts_remaining: u32,
    },
    KindPermanentlyFailed {
        kind: DocumentKind,
        attempts: u32,
    },
    SessionCompleted {
        results: BTreeMap<DocumentKind, KindOutcome>,
        details: FieldMap,
        submission: SubmissionStatus,
    },
    SessionCancelled,
    SessionExpired,
    ModelUnavailable {
        message: String,
    },
    NotExpected {
        detail: String,
    },
}

impl SessionEvent {
    /// Short snake_case name of the variant, for log fields.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::DocumentRequested { .. } => "document_requested",
            SessionEvent::DetailRequested { .. } => "detail_requested",
            SessionEvent::ValidationRejected { .. } => "validation_rejected",
            SessionEvent::WrongDocumentKind { .. } => "wrong_document_kind",
            SessionEvent::ExtractionInProgress { .. } => "extraction_in_progress",
            SessionEvent::ExtractionSucceeded { .. } => "extraction_succeeded",
            SessionEvent::ExtractionFailed { .. } => "extraction_failed",
            SessionEvent::KindPermanentlyFailed { .. } => "kind_permanently_failed",
            SessionEvent::SessionCompleted { .. } => "session_completed",
            SessionEvent::SessionCancelled => "session_cancelled",
            SessionEvent::SessionExpired => "session_expired",
            SessionEvent::ModelUnavailable { .. } => "model_unavailable",
            SessionEvent::NotExpected { .. } => "not_expected",
        }
    }
}

/// A `SessionEvent` addressed to one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundEvent {
    pub session_id: SessionId,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: SessionEvent,
}

impl OutboundEvent {
    pub fn new(session_id: impl Into<SessionId>, event: SessionEvent) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp: Utc::now(),
            event,
        }
    }
}
