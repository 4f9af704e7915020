//! Structured logging for docintake.
//!
//! Console output, optional daily NDJSON files, PII redaction and a
//! per-session audit trail of outbound events.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{AuditEntry, EventLogger};
pub use logger::{init_logger, LogGuard};
pub use redact::{redact_fields, redact_sensitive_data};
