use anyhow::Result;
use async_trait::async_trait;
use docintake_core::{Submission, WorkbookSink};
use docintake_logging::redact_fields;
use tracing::info;

/// Used when no workbook is configured: completed sessions are only logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlySink;

#[async_trait]
impl WorkbookSink for LogOnlySink {
    fn name(&self) -> &str {
        "log"
    }

    async fn submit(&self, session_id: &str, submission: &Submission) -> Result<()> {
        let kinds: Vec<&str> = submission.documents.keys().map(|k| k.as_str()).collect();
        info!(
            session = %session_id,
            ?kinds,
            fields = ?redact_fields(&submission.flattened()),
            "Submission recorded (no workbook configured)"
        );
        Ok(())
    }
}
