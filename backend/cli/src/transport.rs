//! JSON-lines transport for `docintake run`.
//!
//! Each stdin line is one inbound event; images are referenced by path and
//! read when the line is parsed. Each outbound event becomes one stdout line.

use std::path::PathBuf;

use anyhow::{Context, Result};
use docintake_core::{DocumentKind, InboundEvent, OutboundEvent, RawImage};
use docintake_media::detect_mime_type;
use serde::Deserialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    Start {
        session_id: String,
    },
    Image {
        session_id: String,
        path: PathBuf,
        #[serde(default)]
        kind: Option<DocumentKind>,
        /// Overrides the MIME type guessed from the file extension.
        #[serde(default)]
        mime: Option<String>,
    },
    Text {
        session_id: String,
        text: String,
    },
    Cancel {
        session_id: String,
    },
}

impl WireEvent {
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line).with_context(|| format!("Invalid event line: {line}"))
    }

    pub async fn into_inbound(self) -> Result<InboundEvent> {
        Ok(match self {
            WireEvent::Start { session_id } => InboundEvent::SessionStart { session_id },
            WireEvent::Image { session_id, path, kind, mime } => {
                let data = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("Failed to read image: {}", path.display()))?;
                let mime = mime.unwrap_or_else(|| detect_mime_type(&path).to_string());
                InboundEvent::ImageReceived { session_id, kind_hint: kind, image: RawImage::new(data, mime) }
            }
            WireEvent::Text { session_id, text } => InboundEvent::TextReceived { session_id, text },
            WireEvent::Cancel { session_id } => InboundEvent::CancelRequested { session_id },
        })
    }
}

/// Write outbound events as JSON lines until the channel closes.
pub async fn write_events<W: AsyncWrite + Unpin>(mut rx: mpsc::Receiver<OutboundEvent>, mut out: W) -> Result<()> {
    while let Some(event) = rx.recv().await {
        let mut line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to serialize outbound event");
                continue;
            }
        };
        line.push('\n');
        out.write_all(line.as_bytes()).await.context("Failed to write event")?;
        out.flush().await?;
    }
    Ok(())
}
