//! Docintake runtime configuration schema.
//!
//! Every section is optional in the YAML file; `defaults::apply_all_defaults`
//! fills what is missing and the accessor methods fall back to the same
//! constants, so consumers never see an unset value.

use std::collections::BTreeMap;
use std::time::Duration;

use docintake_core::DocumentKind;
use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_INFERENCE_TIMEOUT_SECS, DEFAULT_LOG_LEVEL,
    DEFAULT_MAX_CONCURRENT, DEFAULT_MAX_IMAGE_BYTES, DEFAULT_MAX_RETRIES, DEFAULT_MIN_IMAGE_BYTES,
    DEFAULT_MIN_IMAGE_SIDE, DEFAULT_MONDAY_API_URL, DEFAULT_MONDAY_API_VERSION,
};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for docintake.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeConfig {
    /// Per-kind prompt templates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsConfig>,

    /// Session workflow: required kinds, retries, idle timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionConfig>,

    /// Vision model backend and inference limits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference: Option<InferenceConfig>,

    /// Image acceptance thresholds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageConfig>,

    /// Workbook (Monday.com) hand-off; absent means results are only logged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workbook: Option<WorkbookConfig>,

    /// Logging configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

impl IntakeConfig {
    pub fn prompts(&self) -> PromptsConfig {
        self.prompts.clone().unwrap_or_default()
    }

    pub fn session(&self) -> SessionConfig {
        self.session.clone().unwrap_or_default()
    }

    pub fn inference(&self) -> InferenceConfig {
        self.inference.clone().unwrap_or_default()
    }

    pub fn image(&self) -> ImageConfig {
        self.image.clone().unwrap_or_default()
    }

    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_card: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drivers_license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_card: Option<String>,
}

impl PromptsConfig {
    /// The configured prompt for `kind`, if any.
    pub fn for_kind(&self, kind: DocumentKind) -> Option<&str> {
        match kind {
            DocumentKind::IdentityCard => self.identity_card.as_deref(),
            DocumentKind::DriversLicense => self.drivers_license.as_deref(),
            DocumentKind::LogCard => self.log_card.as_deref(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Kinds every session must resolve, in request order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_kinds: Option<Vec<DocumentKind>>,
    /// Re-submissions allowed per kind before it is marked permanently failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_timeout_secs: Option<u64>,
    /// Free-text questions asked after all documents, e.g. "Referrer's Name".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl SessionConfig {
    pub fn required_kinds(&self) -> Vec<DocumentKind> {
        self.required_kinds
            .clone()
            .unwrap_or_else(|| DocumentKind::ALL.to_vec())
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS))
    }

    pub fn details(&self) -> Vec<String> {
        self.details.clone().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Inference
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Parallel model calls, honoured only by reentrant backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderConfig>,
}

impl InferenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_INFERENCE_TIMEOUT_SECS))
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.unwrap_or(DEFAULT_MAX_CONCURRENT).max(1)
    }
}

/// Vision model backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Any `/v1/chat/completions` server (vLLM, LM Studio, OpenAI).
    #[serde(rename_all = "camelCase")]
    OpenaiCompatible {
        base_url: String,
        model: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_tokens: Option<u32>,
    },
    /// A local Ollama daemon.
    #[serde(rename_all = "camelCase")]
    Ollama { base_url: String, model: String },
}

// ---------------------------------------------------------------------------
// Image
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_bytes: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bytes: Option<usize>,
    /// Format names: jpeg, png, webp, gif, bmp, tiff.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_formats: Option<Vec<String>>,
}

impl ImageConfig {
    pub fn min_width(&self) -> u32 {
        self.min_width.unwrap_or(DEFAULT_MIN_IMAGE_SIDE)
    }

    pub fn min_height(&self) -> u32 {
        self.min_height.unwrap_or(DEFAULT_MIN_IMAGE_SIDE)
    }

    pub fn min_bytes(&self) -> usize {
        self.min_bytes.unwrap_or(DEFAULT_MIN_IMAGE_BYTES)
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes.unwrap_or(DEFAULT_MAX_IMAGE_BYTES)
    }

    pub fn allowed_formats(&self) -> Vec<String> {
        self.allowed_formats
            .clone()
            .unwrap_or_else(crate::defaults::default_allowed_formats)
    }
}

// ---------------------------------------------------------------------------
// Workbook
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbookConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    /// Extracted field name → board column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<BTreeMap<String, ColumnSpec>>,
}

impl WorkbookConfig {
    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_MONDAY_API_URL)
    }

    pub fn api_version(&self) -> &str {
        self.api_version.as_deref().unwrap_or(DEFAULT_MONDAY_API_VERSION)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    pub id: String,
    #[serde(default, rename = "type")]
    pub column_type: ColumnType,
}

impl ColumnSpec {
    pub fn text(id: impl Into<String>) -> Self {
        Self { id: id.into(), column_type: ColumnType::Text }
    }

    pub fn date(id: impl Into<String>) -> Self {
        Self { id: id.into(), column_type: ColumnType::Date }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    #[default]
    Text,
    Date,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Directory for rolling NDJSON logs; console only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

impl LoggingConfig {
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}
