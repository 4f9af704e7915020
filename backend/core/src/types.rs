use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::InferenceFailure;

/// Identifier of a chat user / conversation owning a session.
pub type SessionId = String;

/// Extracted field name → value.
pub type FieldMap = BTreeMap<String, String>;

/// The supported identification document categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    IdentityCard,
    DriversLicense,
    LogCard,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 3] = [
        DocumentKind::IdentityCard,
        DocumentKind::DriversLicense,
        DocumentKind::LogCard,
    ];

    /// Stable machine name, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::IdentityCard => "identity_card",
            DocumentKind::DriversLicense => "drivers_license",
            DocumentKind::LogCard => "log_card",
        }
    }

    /// Human label for transport layers that render events.
    pub fn label(&self) -> &'static str {
        match self {
            DocumentKind::IdentityCard => "Identity Card",
            DocumentKind::DriversLicense => "Driver's License",
            DocumentKind::LogCard => "Log Card",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "identity_card" | "id_card" | "id" | "nric" => Ok(DocumentKind::IdentityCard),
            "drivers_license" | "driver_license" | "license" | "licence" | "driving_licence" => {
                Ok(DocumentKind::DriversLicense)
            }
            "log_card" | "logcard" | "vehicle_log_card" => Ok(DocumentKind::LogCard),
            _ => Err(format!("unknown document kind: {s}")),
        }
    }
}

/// An image payload as received from the chat transport.
///
/// Never persisted by the core; dropped once validation and extraction
/// for the submitting attempt have finished with it.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub data: Bytes,
    /// MIME type declared by the transport, e.g. `image/jpeg`.
    pub declared_format: String,
}

impl RawImage {
    pub fn new(data: impl Into<Bytes>, declared_format: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            declared_format: declared_format.into(),
        }
    }

    pub fn byte_size(&self) -> usize {
        self.data.len()
    }
}

/// One extraction attempt: the image plus the prompt resolved for its kind.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub kind: DocumentKind,
    pub image: RawImage,
    pub prompt: String,
}

/// Result of one extraction attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub kind: DocumentKind,
    pub fields: FieldMap,
    pub raw_text: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<InferenceFailure>,
}

impl ExtractionResult {
    pub fn succeeded(kind: DocumentKind, fields: FieldMap, raw_text: impl Into<String>) -> Self {
        Self {
            kind,
            fields,
            raw_text: raw_text.into(),
            success: true,
            failure: None,
        }
    }

    pub fn failed(kind: DocumentKind, raw_text: impl Into<String>, failure: InferenceFailure) -> Self {
        Self {
            kind,
            fields: FieldMap::new(),
            raw_text: raw_text.into(),
            success: false,
            failure: Some(failure),
        }
    }
}

/// Outcome of header-level image validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ValidationOutcome {
    Accepted,
    RejectedTooSmall {
        /// Pixel dimensions when known; `None` when the file itself was too small.
        width: Option<u32>,
        height: Option<u32>,
        bytes: usize,
    },
    RejectedBadFormat { detail: String },
    RejectedTooLarge { bytes: usize, max_bytes: usize },
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted)
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationOutcome::Accepted => write!(f, "accepted"),
            ValidationOutcome::RejectedTooSmall {
                width: Some(w),
                height: Some(h),
                ..
            } => write!(f, "image too small ({w}x{h})"),
            ValidationOutcome::RejectedTooSmall { bytes, .. } => {
                write!(f, "image file too small ({bytes} bytes)")
            }
            ValidationOutcome::RejectedBadFormat { detail } => write!(f, "unsupported image: {detail}"),
            ValidationOutcome::RejectedTooLarge { bytes, max_bytes } => {
                write!(f, "image too large ({bytes} bytes, limit {max_bytes})")
            }
        }
    }
}

/// Final state of one required kind inside a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum KindOutcome {
    Succeeded(ExtractionResult),
    PermanentlyFailed { attempts: u32, last_failure: String },
}

impl KindOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, KindOutcome::Succeeded(_))
    }
}

/// Payload handed to the workbook boundary when a session completes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub documents: BTreeMap<DocumentKind, FieldMap>,
    /// Free-text details collected after the documents, keyed by prompt.
    #[serde(default)]
    pub details: FieldMap,
}

impl Submission {
    /// Builds a submission from successfully extracted kinds only.
    pub fn from_outcomes(outcomes: &BTreeMap<DocumentKind, KindOutcome>, details: FieldMap) -> Self {
        let documents = outcomes
            .iter()
            .filter_map(|(kind, outcome)| match outcome {
                KindOutcome::Succeeded(result) => Some((*kind, result.fields.clone())),
                KindOutcome::PermanentlyFailed { .. } => None,
            })
            .collect();
        Self { documents, details }
    }

    /// All fields merged into one map, documents in kind order, details last.
    pub fn flattened(&self) -> FieldMap {
        let mut merged = FieldMap::new();
        for fields in self.documents.values() {
            merged.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged.extend(self.details.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_aliases() {
        assert_eq!("id_card".parse::<DocumentKind>().unwrap(), DocumentKind::IdentityCard);
        assert_eq!("Driver's License".replace('\'', "").parse::<DocumentKind>().unwrap(), DocumentKind::DriversLicense);
        assert_eq!("log-card".parse::<DocumentKind>().unwrap(), DocumentKind::LogCard);
        assert!("passport".parse::<DocumentKind>().is_err());
    }

    #[test]
    fn test_kind_serde_matches_as_str() {
        for kind in DocumentKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_submission_skips_failed_kinds() {
        let mut outcomes = BTreeMap::new();
        let mut fields = FieldMap::new();
        fields.insert("Name".into(), "TAN AH KOW".into());
        outcomes.insert(
            DocumentKind::IdentityCard,
            KindOutcome::Succeeded(ExtractionResult::succeeded(DocumentKind::IdentityCard, fields, "Name: TAN AH KOW")),
        );
        outcomes.insert(
            DocumentKind::LogCard,
            KindOutcome::PermanentlyFailed { attempts: 3, last_failure: "timeout".into() },
        );

        let submission = Submission::from_outcomes(&outcomes, FieldMap::new());
        assert_eq!(submission.documents.len(), 1);
        assert!(submission.documents.contains_key(&DocumentKind::IdentityCard));
        assert_eq!(submission.flattened().get("Name").map(String::as_str), Some("TAN AH KOW"));
    }

    #[test]
    fn test_validation_outcome_display() {
        let outcome = ValidationOutcome::RejectedTooSmall { width: Some(50), height: Some(40), bytes: 2048 };
        assert_eq!(outcome.to_string(), "image too small (50x40)");
        assert!(ValidationOutcome::Accepted.is_accepted());
    }
}
