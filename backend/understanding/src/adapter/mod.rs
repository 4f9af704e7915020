//! Kind-specific extraction: the prompt sent with each image and the rules
//! that turn the model's free text into fields.

pub mod fields;

use std::collections::BTreeMap;
use std::sync::LazyLock;

use docintake_config::{PromptsConfig, default_prompt};
use docintake_core::{
    DocumentKind, ExtractionRequest, ExtractionResult, FieldMap, InferenceFailure, IntakeError, RawImage,
};
use regex::Regex;
use tracing::{debug, info};

use crate::engine::SharedInferenceEngine;
use fields::{KindSchema, is_placeholder, normalize_value, schema_for};

/// Marker the prompts end with; small models often echo the whole prompt.
static PROMPT_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)only output the extracted information").expect("valid prompt tail regex"));

/// `Key: value`, tolerating list bullets and markdown bold around the key.
static KEY_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•]\s+|\d+[.)]\s+)?\**\s*([^:*]+?)\s*\**\s*:\s*\**\s*(.*?)\s*\**\s*$")
        .expect("valid key-value regex")
});

/// One document kind's prompt and post-processing.
#[derive(Debug, Clone)]
pub struct ExtractionAdapter {
    kind: DocumentKind,
    prompt: String,
    schema: &'static KindSchema,
}

impl ExtractionAdapter {
    pub fn new(kind: DocumentKind, prompt: impl Into<String>) -> Self {
        Self { kind, prompt: prompt.into(), schema: schema_for(kind) }
    }

    /// Prompt from config, built-in default otherwise.
    pub fn from_config(kind: DocumentKind, prompts: &PromptsConfig) -> Self {
        let prompt = prompts
            .for_kind(kind)
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| default_prompt(kind));
        Self::new(kind, prompt)
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn build_request(&self, image: RawImage) -> ExtractionRequest {
        ExtractionRequest { kind: self.kind, image, prompt: self.prompt.clone() }
    }

    /// Parse raw model text into canonical fields.
    ///
    /// Unknown keys and placeholder values are dropped; the first real value
    /// for a field wins.
    pub fn format_result(&self, raw: &str) -> FieldMap {
        let body = strip_echoed_prompt(raw);
        let mut fields = FieldMap::new();

        for line in body.lines() {
            let Some(caps) = KEY_VALUE.captures(line) else { continue };
            let (key, value) = (&caps[1], &caps[2]);
            let Some(spec) = self.schema.lookup(key) else {
                continue;
            };
            if is_placeholder(value) || fields.contains_key(spec.name) {
                continue;
            }
            fields.insert(spec.name.to_string(), normalize_value(value, spec.normalize));
        }
        fields
    }

    /// Required fields absent from `fields`, in table order.
    pub fn missing_fields(&self, fields: &FieldMap) -> Vec<String> {
        self.schema
            .required
            .iter()
            .filter(|name| !fields.contains_key(**name))
            .map(|name| name.to_string())
            .collect()
    }

    pub fn validate_structure(&self, fields: &FieldMap) -> bool {
        self.missing_fields(fields).is_empty()
    }

    /// Turn the engine's raw result into this kind's final result.
    pub fn finish(&self, raw: ExtractionResult) -> ExtractionResult {
        if !raw.success {
            return raw;
        }
        let fields = self.format_result(&raw.raw_text);
        let missing = self.missing_fields(&fields);
        if missing.is_empty() {
            ExtractionResult::succeeded(self.kind, fields, raw.raw_text)
        } else {
            debug!(kind = %self.kind, ?missing, found = fields.len(), "Extraction missing required fields");
            ExtractionResult::failed(self.kind, raw.raw_text, InferenceFailure::MissingFields { missing })
        }
    }

    /// One full attempt: request, inference and formatting.
    ///
    /// Only a released engine is an `Err`; everything else is a result the
    /// session can retry.
    pub async fn extract(
        &self,
        engine: &SharedInferenceEngine,
        image: RawImage,
    ) -> Result<ExtractionResult, IntakeError> {
        let request = self.build_request(image);
        let raw = engine.infer(&request).await?;
        let result = self.finish(raw);
        info!(kind = %self.kind, success = result.success, fields = result.fields.len(), "Extraction attempt finished");
        Ok(result)
    }
}

fn strip_echoed_prompt(raw: &str) -> &str {
    let body = match PROMPT_TAIL.find_iter(raw).last() {
        Some(tail) => {
            let after = &raw[tail.end()..];
            match after.find('\n') {
                Some(nl) => &after[nl + 1..],
                None => "",
            }
        }
        None => raw,
    };
    let body = body.trim_start();
    body.strip_prefix("Assistant:").unwrap_or(body)
}

/// Adapters for every kind, built once from config.
#[derive(Debug, Clone)]
pub struct AdapterSet {
    adapters: BTreeMap<DocumentKind, ExtractionAdapter>,
}

impl AdapterSet {
    pub fn from_config(prompts: &PromptsConfig) -> Self {
        let adapters = DocumentKind::ALL
            .iter()
            .map(|kind| (*kind, ExtractionAdapter::from_config(*kind, prompts)))
            .collect();
        Self { adapters }
    }

    pub fn get(&self, kind: DocumentKind) -> &ExtractionAdapter {
        // Built for every kind in `from_config`.
        &self.adapters[&kind]
    }
}

impl Default for AdapterSet {
    fn default() -> Self {
        Self::from_config(&PromptsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineSettings;
    use crate::mock::{MockReply, MockVisionModel};
    use std::sync::Arc;
    use std::time::Duration;

    const ECHOED_ID: &str = "User:<image>Below is an identity card image.\n\
Extract and list the following information in exactly this format:\n\
Name: [Full name including Chinese name if present]\n\
Date of birth: [DOB in DD-MM-YYYY format]\n\
Only output the extracted information in the exact format above.\n\
Assistant: Name: TAN  AH KOW 陈阿狗\n\
Race: CHINESE\n\
Date of birth: 27-11-1985\n\
Sex: male\n\
Country/Place of birth: Not found";

    fn adapter(kind: DocumentKind) -> ExtractionAdapter {
        ExtractionAdapter::from_config(kind, &PromptsConfig::default())
    }

    #[test]
    fn parses_echoed_identity_card_output() {
        let id = adapter(DocumentKind::IdentityCard);
        let fields = id.format_result(ECHOED_ID);
        assert_eq!(fields["Name"], "TAN AH KOW 陈阿狗");
        assert_eq!(fields["Date of birth"], "27-11-1985");
        assert_eq!(fields["Sex"], "M");
        assert!(!fields.contains_key("Country/Place of birth"));
        assert!(id.validate_structure(&fields));
    }

    #[test]
    fn echo_is_stripped_when_lowercasing_changes_length() {
        let raw = "User:<image>List the fields.\n\
Name: [Full name]\n\
ONLY OUTPUT THE EXTRACTED INFORMATION in the exact format above.\n\
Assistant: Name: İLKER YILMAZ\n\
Date of birth: 01-01-1980";
        let fields = adapter(DocumentKind::IdentityCard).format_result(raw);
        assert_eq!(fields["Name"], "İLKER YILMAZ");
        assert_eq!(fields["Date of birth"], "01-01-1980");
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn log_card_aliases_and_markdown() {
        let raw = "**Vehicle No.**: sba1234a\n- Make / Model: ALFA ROMEO / ALFA 159\nChassis No: zar939\nOwner: someone\nPARF Eligibility Expiry Date: -";
        let fields = adapter(DocumentKind::LogCard).format_result(raw);
        assert_eq!(fields["Vehicle No"], "SBA1234A");
        assert_eq!(fields["Make/Model"], "ALFA ROMEO / ALFA 159");
        assert_eq!(fields["Chassis No"], "ZAR939");
        assert!(!fields.contains_key("PARF Eligibility Expiry Date"));
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn template_echo_only_is_missing_fields() {
        let license = adapter(DocumentKind::DriversLicense);
        let fields = license.format_result("Name: [Full name]\nLicense Number: [License number]");
        assert!(fields.is_empty());
        assert_eq!(license.missing_fields(&fields), vec!["Name", "License Number"]);
    }

    #[test]
    fn configured_prompt_wins_over_default() {
        let prompts = PromptsConfig { log_card: Some("Read the plate.".into()), ..Default::default() };
        let set = AdapterSet::from_config(&prompts);
        assert_eq!(set.get(DocumentKind::LogCard).prompt(), "Read the plate.");
        assert_eq!(set.get(DocumentKind::IdentityCard).prompt(), default_prompt(DocumentKind::IdentityCard));
    }

    #[tokio::test]
    async fn extract_applies_structure_check() {
        let model = MockVisionModel::new("m").with_replies([
            MockReply::Text("Vehicle No: SGX1234B".into()),
            MockReply::Text("Vehicle No: SGX1234B\nMake/Model: TOYOTA / COROLLA".into()),
        ]);
        let engine = SharedInferenceEngine::new(
            Arc::new(model),
            EngineSettings { timeout: Duration::from_secs(1), max_concurrent: 1 },
        );
        let log_card = adapter(DocumentKind::LogCard);
        let image = RawImage::new(vec![0u8; 8], "image/jpeg");

        let first = log_card.extract(&engine, image.clone()).await.unwrap();
        assert!(!first.success);
        assert_eq!(
            first.failure,
            Some(InferenceFailure::MissingFields { missing: vec!["Make/Model".into()] })
        );

        let second = log_card.extract(&engine, image).await.unwrap();
        assert!(second.success);
        assert_eq!(second.fields["Make/Model"], "TOYOTA / COROLLA");
    }
}
