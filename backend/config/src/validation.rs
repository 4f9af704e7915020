//! Config validation: checks the prepared config and reports every problem at once.

use thiserror::Error;

use docintake_core::DocumentKind;

use crate::schema::{IntakeConfig, ProviderConfig};

/// Image format names the validator understands.
pub const KNOWN_IMAGE_FORMATS: &[&str] = &["jpeg", "png", "webp", "gif", "bmp", "tiff"];

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &IntakeConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_prompts(config, &mut report);
    validate_session(config, &mut report);
    validate_inference(config, &mut report);
    validate_image(config, &mut report);
    validate_workbook(config, &mut report);
    report
}

fn validate_prompts(config: &IntakeConfig, report: &mut ValidationReport) {
    let prompts = config.prompts();
    for kind in config.session().required_kinds() {
        let empty = prompts.for_kind(kind).map(str::trim).unwrap_or("").is_empty();
        if empty {
            report.error(format!("prompts.{}", prompt_key(kind)), "Prompt is required for a required kind");
        }
    }
}

fn prompt_key(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::IdentityCard => "identityCard",
        DocumentKind::DriversLicense => "driversLicense",
        DocumentKind::LogCard => "logCard",
    }
}

fn validate_session(config: &IntakeConfig, report: &mut ValidationReport) {
    let Some(session) = &config.session else { return };

    if session.required_kinds.as_ref().is_some_and(Vec::is_empty) {
        report.error("session.requiredKinds", "At least one document kind is required");
    }
    if let Some(retries) = session.max_retries {
        if retries > 10 {
            report.warn(
                "session.maxRetries",
                format!("{retries} retries per document keeps users in long loops"),
            );
        }
    }
    if session.idle_timeout_secs == Some(0) {
        report.error("session.idleTimeoutSecs", "Idle timeout must be > 0");
    }
    for (i, detail) in session.details.iter().flatten().enumerate() {
        if detail.trim().is_empty() {
            report.error(format!("session.details[{i}]"), "Detail prompt cannot be empty");
        }
    }
}

fn validate_inference(config: &IntakeConfig, report: &mut ValidationReport) {
    let Some(inference) = &config.inference else { return };

    if inference.timeout_secs == Some(0) {
        report.error("inference.timeoutSecs", "Inference timeout must be > 0");
    }
    if inference.max_concurrent == Some(0) {
        report.warn("inference.maxConcurrent", "0 is treated as 1");
    }
    match &inference.provider {
        None => report.warn("inference.provider", "No vision provider configured; extraction will fail"),
        Some(ProviderConfig::OpenaiCompatible { base_url, model, .. })
        | Some(ProviderConfig::Ollama { base_url, model }) => {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                report.error("inference.provider.baseUrl", "Base URL must start with http:// or https://");
            }
            if model.trim().is_empty() {
                report.error("inference.provider.model", "Model name cannot be empty");
            }
        }
    }
}

fn validate_image(config: &IntakeConfig, report: &mut ValidationReport) {
    let Some(image) = &config.image else { return };

    if image.min_width == Some(0) || image.min_height == Some(0) {
        report.warn("image", "A zero minimum dimension accepts any image size");
    }
    if let (Some(min), Some(max)) = (image.min_bytes, image.max_bytes) {
        if max <= min {
            report.error("image.maxBytes", format!("maxBytes ({max}) must exceed minBytes ({min})"));
        }
    }
    if let Some(formats) = &image.allowed_formats {
        if formats.is_empty() {
            report.error("image.allowedFormats", "At least one format must be allowed");
        }
        for format in formats {
            if !KNOWN_IMAGE_FORMATS.contains(&format.to_ascii_lowercase().as_str()) {
                report.error(
                    "image.allowedFormats",
                    format!("Unknown format '{format}'; expected one of {}", KNOWN_IMAGE_FORMATS.join(", ")),
                );
            }
        }
    }
}

fn validate_workbook(config: &IntakeConfig, report: &mut ValidationReport) {
    let Some(workbook) = &config.workbook else { return };

    if workbook.api_token.as_deref().map(str::is_empty).unwrap_or(true) {
        report.error("workbook.apiToken", "Workbook API token is required");
    }
    if workbook.board_id.as_deref().map(str::is_empty).unwrap_or(true) {
        report.error("workbook.boardId", "Workbook board id is required");
    }
    if let Some(columns) = &workbook.columns {
        if columns.is_empty() {
            report.warn("workbook.columns", "No columns mapped; items will be created empty");
        }
        for (field, column) in columns {
            if column.id.trim().is_empty() {
                report.error(format!("workbook.columns.{field}"), "Column id cannot be empty");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::apply_all_defaults;
    use crate::schema::{ImageConfig, InferenceConfig, SessionConfig, WorkbookConfig};

    fn with_provider(mut cfg: IntakeConfig) -> IntakeConfig {
        cfg.inference = Some(InferenceConfig {
            provider: Some(ProviderConfig::Ollama {
                base_url: "http://localhost:11434".into(),
                model: "llava".into(),
            }),
            ..Default::default()
        });
        cfg
    }

    #[test]
    fn defaults_with_provider_are_valid() {
        let cfg = apply_all_defaults(with_provider(IntakeConfig::default()));
        let report = validate(&cfg);
        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn missing_provider_is_warning() {
        let report = validate(&apply_all_defaults(IntakeConfig::default()));
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.path == "inference.provider"));
    }

    #[test]
    fn empty_required_kinds_is_error() {
        let mut cfg = with_provider(IntakeConfig::default());
        cfg.session = Some(SessionConfig {
            required_kinds: Some(vec![]),
            ..Default::default()
        });
        let report = validate(&cfg);
        assert!(report.errors.iter().any(|e| e.path == "session.requiredKinds"));
    }

    #[test]
    fn inverted_byte_limits_and_unknown_format() {
        let mut cfg = with_provider(IntakeConfig::default());
        cfg.image = Some(ImageConfig {
            min_bytes: Some(4096),
            max_bytes: Some(1024),
            allowed_formats: Some(vec!["jpeg".into(), "heic".into()]),
            ..Default::default()
        });
        let report = validate(&apply_all_defaults(cfg));
        let paths: Vec<_> = report.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["image.maxBytes", "image.allowedFormats"]);
    }

    #[test]
    fn workbook_requires_token_and_board() {
        let mut cfg = with_provider(IntakeConfig::default());
        cfg.workbook = Some(WorkbookConfig::default());
        let report = validate(&apply_all_defaults(cfg));
        let paths: Vec<_> = report.errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"workbook.apiToken"));
        assert!(paths.contains(&"workbook.boardId"));
    }
}
