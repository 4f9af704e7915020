//! Runtime configuration for docintake.
//!
//! Provides:
//! - Typed config schema (prompts, session, inference, image, workbook)
//! - YAML read/write with atomic backup rotation
//! - `${ENV_VAR}` substitution
//! - Config redaction for safe logging/display
//! - Default value application
//! - Validation with per-field reports

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use defaults::{apply_all_defaults, default_prompt};
pub use env::{collect_referenced_vars, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_dir, config_file_path, load_config, read_config_value, write_config};
pub use redact::{collect_redacted_paths, redact};
pub use schema::{
    ColumnSpec, ColumnType, ImageConfig, InferenceConfig, IntakeConfig, LoggingConfig,
    PromptsConfig, ProviderConfig, SessionConfig, WorkbookConfig,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;

/// Load, substitute env vars, apply defaults and validate a config file.
///
/// This is the main entry point for loading a config at runtime. Warnings
/// are logged; any validation error aborts the load.
pub async fn load_and_prepare(path: &Path) -> Result<IntakeConfig> {
    let value = read_config_value(path).await?;
    prepare(&value)
}

/// The same pipeline over an already-parsed tree.
pub fn prepare(value: &Value) -> Result<IntakeConfig> {
    let value = resolve_env_vars(value).context("Failed to resolve env vars in config")?;

    let config: IntakeConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;
    let config = apply_all_defaults(config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if !report.is_valid() {
        bail!("config has {} error(s); first: {}", report.errors.len(), report.errors[0]);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prepare_fills_defaults() {
        let cfg = prepare(&json!({"session": {"maxRetries": 1}})).unwrap();
        assert_eq!(cfg.session().max_retries(), 1);
        assert!(cfg.prompts().identity_card.is_some());
    }

    #[test]
    fn prepare_rejects_invalid() {
        let err = prepare(&json!({"image": {"minBytes": 10, "maxBytes": 5}})).unwrap_err();
        assert!(err.to_string().contains("image.maxBytes"));
    }

    #[tokio::test]
    async fn load_and_prepare_reads_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "session:\n  requiredKinds: [log_card]\n").unwrap();
        let cfg = load_and_prepare(&path).await.unwrap();
        assert_eq!(cfg.session().required_kinds(), vec![docintake_core::DocumentKind::LogCard]);
    }
}
