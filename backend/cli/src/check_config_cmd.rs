//! `docintake check-config`: validate and print the effective config.

use anyhow::{bail, Context, Result};
use docintake_config::{apply_all_defaults, collect_redacted_paths, redact, resolve_env_vars, validate, IntakeConfig};
use serde_json::Value;

use crate::config::ConfigSource;
use crate::terminal_output::{note_error, note_info, note_success, note_warn};

pub fn run(source: &ConfigSource, raw: &Value) -> Result<()> {
    note_info(&format!("Config: {}", source.path().display()));

    let resolved = resolve_env_vars(raw).context("Failed to resolve env vars in config")?;
    let config: IntakeConfig = serde_json::from_value(resolved).context("Config does not match the schema")?;
    let config = apply_all_defaults(config);
    let report = validate(&config);

    let effective = serde_json::to_value(&config)?;
    let masked = collect_redacted_paths(&effective);
    println!("{}", serde_yaml::to_string(&redact(&effective))?);
    if !masked.is_empty() {
        note_info(&format!("Masked: {}", masked.join(", ")));
    }

    for warning in &report.warnings {
        note_warn(&warning.to_string());
    }
    for error in &report.errors {
        note_error(&error.to_string());
    }
    if !report.is_valid() {
        bail!("config has {} error(s)", report.errors.len());
    }
    note_success("Config is valid");
    Ok(())
}
