//! `docintake init`: write a starter config.

use anyhow::{bail, Result};
use docintake_config::{apply_all_defaults, write_config, InferenceConfig, IntakeConfig, ProviderConfig};

use crate::config::ConfigSource;
use crate::terminal_output::{note_info, note_success};

/// Defaults plus a local OpenAI-compatible endpoint serving SmolVLM.
pub fn starter_config() -> IntakeConfig {
    let config = IntakeConfig {
        inference: Some(InferenceConfig {
            provider: Some(ProviderConfig::OpenaiCompatible {
                base_url: "http://localhost:8000".into(),
                model: "HuggingFaceTB/SmolVLM-Instruct".into(),
                api_key: None,
                max_tokens: None,
            }),
            ..Default::default()
        }),
        ..Default::default()
    };
    apply_all_defaults(config)
}

pub async fn run(source: &ConfigSource, force: bool) -> Result<()> {
    let path = source.path();
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(&starter_config(), path).await?;
    note_success(&format!("Wrote {}", path.display()));
    note_info("Set inference.provider and, to submit to Monday.com, a workbook section");
    Ok(())
}
