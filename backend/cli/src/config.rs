use std::path::{Path, PathBuf};

use anyhow::Result;
use docintake_config::{config_dir, config_file_path, read_config_value, resolve_env_vars, IntakeConfig, LoggingConfig};
use serde_json::Value;

/// Where the config file lives.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
}

impl ConfigSource {
    /// An explicit path wins; otherwise the standard location.
    pub fn resolve(explicit: Option<PathBuf>) -> Self {
        let path = explicit.unwrap_or_else(|| config_file_path(&config_dir()));
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read_raw(&self) -> Result<Value> {
        read_config_value(&self.path).await
    }
}

/// The logging section, read before the logger exists so the rest of the
/// load can be logged. Falls back to defaults when it cannot be read.
pub fn logging_settings(raw: &Value) -> LoggingConfig {
    let section = raw.get("logging").cloned().unwrap_or(Value::Null);
    let section = resolve_env_vars(&section).unwrap_or(section);
    serde_json::from_value::<Option<LoggingConfig>>(section)
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// The full pipeline: env substitution, defaults, validation.
pub fn prepare(raw: &Value) -> Result<IntakeConfig> {
    docintake_config::prepare(raw)
}
