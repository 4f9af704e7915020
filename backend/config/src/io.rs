//! Config file read/write with atomic backup rotation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::schema::IntakeConfig;

const CONFIG_FILE_NAME: &str = "config.yaml";

const MAX_BACKUPS: usize = 3;

/// Resolve the docintake config directory.
/// Priority: `DOCINTAKE_CONFIG_DIR` env > `~/.docintake/`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("DOCINTAKE_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".docintake"),
        None => PathBuf::from(".docintake"),
    }
}

pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Read the YAML file as an untyped tree, before env substitution.
///
/// A missing file yields an empty object so a first run works on defaults.
pub async fn read_config_value(path: &Path) -> Result<Value> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(Value::Object(Default::default()));
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let value: Value = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;

    // An empty file parses as null.
    Ok(if value.is_null() { Value::Object(Default::default()) } else { value })
}

/// Load and parse the config from disk without substitution or defaults.
pub async fn load_config(path: &Path) -> Result<IntakeConfig> {
    let value = read_config_value(path).await?;
    let config: IntakeConfig = serde_json::from_value(value)
        .with_context(|| format!("Invalid config structure at: {}", path.display()))?;
    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Write config to disk atomically (write to temp file, rename), keeping
/// rolling backups of the previous file.
pub async fn write_config(config: &IntakeConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }

    if path.exists() {
        rotate_backups(path).await;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    let tmp_path = path.with_extension("yaml.tmp");
    fs::write(&tmp_path, yaml.as_bytes())
        .await
        .with_context(|| format!("Failed to write temp config: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to rename temp config to: {}", path.display()))?;

    info!(path = %path.display(), "Wrote config");
    Ok(())
}

/// config.yaml.bak.1 → .bak.2 → ... → .bak.N
async fn rotate_backups(path: &Path) {
    for i in (1..MAX_BACKUPS).rev() {
        let old = path.with_extension(format!("yaml.bak.{i}"));
        let new = path.with_extension(format!("yaml.bak.{}", i + 1));
        if old.exists() {
            if let Err(e) = fs::rename(&old, &new).await {
                warn!("Failed to rotate backup {}: {}", old.display(), e);
            }
        }
    }

    let bak = path.with_extension("yaml.bak.1");
    if let Err(e) = fs::copy(path, &bak).await {
        warn!("Failed to create backup {}: {}", bak.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SessionConfig;

    #[tokio::test]
    async fn missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("absent.yaml")).await.unwrap();
        assert!(cfg.session.is_none());
    }

    #[tokio::test]
    async fn empty_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "").unwrap();
        assert!(load_config(&path).await.unwrap().inference.is_none());
    }

    #[tokio::test]
    async fn write_then_load_keeps_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file_path(dir.path());

        let mut cfg = IntakeConfig::default();
        write_config(&cfg, &path).await.unwrap();

        cfg.session = Some(SessionConfig {
            max_retries: Some(1),
            ..Default::default()
        });
        write_config(&cfg, &path).await.unwrap();

        let loaded = load_config(&path).await.unwrap();
        assert_eq!(loaded.session().max_retries(), 1);
        assert!(path.with_extension("yaml.bak.1").exists());
    }
}
