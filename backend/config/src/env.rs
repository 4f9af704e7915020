//! `${VAR}` substitution in config string values.
//!
//! Prompts and secrets are usually kept out of the YAML file, e.g.
//! `identityCard: ${ID_CARD_PROMPT}` or `apiToken: ${MONDAY_API_TOKEN}`.
//! `${VAR:-fallback}` uses `fallback` when `VAR` is unset or empty and
//! `$${VAR}` is kept as a literal `${VAR}`. Only `[A-Z_][A-Z0-9_]*` names match.

use std::collections::HashMap;

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

/// `$${NAME}` (escaped), `${NAME}` or `${NAME:-fallback}`.
static REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\$)?\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").expect("valid env reference regex")
});

/// A referenced variable with no value and no fallback.
#[derive(Debug, thiserror::Error)]
#[error("environment variable {var_name} referenced at '{config_path}' is not set")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Substitute references in every string leaf using the process environment.
pub fn resolve_env_vars(value: &Value) -> Result<Value> {
    let env: HashMap<String, String> = std::env::vars().collect();
    resolve_env_vars_with(value, &env)
}

/// Substitute references using an explicit variable map.
pub fn resolve_env_vars_with(value: &Value, env: &HashMap<String, String>) -> Result<Value> {
    Ok(walk(value, env, "")?)
}

fn walk(value: &Value, env: &HashMap<String, String>, path: &str) -> Result<Value, MissingEnvVarError> {
    Ok(match value {
        Value::String(s) => Value::String(expand(s, env, path)?),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| walk(item, env, &format!("{path}[{i}]")))
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                let child = if path.is_empty() { key.clone() } else { format!("{path}.{key}") };
                out.insert(key.clone(), walk(item, env, &child)?);
            }
            Value::Object(out)
        }
        other => other.clone(),
    })
}

fn expand(s: &str, env: &HashMap<String, String>, path: &str) -> Result<String, MissingEnvVarError> {
    if !s.contains("${") {
        return Ok(s.to_string());
    }

    let mut missing = None;
    let expanded = REFERENCE.replace_all(s, |caps: &Captures| {
        let name = &caps[2];
        if caps.get(1).is_some() {
            // Escaped: drop one `$`, keep the reference text.
            return caps[0][1..].to_string();
        }
        match env.get(name).filter(|v| !v.is_empty()) {
            Some(v) => v.clone(),
            None => match caps.get(3) {
                Some(fallback) => fallback.as_str().to_string(),
                None => {
                    missing.get_or_insert_with(|| MissingEnvVarError {
                        var_name: name.to_string(),
                        config_path: path.to_string(),
                    });
                    String::new()
                }
            },
        }
    });

    match missing {
        Some(err) => Err(err),
        None => Ok(expanded.into_owned()),
    }
}

/// Names referenced anywhere in the tree, sorted and deduplicated.
pub fn collect_referenced_vars(value: &Value) -> Vec<String> {
    fn visit(value: &Value, out: &mut Vec<String>) {
        match value {
            Value::String(s) => out.extend(
                REFERENCE
                    .captures_iter(s)
                    .filter(|caps| caps.get(1).is_none())
                    .map(|caps| caps[2].to_string()),
            ),
            Value::Array(items) => items.iter().for_each(|item| visit(item, out)),
            Value::Object(map) => map.values().for_each(|item| visit(item, out)),
            _ => {}
        }
    }

    let mut vars = Vec::new();
    visit(value, &mut vars);
    vars.sort();
    vars.dedup();
    vars
}
