//! Config redaction: masks credentials before a config is printed or logged.

use serde_json::Value;

static SECRET_KEYS: &[&str] = &[
    "apiKey",
    "api_key",
    "apiToken",
    "api_token",
    "token",
    "secret",
    "password",
];

/// Replace every credential value with a short prefix plus `***`.
pub fn redact(value: &Value) -> Value {
    redact_recursive(value, "")
}

fn is_secret_key(key: &str) -> bool {
    SECRET_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

fn mask(s: &str) -> String {
    if s.chars().count() > 8 {
        format!("{}***", s.chars().take(4).collect::<String>())
    } else {
        "***".to_string()
    }
}

fn redact_recursive(value: &Value, key: &str) -> Value {
    match value {
        Value::String(s) if is_secret_key(key) && !s.is_empty() => Value::String(mask(s)),
        Value::Array(items) => Value::Array(items.iter().map(|v| redact_recursive(v, key)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), redact_recursive(v, k)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Dotted paths of every value `redact` would mask.
pub fn collect_redacted_paths(value: &Value) -> Vec<String> {
    fn visit(value: &Value, path: &str, key: &str, out: &mut Vec<String>) {
        match value {
            Value::String(s) if is_secret_key(key) && !s.is_empty() => out.push(path.to_string()),
            Value::Object(map) => {
                for (k, v) in map {
                    let child = if path.is_empty() { k.clone() } else { format!("{path}.{k}") };
                    visit(v, &child, k, out);
                }
            }
            _ => {}
        }
    }

    let mut paths = Vec::new();
    visit(value, "", "", &mut paths);
    paths
}
