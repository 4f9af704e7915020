//! Mapping extracted fields onto board columns.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use docintake_config::{ColumnSpec, ColumnType};
use docintake_core::FieldMap;
use serde_json::{Map, Value, json};
use tracing::warn;

/// Formats dates are read from, most common first.
const DATE_FORMATS: [&str; 4] = ["%d %b %Y", "%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d"];

/// Parse a document date into the board's `YYYY-MM-DD`.
pub fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "0" {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .map(|date| date.format("%Y-%m-%d").to_string())
}

/// `Make/Model` becomes separate `Make` and `Model` fields.
pub fn expand_make_model(fields: &mut FieldMap) {
    let Some(combined) = fields.get("Make/Model").cloned() else { return };
    let mut parts = combined.splitn(2, '/').map(str::trim);
    if let Some(make) = parts.next().filter(|s| !s.is_empty()) {
        fields.entry("Make".into()).or_insert_with(|| make.to_string());
    }
    if let Some(model) = parts.next().filter(|s| !s.is_empty()) {
        fields.entry("Model".into()).or_insert_with(|| model.to_string());
    }
}

/// Board `column_values` for `fields`. Fields without a column are skipped,
/// and so are dates that cannot be read.
pub fn column_values(fields: &FieldMap, columns: &BTreeMap<String, ColumnSpec>) -> Map<String, Value> {
    let mut values = Map::new();
    for (name, value) in fields {
        let Some(column) = columns.get(name) else { continue };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match column.column_type {
            ColumnType::Text => {
                values.insert(column.id.clone(), Value::String(value.to_string()));
            }
            ColumnType::Date => match normalize_date(value) {
                Some(date) => {
                    values.insert(column.id.clone(), json!({ "date": date }));
                }
                None => warn!(field = %name, "Could not parse date; column left empty"),
            },
        }
    }
    values
}

/// `"<Name> - <Vehicle No>"`, or whichever half is present.
pub fn item_name(fields: &FieldMap, session_id: &str) -> String {
    let parts: Vec<&str> = ["Name", "Vehicle No"]
        .iter()
        .filter_map(|key| fields.get(*key).map(|v| v.trim()))
        .filter(|v| !v.is_empty())
        .collect();
    if parts.is_empty() { format!("New submission {session_id}") } else { parts.join(" - ") }
}
