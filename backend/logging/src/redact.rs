//! Log Redaction Layer
//!
//! Scrubs identity numbers, phone numbers and credentials from strings
//! before they reach a log sink.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

/// Singapore NRIC/FIN: prefix letter, seven digits, checksum letter.
static NRIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[STFGMstfgm]\d{7}[A-Za-z]\b").expect("valid NRIC regex"));
static TELEPHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+\d{1,3}[-.\s]?)?\b\d{4}[-.\s]?\d{4}\b|(?:\+?\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}")
        .expect("valid phone regex")
});
static API_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(sk-[a-zA-Z0-9]{32,})|(Bearer\s+[a-zA-Z0-9\-\._~+/]+=*)").expect("valid token regex")
});

/// Field names whose values are personal data and never logged verbatim.
const PERSONAL_FIELDS: &[&str] = &[
    "Name",
    "Date of birth",
    "License Number",
    "Vehicle No",
    "Chassis No",
    "Engine No",
    "Motor No",
];

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = API_KEY_RE.replace_all(input, "[REDACTED_TOKEN]");
    let redacted = NRIC_RE.replace_all(&redacted, "[REDACTED_ID]");
    TELEPHONE_RE.replace_all(&redacted, "[REDACTED_PHONE]").into_owned()
}

/// Mask personal values in an extracted field map, keeping the keys so the
/// log still shows which fields were found.
pub fn redact_fields(fields: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    fields
        .iter()
        .map(|(k, v)| {
            let value = if PERSONAL_FIELDS.iter().any(|p| p.eq_ignore_ascii_case(k)) {
                mask(v)
            } else {
                redact_sensitive_data(v)
            };
            (k.clone(), value)
        })
        .collect()
}

fn mask(value: &str) -> String {
    let n = value.chars().count();
    if n <= 2 {
        "*".repeat(n)
    } else {
        let last: String = value.chars().skip(n - 2).collect();
        format!("{}{last}", "*".repeat(n - 2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redaction() {
        let raw = "Sending to +1-555-123-4567 with Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";
        let clean = redact_sensitive_data(raw);
        assert!(!clean.contains("+1-555-123-4567"));
        assert!(!clean.contains("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9"));
    }

    #[test]
    fn nric_and_local_phone_redacted() {
        let clean = redact_sensitive_data("owner S1234567D reachable at 9123 4567");
        assert_eq!(clean, "owner [REDACTED_ID] reachable at [REDACTED_PHONE]");
    }

    #[test]
    fn personal_fields_masked_keep_tail() {
        let mut fields = BTreeMap::new();
        fields.insert("License Number".to_string(), "S1234567D".to_string());
        fields.insert("Sex".to_string(), "F".to_string());
        let out = redact_fields(&fields);
        assert_eq!(out["License Number"], "*******7D");
        assert_eq!(out["Sex"], "F");
    }
}
