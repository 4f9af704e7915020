//! Terminal output helpers: ANSI notes and the field table.

use docintake_core::FieldMap;

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

/// Check if the terminal supports color output.
pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok()
            || std::env::var("TERM")
                .map(|t| t != "dumb")
                .unwrap_or(false))
}

/// Notes go to stderr; stdout carries command output only.
pub fn note_info(msg: &str) {
    if supports_color() {
        eprintln!("{CYAN}{BOLD}ℹ{RESET} {msg}");
    } else {
        eprintln!("INFO: {msg}");
    }
}

pub fn note_warn(msg: &str) {
    if supports_color() {
        eprintln!("{YELLOW}{BOLD}⚠{RESET} {msg}");
    } else {
        eprintln!("WARN: {msg}");
    }
}

pub fn note_error(msg: &str) {
    if supports_color() {
        eprintln!("{RED}{BOLD}✗{RESET} {msg}");
    } else {
        eprintln!("ERROR: {msg}");
    }
}

pub fn note_success(msg: &str) {
    if supports_color() {
        eprintln!("{GREEN}{BOLD}✓{RESET} {msg}");
    } else {
        eprintln!("OK: {msg}");
    }
}

/// Two-column `Field | Value` table.
pub fn render_fields(fields: &FieldMap) -> String {
    if fields.is_empty() {
        return "  (no fields)\n".to_string();
    }
    let width = fields.keys().map(|k| k.chars().count()).max().unwrap_or(0).max("Field".len());
    let value_width = fields.values().map(|v| v.chars().count()).max().unwrap_or(0).max("Value".len());

    let mut out = String::new();
    out.push_str(&format!("  {:<width$}  Value\n", "Field"));
    out.push_str(&format!("  {}  {}\n", "-".repeat(width), "-".repeat(value_width)));
    for (key, value) in fields {
        out.push_str(&format!("  {key:<width$}  {value}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_aligned_rows() {
        let fields: FieldMap = [
            ("Name".to_string(), "TAN AH KOW".to_string()),
            ("Vehicle No".to_string(), "SBA1234A".to_string()),
        ]
        .into();
        let table = render_fields(&fields);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "  Name        TAN AH KOW");
        assert_eq!(lines[3], "  Vehicle No  SBA1234A");
    }

    #[test]
    fn empty_table_says_so() {
        assert_eq!(render_fields(&FieldMap::new()), "  (no fields)\n");
    }
}
