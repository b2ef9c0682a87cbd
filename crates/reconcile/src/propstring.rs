//! Property-string codec
//!
//! Composite fields travel as `key=value` pairs joined by commas, with
//! double-quoted values when they contain separators:
//!
//! ```text
//! type=offline,message="disk swap, back soon"
//! ```

use std::collections::BTreeMap;

/// Parse a property string into its entries
///
/// Keys are lowercased. Parsing is lenient: pairs without a key are dropped
/// and an unterminated quote runs to the end of the input.
pub fn parse(raw: &str) -> BTreeMap<String, String> {
    let mut entries = BTreeMap::new();
    let raw = raw.trim();
    if raw.is_empty() {
        return entries;
    }

    let mut key = String::new();
    let mut value = String::new();
    let mut reading_key = true;
    let mut in_quotes = false;
    let mut escaped = false;

    let mut flush = |key: &mut String, value: &mut String| {
        let k = key.trim().to_lowercase();
        if !k.is_empty() {
            entries.insert(k, value.trim().to_string());
        }
        key.clear();
        value.clear();
    };

    for c in raw.chars() {
        let target = if reading_key { &mut key } else { &mut value };
        if escaped {
            target.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '=' if !in_quotes && reading_key => reading_key = false,
            ',' if !in_quotes => {
                flush(&mut key, &mut value);
                reading_key = true;
            }
            _ => target.push(c),
        }
    }
    flush(&mut key, &mut value);

    entries
}

/// Render entries as a property string
///
/// Keys come out sorted so equal maps always produce identical strings.
/// Entries with empty values are skipped.
pub fn format(entries: &BTreeMap<String, String>) -> String {
    entries
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{}={}", k, quote(v)))
        .collect::<Vec<_>>()
        .join(",")
}

fn quote(value: &str) -> String {
    if !value.contains([',', '"', ' ', '=']) {
        return value.to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
