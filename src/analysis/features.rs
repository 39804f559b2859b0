//! Categorical feature engineering over process-event fields.
//!
//! These encodings turn string-valued event fields into numeric features
//! so that structurally similar invocations land near each other in
//! feature space: identical paths score identically, and command lines
//! with the same shape produce the same token count regardless of literal
//! argument values.

/// Sum of character ordinals of the lowercased input. Identical strings
/// map to the same score; near-identical paths land close together.
pub fn char_ord_score(value: &str) -> f64 {
    value
        .to_lowercase()
        .chars()
        .map(|c| c as u32 as f64)
        .sum()
}

const DELIMITERS: &[char] = &[
    ' ', '"', '\'', '-', '/', '\\', '.', ',', ';', ':', '|', '&', '%', '$', '(', ')',
];

/// Count of delimiter characters, a cheap proxy for command-line shape
pub fn delim_count(value: &str) -> f64 {
    value.chars().filter(|c| DELIMITERS.contains(c)).count() as f64
}

/// Well-known system logon session markers (LUID 0x3e7 forms and the
/// LocalSystem SID)
pub fn is_system_session(session_id: &str) -> bool {
    let trimmed = session_id.trim();
    trimmed.eq_ignore_ascii_case("0x3e7")
        || trimmed == "999"
        || trimmed.starts_with("S-1-5-18")
}
