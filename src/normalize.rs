// Text normalization for description matching
//
// "Cadeira  Giratória " and "cadeira giratoria" must compare equal:
// - Lowercase
// - Accent fold (NFD, drop combining marks)
// - Collapse whitespace runs, trim

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalize free text for comparison
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize an optional field; absent and blank both become ""
pub fn normalize_field(field: Option<&str>) -> String {
    field.map(normalize).unwrap_or_default()
}

/// Join the present, non-blank parts of a record into one comparison string
pub fn join_fields(parts: &[Option<&str>]) -> String {
    parts
        .iter()
        .flatten()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
