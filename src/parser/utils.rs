//! Label escaping for writing Nexus and Newick output.

/// Characters that force a label into single quotes.
const SPECIAL_CHARS: &[char] = &[
    ' ', ',', ';', '\t', '\n', '\r', '(', ')', ':', '[', ']', '\'', '=', '"',
];

/// Returns whether the label can be written without quotes.
///
/// # Examples
/// ```
/// # use cladewick::parser::utils::is_plain_label;
/// assert!(is_plain_label("Pukeko"));
/// assert!(is_plain_label("Australasian_Swamphen"));
/// assert!(!is_plain_label("Australasian Swamphen"));
/// assert!(!is_plain_label("Pu[ke]ko"));
/// ```
pub fn is_plain_label(label: &str) -> bool {
    !label.is_empty() && !label.contains(SPECIAL_CHARS)
}

/// Escapes a taxon label for Nexus and Newick output.
///
/// Plain labels are kept verbatim; everything else is wrapped in single
/// quotes with internal single quotes doubled.
///
/// # Examples
/// ```
/// # use cladewick::parser::utils::escape_label;
/// assert_eq!(escape_label("Pukeko"), "Pukeko");
/// assert_eq!(escape_label("Pu[ke]ko"), "'Pu[ke]ko'");
/// assert_eq!(escape_label("Australasian Swamphen"), "'Australasian Swamphen'");
/// assert_eq!(escape_label("Baillon's Crake"), "'Baillon''s Crake'");
/// ```
pub fn escape_label(label: &str) -> String {
    if is_plain_label(label) {
        label.to_string()
    } else {
        format!("'{}'", label.replace('\'', "''"))
    }
}

/// Formats a float the way tree files conventionally carry them:
/// integral values keep one decimal (`2.0`), others use the shortest
/// representation that round-trips.
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}
