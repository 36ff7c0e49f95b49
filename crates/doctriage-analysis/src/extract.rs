//! Classification label extraction from free-form model output.

use std::sync::OnceLock;

use regex::Regex;

use doctriage::models::UNKNOWN_LABEL;

const MARKER: &str = "Final Classification:";

fn fallback_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"(?i)Final\s+Classification\s*[:\-]\s*\**\s*([A-Za-z0-9_\-]+)").ok()
        })
        .as_ref()
}

/// Pull the classification label out of a model response.
///
/// Takes the rest of the line after the first `Final Classification:`, then
/// falls back to a case-insensitive pattern, then to `UNKNOWN`.
pub fn extract_classification(text: &str) -> String {
    if let Some(label) = from_marker(text) {
        return label;
    }
    if let Some(caps) = fallback_pattern().and_then(|re| re.captures(text)) {
        if let Some(m) = caps.get(1) {
            return m.as_str().to_string();
        }
    }
    tracing::warn!(
        "No classification found in response ({} chars), recording {}",
        text.len(),
        UNKNOWN_LABEL
    );
    UNKNOWN_LABEL.to_string()
}

fn from_marker(text: &str) -> Option<String> {
    let start = text.find(MARKER)? + MARKER.len();
    let line = text[start..].lines().next().unwrap_or("");
    let label = clean_label(line);
    (!label.is_empty()).then_some(label)
}

fn clean_label(raw: &str) -> String {
    let mut label = raw.trim();
    if let Some(stripped) = label.strip_suffix("</classification>") {
        label = stripped.trim_end();
    }
    label
        .trim_matches(|c: char| matches!(c, '*' | '_' | '`' | '"' | '\'') || c.is_whitespace())
        .to_string()
}
