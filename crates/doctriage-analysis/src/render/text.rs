//! Text-layer extraction for classification without page images.

use std::path::Path;

use super::{open_document, RenderError};

/// Text of the first `max_pages` pages, separated by blank lines.
pub fn extract_text(path: &Path, max_pages: usize) -> Result<String, RenderError> {
    let doc = open_document(path)?;
    let pages: Vec<u32> = doc
        .get_pages()
        .keys()
        .copied()
        .take(max_pages)
        .collect();

    let mut parts = Vec::with_capacity(pages.len());
    for page in pages {
        match doc.extract_text(&[page]) {
            Ok(text) => parts.push(text.trim().to_string()),
            Err(e) => tracing::warn!(
                "No text extracted from page {} of {}: {}",
                page,
                path.display(),
                e
            ),
        }
    }
    Ok(parts.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::test_pdf;

    #[test]
    fn test_extracts_first_pages_only() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("charter.pdf");
        test_pdf::write(&pdf, &["CHARTER PARTY", "RIDER CLAUSES", "SIGNATURES"]);

        let text = extract_text(&pdf, 2).unwrap();
        assert!(text.contains("CHARTER PARTY"));
        assert!(text.contains("RIDER CLAUSES"));
        assert!(!text.contains("SIGNATURES"));
    }

    #[test]
    fn test_missing_file() {
        let err = extract_text(Path::new("/nonexistent.pdf"), 1).unwrap_err();
        assert!(matches!(err, RenderError::NotFound(_)));
    }
}
