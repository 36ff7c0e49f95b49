//! Prompt-optimisation comparison.

use std::cmp::Ordering;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use doctriage::models::PromptResult;

use crate::output::ReportError;

/// Read every JSON file in `dir` that describes a prompt result.
///
/// Files without a string `name` are skipped; a missing `accuracy` reads as 0.
pub fn load_prompt_results(dir: &Path) -> Result<Vec<PromptResult>, ReportError> {
    let entries = std::fs::read_dir(dir).map_err(|source| ReportError::Read {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut results = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|source| ReportError::Read {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        if path.extension().map_or(true, |ext| ext != "json") {
            continue;
        }

        let contents = std::fs::read_to_string(&path).map_err(|source| ReportError::Read {
            path: path.clone(),
            source,
        })?;
        let value: Value = match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(e) => {
                debug!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        if !value.get("name").is_some_and(Value::is_string) {
            debug!("Skipping {}: no prompt name", path.display());
            continue;
        }
        match serde_json::from_value::<PromptResult>(value) {
            Ok(result) => results.push(result),
            Err(e) => debug!("Skipping {}: {}", path.display(), e),
        }
    }
    Ok(results)
}

/// Sort by accuracy descending, ties by name.
pub fn rank_prompts(mut results: Vec<PromptResult>) -> Vec<PromptResult> {
    results.sort_by(|a, b| {
        b.accuracy
            .partial_cmp(&a.accuracy)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(name: &str, accuracy: f64) -> PromptResult {
        PromptResult {
            name: name.to_string(),
            accuracy,
            notes: None,
        }
    }

    #[test]
    fn test_ranking() {
        let ranked = rank_prompts(vec![
            prompt("baseline", 0.90),
            prompt("two_step_reasoning", 0.95),
            prompt("detailed_types", 0.90),
            prompt("pattern_matching", 0.95),
        ]);
        let names: Vec<&str> = ranked.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["pattern_matching", "two_step_reasoning", "baseline", "detailed_types"]
        );
    }

    #[test]
    fn test_load_skips_unrelated_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("prompt_test_baseline.json"),
            r#"{"name": "baseline", "accuracy": 0.9, "notes": "Simple prompt"}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("prompt_test_context.json"),
            r#"{"name": "context_focused"}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("run_summary.json"), r#"{"summary": {}}"#).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();
        std::fs::write(dir.path().join("readme.txt"), "name").unwrap();

        let ranked = rank_prompts(load_prompt_results(dir.path()).unwrap());
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].name, "baseline");
        assert_eq!(ranked[0].notes.as_deref(), Some("Simple prompt"));
        assert_eq!(ranked[1].accuracy, 0.0);
    }
}
