//! Validation dataset loading.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use doctriage::models::{ClassificationTask, ValidationRecord};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read validation dataset {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("validation dataset {path} needs a `{column}` column")]
    MissingColumn { path: PathBuf, column: &'static str },
}

/// Which rows of the dataset to classify.
#[derive(Debug, Clone, Default)]
pub struct DatasetFilter<'a> {
    /// Directory joined with `file_name` values.
    pub docs_dir: Option<&'a Path>,
    /// Keep only documents whose id contains this substring.
    pub file_filter: Option<&'a str>,
    /// Keep at most this many documents.
    pub limit: Option<usize>,
}

/// Read every row of a validation CSV.
///
/// The file needs a `classification` column and one of `file_path` or
/// `file_name`.
pub fn load_validation(path: &Path) -> Result<Vec<ValidationRecord>, DatasetError> {
    let read_err = |source| DatasetError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(read_err)?;

    let headers = reader.headers().map_err(read_err)?.clone();
    let has = |name: &str| headers.iter().any(|h| h == name);
    if !has("classification") {
        return Err(DatasetError::MissingColumn {
            path: path.to_path_buf(),
            column: "classification",
        });
    }
    if !has("file_path") && !has("file_name") {
        return Err(DatasetError::MissingColumn {
            path: path.to_path_buf(),
            column: "file_path",
        });
    }

    let mut records = Vec::new();
    for row in reader.deserialize::<ValidationRecord>() {
        records.push(row.map_err(read_err)?);
    }
    debug!("Loaded {} rows from {}", records.len(), path.display());
    Ok(records)
}

/// Turn dataset rows into classification tasks.
///
/// `file_path` values are used as given; bare `file_name` values are joined
/// with the docs directory, or with `dataset_dir` when none is set.
pub fn build_tasks(
    records: &[ValidationRecord],
    dataset_dir: &Path,
    filter: &DatasetFilter<'_>,
) -> Vec<ClassificationTask> {
    let mut tasks = Vec::new();
    for (row, record) in records.iter().enumerate() {
        let Some(id) = record.document_id() else {
            warn!("Skipping dataset row {}: no file_path or file_name", row + 1);
            continue;
        };
        if let Some(needle) = filter.file_filter {
            if !id.contains(needle) {
                continue;
            }
        }

        let path = match record.file_path.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(file_path) => PathBuf::from(file_path),
            None => filter.docs_dir.unwrap_or(dataset_dir).join(id),
        };

        let mut task = ClassificationTask::new(id, path);
        let label = record.classification.trim();
        if !label.is_empty() {
            task = task.with_expected(label);
        }
        tasks.push(task);

        if filter.limit.is_some_and(|limit| tasks.len() >= limit) {
            break;
        }
    }
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_csv(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("validation.csv");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_file_path_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "file_path,classification\ndocs/a.pdf,INVOICE\ndocs/b.pdf, CHARTER_PARTY \n",
        );
        let records = load_validation(&path).unwrap();
        let tasks = build_tasks(&records, dir.path(), &DatasetFilter::default());

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].document_id, "docs/a.pdf");
        assert_eq!(tasks[0].file_path, PathBuf::from("docs/a.pdf"));
        assert_eq!(tasks[1].expected_label.as_deref(), Some("CHARTER_PARTY"));
    }

    #[test]
    fn test_file_name_column_joins_docs_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "file_name,classification\na.pdf,INVOICE\n");
        let records = load_validation(&path).unwrap();

        let docs = dir.path().join("pdfs");
        let filter = DatasetFilter {
            docs_dir: Some(&docs),
            ..Default::default()
        };
        let tasks = build_tasks(&records, dir.path(), &filter);
        assert_eq!(tasks[0].document_id, "a.pdf");
        assert_eq!(tasks[0].file_path, docs.join("a.pdf"));

        let tasks = build_tasks(&records, dir.path(), &DatasetFilter::default());
        assert_eq!(tasks[0].file_path, dir.path().join("a.pdf"));
    }

    #[test]
    fn test_filter_and_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "file_path,classification\n\
             invoices/1.pdf,INVOICE\n\
             charters/1.pdf,CHARTER_PARTY\n\
             invoices/2.pdf,INVOICE\n\
             invoices/3.pdf,INVOICE\n",
        );
        let records = load_validation(&path).unwrap();
        let filter = DatasetFilter {
            file_filter: Some("invoices/"),
            limit: Some(2),
            ..Default::default()
        };
        let ids: Vec<String> = build_tasks(&records, dir.path(), &filter)
            .into_iter()
            .map(|t| t.document_id)
            .collect();
        assert_eq!(ids, vec!["invoices/1.pdf", "invoices/2.pdf"]);
    }

    #[test]
    fn test_missing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "path,label\na.pdf,INVOICE\n");
        assert!(matches!(
            load_validation(&path),
            Err(DatasetError::MissingColumn {
                column: "classification",
                ..
            })
        ));

        let path = write_csv(dir.path(), "document,classification\na.pdf,INVOICE\n");
        assert!(matches!(
            load_validation(&path),
            Err(DatasetError::MissingColumn {
                column: "file_path",
                ..
            })
        ));
    }

    #[test]
    fn test_rows_without_id_are_skipped() {
        let records = vec![
            ValidationRecord {
                file_path: Some(" ".to_string()),
                file_name: None,
                classification: "INVOICE".to_string(),
            },
            ValidationRecord {
                file_path: Some("b.pdf".to_string()),
                file_name: None,
                classification: String::new(),
            },
        ];
        let tasks = build_tasks(&records, Path::new("."), &DatasetFilter::default());
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].expected_label.is_none());
    }
}
