//! Audit trail for rename runs.
//!
//! A log directory holds three files:
//! - `rename_log.csv`: one row per completed rename
//! - `citations.bib`: the citation store fed by every rename
//! - `errors.log`: one JSON object per line for failed documents

use std::fs::{self, OpenOptions};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::citation::{CitationStore, StoreError};
use crate::metadata::ArticleMetadata;

pub const RENAME_LOG_FILE: &str = "rename_log.csv";
pub const CITATIONS_FILE: &str = "citations.bib";
pub const ERROR_LOG_FILE: &str = "errors.log";

/// Default number of rows returned by [`ChangeLogger::recent_changes`].
pub const DEFAULT_RECENT_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit log I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("rename log write failed at {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuditError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One row of the rename log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenameRecord {
    pub timestamp: String,
    pub original_path: String,
    pub new_path: String,
    /// Authors joined with `; `.
    pub authors: String,
    pub year: Option<i32>,
    pub title: String,
    pub doi: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorEntry<'a> {
    timestamp: String,
    error_type: &'a str,
    error_message: &'a str,
    context: serde_json::Value,
}

/// Writes the rename log, the citation store and the error log.
#[derive(Debug, Clone)]
pub struct ChangeLogger {
    directory: PathBuf,
    rename_log: PathBuf,
    error_log: PathBuf,
    citations: CitationStore,
}

impl ChangeLogger {
    /// Creates `directory` and any missing log files.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] when the directory or files cannot be created.
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self, AuditError> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|e| AuditError::io(&directory, e))?;

        let logger = Self {
            rename_log: directory.join(RENAME_LOG_FILE),
            error_log: directory.join(ERROR_LOG_FILE),
            citations: CitationStore::new(directory.join(CITATIONS_FILE)),
            directory,
        };

        if !logger.rename_log.exists() {
            let mut writer = csv::Writer::from_path(&logger.rename_log)
                .map_err(|source| logger.csv_error(source))?;
            writer
                .write_record([
                    "timestamp",
                    "original_path",
                    "new_path",
                    "authors",
                    "year",
                    "title",
                    "doi",
                ])
                .map_err(|source| logger.csv_error(source))?;
            writer
                .flush()
                .map_err(|e| AuditError::io(&logger.rename_log, e))?;
        }
        for path in [logger.citations.path(), logger.error_log.as_path()] {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| AuditError::io(path, e))?;
        }
        Ok(logger)
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    #[must_use]
    pub fn citation_store(&self) -> &CitationStore {
        &self.citations
    }

    fn csv_error(&self, source: csv::Error) -> AuditError {
        AuditError::Csv {
            path: self.rename_log.clone(),
            source,
        }
    }

    /// Appends a rename row and records the citation. Returns the citation key.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] when either the row or the citation cannot be
    /// written. The rename itself has already happened at that point.
    #[instrument(skip(self, metadata), fields(from = %original.display(), to = %renamed.display()))]
    pub fn log_change(
        &self,
        original: &Path,
        renamed: &Path,
        metadata: &ArticleMetadata,
    ) -> Result<String, AuditError> {
        let record = RenameRecord {
            timestamp: Local::now().to_rfc3339(),
            original_path: original.display().to_string(),
            new_path: renamed.display().to_string(),
            authors: metadata.authors.join("; "),
            year: metadata.year,
            title: metadata.title.clone(),
            doi: metadata.doi.clone(),
        };

        let file = OpenOptions::new()
            .append(true)
            .open(&self.rename_log)
            .map_err(|e| AuditError::io(&self.rename_log, e))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer
            .serialize(&record)
            .map_err(|source| self.csv_error(source))?;
        writer
            .flush()
            .map_err(|e| AuditError::io(&self.rename_log, e))?;

        let key = self.citations.record(metadata)?;
        info!(citation_key = %key, "logged change");
        Ok(key)
    }

    /// Appends a JSON line describing a failed document.
    ///
    /// Failures to write are reported through `tracing` only.
    pub fn log_error(&self, error_type: &str, message: &str, context: serde_json::Value) {
        let entry = ErrorEntry {
            timestamp: Local::now().to_rfc3339(),
            error_type,
            error_message: message,
            context,
        };
        let line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(error) => {
                warn!(error = %error, "cannot serialize error entry");
                return;
            }
        };
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.error_log)
            .and_then(|mut file| writeln!(file, "{line}"));
        if let Err(error) = result {
            warn!(path = %self.error_log.display(), error = %error, "cannot write error log");
        }
    }

    /// The last `limit` rename rows, oldest first. Unreadable logs read as
    /// empty.
    #[must_use]
    pub fn recent_changes(&self, limit: usize) -> Vec<RenameRecord> {
        let mut reader = match csv::Reader::from_path(&self.rename_log) {
            Ok(reader) => reader,
            Err(error) => {
                warn!(error = %error, "cannot read rename log");
                return Vec::new();
            }
        };
        let records: Vec<RenameRecord> = reader
            .deserialize()
            .filter_map(|row| match row {
                Ok(record) => Some(record),
                Err(error) => {
                    warn!(error = %error, "skipping malformed rename log row");
                    None
                }
            })
            .collect();
        let skip = records.len().saturating_sub(limit);
        records.into_iter().skip(skip).collect()
    }

    /// Number of entries in the citation store.
    #[must_use]
    pub fn citation_count(&self) -> usize {
        self.citations.count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::metadata::MetadataSource;

    fn metadata() -> ArticleMetadata {
        let mut meta = ArticleMetadata::empty(MetadataSource::SemanticScholar);
        meta.authors = vec!["Smith, John".to_string(), "Doe, Jane".to_string()];
        meta.year = Some(2024);
        meta.title = "Machine Learning, Revisited".to_string();
        meta.doi = Some("10.1000/xyz".to_string());
        meta
    }

    #[test]
    fn test_new_creates_log_files_with_header() {
        let dir = TempDir::new().unwrap();
        let logger = ChangeLogger::new(dir.path().join("logs")).unwrap();

        let header = fs::read_to_string(logger.directory().join(RENAME_LOG_FILE)).unwrap();
        assert_eq!(header, "timestamp,original_path,new_path,authors,year,title,doi\n");
        assert!(logger.directory().join(CITATIONS_FILE).exists());
        assert!(logger.directory().join(ERROR_LOG_FILE).exists());
    }

    #[test]
    fn test_new_keeps_existing_rows() {
        let dir = TempDir::new().unwrap();
        let logger = ChangeLogger::new(dir.path()).unwrap();
        logger
            .log_change(Path::new("a.pdf"), Path::new("b.pdf"), &metadata())
            .unwrap();

        let reopened = ChangeLogger::new(dir.path()).unwrap();
        assert_eq!(reopened.recent_changes(DEFAULT_RECENT_LIMIT).len(), 1);
    }

    #[test]
    fn test_log_change_writes_row_and_citation() {
        let dir = TempDir::new().unwrap();
        let logger = ChangeLogger::new(dir.path()).unwrap();

        let key = logger
            .log_change(Path::new("in/old.pdf"), Path::new("in/new.pdf"), &metadata())
            .unwrap();
        assert_eq!(key, "Smith_2024");

        let rows = logger.recent_changes(DEFAULT_RECENT_LIMIT);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].original_path, "in/old.pdf");
        assert_eq!(rows[0].authors, "Smith, John; Doe, Jane");
        assert_eq!(rows[0].year, Some(2024));
        assert_eq!(rows[0].title, "Machine Learning, Revisited");
        assert_eq!(rows[0].doi.as_deref(), Some("10.1000/xyz"));
        assert_eq!(logger.citation_count(), 1);
    }

    #[test]
    fn test_recent_changes_returns_tail() {
        let dir = TempDir::new().unwrap();
        let logger = ChangeLogger::new(dir.path()).unwrap();
        for i in 0..4 {
            logger
                .log_change(
                    Path::new(&format!("{i}.pdf")),
                    Path::new("x.pdf"),
                    &metadata(),
                )
                .unwrap();
        }

        let recent = logger.recent_changes(2);
        let originals: Vec<_> = recent.iter().map(|r| r.original_path.as_str()).collect();
        assert_eq!(originals, vec!["2.pdf", "3.pdf"]);
        assert_eq!(logger.citation_count(), 4);
    }

    #[test]
    fn test_log_error_appends_json_lines() {
        let dir = TempDir::new().unwrap();
        let logger = ChangeLogger::new(dir.path()).unwrap();

        logger.log_error("ExtractionError", "bad pdf", serde_json::json!({"file": "a.pdf"}));
        logger.log_error("StoreError", "disk full", serde_json::json!({}));

        let content = fs::read_to_string(dir.path().join(ERROR_LOG_FILE)).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["error_type"], "ExtractionError");
        assert_eq!(lines[0]["error_message"], "bad pdf");
        assert_eq!(lines[0]["context"]["file"], "a.pdf");
        assert!(lines[1]["timestamp"].is_string());
    }
}
