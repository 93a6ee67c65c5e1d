//! Citation database export for a batch of documents.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use super::{StoreError, citation_key, entry_for, render_bibliography};
use crate::metadata::ArticleMetadata;

/// Output format of a citation export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Bibtex,
    Csv,
}

impl ExportFormat {
    /// Default file extension, without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Bibtex => "bib",
            Self::Csv => "csv",
        }
    }
}

#[derive(Debug, Serialize)]
struct CsvCitation<'a> {
    citation_key: &'a str,
    title: &'a str,
    authors: String,
    year: Option<i32>,
    doi: &'a str,
    #[serde(rename = "abstract")]
    abstract_text: &'a str,
    keywords: String,
}

/// Citations collected for one export, keys unique within the batch.
#[derive(Debug, Default)]
pub struct CitationBatch {
    keys: HashSet<String>,
    records: Vec<(String, ArticleMetadata)>,
}

impl CitationBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns a key unique within this batch and keeps the record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeySuffixExhausted`] when no key is free.
    pub fn push(&mut self, metadata: ArticleMetadata) -> Result<String, StoreError> {
        let key = citation_key(&metadata, &self.keys)?;
        self.keys.insert(key.clone());
        self.records.push((key.clone(), metadata));
        Ok(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records with their keys, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArticleMetadata)> {
        self.records.iter().map(|(key, meta)| (key.as_str(), meta))
    }

    /// Renders the batch as BibTeX.
    #[must_use]
    pub fn to_bibtex(&self) -> String {
        let entries: Vec<_> = self
            .records
            .iter()
            .map(|(key, meta)| entry_for(key, meta))
            .collect();
        render_bibliography(&entries)
    }

    /// Writes the batch to `path` in `format`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the file cannot be written.
    pub fn write(&self, path: &Path, format: ExportFormat) -> Result<(), StoreError> {
        match format {
            ExportFormat::Bibtex => fs::write(path, self.to_bibtex()).map_err(|source| {
                StoreError::Write {
                    path: path.to_path_buf(),
                    source,
                }
            })?,
            ExportFormat::Csv => self.write_csv(path)?,
        }
        info!(path = %path.display(), citations = self.len(), ?format, "wrote citations");
        Ok(())
    }

    fn write_csv(&self, path: &Path) -> Result<(), StoreError> {
        let csv_error = |source| StoreError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
        for (key, meta) in &self.records {
            writer
                .serialize(CsvCitation {
                    citation_key: key,
                    title: &meta.title,
                    authors: meta.authors.join("; "),
                    year: meta.year,
                    doi: meta.doi.as_deref().unwrap_or_default(),
                    abstract_text: meta.abstract_text.as_deref().unwrap_or_default(),
                    keywords: meta.keywords.join(", "),
                })
                .map_err(csv_error)?;
        }
        writer.flush().map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
