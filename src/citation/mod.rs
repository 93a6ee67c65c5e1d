//! Citation keys and the persisted BibTeX citation store.
//!
//! Keys take the form `{Surname}_{Year}` and gain a single-letter suffix
//! (`_a` through `_z`) on collision. The store is one BibTeX file that is read
//! in full, extended by one entry, and rewritten in full for every recorded
//! document. Writers must therefore be serialized; the rename pipeline
//! processes one document at a time.

mod bibtex;
mod export;

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::metadata::{ArticleMetadata, author_token};

pub use bibtex::{BibEntry, BibtexError, parse_bibliography, render_bibliography};
pub use export::{CitationBatch, ExportFormat};

/// Author component used when a record has no authors.
pub const UNKNOWN_CITATION_AUTHOR: &str = "Unknown";

/// Year component used when a record has no year.
pub const UNKNOWN_CITATION_YEAR: &str = "XXXX";

/// Errors raised while deriving keys or writing citation files.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `base_a` through `base_z` are all taken.
    #[error("citation key suffixes exhausted for {base}")]
    KeySuffixExhausted { base: String },

    /// The store or an export file could not be written.
    #[error("cannot write citations to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// CSV export failed.
    #[error("cannot write CSV citations to {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl StoreError {
    fn write(path: &Path, source: io::Error) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Derives a citation key unique among `existing`.
///
/// The author component is the first author's surname (letters and digits
/// only), `Unknown` when there are no authors. The year component is the year
/// or `XXXX`. A taken key gets the first free suffix from `_a` to `_z`.
///
/// # Errors
///
/// Returns [`StoreError::KeySuffixExhausted`] when all 26 suffixes are taken.
pub fn citation_key(
    metadata: &ArticleMetadata,
    existing: &HashSet<String>,
) -> Result<String, StoreError> {
    let author = metadata
        .authors
        .first()
        .map_or_else(|| UNKNOWN_CITATION_AUTHOR.to_string(), |a| author_token(a));
    let year = metadata
        .year
        .map_or_else(|| UNKNOWN_CITATION_YEAR.to_string(), |y| y.to_string());
    let base = format!("{author}_{year}");

    if !existing.contains(&base) {
        return Ok(base);
    }
    let suffixed = ('a'..='z')
        .map(|suffix| format!("{base}_{suffix}"))
        .find(|candidate| !existing.contains(candidate));
    suffixed.ok_or(StoreError::KeySuffixExhausted { base })
}

/// Builds the `@article` entry written for a record.
#[must_use]
pub fn entry_for(key: &str, metadata: &ArticleMetadata) -> BibEntry {
    let mut entry = BibEntry::new("article", key);
    entry.push_field("title", metadata.title.trim());
    entry.push_field("author", metadata.authors.join(" and "));
    entry.push_field(
        "year",
        metadata.year.map(|y| y.to_string()).unwrap_or_default(),
    );
    entry.push_field("doi", metadata.doi.clone().unwrap_or_default());
    entry.push_field(
        "abstract",
        metadata.abstract_text.clone().unwrap_or_default(),
    );
    entry.push_field("keywords", metadata.keywords.join(", "));
    entry
}

/// The persisted BibTeX citation database.
#[derive(Debug, Clone)]
pub struct CitationStore {
    path: PathBuf,
}

impl CitationStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every entry. A missing, unreadable or malformed store reads as
    /// empty.
    #[must_use]
    pub fn load(&self) -> Vec<BibEntry> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(error) => {
                warn!(path = %self.path.display(), error = %error, "citation store unreadable, starting fresh");
                return Vec::new();
            }
        };
        match parse_bibliography(&content) {
            Ok(entries) => entries,
            Err(error) => {
                warn!(path = %self.path.display(), error = %error, "citation store is corrupt, starting fresh");
                Vec::new()
            }
        }
    }

    /// Keys currently in the store.
    #[must_use]
    pub fn keys(&self) -> HashSet<String> {
        self.load().into_iter().map(|entry| entry.key).collect()
    }

    /// Number of entries in the store.
    #[must_use]
    pub fn count(&self) -> usize {
        self.load().len()
    }

    /// Adds a citation for `metadata` and rewrites the store.
    ///
    /// Returns the assigned key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when no key can be assigned or the store cannot
    /// be written.
    #[instrument(skip(self, metadata), fields(path = %self.path.display()))]
    pub fn record(&self, metadata: &ArticleMetadata) -> Result<String, StoreError> {
        let mut entries = self.load();
        let existing: HashSet<String> = entries.iter().map(|e| e.key.clone()).collect();
        let key = citation_key(metadata, &existing)?;
        entries.push(entry_for(&key, metadata));

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::write(parent, e))?;
        }
        fs::write(&self.path, render_bibliography(&entries))
            .map_err(|e| StoreError::write(&self.path, e))?;

        debug!(key = %key, entries = entries.len(), "recorded citation");
        Ok(key)
    }
}
