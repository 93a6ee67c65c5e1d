//! Per-document rename pipeline and batch driver.
//!
//! Documents are processed one at a time in discovery order. A failure is
//! attributed to the document that caused it, written to the error log, and
//! the batch moves on. Renames and citations already written are never
//! rolled back.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::audit::{AuditError, ChangeLogger};
use crate::citation::{CitationBatch, StoreError};
use crate::extract::{ContentExtractor, ExtractionError, create_backup};
use crate::metadata::{ArticleMetadata, EnrichmentError, Enricher};
use crate::naming::{FilenameGenerationError, FilenameGenerator, is_canonical_variant};
use crate::source::Capabilities;

/// How a rename run treats the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenameOptions {
    /// Resolve names but leave files untouched.
    pub dry_run: bool,
    /// Copy each file to `<name>.bak` before renaming.
    pub backup: bool,
}

impl Default for RenameOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            backup: true,
        }
    }
}

/// What happened to one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    Renamed {
        from: PathBuf,
        to: PathBuf,
        citation_key: String,
    },
    /// Dry run: the name the document would receive.
    WouldRename { from: PathBuf, to: PathBuf },
    /// The document already carries its canonical name.
    Unchanged { path: PathBuf },
}

/// Failure of a single document. Never aborts the batch.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Enrichment(#[from] EnrichmentError),

    #[error(transparent)]
    Filename(#[from] FilenameGenerationError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Citation(#[from] StoreError),

    #[error("cannot rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("path has no parent directory: {path}")]
    NoParent { path: PathBuf },
}

impl DocumentError {
    /// Stable label written as `error_type` in the error log.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Extraction(_) => "ExtractionError",
            Self::Enrichment(_) => "EnrichmentError",
            Self::Filename(_) => "FilenameGenerationError",
            Self::Audit(AuditError::Store(_)) | Self::Citation(_) => "StoreError",
            Self::Audit(_) => "AuditError",
            Self::Rename { .. } | Self::NoParent { .. } => "FileProcessingError",
        }
    }
}

/// Counts and failures of one batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub renamed: usize,
    pub would_rename: usize,
    pub unchanged: usize,
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchReport {
    fn record(&mut self, outcome: &DocumentOutcome) {
        match outcome {
            DocumentOutcome::Renamed { .. } => self.renamed += 1,
            DocumentOutcome::WouldRename { .. } => self.would_rename += 1,
            DocumentOutcome::Unchanged { .. } => self.unchanged += 1,
        }
    }

    #[must_use]
    pub fn processed(&self) -> usize {
        self.renamed + self.would_rename + self.unchanged + self.failed.len()
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Extraction, enrichment and naming wired together.
#[derive(Debug)]
pub struct DocumentPipeline {
    extractor: ContentExtractor,
    enricher: Enricher,
    generator: FilenameGenerator,
}

impl DocumentPipeline {
    #[must_use]
    pub fn new(extractor: ContentExtractor, enricher: Enricher, generator: FilenameGenerator) -> Self {
        Self {
            extractor,
            enricher,
            generator,
        }
    }

    #[must_use]
    pub fn extractor(&self) -> &ContentExtractor {
        &self.extractor
    }

    #[must_use]
    pub fn enricher(&self) -> &Enricher {
        &self.enricher
    }

    /// Extracts and enriches one document without touching it.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] when the content cannot be read or the
    /// enricher reports an internal inconsistency.
    pub async fn describe(
        &self,
        path: &Path,
        capabilities: &Capabilities,
    ) -> Result<ArticleMetadata, DocumentError> {
        let content = self.extractor.extract(path)?;
        debug!(format = %content.format, chars = content.text.len(), "extracted content");
        let metadata = self
            .enricher
            .enrich(&content.text, &content.metadata, capabilities)
            .await?;
        Ok(metadata)
    }

    /// Renames one document to its canonical name and records it.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] for any failure of this document. When the
    /// audit write fails the rename has already happened.
    #[instrument(skip(self, capabilities, logger), fields(path = %path.display()))]
    pub async fn process(
        &self,
        path: &Path,
        capabilities: &Capabilities,
        options: RenameOptions,
        logger: &ChangeLogger,
    ) -> Result<DocumentOutcome, DocumentError> {
        let metadata = self.describe(path, capabilities).await?;

        let extension = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let generated = self.generator.generate(&metadata, &extension);

        let directory = path
            .parent()
            .ok_or_else(|| DocumentError::NoParent {
                path: path.to_path_buf(),
            })?;
        if path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| is_canonical_variant(name, &generated))
        {
            debug!("already canonical");
            return Ok(DocumentOutcome::Unchanged {
                path: path.to_path_buf(),
            });
        }

        let unique = self.generator.ensure_unique(&generated, directory)?;
        let target = directory.join(&unique);

        if options.dry_run {
            info!(to = %target.display(), "dry run, not renaming");
            return Ok(DocumentOutcome::WouldRename {
                from: path.to_path_buf(),
                to: target,
            });
        }

        if options.backup {
            create_backup(path)?;
        }
        fs::rename(path, &target).map_err(|source| DocumentError::Rename {
            from: path.to_path_buf(),
            to: target.clone(),
            source,
        })?;
        info!(to = %target.display(), "renamed");

        let citation_key = logger.log_change(path, &target, &metadata)?;
        Ok(DocumentOutcome::Renamed {
            from: path.to_path_buf(),
            to: target,
            citation_key,
        })
    }
}

/// Processes `files` in order, logging each failure and continuing.
///
/// `on_result` sees every document's result as it completes.
pub async fn run_rename_batch<F>(
    pipeline: &DocumentPipeline,
    files: &[PathBuf],
    capabilities: &Capabilities,
    options: RenameOptions,
    logger: &ChangeLogger,
    mut on_result: F,
) -> BatchReport
where
    F: FnMut(&Path, &Result<DocumentOutcome, DocumentError>),
{
    let mut report = BatchReport::default();
    for path in files {
        let result = pipeline.process(path, capabilities, options, logger).await;
        on_result(path, &result);
        match result {
            Ok(outcome) => report.record(&outcome),
            Err(error) => {
                warn!(path = %path.display(), error = %error, "document failed");
                logger.log_error(
                    error.kind(),
                    &error.to_string(),
                    serde_json::json!({ "file": path.display().to_string() }),
                );
                report.failed.push((path.clone(), error.to_string()));
            }
        }
    }
    info!(
        renamed = report.renamed,
        would_rename = report.would_rename,
        unchanged = report.unchanged,
        failed = report.failed.len(),
        "batch complete"
    );
    report
}

/// Enriches `files` into a citation batch without renaming anything.
///
/// Documents that fail are returned alongside the batch.
pub async fn collect_citations(
    pipeline: &DocumentPipeline,
    files: &[PathBuf],
    capabilities: &Capabilities,
) -> (CitationBatch, Vec<(PathBuf, DocumentError)>) {
    let mut batch = CitationBatch::new();
    let mut failed = Vec::new();
    for path in files {
        let pushed = match pipeline.describe(path, capabilities).await {
            Ok(metadata) => batch.push(metadata).map_err(DocumentError::from),
            Err(error) => Err(error),
        };
        match pushed {
            Ok(key) => debug!(path = %path.display(), %key, "collected citation"),
            Err(error) => {
                warn!(path = %path.display(), error = %error, "skipping document");
                failed.push((path.clone(), error));
            }
        }
    }
    (batch, failed)
}
