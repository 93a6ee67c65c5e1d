//! Reference Renamer Core Library
//!
//! This library standardizes filenames of academic documents. It extracts
//! bibliographic metadata from document content, cross-references it against
//! external bibliographic sources, and derives a canonical filename and a
//! citation record from the reconciled result.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`metadata`] - The shared [`ArticleMetadata`] record, the combiner and the enricher
//! - [`source`] - Source adapters (LLM extractor, arXiv, Semantic Scholar) behind async traits
//! - [`extract`] - Document text extraction and directory scanning
//! - [`naming`] - Deterministic filename synthesis and uniqueness resolution
//! - [`citation`] - Citation key derivation, the persisted BibTeX store and exports
//! - [`audit`] - Rename audit log and per-document error log
//! - [`pipeline`] - Per-document orchestration with per-document error attribution
//! - [`config`] - File configuration loading and validation

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod audit;
pub mod citation;
pub mod config;
pub mod extract;
pub mod metadata;
pub mod naming;
pub mod pipeline;
pub mod source;

// Re-export commonly used types
pub use audit::{AuditError, ChangeLogger, RenameRecord};
pub use citation::{CitationBatch, CitationStore, ExportFormat, StoreError, citation_key};
pub use config::{ConfigError, FileConfig, LoadedConfig, load_config};
pub use extract::{ContentExtractor, DocumentScanner, ExtractedContent, ExtractionError};
pub use metadata::{
    ArticleMetadata, EnrichmentError, Enricher, MetadataSource, RawMetadata, SOURCE_WEIGHTS,
    combine,
};
pub use naming::{FilenameGenerationError, FilenameGenerator};
pub use pipeline::{
    BatchReport, DocumentError, DocumentOutcome, DocumentPipeline, RenameOptions,
    collect_citations, run_rename_batch,
};
pub use source::{
    ApiError, ArxivSource, Availability, BibliographicSource, Capabilities, HttpSettings,
    MetadataExtractor, OllamaExtractor, RetryPolicy, SemanticScholarSource,
};
