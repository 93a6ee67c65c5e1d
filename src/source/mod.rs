//! Remote metadata sources.
//!
//! Two kinds of source exist: the [`MetadataExtractor`], which reads metadata
//! out of document text (a local language model), and [`BibliographicSource`]
//! lookups (arXiv, Semantic Scholar), which find records by query or DOI.
//! Both are object-safe async traits so the enricher can hold any
//! implementation, including in-process stubs in tests.
//!
//! Availability of the language model is not remembered by the adapter. It is
//! checked by the caller and passed into each enrichment run as
//! [`Capabilities`], so a change between runs is always observed.

mod arxiv;
mod error;
mod http_client;
mod ollama;
mod retry;
mod semantic_scholar;

use async_trait::async_trait;
use tracing::info;

use crate::metadata::{ArticleMetadata, MetadataSource};

pub use arxiv::{ArxivSource, DEFAULT_ARXIV_URL, arxiv_id_from_doi};
pub use error::ApiError;
pub use http_client::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS, HttpSettings,
    build_source_http_client, default_user_agent,
};
pub use ollama::{DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL, OllamaExtractor, parse_llm_response};
pub use retry::{
    DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_api_error,
    classify_http_status, retry_with,
};
pub use semantic_scholar::{DEFAULT_SEMANTIC_SCHOLAR_URL, SemanticScholarSource};

/// Maximum number of results requested from a lookup source.
pub const LOOKUP_RESULT_LIMIT: usize = 5;

/// Whether a capability can be used for the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable,
}

/// Capabilities observed at the start of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub llm: Availability,
}

impl Capabilities {
    /// Checks the extractor once and records the result.
    pub async fn detect(extractor: &dyn MetadataExtractor) -> Self {
        let llm = extractor.check_availability().await;
        info!(extractor = extractor.name(), availability = ?llm, "checked language model");
        Self { llm }
    }

    /// Capabilities with every optional service available.
    #[must_use]
    pub fn available() -> Self {
        Self {
            llm: Availability::Available,
        }
    }

    /// Capabilities with every optional service unavailable.
    #[must_use]
    pub fn offline() -> Self {
        Self {
            llm: Availability::Unavailable,
        }
    }

    #[must_use]
    pub fn llm_available(&self) -> bool {
        self.llm == Availability::Available
    }
}

/// Extracts metadata from document text.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Quick, bounded check of whether the extractor can serve requests.
    async fn check_availability(&self) -> Availability;

    /// Extracts a record from `text`. The result is tagged [`MetadataSource::Llm`].
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the service fails or its answer is unusable.
    async fn extract(&self, text: &str) -> Result<ArticleMetadata, ApiError>;
}

/// Looks up bibliographic records in an external catalogue.
#[async_trait]
pub trait BibliographicSource: Send + Sync {
    /// The source tag stamped on every record this adapter returns.
    fn source(&self) -> MetadataSource;

    /// Builds the search query for a seed record, or `None` to skip searching.
    ///
    /// Defaults to the seed's title.
    fn query_for(&self, seed: &ArticleMetadata) -> Option<String> {
        seed.has_title().then(|| seed.title.trim().to_string())
    }

    /// Searches by free-text query, best match first.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the service fails or the response is malformed.
    async fn lookup_by_query(&self, query: &str) -> Result<Vec<ArticleMetadata>, ApiError>;

    /// Finds the record for a DOI. `Ok(None)` when the source has no such record.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the service fails or the response is malformed.
    async fn lookup_by_doi(&self, doi: &str) -> Result<Option<ArticleMetadata>, ApiError>;
}

/// Collapses runs of whitespace (including newlines) into single spaces.
pub(crate) fn normalize_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Removes trailing slashes so endpoint paths can be appended uniformly.
pub(crate) fn trim_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}
