//! Orchestrates the language model and the lookup sources for one document.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::{ArticleMetadata, MetadataSource, RawMetadata, combine};
use crate::source::{BibliographicSource, Capabilities, MetadataExtractor};

/// Default number of document characters handed to the language model.
pub const DEFAULT_CONTENT_CHARS: usize = 2000;

/// Internal inconsistency while enriching a document.
///
/// Source failures never surface here; they degrade to absent candidates.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    /// An adapter was wired into a slot meant for another source.
    #[error("{slot} slot was given an adapter reporting {reported}")]
    MisroutedSource {
        slot: MetadataSource,
        reported: MetadataSource,
    },

    /// An adapter returned a record tagged with a different source.
    #[error("{expected} adapter returned a record tagged {actual}")]
    MismatchedCandidate {
        expected: MetadataSource,
        actual: MetadataSource,
    },
}

/// Runs extraction and lookups for a document and combines the results.
pub struct Enricher {
    extractor: Arc<dyn MetadataExtractor>,
    arxiv: Arc<dyn BibliographicSource>,
    scholar: Arc<dyn BibliographicSource>,
    content_chars: usize,
}

impl std::fmt::Debug for Enricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enricher")
            .field("extractor", &self.extractor.name())
            .field("arxiv", &self.arxiv.source())
            .field("scholar", &self.scholar.source())
            .field("content_chars", &self.content_chars)
            .finish()
    }
}

impl Enricher {
    /// Wires the adapters together.
    ///
    /// # Errors
    ///
    /// Returns [`EnrichmentError::MisroutedSource`] when a lookup adapter
    /// reports a source other than the slot it is given.
    pub fn new(
        extractor: Arc<dyn MetadataExtractor>,
        arxiv: Arc<dyn BibliographicSource>,
        scholar: Arc<dyn BibliographicSource>,
    ) -> Result<Self, EnrichmentError> {
        for (slot, adapter) in [
            (MetadataSource::Arxiv, &arxiv),
            (MetadataSource::SemanticScholar, &scholar),
        ] {
            if adapter.source() != slot {
                return Err(EnrichmentError::MisroutedSource {
                    slot,
                    reported: adapter.source(),
                });
            }
        }
        Ok(Self {
            extractor,
            arxiv,
            scholar,
            content_chars: DEFAULT_CONTENT_CHARS,
        })
    }

    /// Overrides how many characters of document text reach the language model.
    #[must_use]
    pub fn with_content_chars(mut self, content_chars: usize) -> Self {
        self.content_chars = content_chars;
        self
    }

    /// The language model adapter, used by callers to check availability.
    #[must_use]
    pub fn extractor(&self) -> &dyn MetadataExtractor {
        self.extractor.as_ref()
    }

    /// Produces the combined metadata record for one document.
    ///
    /// The language model runs only when `capabilities` says it is available.
    /// Its title and DOI seed the arXiv and Semantic Scholar lookups; any
    /// lookup failure yields an absent candidate.
    ///
    /// # Errors
    ///
    /// Returns [`EnrichmentError::MismatchedCandidate`] when an adapter
    /// returns a record tagged with the wrong source.
    #[instrument(skip_all, fields(text_chars = text.len(), llm = ?capabilities.llm))]
    pub async fn enrich(
        &self,
        text: &str,
        raw: &RawMetadata,
        capabilities: &Capabilities,
    ) -> Result<ArticleMetadata, EnrichmentError> {
        let llm = if capabilities.llm_available() {
            let excerpt = truncate_chars(text, self.content_chars);
            match self.extractor.extract(excerpt).await {
                Ok(meta) => {
                    if meta.source != MetadataSource::Llm {
                        return Err(EnrichmentError::MismatchedCandidate {
                            expected: MetadataSource::Llm,
                            actual: meta.source,
                        });
                    }
                    meta
                }
                Err(error) => {
                    warn!(error = %error, "language model extraction failed");
                    ArticleMetadata::llm_failed()
                }
            }
        } else {
            info!("language model unavailable, skipping extraction");
            ArticleMetadata::llm_failed()
        };

        let arxiv = lookup(self.arxiv.as_ref(), &llm).await?;
        let scholar = lookup(self.scholar.as_ref(), &llm).await?;

        debug!(
            arxiv = arxiv.is_some(),
            scholar = scholar.is_some(),
            "lookups finished"
        );
        Ok(combine(raw, llm, arxiv, scholar))
    }
}

/// Queries one lookup source, seeded by the language model record.
///
/// A usable DOI is tried first; a title-derived query follows when the DOI
/// yields nothing. Without a title no query is sent.
async fn lookup(
    source: &dyn BibliographicSource,
    seed: &ArticleMetadata,
) -> Result<Option<ArticleMetadata>, EnrichmentError> {
    let expected = source.source();

    if let Some(doi) = seed.normalized_doi() {
        match source.lookup_by_doi(&doi).await {
            Ok(Some(found)) => return checked(expected, found).map(Some),
            Ok(None) => debug!(source = %expected, %doi, "no record for DOI"),
            Err(error) => {
                warn!(source = %expected, error = %error, "DOI lookup failed");
                return Ok(None);
            }
        }
    }

    if !seed.has_title() {
        debug!(source = %expected, "no title to query with, skipping lookup");
        return Ok(None);
    }
    let Some(query) = source.query_for(seed) else {
        return Ok(None);
    };

    match source.lookup_by_query(&query).await {
        Ok(results) => match results.into_iter().next() {
            Some(best) => checked(expected, best).map(Some),
            None => {
                debug!(source = %expected, "lookup returned no results");
                Ok(None)
            }
        },
        Err(error) => {
            warn!(source = %expected, error = %error, "lookup failed");
            Ok(None)
        }
    }
}

fn checked(
    expected: MetadataSource,
    candidate: ArticleMetadata,
) -> Result<ArticleMetadata, EnrichmentError> {
    if candidate.source == expected {
        Ok(candidate)
    } else {
        Err(EnrichmentError::MismatchedCandidate {
            expected,
            actual: candidate.source,
        })
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
