//! Bibliographic metadata model shared by every source and consumer.
//!
//! [`ArticleMetadata`] is the single record type that flows from the source
//! adapters through the [`combine`] step into filename synthesis and citation
//! storage. The per-source weights live in one constant table,
//! [`SOURCE_WEIGHTS`], which is the only place both the confidence an adapter
//! stamps on its output and the ranking weight used by the combiner are defined.

mod combiner;
mod doi;
mod enricher;
mod year;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use combiner::combine;
pub use doi::normalize_doi;
pub use enricher::{DEFAULT_CONTENT_CHARS, EnrichmentError, Enricher};
pub use year::{MIN_YEAR, parse_year, parse_year_value, plausible_year};
pub(crate) use year::compile_static_regex;

/// Free-form key/value metadata embedded in a document (PDF Info dictionary).
///
/// Logged for diagnostics only; never merged into the combined record.
pub type RawMetadata = BTreeMap<String, String>;

/// Author token used when no author is known.
pub const UNKNOWN_AUTHOR: &str = "UnknownAuthor";

/// Where a metadata record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataSource {
    /// Extracted from document text by the language model.
    Llm,
    /// Language model unavailable or its extraction failed.
    LlmFailed,
    /// arXiv Atom API.
    Arxiv,
    /// Semantic Scholar Graph API.
    SemanticScholar,
}

impl MetadataSource {
    /// Stable lowercase identifier used in logs and audit records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::LlmFailed => "llm_failed",
            Self::Arxiv => "arxiv",
            Self::SemanticScholar => "semantic_scholar",
        }
    }

    /// Confidence an adapter stamps on records it produces.
    #[must_use]
    pub fn produced_confidence(self) -> f32 {
        weight_for(self).map_or(0.0, |w| w.produced)
    }

    /// Ranking weight the combiner assigns when this source wins.
    ///
    /// `None` for [`MetadataSource::LlmFailed`], which never ranks.
    #[must_use]
    pub fn rank_weight(self) -> Option<f32> {
        weight_for(self).map(|w| w.rank)
    }
}

impl fmt::Display for MetadataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the source weight table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceWeight {
    pub source: MetadataSource,
    /// Confidence stamped by the adapter on its own output.
    pub produced: f32,
    /// Weight assigned by the combiner when this source is chosen as base.
    pub rank: f32,
}

/// Source weights in combiner priority order (highest priority first).
pub const SOURCE_WEIGHTS: [SourceWeight; 3] = [
    SourceWeight {
        source: MetadataSource::SemanticScholar,
        produced: 0.9,
        rank: 0.9,
    },
    SourceWeight {
        source: MetadataSource::Arxiv,
        produced: 0.9,
        rank: 0.8,
    },
    SourceWeight {
        source: MetadataSource::Llm,
        produced: 0.7,
        rank: 0.7,
    },
];

fn weight_for(source: MetadataSource) -> Option<SourceWeight> {
    SOURCE_WEIGHTS.iter().copied().find(|w| w.source == source)
}

/// Bibliographic description of one article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleMetadata {
    /// Display names, first author first. Order is significant.
    pub authors: Vec<String>,
    pub year: Option<i32>,
    /// Possibly empty; an empty title never becomes the combiner's base.
    pub title: String,
    pub doi: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub keywords: Vec<String>,
    pub source: MetadataSource,
    pub confidence: f32,
}

impl ArticleMetadata {
    /// An empty record tagged with `source` and its produced confidence.
    #[must_use]
    pub fn empty(source: MetadataSource) -> Self {
        Self {
            authors: Vec::new(),
            year: None,
            title: String::new(),
            doi: None,
            abstract_text: None,
            keywords: Vec::new(),
            source,
            confidence: source.produced_confidence(),
        }
    }

    /// The placeholder produced when the language model cannot be used.
    #[must_use]
    pub fn llm_failed() -> Self {
        Self::empty(MetadataSource::LlmFailed)
    }

    /// True when the title carries any non-whitespace character.
    #[must_use]
    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }

    /// The DOI, if present and non-blank.
    #[must_use]
    pub fn doi(&self) -> Option<&str> {
        non_blank(self.doi.as_deref())
    }

    /// The DOI in bare `10.x/y` form, when it parses as one.
    #[must_use]
    pub fn normalized_doi(&self) -> Option<String> {
        self.doi().and_then(normalize_doi)
    }

    /// Surname token of the first author, if any author is known.
    #[must_use]
    pub fn first_author_token(&self) -> Option<String> {
        self.authors.first().map(|a| author_token(a))
    }
}

impl Default for ArticleMetadata {
    fn default() -> Self {
        Self::llm_failed()
    }
}

/// Returns `value` when it contains non-whitespace text.
#[must_use]
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Reduces an author display name to its surname token.
///
/// Takes the segment before the first `,` or `;` and keeps only alphanumeric
/// characters, so `"Smith, John"` and `"Smith; Jones"` both become `"Smith"`.
#[must_use]
pub fn author_token(author: &str) -> String {
    author
        .split([',', ';'])
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}
