//! arXiv lookup source using the Atom export API.

use std::sync::LazyLock;

use async_trait::async_trait;
use quick_xml::de::from_str;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{
    ApiError, BibliographicSource, HttpSettings, LOOKUP_RESULT_LIMIT, RetryPolicy,
    build_source_http_client, normalize_whitespace, retry_with,
};
use crate::metadata::{
    ArticleMetadata, MetadataSource, compile_static_regex, non_blank, normalize_doi, parse_year,
};

const SERVICE: &str = "arxiv";

/// Default arXiv query endpoint.
pub const DEFAULT_ARXIV_URL: &str = "http://export.arxiv.org/api/query";

/// arXiv-issued DOIs: `10.48550/arXiv.<id>`.
static ARXIV_DOI: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"(?i)^10\.48550/arxiv\.(\d{4}\.\d{4,5}(?:v\d+)?|[a-z\-]+(?:\.[A-Z]{2})?/\d{7}(?:v\d+)?)$")
});

/// Extracts the arXiv identifier from an arXiv-issued DOI.
#[must_use]
pub fn arxiv_id_from_doi(doi: &str) -> Option<String> {
    ARXIV_DOI
        .captures(doi.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Looks up papers in the arXiv catalogue.
#[derive(Debug, Clone)]
pub struct ArxivSource {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ArxivSource {
    /// # Errors
    ///
    /// Returns [`ApiError::Client`] when the HTTP client cannot be built.
    pub fn new(base_url: &str, settings: &HttpSettings) -> Result<Self, ApiError> {
        Ok(Self {
            client: build_source_http_client(SERVICE, settings)?,
            base_url: base_url.trim().to_string(),
            retry: RetryPolicy::default(),
        })
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_feed(&self, params: &[(&str, &str)]) -> Result<Vec<ArticleMetadata>, ApiError> {
        let url = Url::parse_with_params(&self.base_url, params)
            .map_err(|e| ApiError::invalid_url(SERVICE, e.to_string()))?;
        debug!(url = %url, "querying arXiv");

        let client = &self.client;
        let url = &url;
        let body = retry_with(&self.retry, move || async move {
            let response = client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| ApiError::from_reqwest(SERVICE, e))?;
            let status = response.status();
            if !status.is_success() {
                return Err(ApiError::http_status(SERVICE, status.as_u16()));
            }
            response
                .text()
                .await
                .map_err(|e| ApiError::from_reqwest(SERVICE, e))
        })
        .await?;

        parse_atom_feed(&body)
    }
}

#[async_trait]
impl BibliographicSource for ArxivSource {
    fn source(&self) -> MetadataSource {
        MetadataSource::Arxiv
    }

    /// `ti:"<title>"`, narrowed by `au:"<surname>"` when an author is known.
    fn query_for(&self, seed: &ArticleMetadata) -> Option<String> {
        if !seed.has_title() {
            return None;
        }
        let title = normalize_whitespace(&seed.title).replace('"', "");
        let query = match seed.first_author_token().filter(|a| !a.is_empty()) {
            Some(author) => format!("ti:\"{title}\" AND au:\"{author}\""),
            None => format!("ti:\"{title}\""),
        };
        Some(query)
    }

    #[instrument(skip(self), fields(service = SERVICE))]
    async fn lookup_by_query(&self, query: &str) -> Result<Vec<ArticleMetadata>, ApiError> {
        let limit = LOOKUP_RESULT_LIMIT.to_string();
        self.fetch_feed(&[
            ("search_query", query),
            ("start", "0"),
            ("max_results", limit.as_str()),
            ("sortBy", "relevance"),
            ("sortOrder", "descending"),
        ])
        .await
    }

    #[instrument(skip(self), fields(service = SERVICE))]
    async fn lookup_by_doi(&self, doi: &str) -> Result<Option<ArticleMetadata>, ApiError> {
        let Some(id) = arxiv_id_from_doi(doi) else {
            debug!("DOI is not arXiv-issued, skipping");
            return Ok(None);
        };
        let entries = self.fetch_feed(&[("id_list", id.as_str())]).await?;
        Ok(entries.into_iter().next())
    }
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    published: Option<String>,
    #[serde(rename = "author", default)]
    authors: Vec<AtomAuthor>,
    #[serde(rename = "category", default)]
    categories: Vec<AtomCategory>,
    #[serde(rename = "arxiv:doi", alias = "doi", default)]
    doi: Option<String>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomCategory {
    #[serde(rename = "@term")]
    term: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@title")]
    title: Option<String>,
}

/// Parses an Atom response into records, best match first.
///
/// Entries without a title are dropped; the arXiv error feed carries a single
/// such entry.
fn parse_atom_feed(xml: &str) -> Result<Vec<ArticleMetadata>, ApiError> {
    let feed: AtomFeed =
        from_str(xml).map_err(|e| ApiError::parse(SERVICE, format!("invalid atom xml: {e}")))?;
    Ok(feed.entries.into_iter().filter_map(entry_to_metadata).collect())
}

fn entry_to_metadata(entry: AtomEntry) -> Option<ArticleMetadata> {
    let title = normalize_whitespace(entry.title.as_deref().unwrap_or_default());
    if title.is_empty() || title.eq_ignore_ascii_case("error") {
        return None;
    }

    let doi = entry
        .doi
        .as_deref()
        .and_then(|d| non_blank(Some(d)))
        .and_then(normalize_doi)
        .or_else(|| {
            entry
                .links
                .iter()
                .find(|link| link.title.as_deref() == Some("doi"))
                .and_then(|link| link.href.as_deref())
                .and_then(normalize_doi)
        });

    let mut meta = ArticleMetadata::empty(MetadataSource::Arxiv);
    meta.title = title;
    meta.authors = entry
        .authors
        .into_iter()
        .filter_map(|a| a.name)
        .map(|name| normalize_whitespace(&name))
        .filter(|name| !name.is_empty())
        .collect();
    meta.year = entry.published.as_deref().and_then(parse_year);
    meta.doi = doi;
    meta.abstract_text = entry
        .summary
        .map(|s| normalize_whitespace(&s))
        .filter(|s| !s.is_empty());
    meta.keywords = entry
        .categories
        .into_iter()
        .filter_map(|c| c.term)
        .filter(|term| !term.trim().is_empty())
        .collect();
    Some(meta)
}
