//! Semantic Scholar Graph API lookup source.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use super::{
    ApiError, BibliographicSource, HttpSettings, LOOKUP_RESULT_LIMIT, RetryPolicy,
    build_source_http_client, normalize_whitespace, retry_with, trim_base_url,
};
use crate::metadata::{ArticleMetadata, MetadataSource, normalize_doi, plausible_year};

const SERVICE: &str = "semantic_scholar";

/// Default Graph API base URL.
pub const DEFAULT_SEMANTIC_SCHOLAR_URL: &str = "https://api.semanticscholar.org/graph/v1";

const PAPER_FIELDS: &str = "title,authors,year,abstract,externalIds,fieldsOfStudy";

/// Looks up papers in Semantic Scholar.
#[derive(Clone)]
pub struct SemanticScholarSource {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for SemanticScholarSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticScholarSource")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl SemanticScholarSource {
    /// # Errors
    ///
    /// Returns [`ApiError::Client`] when the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        settings: &HttpSettings,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            client: build_source_http_client(SERVICE, settings)?,
            base_url: trim_base_url(base_url),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            retry: RetryPolicy::default(),
        })
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// GETs `url`; `Ok(None)` on 404 when `not_found_is_none` is set.
    async fn get_json<T: serde::de::DeserializeOwned + Send>(
        &self,
        url: &Url,
        not_found_is_none: bool,
    ) -> Result<Option<T>, ApiError> {
        let client = &self.client;
        let api_key = self.api_key.as_deref();
        retry_with(&self.retry, move || async move {
            let mut request = client.get(url.clone());
            if let Some(key) = api_key {
                request = request.header("x-api-key", key);
            }
            let response = request
                .send()
                .await
                .map_err(|e| ApiError::from_reqwest(SERVICE, e))?;
            let status = response.status();
            if not_found_is_none && status == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !status.is_success() {
                return Err(ApiError::http_status(SERVICE, status.as_u16()));
            }
            response
                .json::<T>()
                .await
                .map(Some)
                .map_err(|e| ApiError::parse(SERVICE, e.to_string()))
        })
        .await
    }
}

#[async_trait]
impl BibliographicSource for SemanticScholarSource {
    fn source(&self) -> MetadataSource {
        MetadataSource::SemanticScholar
    }

    #[instrument(skip(self), fields(service = SERVICE))]
    async fn lookup_by_query(&self, query: &str) -> Result<Vec<ArticleMetadata>, ApiError> {
        let limit = LOOKUP_RESULT_LIMIT.to_string();
        let url = Url::parse_with_params(
            &format!("{}/paper/search", self.base_url),
            &[
                ("query", query),
                ("limit", limit.as_str()),
                ("fields", PAPER_FIELDS),
            ],
        )
        .map_err(|e| ApiError::invalid_url(SERVICE, e.to_string()))?;

        let page: SearchResponse = self.get_json(&url, false).await?.unwrap_or_default();
        let results: Vec<_> = page.data.into_iter().filter_map(paper_to_metadata).collect();
        debug!(results = results.len(), "search results");
        Ok(results)
    }

    #[instrument(skip(self), fields(service = SERVICE))]
    async fn lookup_by_doi(&self, doi: &str) -> Result<Option<ArticleMetadata>, ApiError> {
        let encoded = urlencoding::encode(doi.trim()).replace("%2F", "/");
        let url = Url::parse_with_params(
            &format!("{}/paper/DOI:{encoded}", self.base_url),
            &[("fields", PAPER_FIELDS)],
        )
        .map_err(|e| ApiError::invalid_url(SERVICE, e.to_string()))?;

        let paper: Option<Paper> = self.get_json(&url, true).await?;
        Ok(paper.and_then(paper_to_metadata))
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Paper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Paper {
    title: Option<String>,
    authors: Option<Vec<PaperAuthor>>,
    year: Option<i64>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    external_ids: Option<HashMap<String, Value>>,
    fields_of_study: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct PaperAuthor {
    name: Option<String>,
}

/// Converts a Graph API paper; papers without a title are discarded.
fn paper_to_metadata(paper: Paper) -> Option<ArticleMetadata> {
    let title = normalize_whitespace(paper.title.as_deref().unwrap_or_default());
    if title.is_empty() {
        return None;
    }

    let mut meta = ArticleMetadata::empty(MetadataSource::SemanticScholar);
    meta.title = title;
    meta.authors = paper
        .authors
        .unwrap_or_default()
        .into_iter()
        .filter_map(|a| a.name)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    meta.year = paper.year.and_then(plausible_year);
    meta.abstract_text = paper
        .abstract_text
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty());
    meta.doi = paper
        .external_ids
        .as_ref()
        .and_then(|ids| ids.get("DOI"))
        .and_then(Value::as_str)
        .and_then(normalize_doi);
    meta.keywords = paper.fields_of_study.unwrap_or_default();
    Some(meta)
}
