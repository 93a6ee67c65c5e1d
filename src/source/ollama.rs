//! Language model metadata extractor backed by a local Ollama server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use super::{
    ApiError, Availability, HttpSettings, MetadataExtractor, RetryPolicy,
    build_source_http_client, retry_with, trim_base_url,
};
use crate::metadata::{ArticleMetadata, MetadataSource, non_blank, parse_year_value};

const SERVICE: &str = "ollama";

/// Default Ollama server address.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default model used for extraction.
pub const DEFAULT_OLLAMA_MODEL: &str = "drummer-knowledge";

/// Default bound on the availability check.
const DEFAULT_AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(2);

const SYSTEM_PROMPT: &str = "You are a JSON-only responder that extracts bibliographic metadata \
from academic documents.
Respond ONLY with a JSON object containing the following fields:
- authors: list of author names
- year: publication year (integer)
- title: document title
- doi: DOI if present
- abstract: document abstract
- keywords: list of key topics or phrases

Format all text fields as clean, properly capitalized strings.
If a field is not found, use null.
Do not include any explanation or additional text.";

/// Extracts metadata by prompting an Ollama chat model.
#[derive(Debug, Clone)]
pub struct OllamaExtractor {
    client: Client,
    base_url: String,
    model: String,
    retry: RetryPolicy,
    availability_timeout: Duration,
}

impl OllamaExtractor {
    /// Creates an extractor for the server at `base_url` using `model`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Client`] when the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        settings: &HttpSettings,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            client: build_source_http_client(SERVICE, settings)?,
            base_url: trim_base_url(base_url),
            model: model.into(),
            retry: RetryPolicy::default(),
            availability_timeout: DEFAULT_AVAILABILITY_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_availability_timeout(mut self, timeout: Duration) -> Self {
        self.availability_timeout = timeout;
        self
    }

    async fn chat(&self, text: &str) -> Result<String, ApiError> {
        let url = format!("{}/api/chat", self.base_url);
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt(text)},
            ],
            "stream": false,
        });

        let client = &self.client;
        let url = url.as_str();
        let payload = &payload;
        let body: ChatResponse = retry_with(&self.retry, move || async move {
            let response = client
                .post(url)
                .json(payload)
                .send()
                .await
                .map_err(|e| ApiError::from_reqwest(SERVICE, e))?;
            let status = response.status();
            if !status.is_success() {
                return Err(ApiError::http_status(SERVICE, status.as_u16()));
            }
            response
                .json::<ChatResponse>()
                .await
                .map_err(|e| ApiError::parse(SERVICE, e.to_string()))
        })
        .await?;

        Ok(body.message.map(|m| m.content).unwrap_or_default())
    }
}

#[async_trait]
impl MetadataExtractor for OllamaExtractor {
    fn name(&self) -> &'static str {
        SERVICE
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn check_availability(&self) -> Availability {
        let url = format!("{}/api/tags", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(self.availability_timeout)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                debug!("language model service is available");
                Availability::Available
            }
            Ok(response) => {
                info!(
                    status = response.status().as_u16(),
                    "language model service answered with an error, using lookup sources only"
                );
                Availability::Unavailable
            }
            Err(error) => {
                info!(error = %error, "language model service not reachable, using lookup sources only");
                Availability::Unavailable
            }
        }
    }

    #[instrument(skip(self, text), fields(model = %self.model, text_chars = text.len()))]
    async fn extract(&self, text: &str) -> Result<ArticleMetadata, ApiError> {
        let content = self.chat(text).await?;
        debug!(response_chars = content.len(), "model responded");
        parse_llm_response(&content)
    }
}

fn user_prompt(text: &str) -> String {
    format!(
        "Extract metadata from this academic document content:\n\n{text}\n\n\
         Respond with a JSON object containing authors, year, title, doi, abstract, and keywords."
    )
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPayload {
    #[serde(default)]
    authors: Value,
    #[serde(default)]
    year: Value,
    #[serde(default)]
    title: Value,
    #[serde(default)]
    doi: Value,
    #[serde(default, rename = "abstract")]
    abstract_text: Value,
    #[serde(default)]
    keywords: Value,
}

/// Parses a model answer into a record tagged [`MetadataSource::Llm`].
///
/// Models often wrap the JSON object in prose or code fences; the text between
/// the first `{` and the last `}` is used, and a missing closing brace is
/// supplied. Authors given as one string are split on `;`, keywords on `,`.
///
/// # Errors
///
/// Returns [`ApiError::Parse`] when no JSON object can be recovered.
pub fn parse_llm_response(response: &str) -> Result<ArticleMetadata, ApiError> {
    let trimmed = response.trim();
    let start = trimmed
        .find('{')
        .ok_or_else(|| ApiError::parse(SERVICE, "response contains no JSON object"))?;
    let body = &trimmed[start..];
    let json_text = match body.rfind('}') {
        Some(end) => body[..=end].to_string(),
        None => format!("{body}}}"),
    };

    let payload: LlmPayload = serde_json::from_str(&json_text)
        .map_err(|e| ApiError::parse(SERVICE, format!("invalid JSON response: {e}")))?;

    let mut meta = ArticleMetadata::empty(MetadataSource::Llm);
    meta.authors = string_list(&payload.authors, ';');
    meta.year = parse_year_value(&payload.year);
    meta.title = text_field(&payload.title).unwrap_or_default();
    meta.doi = text_field(&payload.doi);
    meta.abstract_text = text_field(&payload.abstract_text);
    meta.keywords = string_list(&payload.keywords, ',');
    Ok(meta)
}

fn text_field(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_blank(Some(s.as_str())).map(|s| s.trim().to_string()),
        _ => None,
    }
}

fn string_list(value: &Value, delimiter: char) -> Vec<String> {
    let items: Vec<&str> = match value {
        Value::String(s) => s.split(delimiter).collect(),
        Value::Array(values) => values.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    items
        .into_iter()
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
