//! Integration tests for the source adapters against mock HTTP servers.

use std::time::Duration;

use renamer_core::source::{
    ArxivSource, Availability, BibliographicSource, HttpSettings, MetadataExtractor,
    OllamaExtractor, RetryPolicy, SemanticScholarSource,
};
use renamer_core::{ApiError, MetadataSource};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

const ATOM_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All You Need</title>
    <summary>Transformers.</summary>
    <author><name>Ashish Vaswani</name></author>
    <arxiv:doi>10.48550/arXiv.1706.03762</arxiv:doi>
    <category term="cs.CL"/>
  </entry>
</feed>"#;

fn settings() -> HttpSettings {
    HttpSettings {
        connect_timeout: Duration::from_secs(2),
        read_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_ollama_availability_check() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"models": []})))
        .mount(&server)
        .await;

    let llm = OllamaExtractor::new(&server.uri(), "test-model", &settings()).unwrap();
    assert_eq!(llm.check_availability().await, Availability::Available);
}

#[tokio::test]
async fn test_ollama_unreachable_is_unavailable() {
    let llm = OllamaExtractor::new("http://127.0.0.1:9", "test-model", &settings())
        .unwrap()
        .with_availability_timeout(Duration::from_millis(200));
    assert_eq!(llm.check_availability().await, Availability::Unavailable);
}

#[tokio::test]
async fn test_ollama_extract_parses_fenced_answer() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let answer = "Sure:\n```json\n{\"authors\": \"Smith, John; Doe, Jane\", \"year\": \"2024\", \
                  \"title\": \"Machine Learning for Natural Language Processing\", \
                  \"keywords\": \"nlp, ml\"}\n```";
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(serde_json::json!({"model": "test-model", "stream": false})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"message": {"role": "assistant", "content": answer}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let llm = OllamaExtractor::new(&server.uri(), "test-model", &settings()).unwrap();
    let meta = llm.extract("document text").await.unwrap();

    assert_eq!(meta.source, MetadataSource::Llm);
    assert_eq!(meta.authors, vec!["Smith, John", "Doe, Jane"]);
    assert_eq!(meta.year, Some(2024));
    assert_eq!(meta.title, "Machine Learning for Natural Language Processing");
    assert_eq!(meta.keywords, vec!["nlp", "ml"]);
}

#[tokio::test]
async fn test_ollama_extract_retries_transient_status() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"message": {"content": "{\"title\": \"Recovered\"}"}})),
        )
        .mount(&server)
        .await;

    let llm = OllamaExtractor::new(&server.uri(), "m", &settings())
        .unwrap()
        .with_retry_policy(RetryPolicy::immediate(3));
    let meta = llm.extract("text").await.unwrap();
    assert_eq!(meta.title, "Recovered");
}

#[tokio::test]
async fn test_ollama_extract_gives_up_on_permanent_status() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let llm = OllamaExtractor::new(&server.uri(), "m", &settings())
        .unwrap()
        .with_retry_policy(RetryPolicy::immediate(3));
    let err = llm.extract("text").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn test_arxiv_query_lookup() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/query"))
        .and(query_param("search_query", "ti:\"Attention Is All You Need\""))
        .and(query_param("max_results", "5"))
        .and(query_param("sortBy", "relevance"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ATOM_FEED))
        .mount(&server)
        .await;

    let arxiv = ArxivSource::new(&format!("{}/api/query", server.uri()), &settings()).unwrap();
    let results = arxiv
        .lookup_by_query("ti:\"Attention Is All You Need\"")
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].source, MetadataSource::Arxiv);
    assert_eq!(results[0].year, Some(2017));
    assert_eq!(results[0].keywords, vec!["cs.CL"]);
}

#[tokio::test]
async fn test_arxiv_doi_lookup_uses_id_list() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/query"))
        .and(query_param("id_list", "1706.03762"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ATOM_FEED))
        .expect(1)
        .mount(&server)
        .await;

    let arxiv = ArxivSource::new(&format!("{}/api/query", server.uri()), &settings()).unwrap();
    let found = arxiv
        .lookup_by_doi("10.48550/arXiv.1706.03762")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.title, "Attention Is All You Need");

    let other = arxiv.lookup_by_doi("10.1000/not-arxiv").await.unwrap();
    assert!(other.is_none());
}

#[tokio::test]
async fn test_arxiv_malformed_feed_is_parse_error() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<feed><entry>"))
        .mount(&server)
        .await;

    let arxiv = ArxivSource::new(&server.uri(), &settings()).unwrap();
    let err = arxiv.lookup_by_query("ti:\"x\"").await.unwrap_err();
    assert!(matches!(err, ApiError::Parse { .. }));
}

#[tokio::test]
async fn test_semantic_scholar_doi_lookup_sends_api_key() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/graph/v1/paper/DOI:10.1109/CVPR.2016.90"))
        .and(header("x-api-key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "title": "Deep Residual Learning for Image Recognition",
            "authors": [{"name": "Kaiming He"}],
            "year": 2016,
            "externalIds": {"DOI": "10.1109/CVPR.2016.90"},
            "fieldsOfStudy": ["Computer Science"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let scholar = SemanticScholarSource::new(
        &format!("{}/graph/v1", server.uri()),
        Some("secret".to_string()),
        &settings(),
    )
    .unwrap();
    let found = scholar
        .lookup_by_doi("10.1109/CVPR.2016.90")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.source, MetadataSource::SemanticScholar);
    assert_eq!(found.authors, vec!["Kaiming He"]);
    assert_eq!(found.year, Some(2016));
}

#[tokio::test]
async fn test_semantic_scholar_unknown_doi_is_none() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let scholar = SemanticScholarSource::new(&server.uri(), None, &settings()).unwrap();
    assert!(scholar.lookup_by_doi("10.1000/missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_semantic_scholar_search_skips_untitled() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/paper/search"))
        .and(query_param("query", "residual learning"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total": 2,
            "data": [
                {"title": null},
                {"title": "Deep Residual Learning", "year": 2016, "authors": []}
            ]
        })))
        .mount(&server)
        .await;

    let scholar = SemanticScholarSource::new(&server.uri(), None, &settings()).unwrap();
    let results = scholar.lookup_by_query("residual learning").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "Deep Residual Learning");
}

#[tokio::test]
async fn test_semantic_scholar_rate_limit_retried_then_fails() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&server)
        .await;

    let scholar = SemanticScholarSource::new(&server.uri(), None, &settings())
        .unwrap()
        .with_retry_policy(RetryPolicy::immediate(2));
    let err = scholar.lookup_by_query("anything").await.unwrap_err();
    assert_eq!(err.status(), Some(429));
}
