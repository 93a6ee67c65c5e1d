//! CLI command handlers.

mod citations;
mod rename;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use renamer_core::{
    ArxivSource, ContentExtractor, DocumentPipeline, Enricher, FileConfig, OllamaExtractor,
    SemanticScholarSource,
};

pub(crate) use citations::run_citations_command;
pub(crate) use rename::run_rename_command;

/// Wires the configured adapters into a pipeline.
fn build_pipeline(config: &FileConfig) -> Result<DocumentPipeline> {
    let settings = config.http_settings();
    let retry = config.retry_policy();

    let llm = OllamaExtractor::new(&config.ollama_url, config.ollama_model.clone(), &settings)?
        .with_retry_policy(retry.clone())
        .with_availability_timeout(config.availability_timeout());
    let arxiv = ArxivSource::new(&config.arxiv_url, &settings)?.with_retry_policy(retry.clone());
    let scholar = SemanticScholarSource::new(
        &config.semantic_scholar_url,
        config.semantic_scholar_api_key.clone(),
        &settings,
    )?
    .with_retry_policy(retry);

    let enricher = Enricher::new(Arc::new(llm), Arc::new(arxiv), Arc::new(scholar))?
        .with_content_chars(config.llm_content_chars);

    Ok(DocumentPipeline::new(
        ContentExtractor::new(config.extensions.clone()),
        enricher,
        config.filename_generator(),
    ))
}

/// `log_dir` as given when absolute, else relative to `directory`.
fn resolve_log_dir(directory: &Path, log_dir: &Path) -> PathBuf {
    if log_dir.is_absolute() {
        log_dir.to_path_buf()
    } else {
        directory.join(log_dir)
    }
}
