//! Citation keys through the persisted store and the change logger.

use std::fs;
use std::path::Path;

use renamer_core::citation::parse_bibliography;
use renamer_core::{
    ArticleMetadata, ChangeLogger, CitationBatch, CitationStore, ExportFormat, MetadataSource,
};
use tempfile::TempDir;

fn lee(title: &str) -> ArticleMetadata {
    let mut meta = ArticleMetadata::empty(MetadataSource::Arxiv);
    meta.authors = vec!["Lee, Min".to_string(), "Park, Ji".to_string()];
    meta.year = Some(2021);
    meta.title = title.to_string();
    meta.keywords = vec!["cs.LG".to_string()];
    meta
}

#[test]
fn test_store_suffixes_repeated_author_year() {
    let dir = TempDir::new().unwrap();
    let store = CitationStore::new(dir.path().join("citations.bib"));

    assert_eq!(store.record(&lee("First Paper")).unwrap(), "Lee_2021");
    assert_eq!(store.record(&lee("Second Paper")).unwrap(), "Lee_2021_a");
    assert_eq!(store.record(&lee("Third Paper")).unwrap(), "Lee_2021_b");

    let entries = parse_bibliography(&fs::read_to_string(store.path()).unwrap()).unwrap();
    let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, ["Lee_2021", "Lee_2021_a", "Lee_2021_b"]);
    assert_eq!(entries[1].get("title"), Some("Second Paper"));
    assert_eq!(entries[1].get("author"), Some("Lee, Min and Park, Ji"));
}

#[test]
fn test_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("citations.bib");
    CitationStore::new(&path).record(&lee("First Paper")).unwrap();

    let reopened = CitationStore::new(&path);
    assert_eq!(reopened.count(), 1);
    assert_eq!(reopened.record(&lee("Again")).unwrap(), "Lee_2021_a");
}

#[test]
fn test_corrupt_store_restarts_from_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("citations.bib");
    fs::write(&path, "@article{Lee_2021, title = {unterminated").unwrap();

    let store = CitationStore::new(&path);
    assert_eq!(store.record(&lee("Fresh")).unwrap(), "Lee_2021");
    assert_eq!(store.count(), 1);
}

#[test]
fn test_logger_records_rename_and_citation() {
    let dir = TempDir::new().unwrap();
    let logger = ChangeLogger::new(dir.path().join("logs")).unwrap();

    let first = logger
        .log_change(
            Path::new("a.pdf"),
            Path::new("Lee_2021_First_Paper_X_X_X.pdf"),
            &lee("First Paper"),
        )
        .unwrap();
    let second = logger
        .log_change(
            Path::new("b.pdf"),
            Path::new("Lee_2021_Second_Paper_X_X_X.pdf"),
            &lee("Second Paper"),
        )
        .unwrap();

    assert_eq!(first, "Lee_2021");
    assert_eq!(second, "Lee_2021_a");
    assert_eq!(logger.citation_count(), 2);

    let changes = logger.recent_changes(1);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].original_path, "b.pdf");
    assert_eq!(changes[0].authors, "Lee, Min; Park, Ji");
    assert_eq!(changes[0].year, Some(2021));
}

#[test]
fn test_batch_export_is_independent_of_store() {
    let dir = TempDir::new().unwrap();
    let store = CitationStore::new(dir.path().join("citations.bib"));
    store.record(&lee("Already Stored")).unwrap();

    let mut batch = CitationBatch::new();
    assert_eq!(batch.push(lee("One")).unwrap(), "Lee_2021");
    assert_eq!(batch.push(lee("Two")).unwrap(), "Lee_2021_a");

    let out = dir.path().join("export.bib");
    batch.write(&out, ExportFormat::Bibtex).unwrap();
    let exported = parse_bibliography(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(exported.len(), 2);
    assert_eq!(store.count(), 1);
}
