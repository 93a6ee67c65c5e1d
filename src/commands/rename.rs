//! Rename command handler.

use std::path::Path;

use anyhow::{Context, Result};
use renamer_core::{
    Capabilities, ChangeLogger, DocumentError, DocumentOutcome, DocumentScanner, FileConfig,
    RenameOptions, run_rename_batch,
};
use tracing::warn;

use super::{build_pipeline, resolve_log_dir};
use crate::ProcessExit;
use crate::cli::RenameArgs;

pub(crate) async fn run_rename_command(args: &RenameArgs, config: &FileConfig) -> Result<ProcessExit> {
    let scanner = DocumentScanner::new(&args.directory, !args.no_recursive)?;
    let pipeline = build_pipeline(config)?;

    let files = scanner.scan(pipeline.extractor());
    if files.is_empty() {
        println!("No files found to process in {}", args.directory.display());
        return Ok(ProcessExit::Success);
    }
    println!("Found {} files to process", files.len());

    let log_dir = match args.log_dir.as_deref() {
        Some(dir) => dir.to_path_buf(),
        None => resolve_log_dir(&args.directory, &config.log_dir),
    };
    let logger = ChangeLogger::new(&log_dir)
        .with_context(|| format!("Failed to prepare log directory '{}'", log_dir.display()))?;

    let capabilities = Capabilities::detect(pipeline.enricher().extractor()).await;
    if !capabilities.llm_available() {
        warn!("language model unavailable; names will rely on lookups only");
    }

    let options = RenameOptions {
        dry_run: args.dry_run,
        backup: !args.no_backup,
    };
    let report = run_rename_batch(
        &pipeline,
        &files,
        &capabilities,
        options,
        &logger,
        print_result,
    )
    .await;

    println!();
    if args.dry_run {
        println!(
            "Dry run completed: {} would be renamed, {} unchanged, {} failed",
            report.would_rename,
            report.unchanged,
            report.failed.len()
        );
    } else {
        println!(
            "Processing completed: {} renamed, {} unchanged, {} failed. {} citations in {}",
            report.renamed,
            report.unchanged,
            report.failed.len(),
            logger.citation_count(),
            logger.citation_store().path().display()
        );
    }

    Ok(ProcessExit::from_failures(report.failed.len()))
}

fn print_result(path: &Path, result: &Result<DocumentOutcome, DocumentError>) {
    match result {
        Ok(DocumentOutcome::Renamed {
            to, citation_key, ..
        }) => println!(
            "Renamed: {} -> {} [{citation_key}]",
            file_name(path),
            file_name(to)
        ),
        Ok(DocumentOutcome::WouldRename { to, .. }) => {
            println!("Would rename: {} -> {}", file_name(path), file_name(to));
        }
        Ok(DocumentOutcome::Unchanged { .. }) => println!("Unchanged: {}", file_name(path)),
        Err(error) => println!("Error processing {}: {error}", path.display()),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}
