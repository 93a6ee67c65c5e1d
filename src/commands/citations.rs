//! Citations command handler: export a citation database without renaming.

use anyhow::{Context, Result};
use renamer_core::{Capabilities, DocumentScanner, ExportFormat, FileConfig, collect_citations};

use super::build_pipeline;
use crate::ProcessExit;
use crate::cli::CitationsArgs;

pub(crate) async fn run_citations_command(
    args: &CitationsArgs,
    config: &FileConfig,
) -> Result<ProcessExit> {
    let scanner = DocumentScanner::new(&args.directory, !args.no_recursive)?;
    let pipeline = build_pipeline(config)?;

    let files = scanner.scan(pipeline.extractor());
    if files.is_empty() {
        println!("No files found to process in {}", args.directory.display());
        return Ok(ProcessExit::Success);
    }
    println!("Found {} files to process", files.len());

    let capabilities = Capabilities::detect(pipeline.enricher().extractor()).await;
    let (batch, failed) = collect_citations(&pipeline, &files, &capabilities).await;
    for (path, error) in &failed {
        println!("Error processing {}: {error}", path.display());
    }

    let format = ExportFormat::from(args.format);
    let output = args.output.clone().unwrap_or_else(|| {
        args.directory
            .join(format!("citations.{}", format.extension()))
    });
    batch
        .write(&output, format)
        .with_context(|| format!("Failed to write citations to '{}'", output.display()))?;

    println!();
    println!("{} citations written to {}", batch.len(), output.display());
    Ok(ProcessExit::from_failures(failed.len()))
}
