//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use renamer_core::ExportFormat;

/// Standardize academic document filenames from enriched bibliographic metadata.
///
/// Documents are renamed to `Author_Year_Title_Words.ext` using metadata read
/// from their content by a local language model and cross-checked against
/// arXiv and Semantic Scholar.
#[derive(Parser, Debug)]
#[command(name = "renamer")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Config file (default: $XDG_CONFIG_HOME/reference-renamer/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rename supported files in DIRECTORY to their canonical names
    Rename(RenameArgs),
    /// Write a citation database for files in DIRECTORY without renaming
    Citations(CitationsArgs),
}

#[derive(ClapArgs, Debug)]
pub struct RenameArgs {
    /// Directory to process
    pub directory: PathBuf,

    /// Only process files directly inside DIRECTORY
    #[arg(long)]
    pub no_recursive: bool,

    /// Show the new names without renaming anything
    #[arg(long)]
    pub dry_run: bool,

    /// Do not copy files to `<name>.bak` before renaming
    #[arg(long)]
    pub no_backup: bool,

    /// Directory for rename_log.csv, citations.bib and errors.log
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct CitationsArgs {
    /// Directory to process
    pub directory: PathBuf,

    /// Only process files directly inside DIRECTORY
    #[arg(long)]
    pub no_recursive: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = CitationFormat::Bibtex)]
    pub format: CitationFormat,

    /// Output file (default: DIRECTORY/citations.bib or .csv)
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitationFormat {
    Bibtex,
    Csv,
}

impl From<CitationFormat> for ExportFormat {
    fn from(format: CitationFormat) -> Self {
        match format {
            CitationFormat::Bibtex => Self::Bibtex,
            CitationFormat::Csv => Self::Csv,
        }
    }
}
