//! CLI entry point for the reference renamer.

use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use renamer_core::load_config;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod cli;
mod commands;

use cli::{Args, Command};

/// Process outcome mapped to the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Every document succeeded.
    Success,
    /// Some documents failed; the batch ran to completion.
    Partial,
}

impl ProcessExit {
    pub(crate) fn from_failures(failed: usize) -> Self {
        if failed == 0 {
            Self::Success
        } else {
            Self::Partial
        }
    }

    fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Partial => 2,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    if let Err(error) = init_tracing(&args) {
        eprintln!("error: {error:#}");
        return ExitCode::from(1);
    }

    match run(args).await {
        Ok(exit) => ExitCode::from(exit.code()),
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> Result<ProcessExit> {
    debug!(?args, "CLI arguments parsed");
    let loaded = load_config(args.config.as_deref())?;
    if let Some(path) = loaded.path.as_deref().filter(|_| loaded.loaded_from_file) {
        info!(path = %path.display(), "using config file");
    }

    match &args.command {
        Command::Rename(rename) => commands::run_rename_command(rename, &loaded.config).await,
        Command::Citations(citations) => {
            commands::run_citations_command(citations, &loaded.config).await
        }
    }
}

/// Log level priority: `RUST_LOG` > `--quiet` > `-v` count > `info`.
fn default_log_level(args: &Args) -> &'static str {
    if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

fn init_tracing(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(args)));

    let file_layer = match args.log_file.as_deref() {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file '{}'", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(())
}
