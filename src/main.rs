//! dmarc-ingest - DMARC aggregate report pipeline runner
//!
//! Runs either pipeline stage for one object-created event against a
//! directory-backed object store, so both stages can be exercised locally.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dmarc_ingest::{
    run_extractor, run_transformer, Config, ExtractOutcome, LocalStore, ObjectCreatedEvent,
    SystemClock, TransformOutcome,
};
use std::path::{Path, PathBuf};
use tracing::Level;

/// CLI arguments for dmarc-ingest.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Extracts DMARC aggregate reports from emails and flattens them to JSON",
    long_about = "dmarc-ingest runs one pipeline stage for one object-created event. \
                  Buckets are directories under --store-root; the destination bucket \
                  comes from OUTPUT_BUCKET_NAME."
)]
struct Cli {
    /// Directory holding one subdirectory per bucket
    #[arg(long, value_parser)]
    store_root: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    stage: Stage,
}

#[derive(Subcommand, Debug)]
enum Stage {
    /// Unpack the report attachment of a raw email into xml/ objects
    Extract {
        /// Path to the event JSON
        #[arg(long)]
        event: PathBuf,
    },
    /// Flatten an XML report into newline-delimited JSON
    Transform {
        /// Path to the event JSON
        #[arg(long)]
        event: PathBuf,
    },
}

fn load_event(path: &Path) -> Result<ObjectCreatedEvent> {
    let payload = std::fs::read(path)
        .with_context(|| format!("Failed to read event file {}", path.display()))?;
    ObjectCreatedEvent::from_json(&payload).context("Failed to decode event")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env();
    let store = LocalStore::new(&cli.store_root);

    match &cli.stage {
        Stage::Extract { event } => {
            let event = load_event(event)?;
            let outcome = run_extractor(&event, &store, &config)
                .await
                .context("Extraction failed")?;
            match outcome {
                ExtractOutcome::Extracted { bucket, keys } => {
                    println!("{}", "Extracted reports".bold().green());
                    for key in &keys {
                        println!("  {}/{}", bucket, key);
                    }
                    if keys.is_empty() {
                        println!("{}", "No XML files found in attachment.".yellow());
                    }
                }
                ExtractOutcome::WrongPartCount(parts) => {
                    println!(
                        "{}",
                        format!("Skipped: email has {} top-level parts, expected 2.", parts).yellow()
                    );
                }
                ExtractOutcome::UnrecognizedAttachment { content_type } => {
                    println!(
                        "{}",
                        format!("Skipped: unrecognized attachment type {}.", content_type).yellow()
                    );
                }
            }
        }
        Stage::Transform { event } => {
            let event = load_event(event)?;
            let outcome = run_transformer(&event, &store, &config, &SystemClock)
                .await
                .context("Transformation failed")?;
            match outcome {
                TransformOutcome::Written {
                    bucket,
                    key,
                    records,
                } => {
                    println!(
                        "{} {} records to {}/{}",
                        "Wrote".bold().green(),
                        records,
                        bucket,
                        key
                    );
                }
                TransformOutcome::SkippedMalformed { reason } => {
                    println!("{}", format!("Skipped: report is not well formed ({}).", reason).yellow());
                }
            }
        }
    }

    Ok(())
}
