use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use super::{build_embedder, connect_index};
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::services::Ingestor;
use crate::sources::{DocumentSource, JsonDocumentSource};

#[derive(Debug, Args)]
pub struct IngestArgs {
    #[arg(help = "Path to a JSON or JSONL file of documents (use - for stdin)")]
    pub file: PathBuf,

    #[arg(long, help = "Only validate the input without indexing")]
    pub validate_only: bool,
}

pub async fn handle_ingest(args: IngestArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let start_time = Instant::now();

    let source = JsonDocumentSource::new(&args.file);
    let documents = source
        .load()
        .with_context(|| format!("failed to load documents from {}", source.path().display()))?;

    if documents.is_empty() {
        println!("{}", formatter.format_message("No documents found in input."));
        return Ok(());
    }

    if verbose || args.validate_only {
        eprintln!("Found {} documents in {}", documents.len(), source.name());
    }

    if args.validate_only {
        println!(
            "{}",
            formatter.format_message(&format!(
                "Validation successful: {} documents ready for ingestion",
                documents.len()
            ))
        );
        return Ok(());
    }

    let embedder = build_embedder(&config)?;
    let index = connect_index(&config)?;
    index
        .ensure_collection()
        .await
        .context("failed to prepare vector collection")?;

    let ingestor = Ingestor::from_config(&config.ingestion, embedder, index);

    let spinner = (format == OutputFormat::Text).then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Ingesting {} documents...", documents.len()));
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    });

    let result = ingestor.ingest(&documents).await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let report = result.context("ingestion failed")?;

    let duration_ms = start_time.elapsed().as_millis() as u64;
    print!("{}", formatter.format_ingest_report(&report, duration_ms));

    Ok(())
}
