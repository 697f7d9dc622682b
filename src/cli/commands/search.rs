use anyhow::{Context, Result};
use clap::Args;

use super::{build_embedder, connect_index};
use crate::cli::output::get_formatter;
use crate::models::{Config, MetadataFilter, OutputFormat, Subject};
use crate::services::Retriever;

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(required = true, help = "Search query text")]
    pub query: String,

    #[arg(long, short = 's', help = "Restrict results to one subject (e.g. math, science)")]
    pub subject: Option<Subject>,

    #[arg(long, short = 'n', help = "Maximum number of results to return")]
    pub limit: Option<usize>,
}

/// Raw retrieval without reranking or generation.
pub async fn handle_search(args: SearchArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let query = args.query.trim();
    if query.is_empty() {
        anyhow::bail!("search query cannot be empty");
    }

    let config = Config::load()?;
    let formatter = get_formatter(format);

    let limit = args.limit.unwrap_or(config.retrieval.top_k);
    if limit == 0 {
        anyhow::bail!("limit must be at least 1");
    }

    if verbose {
        eprintln!("Query: \"{query}\"");
        eprintln!("  Limit: {limit}");
        if let Some(subject) = args.subject {
            eprintln!("  Subject: {}", subject.display_name());
        }
    }

    let retriever = Retriever::new(build_embedder(&config)?, connect_index(&config)?);
    let filter = args.subject.map(MetadataFilter::subject);
    let results = retriever
        .retrieve(query, filter.as_ref(), limit, false)
        .await
        .context("search failed")?;

    print!("{}", formatter.format_search_results(query, &results));
    Ok(())
}
