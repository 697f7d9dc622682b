use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;

use super::{build_embedder, connect_index};
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat, Subject};
use crate::services::{ModelTiers, Orchestrator};

#[derive(Debug, Args)]
pub struct AskArgs {
    #[arg(required = true, help = "Question to answer from the indexed corpus")]
    pub question: String,

    #[arg(long, short = 's', help = "Restrict context to one subject (e.g. math, science)")]
    pub subject: Option<Subject>,

    #[arg(long, help = "Skip the reranking pass")]
    pub no_rerank: bool,
}

pub async fn handle_ask(args: AskArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let question = args.question.trim();
    if question.is_empty() {
        anyhow::bail!("question cannot be empty");
    }

    let config = Config::load()?;
    let formatter = get_formatter(format);
    let start_time = Instant::now();

    let tiers =
        ModelTiers::from_config(&config.generation).context("failed to create model clients")?;
    let orchestrator = Orchestrator::from_config(
        &config,
        &tiers,
        build_embedder(&config)?,
        connect_index(&config)?,
    )?;

    let answer = orchestrator
        .query_with_sources(question, args.subject, !args.no_rerank)
        .await
        .context("query failed")?;

    if verbose {
        eprintln!(
            "Answered with {} sources in {}ms (answer tier: {})",
            answer.sources.len(),
            start_time.elapsed().as_millis(),
            config.generation.answer_tier
        );
    }

    print!("{}", formatter.format_answer(question, &answer));
    Ok(())
}
