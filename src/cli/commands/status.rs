use anyhow::Result;

use crate::cli::output::{StatusInfo, TierStatus, get_formatter};
use crate::models::{Config, OutputFormat};
use crate::services::{HttpEmbeddingProvider, QdrantIndex, VectorIndex};

pub async fn handle_status(format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let embedding_connected = match HttpEmbeddingProvider::new(&config.embedding) {
        Ok(provider) => provider.health_check().await.is_ok(),
        Err(_) => false,
    };

    let (index_connected, points) =
        match QdrantIndex::new(&config.index, u64::from(config.embedding.dimension)) {
            Ok(index) => {
                let connected = index.health_check().await.is_ok();
                let points = if connected {
                    index.points_count().await.ok().flatten()
                } else {
                    None
                };
                (connected, points)
            }
            Err(_) => (false, None),
        };

    let tiers = config
        .generation
        .tiers
        .iter()
        .map(|(name, tier)| TierStatus {
            name: name.clone(),
            model: tier.model.clone(),
            url: tier.url.clone(),
            rerank: *name == config.generation.rerank_tier,
            answer: *name == config.generation.answer_tier,
        })
        .collect();

    let status = StatusInfo {
        embedding_url: config.embedding.url.clone(),
        embedding_connected,
        index_url: config.index.url.clone(),
        index_connected,
        collection: config.index.collection.clone(),
        points,
        tiers,
    };

    print!("{}", formatter.format_status(&status));

    if !embedding_connected || !index_connected {
        eprintln!();
        if !embedding_connected {
            eprintln!("Warning: embedding server not reachable at {}", config.embedding.url);
        }
        if !index_connected {
            eprintln!("Warning: Qdrant not running. Start with: docker-compose up -d qdrant");
        }
    } else if verbose && points.is_none() {
        eprintln!("Collection '{}' not created yet. Run: studyrag ingest <file>", config.index.collection);
    }

    Ok(())
}
