mod ask;
mod config;
mod ingest;
mod search;
mod status;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::models::Config;
use crate::services::{Embedder, HttpEmbeddingProvider, QdrantIndex};

pub use ask::AskArgs;
pub use config::ConfigCommand;
pub use ingest::IngestArgs;
pub use search::SearchArgs;

pub use ask::handle_ask;
pub use config::handle_config;
pub use ingest::handle_ingest;
pub use search::handle_search;
pub use status::handle_status;

fn build_embedder(config: &Config) -> Result<Arc<Embedder>> {
    let provider = HttpEmbeddingProvider::new(&config.embedding)
        .context("failed to create embedding client")?;
    Ok(Arc::new(Embedder::from_config(
        Arc::new(provider),
        &config.embedding,
    )))
}

fn connect_index(config: &Config) -> Result<Arc<QdrantIndex>> {
    let index = QdrantIndex::new(&config.index, u64::from(config.embedding.dimension))
        .context("failed to create Qdrant client")?;
    Ok(Arc::new(index))
}
