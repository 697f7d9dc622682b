//! Query pipeline: retrieve, rerank, assemble context, generate.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::error::{GenerationError, QueryError};
use crate::models::{Config, MetadataFilter, RetrievalConfig, SearchResult, Subject};
use crate::services::context::ContextBuilder;
use crate::services::embedding::Embedder;
use crate::services::generation::{GenerationParams, ModelTiers, TextGenerator};
use crate::services::index::VectorIndex;
use crate::services::rerank::Reranker;
use crate::services::retriever::Retriever;

/// An answer together with the results that were placed in its context.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SearchResult>,
}

pub struct Orchestrator {
    retriever: Retriever,
    reranker: Reranker,
    context: ContextBuilder,
    answer_model: Arc<dyn TextGenerator>,
    top_k: usize,
    max_context_tokens: usize,
    answer_params: GenerationParams,
    timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        retriever: Retriever,
        reranker: Reranker,
        answer_model: Arc<dyn TextGenerator>,
        settings: &RetrievalConfig,
    ) -> Self {
        Self {
            retriever,
            reranker,
            context: ContextBuilder::default(),
            answer_model,
            top_k: settings.top_k,
            max_context_tokens: settings.max_context_tokens,
            answer_params: GenerationParams::new(settings.answer_max_tokens, settings.temperature),
            timeout: Duration::from_secs(settings.query_timeout_secs),
        }
    }

    /// Wire the pipeline from configuration, picking the rerank and answer
    /// models out of `tiers` by the configured tier names.
    pub fn from_config(
        config: &Config,
        tiers: &ModelTiers,
        embedder: Arc<Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self, GenerationError> {
        let reranker = Reranker::new(tiers.get(&config.generation.rerank_tier)?);
        let answer_model = tiers.get(&config.generation.answer_tier)?;
        Ok(Self::new(
            Retriever::new(embedder, index),
            reranker,
            answer_model,
            &config.retrieval,
        ))
    }

    #[must_use]
    pub fn with_context_builder(mut self, context: ContextBuilder) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Answer `text`, grounded in the indexed corpus.
    pub async fn query(
        &self,
        text: &str,
        subject: Option<Subject>,
        use_reranking: bool,
    ) -> Result<String, QueryError> {
        Ok(self.query_with_sources(text, subject, use_reranking).await?.text)
    }

    /// Like [`query`](Self::query), also returning the results that made it
    /// into the prompt context, in context order.
    ///
    /// The whole pipeline runs under the configured query timeout; on expiry
    /// nothing partial is returned.
    pub async fn query_with_sources(
        &self,
        text: &str,
        subject: Option<Subject>,
        use_reranking: bool,
    ) -> Result<Answer, QueryError> {
        tokio::time::timeout(self.timeout, self.run(text, subject, use_reranking))
            .await
            .map_err(|_| QueryError::Timeout(self.timeout))?
    }

    async fn run(
        &self,
        text: &str,
        subject: Option<Subject>,
        use_reranking: bool,
    ) -> Result<Answer, QueryError> {
        let filter = subject.map(MetadataFilter::subject);
        let mut candidates = self
            .retriever
            .retrieve(text, filter.as_ref(), self.top_k, use_reranking)
            .await?;

        if use_reranking {
            candidates = self.reranker.rerank(text, candidates).await;
            candidates.truncate(self.top_k);
        }

        let (context, included) = self.context.select(&candidates, self.max_context_tokens);
        candidates.truncate(included);
        tracing::debug!(sources = included, reranked = use_reranking, "context assembled");

        let prompt = build_prompt(subject, &context, text);
        let answer = self.answer_model.generate(&prompt, self.answer_params).await?;

        Ok(Answer {
            text: answer,
            sources: candidates,
        })
    }
}

fn build_prompt(subject: Option<Subject>, context: &str, question: &str) -> String {
    let instruction = subject
        .map(|s| format!("{} ", s.instruction()))
        .unwrap_or_default();
    format!(
        "{instruction}Use the context below to answer. If unsure, say so.\n\n\
         Context:\n{context}\n\nQuestion: {question}\n\nAnswer:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::keys;
    use crate::services::chunker::TextChunker;
    use crate::services::ingest::Ingestor;
    use crate::testing::{FailingIndex, HashingEmbeddingProvider, MemoryIndex, ScriptedGenerator, doc};

    struct Pipeline {
        orchestrator: Orchestrator,
        rerank_model: Arc<ScriptedGenerator>,
        answer_model: Arc<ScriptedGenerator>,
    }

    async fn pipeline(
        rerank_model: ScriptedGenerator,
        answer_model: ScriptedGenerator,
    ) -> Pipeline {
        let embedder = Arc::new(Embedder::new(Arc::new(HashingEmbeddingProvider::new(64))));
        let index = Arc::new(MemoryIndex::new());
        let docs = vec![
            doc("cats", "Cats are mammals. Cats have fur.", Subject::Science),
            doc("photo", "Plants make food from sunlight.", Subject::Science),
            doc("frac", "Fractions divide a whole into equal parts.", Subject::Mathematics),
            doc("rome", "Rome was founded on seven hills.", Subject::History),
        ];
        Ingestor::new(TextChunker::with_params(64, 8), embedder.clone(), index.clone(), 4)
            .ingest(&docs)
            .await
            .unwrap();

        let rerank_model = Arc::new(rerank_model);
        let answer_model = Arc::new(answer_model);
        let tiers = ModelTiers::new()
            .with_tier("fast", rerank_model.clone())
            .with_tier("balanced", answer_model.clone());

        let orchestrator =
            Orchestrator::from_config(&Config::default(), &tiers, embedder, index).unwrap();
        Pipeline {
            orchestrator,
            rerank_model,
            answer_model,
        }
    }

    #[tokio::test]
    async fn test_query_returns_generated_text_verbatim() {
        let p = pipeline(
            ScriptedGenerator::constant("5"),
            ScriptedGenerator::constant("  Cats are furry mammals.\n"),
        )
        .await;

        let answer = p.orchestrator.query("What are cats?", None, true).await.unwrap();
        assert_eq!(answer, "  Cats are furry mammals.\n");

        let prompts = p.answer_model.prompts();
        assert_eq!(prompts.len(), 1);
        let (prompt, params) = &prompts[0];
        assert!(prompt.starts_with("Use the context below to answer. If unsure, say so.\n\nContext:\n[Source 1: "));
        assert!(prompt.ends_with("\n\nQuestion: What are cats?\n\nAnswer:"));
        assert!(prompt.contains("Cats are mammals. Cats have fur."));
        assert_eq!(*params, GenerationParams::new(512, 0.7));
    }

    #[tokio::test]
    async fn test_subject_filter_and_instruction() {
        let p = pipeline(ScriptedGenerator::constant("5"), ScriptedGenerator::constant("ok")).await;

        let answer = p
            .orchestrator
            .query_with_sources("divide into parts", Some(Subject::Mathematics), true)
            .await
            .unwrap();

        assert!(!answer.sources.is_empty());
        assert!(answer
            .sources
            .iter()
            .all(|s| s.document.metadata[keys::SUBJECT] == "MATHEMATICS"));
        let prompt = &p.answer_model.prompts()[0].0;
        assert!(prompt.starts_with(&format!(
            "{} Use the context below",
            Subject::Mathematics.instruction()
        )));
    }

    #[tokio::test]
    async fn test_rerank_order_drives_context() {
        // The rerank model favours the photosynthesis passage regardless of
        // vector similarity.
        let p = pipeline(
            ScriptedGenerator::from_fn(|prompt| {
                Ok(if prompt.contains("sunlight") { "10" } else { "1" }.to_string())
            }),
            ScriptedGenerator::constant("ok"),
        )
        .await;

        let answer = p
            .orchestrator
            .query_with_sources("What are cats?", None, true)
            .await
            .unwrap();

        assert_eq!(answer.sources[0].document.id, "photo_0");
        assert_eq!(answer.sources[0].score, 10.0);
        assert!(answer.sources.len() <= 5);
        assert_eq!(p.rerank_model.prompts().len(), 4);
    }

    #[tokio::test]
    async fn test_without_reranking_skips_rerank_model() {
        let p = pipeline(ScriptedGenerator::constant("5"), ScriptedGenerator::constant("ok")).await;

        let answer = p
            .orchestrator
            .query_with_sources("What are cats?", None, false)
            .await
            .unwrap();

        assert!(p.rerank_model.prompts().is_empty());
        assert_eq!(answer.sources[0].document.id, "cats_0");
        assert!(answer.sources.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_query_timeout_is_typed() {
        let p = pipeline(
            ScriptedGenerator::constant("5"),
            ScriptedGenerator::constant("late").with_delay(Duration::from_millis(500)),
        )
        .await;
        let orchestrator = p.orchestrator.with_timeout(Duration::from_millis(20));

        let result = orchestrator.query("What are cats?", None, false).await;
        assert!(matches!(result, Err(QueryError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_generation_timeout_surfaces() {
        let p = pipeline(
            ScriptedGenerator::constant("5"),
            ScriptedGenerator::from_fn(|_| Err(GenerationError::Timeout)),
        )
        .await;

        let result = p.orchestrator.query("What are cats?", None, true).await;
        assert!(matches!(result, Err(QueryError::GenerationTimeout)));
    }

    #[tokio::test]
    async fn test_index_down_surfaces_as_search_error() {
        let generator: Arc<dyn TextGenerator> = Arc::new(ScriptedGenerator::constant("ok"));
        let orchestrator = Orchestrator::new(
            Retriever::new(
                Arc::new(Embedder::new(Arc::new(HashingEmbeddingProvider::new(8)))),
                Arc::new(FailingIndex),
            ),
            Reranker::new(generator.clone()),
            generator,
            &RetrievalConfig::default(),
        );

        assert!(matches!(
            orchestrator.query("anything", None, true).await,
            Err(QueryError::Search(_))
        ));
    }

    #[test]
    fn test_unknown_tier_rejected() {
        let tiers = ModelTiers::new().with_tier("fast", Arc::new(ScriptedGenerator::constant("1")));
        let result = Orchestrator::from_config(
            &Config::default(),
            &tiers,
            Arc::new(Embedder::new(Arc::new(HashingEmbeddingProvider::new(8)))),
            Arc::new(MemoryIndex::new()),
        );
        assert!(matches!(result, Err(GenerationError::UnknownTier(t)) if t == "balanced"));
    }

    #[test]
    fn test_prompt_template() {
        assert_eq!(
            build_prompt(None, "[Source 1: T]\nbody\n", "Why?"),
            "Use the context below to answer. If unsure, say so.\n\nContext:\n[Source 1: T]\nbody\n\n\nQuestion: Why?\n\nAnswer:"
        );
    }
}
