//! Second-pass relevance scoring with a fast generative model.

use std::sync::{Arc, LazyLock};

use futures::future::join_all;
use regex::Regex;

use crate::models::SearchResult;
use crate::services::generation::{GenerationParams, TextGenerator};

pub const MIN_SCORE: f32 = 0.0;
pub const MAX_SCORE: f32 = 10.0;

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-+]?\d+(?:\.\d+)?").expect("valid number regex"));

/// Turns free-form model output into a relevance score.
pub trait ScoreParser: Send + Sync {
    /// `None` when no score can be read from `response`.
    fn parse(&self, response: &str) -> Option<f32>;
}

/// Takes the first number in the response and clamps it to `[0, 10]`.
/// "7 out of 10" reads as 7; "Score: 8.5/10" as 8.5.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstNumberScoreParser;

impl ScoreParser for FirstNumberScoreParser {
    fn parse(&self, response: &str) -> Option<f32> {
        NUMBER
            .find_iter(response)
            .find_map(|m| m.as_str().parse::<f32>().ok())
            .filter(|score| score.is_finite())
            .map(|score| score.clamp(MIN_SCORE, MAX_SCORE))
    }
}

pub struct Reranker {
    model: Arc<dyn TextGenerator>,
    parser: Arc<dyn ScoreParser>,
    params: GenerationParams,
}

impl Reranker {
    pub fn new(model: Arc<dyn TextGenerator>) -> Self {
        Self {
            model,
            parser: Arc::new(FirstNumberScoreParser),
            params: GenerationParams::new(8, 0.0),
        }
    }

    #[must_use]
    pub fn with_parser(mut self, parser: Arc<dyn ScoreParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Score every candidate concurrently and sort by the new score,
    /// highest first. Ties keep their retrieval order. A candidate whose
    /// score cannot be obtained scores 0; nothing here fails the query.
    pub async fn rerank(&self, query: &str, candidates: Vec<SearchResult>) -> Vec<SearchResult> {
        let scores = join_all(
            candidates
                .iter()
                .map(|candidate| self.score(query, candidate)),
        )
        .await;

        let mut reranked: Vec<SearchResult> = candidates
            .into_iter()
            .zip(scores)
            .map(|(mut candidate, score)| {
                candidate.score = score;
                candidate
            })
            .collect();

        reranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        reranked
    }

    async fn score(&self, query: &str, candidate: &SearchResult) -> f32 {
        let prompt = build_prompt(query, &candidate.document.content);

        let response = match self.model.generate(&prompt, self.params).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(candidate = %candidate.document.id, error = %e, "rerank call failed, scoring 0");
                return MIN_SCORE;
            }
        };

        self.parser.parse(&response).unwrap_or_else(|| {
            tracing::warn!(candidate = %candidate.document.id, response = %response.trim(), "unparsable rerank score, scoring 0");
            MIN_SCORE
        })
    }
}

fn build_prompt(query: &str, content: &str) -> String {
    format!(
        "Rate how relevant the passage is to the question on a scale from 0 to 10, \
         where 0 is unrelated and 10 answers it directly. \
         Reply with a single number only.\n\n\
         Question: {query}\n\nPassage: {content}\n\nScore:"
    )
}
