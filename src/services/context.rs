//! Token-budgeted assembly of retrieved snippets into prompt context.

use std::sync::Arc;

use crate::models::SearchResult;
use crate::services::tokens::{CharRatioEstimator, TokenEstimator};

#[derive(Clone)]
pub struct ContextBuilder {
    estimator: Arc<dyn TokenEstimator>,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(Arc::new(CharRatioEstimator::default()))
    }
}

impl ContextBuilder {
    pub fn new(estimator: Arc<dyn TokenEstimator>) -> Self {
        Self { estimator }
    }

    /// Concatenate `[Source i: title]` snippets in the given order until the
    /// next one would exceed `max_tokens`. That snippet and everything after
    /// it are dropped whole.
    pub fn build(&self, results: &[SearchResult], max_tokens: usize) -> String {
        self.select(results, max_tokens).0
    }

    /// Like [`build`](Self::build), also returning how many results made it in.
    pub fn select(&self, results: &[SearchResult], max_tokens: usize) -> (String, usize) {
        let mut context = String::new();
        let mut used_tokens = 0;
        let mut included = 0;

        for (i, result) in results.iter().enumerate() {
            let snippet = format!(
                "[Source {}: {}]\n{}\n",
                i + 1,
                result.document.title(),
                result.document.content
            );
            let cost = self.estimator.estimate(&snippet);
            if used_tokens + cost > max_tokens {
                tracing::debug!(
                    included,
                    dropped = results.len() - included,
                    used_tokens,
                    max_tokens,
                    "context budget reached"
                );
                break;
            }
            context.push_str(&snippet);
            used_tokens += cost;
            included += 1;
        }

        (context, included)
    }
}
