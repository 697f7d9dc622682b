//! Token count estimation.

/// Estimates how many model tokens a piece of text costs.
///
/// Budgeting code only ever talks to this trait, so a real tokenizer can
/// replace the character heuristic without touching chunking or context
/// assembly.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;
}

/// Heuristic estimator: one token per `chars_per_token` bytes, rounded up.
#[derive(Debug, Clone, Copy)]
pub struct CharRatioEstimator {
    chars_per_token: usize,
}

impl CharRatioEstimator {
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self::new(4)
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.len().div_ceil(self.chars_per_token)
    }
}

/// Estimate tokens with the default heuristic (~4 characters per token).
pub fn estimate_tokens(text: &str) -> usize {
    CharRatioEstimator::default().estimate(text)
}
