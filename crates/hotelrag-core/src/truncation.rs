//! Input truncation ladder for length-limited model calls

use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::warn;

use crate::{Error, Result};

/// Progressively shorter character lengths to retry an oversized input with.
///
/// The full input is always attempted first. A shorter attempt is made only
/// when the previous one failed with `Error::ContextLengthExceeded`, and only
/// with lengths strictly shorter than the text being sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruncationLadder {
    lengths: Vec<usize>,
}

impl Default for TruncationLadder {
    fn default() -> Self {
        Self::new(vec![8000, 4000, 1000, 500])
    }
}

impl TruncationLadder {
    pub fn new(mut lengths: Vec<usize>) -> Self {
        lengths.retain(|len| *len > 0);
        lengths.sort_unstable_by(|a, b| b.cmp(a));
        lengths.dedup();
        Self { lengths }
    }

    /// No truncation at all: only the full input is attempted.
    pub fn disabled() -> Self {
        Self { lengths: Vec::new() }
    }

    /// Character lengths that will be attempted for `text`, full length first.
    pub fn steps(&self, text: &str) -> Vec<usize> {
        let full = text.chars().count();
        let mut steps = vec![full];
        steps.extend(self.lengths.iter().copied().filter(|len| *len < full));
        steps
    }

    /// Run `call` on the input, walking down the ladder on context-length
    /// failures. Any other error stops immediately.
    pub async fn run<T, F, Fut>(&self, text: &str, mut call: F) -> Result<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for length in self.steps(text) {
            let input = truncate_chars(text, length);
            match call(input).await {
                Ok(value) => return Ok(value),
                Err(Error::ContextLengthExceeded(message)) => {
                    warn!(length, "Input too long for model, retrying with truncation");
                    last_error = Some(message);
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::EmbeddingFailed(format!(
            "input still too long after truncation: {}",
            last_error.unwrap_or_default()
        )))
    }
}

/// Prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
