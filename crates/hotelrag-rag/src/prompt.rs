//! Prompt assembly for grounded generation

use hotelrag_core::{ChatMessage, Match};

/// Everything the generator sees for one answer.
///
/// Only the trailing `history_turns` messages of the history are included,
/// and matches are serialized in the order the store returned them.
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    instructions: &'a str,
    history: &'a [ChatMessage],
    matches: &'a [Match],
    query: &'a str,
}

impl<'a> PromptContext<'a> {
    pub fn new(instructions: &'a str, query: &'a str) -> Self {
        Self {
            instructions,
            history: &[],
            matches: &[],
            query,
        }
    }

    /// Keep the last `turns` messages of `history`.
    pub fn with_history(mut self, history: &'a [ChatMessage], turns: usize) -> Self {
        let start = history.len().saturating_sub(turns);
        self.history = &history[start..];
        self
    }

    pub fn with_matches(mut self, matches: &'a [Match]) -> Self {
        self.matches = matches;
        self
    }

    pub fn render(&self) -> String {
        let mut prompt = String::from(self.instructions);
        if !prompt.is_empty() && !prompt.ends_with("\n\n") {
            prompt.push_str(if prompt.ends_with('\n') { "\n" } else { "\n\n" });
        }

        if !self.history.is_empty() {
            prompt.push_str("--- CHAT HISTORY ---\n");
            for message in self.history {
                prompt.push_str(&format!("{}: {}\n", message.role, message.content));
            }
            prompt.push_str("--- END CHAT HISTORY ---\n\n");
        }

        prompt.push_str("--- CONTEXT ---\n");
        for (i, listing) in self.matches.iter().enumerate() {
            prompt.push_str(&format!("Result {}:\n{}\n\n", i + 1, listing.document));
        }
        prompt.push_str("--- END CONTEXT ---\n\n");

        prompt.push_str("User Question: ");
        prompt.push_str(self.query);
        prompt
    }
}
