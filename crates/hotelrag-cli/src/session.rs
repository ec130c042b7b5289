//! Conversation transcript held by the caller

use hotelrag_core::ChatMessage;

/// Full transcript of one chat session, oldest message first.
#[derive(Debug, Clone, Default)]
pub struct Session {
    transcript: Vec<ChatMessage>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last `n` messages, to be sent along with the next query.
    pub fn trailing(&self, n: usize) -> Vec<ChatMessage> {
        let start = self.transcript.len().saturating_sub(n);
        self.transcript[start..].to_vec()
    }

    /// Record a finished exchange. An empty answer (nothing streamed before
    /// a failure or cancellation) records the query alone.
    pub fn record(&mut self, query: &str, answer: &str) {
        self.transcript.push(ChatMessage::user(query));
        if !answer.trim().is_empty() {
            self.transcript.push(ChatMessage::assistant(answer));
        }
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn len(&self) -> usize {
        self.transcript.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty()
    }

    pub fn clear(&mut self) {
        self.transcript.clear();
    }
}
