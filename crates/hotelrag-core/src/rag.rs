//! Request and response types of a retrieval-augmented answer

use serde::{Deserialize, Serialize};
use std::fmt;

/// Speaker of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One turn of the caller-held conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Query for a single orchestration call.
///
/// `history` is ordered oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub history: Vec<ChatMessage>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }
}

/// Pipeline stage announced by a status chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Embedding,
    Searching,
    Generating,
}

impl Stage {
    pub fn message(&self) -> &'static str {
        match self {
            Stage::Embedding => "Embedding your query...\n\n",
            Stage::Searching => "Searching for relevant hotels...\n\n",
            Stage::Generating => "Found matches! Asking the AI...\n\n",
        }
    }
}

/// A unit of the streamed answer.
///
/// Concatenating the `Text` chunks gives the generated answer; the other
/// variants carry progress and terminal outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponseChunk {
    Status(Stage),
    Text(String),
    /// Normal terminal outcome that is not an error (e.g. no matches).
    Notice(String),
    /// Terminal failure, appended after whatever already streamed.
    Error(String),
}

impl ResponseChunk {
    pub fn text(&self) -> &str {
        match self {
            ResponseChunk::Status(stage) => stage.message(),
            ResponseChunk::Text(text) | ResponseChunk::Notice(text) | ResponseChunk::Error(text) => {
                text
            }
        }
    }

    pub fn is_status(&self) -> bool {
        matches!(self, ResponseChunk::Status(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ResponseChunk::Error(_))
    }
}

impl fmt::Display for ResponseChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_text() {
        assert_eq!(
            ResponseChunk::Status(Stage::Searching).text(),
            "Searching for relevant hotels...\n\n"
        );
        assert_eq!(ResponseChunk::Text("Hotel A".into()).to_string(), "Hotel A");
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }
}
