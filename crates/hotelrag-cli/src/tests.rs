//! Snapshot tests for the chat terminal

#[cfg(test)]
mod snapshot_tests {
    use crate::ui::banner_lines;
    use crate::{Session, chunk_line};
    use hotelrag_core::{ResponseChunk, Stage};
    use insta::assert_snapshot;

    #[test]
    fn test_banner_snapshot() {
        let banner = banner_lines(120, "mxbai-embed-large", "gemini-2.5-flash-lite", "supabase").join("\n");

        assert_snapshot!(banner, @r###"
        ┌─────────────────────────────────────────────────────────────────┐
        │                                                                 │
        │  HotelRAG - Tokyo Hotel & Airbnb Chatbot                        │
        │                                                                 │
        │  Embeddings: mxbai-embed-large                                  │
        │  Answers:    gemini-2.5-flash-lite                              │
        │  Listings:   supabase                                           │
        │                                                                 │
        │  Type 'exit' to quit, 'clear' to forget the conversation        │
        │                                                                 │
        └─────────────────────────────────────────────────────────────────┘
        "###);
    }

    #[test]
    fn test_rendered_exchange_snapshot() {
        colored::control::set_override(false);

        let chunks = [
            ResponseChunk::Status(Stage::Embedding),
            ResponseChunk::Status(Stage::Searching),
            ResponseChunk::Notice(
                "I couldn't find any hotels that match your request. Try rephrasing your search.".into(),
            ),
        ];
        let rendered = chunks.iter().map(chunk_line).collect::<Vec<_>>().join("\n");

        assert_snapshot!(rendered, @r###"
        Embedding your query...
        Searching for relevant hotels...
        I couldn't find any hotels that match your request. Try rephrasing your search.
        "###);
    }

    #[test]
    fn test_session_feeds_trailing_history() {
        let mut session = Session::new();
        session.record("hotel in shinjuku", "Hotel Gracery Shinjuku is close to the station.");
        session.record("does it have a dryer?", "Yes.");

        let history = session
            .trailing(2)
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");

        assert_snapshot!(history, @r###"
        user: does it have a dryer?
        assistant: Yes.
        "###);
    }
}
