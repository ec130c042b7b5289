//! RAG pipeline: embed, search, augment, generate

use async_stream::stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use hotelrag_core::{
    EmbeddingProvider, Error, Filter, GenerativeBackend, Query, ResponseChunk, Result,
    SearchRequest, SimilarityStore, Stage,
};

use crate::filters::FilterExtractor;
use crate::prompt::PromptContext;
use crate::response::ResponseStream;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful Tokyo hotel assistant.\n\
1. Answer the user's question based *only* on the provided context.\n\
2. If the user asks a follow-up question, you can use the chat history to understand it.\n\
3. Do not make up information. Be concise and friendly.\n\
4. After providing the summary/answer, create a new section titled 'Hotels Found:'.\n\
5. In this new section, list the **names** of all hotels you used to answer the question with bullet points.\n\n";

const DEFAULT_NO_MATCHES_MESSAGE: &str =
    "I couldn't find any hotels that match your request. Try rephrasing your search.";

/// Configuration for the RAG pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Number of trailing conversation messages included in the prompt.
    pub history_turns: usize,
    pub system_prompt: String,
    pub no_matches_message: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            history_turns: 2,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            no_matches_message: DEFAULT_NO_MATCHES_MESSAGE.to_string(),
        }
    }
}

/// Retrieval-augmented answer pipeline.
///
/// Holds no per-call state, so one pipeline serves concurrent calls. The
/// adapters are shared handles constructed once by the caller.
pub struct RagPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn SimilarityStore>,
    generator: Arc<dyn GenerativeBackend>,
    filter_extractor: Option<Arc<FilterExtractor>>,
    config: Arc<RagConfig>,
}

impl RagPipeline {
    /// Create a pipeline over connected adapters.
    ///
    /// Fails if the store is not connected or its index dimension differs
    /// from the embedding dimension.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn SimilarityStore>,
        generator: Arc<dyn GenerativeBackend>,
        config: RagConfig,
    ) -> Result<Self> {
        if !store.is_connected() {
            return Err(Error::Configuration("Similarity store not connected".to_string()));
        }

        if embedder.dimension() != store.dimension() {
            return Err(Error::Configuration(format!(
                "embedding model {} produces {} dimensions but the store index has {}",
                embedder.model_id(),
                embedder.dimension(),
                store.dimension()
            )));
        }

        Ok(Self {
            embedder,
            store,
            generator,
            filter_extractor: None,
            config: Arc::new(config),
        })
    }

    /// Extract filters from the query text whenever the caller passes none.
    pub fn with_filter_extractor(mut self, extractor: FilterExtractor) -> Self {
        self.filter_extractor = Some(Arc::new(extractor));
        self
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Answer `query` from the store's records as a stream of chunks.
    ///
    /// Invalid arguments are rejected up front. Once streaming starts, every
    /// failure is delivered as a single `ResponseChunk::Error` after whatever
    /// was already produced.
    pub fn respond(
        &self,
        query: Query,
        threshold: f32,
        count: usize,
        filters: Option<Filter>,
    ) -> Result<ResponseStream> {
        if query.text.trim().is_empty() {
            return Err(Error::InvalidInput("query text is empty".to_string()));
        }
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::InvalidInput(format!(
                "match threshold must be within [0, 1], got {threshold}"
            )));
        }
        if count == 0 {
            return Err(Error::InvalidInput("match count must be positive".to_string()));
        }

        let embedder = self.embedder.clone();
        let store = self.store.clone();
        let generator = self.generator.clone();
        let extractor = self.filter_extractor.clone();
        let config = self.config.clone();

        let references = Arc::new(OnceLock::new());
        let published = references.clone();
        let request_id = Uuid::new_v4();
        let span = info_span!("rag_response", %request_id);

        let chunks = stream! {
            info!(query = %query.text, threshold, count, "Starting RAG response");

            yield ResponseChunk::Status(Stage::Embedding);
            let embedding = match embedder.embed(&query.text).await {
                Ok(embedding) => embedding,
                Err(e) => {
                    warn!(error = %e, "Embedding failed");
                    yield ResponseChunk::Error(e.to_string());
                    return;
                }
            };

            let filter = match (filters, &extractor) {
                (Some(filter), _) => Some(filter),
                (None, Some(extractor)) if store.supports_filters() => {
                    let filter = extractor.extract(&query.text).await;
                    debug!(?filter, "Extracted filter");
                    Some(filter)
                }
                _ => None,
            };

            yield ResponseChunk::Status(Stage::Searching);
            let request = SearchRequest::new(embedding, threshold, count).with_filter(filter);
            let mut matches = match store.search(&request).await {
                Ok(matches) => matches,
                Err(e) => {
                    warn!(error = %e, "Search failed");
                    yield ResponseChunk::Error(e.to_string());
                    return;
                }
            };

            if matches.len() > count {
                warn!(returned = matches.len(), count, "Store returned more matches than requested");
                matches.truncate(count);
            }

            if matches.is_empty() {
                info!("No matches");
                yield ResponseChunk::Notice(config.no_matches_message.clone());
                return;
            }

            info!(matches = matches.len(), "Found matches");
            let _ = published.set(matches.iter().map(|m| m.reference.clone()).collect());

            let prompt = PromptContext::new(&config.system_prompt, &query.text)
                .with_history(&query.history, config.history_turns)
                .with_matches(&matches)
                .render();

            yield ResponseChunk::Status(Stage::Generating);
            let mut tokens = match generator.generate_stream(&prompt).await {
                Ok(tokens) => tokens,
                Err(e) => {
                    warn!(error = %e, "Generation failed to start");
                    yield ResponseChunk::Error(e.to_string());
                    return;
                }
            };

            while let Some(token) = tokens.next().await {
                match token {
                    Ok(text) => {
                        yield ResponseChunk::Text(text);
                    }
                    Err(e) => {
                        warn!(error = %e, "Generation failed mid-stream");
                        yield ResponseChunk::Error(e.to_string());
                        return;
                    }
                }
            }

            info!("RAG response complete");
        };

        Ok(ResponseStream::new(chunks.boxed(), references, span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeEmbedder, FakeGenerator, FakeStore, listing};
    use hotelrag_core::{ChatMessage, Match};
    use std::sync::Mutex;
    use std::sync::atomic::Ordering;
    use tracing::{Event, Subscriber};
    use tracing_subscriber::Layer;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::registry::LookupSpan;

    /// Records, for every event, its target and the span it was emitted in.
    #[derive(Clone, Default)]
    struct EventSpans(Arc<Mutex<Vec<(String, Option<String>, bool)>>>);

    impl<S> Layer<S> for EventSpans
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
            let span = ctx.event_span(event);
            let name = span.as_ref().map(|s| s.name().to_string());
            let has_request_id = span
                .as_ref()
                .is_some_and(|s| s.metadata().fields().field("request_id").is_some());
            self.0
                .lock()
                .unwrap()
                .push((event.metadata().target().to_string(), name, has_request_id));
        }
    }

    fn pipeline(
        embedder: FakeEmbedder,
        store: FakeStore,
        generator: FakeGenerator,
    ) -> (RagPipeline, Arc<FakeEmbedder>, Arc<FakeStore>, Arc<FakeGenerator>) {
        let embedder = Arc::new(embedder);
        let store = Arc::new(store);
        let generator = Arc::new(generator);
        let pipeline = RagPipeline::new(
            embedder.clone(),
            store.clone(),
            generator.clone(),
            RagConfig::default(),
        )
        .unwrap();
        (pipeline, embedder, store, generator)
    }

    fn three_matches() -> Vec<Match> {
        vec![
            listing("1", "Hotel Gracery Shinjuku. Washer, dryer.", "https://airbnb.com/rooms/1"),
            listing("2", "Shinjuku loft with washer and dryer.", "https://airbnb.com/rooms/2"),
            listing("3", "Kabukicho studio, coin laundry nearby.", "https://airbnb.com/rooms/3"),
        ]
    }

    #[tokio::test]
    async fn test_scenario_three_matches() {
        let (pipeline, _, store, generator) = pipeline(
            FakeEmbedder::new(4),
            FakeStore::with_matches(three_matches()),
            FakeGenerator::with_tokens(&["Here are ", "three hotels."]),
        );

        let response = pipeline
            .respond(Query::new("hotel in shinjuku with dryer and washer"), 0.5, 5, None)
            .unwrap()
            .collect_all()
            .await;

        assert_eq!(
            response.chunks,
            vec![
                ResponseChunk::Status(Stage::Embedding),
                ResponseChunk::Status(Stage::Searching),
                ResponseChunk::Status(Stage::Generating),
                ResponseChunk::Text("Here are ".into()),
                ResponseChunk::Text("three hotels.".into()),
            ]
        );
        assert_eq!(response.references.len(), 3);
        assert_eq!(response.answer(), "Here are three hotels.");

        let request = store.last_request().unwrap();
        assert_eq!(request.threshold, 0.5);
        assert_eq!(request.count, 5);
        assert_eq!(generator.stream_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_prompt_contains_exactly_the_matches_in_order() {
        let matches = three_matches();
        let (pipeline, _, _, generator) = pipeline(
            FakeEmbedder::new(4),
            FakeStore::with_matches(matches.clone()),
            FakeGenerator::with_tokens(&["ok"]),
        );

        pipeline
            .respond(Query::new("washer"), 0.5, 5, None)
            .unwrap()
            .collect_all()
            .await;

        let prompt = generator.last_prompt().unwrap();
        let positions: Vec<usize> = matches
            .iter()
            .map(|m| prompt.find(&m.document).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(prompt.matches("Result ").count(), matches.len());
        assert!(!prompt.contains("Result 4:"));
    }

    #[tokio::test]
    async fn test_only_last_two_history_messages_reach_prompt() {
        let (pipeline, _, _, generator) = pipeline(
            FakeEmbedder::new(4),
            FakeStore::with_matches(three_matches()),
            FakeGenerator::with_tokens(&["ok"]),
        );

        let history = vec![
            ChatMessage::user("first question"),
            ChatMessage::assistant("first answer"),
            ChatMessage::user("second question"),
            ChatMessage::assistant("second answer"),
        ];
        pipeline
            .respond(Query::new("and cheaper?").with_history(history), 0.5, 5, None)
            .unwrap()
            .collect_all()
            .await;

        let prompt = generator.last_prompt().unwrap();
        assert!(!prompt.contains("first question"));
        assert!(!prompt.contains("first answer"));
        assert!(prompt.contains("user: second question\n"));
        assert!(prompt.contains("assistant: second answer\n"));
    }

    #[tokio::test]
    async fn test_scenario_no_matches() {
        let (pipeline, _, _, generator) = pipeline(
            FakeEmbedder::new(4),
            FakeStore::with_matches(Vec::new()),
            FakeGenerator::with_tokens(&["never"]),
        );

        let response = pipeline
            .respond(Query::new("castle with moat"), 0.5, 5, None)
            .unwrap()
            .collect_all()
            .await;

        assert_eq!(
            response.chunks,
            vec![
                ResponseChunk::Status(Stage::Embedding),
                ResponseChunk::Status(Stage::Searching),
                ResponseChunk::Notice(
                    "I couldn't find any hotels that match your request. Try rephrasing your search."
                        .into()
                ),
            ]
        );
        assert!(response.references.is_empty());
        assert_eq!(generator.stream_calls.load(Ordering::SeqCst), 0);
        assert_eq!(generator.completion_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_scenario_embedding_failure() {
        let (pipeline, _, store, generator) = pipeline(
            FakeEmbedder::failing(4),
            FakeStore::with_matches(three_matches()),
            FakeGenerator::with_tokens(&["never"]),
        );

        let response = pipeline
            .respond(Query::new("hotel"), 0.5, 5, None)
            .unwrap()
            .collect_all()
            .await;

        assert_eq!(
            response.chunks,
            vec![
                ResponseChunk::Status(Stage::Embedding),
                ResponseChunk::Error("Embedding failed: model not loaded".into()),
            ]
        );
        assert_eq!(store.search_calls.load(Ordering::SeqCst), 0);
        assert_eq!(generator.stream_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_single_error_chunk() {
        let (pipeline, _, _, generator) = pipeline(
            FakeEmbedder::new(4),
            FakeStore::unavailable(),
            FakeGenerator::with_tokens(&["never"]),
        );

        let response = pipeline
            .respond(Query::new("hotel"), 0.5, 5, None)
            .unwrap()
            .collect_all()
            .await;

        let errors = response.chunks.iter().filter(|c| c.is_error()).count();
        assert_eq!(errors, 1);
        assert!(response.chunks.last().unwrap().is_error());
        assert_eq!(generator.stream_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generation_failure_keeps_partial_output() {
        let tokens = vec![
            Ok("Hotel Gracery ".to_string()),
            Err(Error::GenerationFailed("connection reset".into())),
            Ok("never delivered".to_string()),
        ];
        let (pipeline, _, _, generator) = pipeline(
            FakeEmbedder::new(4),
            FakeStore::with_matches(three_matches()),
            FakeGenerator::with_results(tokens),
        );

        let response = pipeline
            .respond(Query::new("hotel"), 0.5, 5, None)
            .unwrap()
            .collect_all()
            .await;

        assert_eq!(response.chunks.len(), 5);
        assert_eq!(response.chunks[3], ResponseChunk::Text("Hotel Gracery ".into()));
        assert!(response.chunks[4].is_error());
        assert_eq!(generator.stream_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_filter_extraction_failure_searches_unconstrained() {
        let extractor_backend = Arc::new(FakeGenerator::failing_completion());
        let (pipeline, _, store, _) = pipeline(
            FakeEmbedder::new(4),
            FakeStore::with_matches(three_matches()),
            FakeGenerator::with_tokens(&["ok"]),
        );
        let pipeline = pipeline.with_filter_extractor(FilterExtractor::new(extractor_backend));

        let response = pipeline
            .respond(Query::new("hotel under 9000 yen"), 0.5, 5, None)
            .unwrap()
            .collect_all()
            .await;

        assert!(!response.chunks.iter().any(|c| c.is_error()));
        assert_eq!(store.last_request().unwrap().filter, None);
    }

    #[tokio::test]
    async fn test_call_events_carry_request_span() {
        let events = EventSpans::default();
        let _guard =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(events.clone()));

        let extractor_backend = Arc::new(FakeGenerator::failing_completion());
        let (pipeline, _, _, _) = pipeline(
            FakeEmbedder::new(4),
            FakeStore::with_matches(three_matches()),
            FakeGenerator::with_tokens(&["ok"]),
        );
        let pipeline = pipeline.with_filter_extractor(FilterExtractor::new(extractor_backend));

        pipeline
            .respond(Query::new("hotel under 9000 yen"), 0.5, 5, None)
            .unwrap()
            .collect_all()
            .await;

        let events = events.0.lock().unwrap().clone();
        assert!(events.iter().any(|(target, _, _)| target == "hotelrag_rag::filters"));
        assert!(events.iter().any(|(target, _, _)| target == "hotelrag_rag::engine"));
        let ours = events.iter().filter(|(target, _, _)| target.starts_with("hotelrag"));
        for (target, span, has_request_id) in ours {
            assert_eq!(span.as_deref(), Some("rag_response"), "{target}");
            assert!(*has_request_id, "{target}");
        }
    }

    #[tokio::test]
    async fn test_extracted_filter_reaches_store() {
        let extractor_backend = Arc::new(FakeGenerator::with_completion(
            r#"{"min_price": null, "max_price": 9000}"#,
        ));
        let (pipeline, _, store, _) = pipeline(
            FakeEmbedder::new(4),
            FakeStore::with_matches(three_matches()),
            FakeGenerator::with_tokens(&["ok"]),
        );
        let pipeline = pipeline.with_filter_extractor(FilterExtractor::new(extractor_backend));

        pipeline
            .respond(Query::new("hotel under 9000 yen"), 0.5, 5, None)
            .unwrap()
            .collect_all()
            .await;

        assert_eq!(
            store.last_request().unwrap().filter,
            Some(Filter::new(None, Some(9000.0)))
        );
    }

    #[tokio::test]
    async fn test_caller_filter_skips_extraction() {
        let extractor_backend = Arc::new(FakeGenerator::with_completion(r#"{"max_price": 1}"#));
        let (pipeline, _, store, _) = pipeline(
            FakeEmbedder::new(4),
            FakeStore::with_matches(three_matches()),
            FakeGenerator::with_tokens(&["ok"]),
        );
        let pipeline =
            pipeline.with_filter_extractor(FilterExtractor::new(extractor_backend.clone()));

        let filter = Filter::new(Some(5000.0), None);
        pipeline
            .respond(Query::new("hotel"), 0.5, 5, Some(filter))
            .unwrap()
            .collect_all()
            .await;

        assert_eq!(store.last_request().unwrap().filter, Some(filter));
        assert_eq!(extractor_backend.completion_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dropping_stream_releases_generation() {
        let (pipeline, _, _, generator) = pipeline(
            FakeEmbedder::new(4),
            FakeStore::with_matches(three_matches()),
            FakeGenerator::endless(),
        );

        let mut response = pipeline.respond(Query::new("hotel"), 0.5, 5, None).unwrap();
        let mut seen = Vec::new();
        while let Some(chunk) = response.next().await {
            let is_text = matches!(chunk, ResponseChunk::Text(_));
            seen.push(chunk);
            if is_text {
                break;
            }
        }
        assert!(!generator.stream_dropped.load(Ordering::SeqCst));

        drop(response);
        assert!(generator.stream_dropped.load(Ordering::SeqCst));
        assert!(!seen.iter().any(|c| c.is_error()));
    }

    #[tokio::test]
    async fn test_nothing_runs_before_first_poll() {
        let (pipeline, embedder, _, _) = pipeline(
            FakeEmbedder::new(4),
            FakeStore::with_matches(three_matches()),
            FakeGenerator::with_tokens(&["ok"]),
        );

        let response = pipeline.respond(Query::new("hotel"), 0.5, 5, None).unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert!(response.references().is_empty());
        drop(response);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_arguments_rejected() {
        let (pipeline, _, _, _) = pipeline(
            FakeEmbedder::new(4),
            FakeStore::with_matches(three_matches()),
            FakeGenerator::with_tokens(&["ok"]),
        );

        assert!(pipeline.respond(Query::new("  "), 0.5, 5, None).is_err());
        assert!(pipeline.respond(Query::new("hotel"), 1.5, 5, None).is_err());
        assert!(pipeline.respond(Query::new("hotel"), f32::NAN, 5, None).is_err());
        assert!(pipeline.respond(Query::new("hotel"), 0.5, 0, None).is_err());
    }

    #[tokio::test]
    async fn test_oversized_match_set_is_capped() {
        let many: Vec<Match> = (0..8)
            .map(|i| listing(&i.to_string(), &format!("listing {i}"), &format!("https://x/{i}")))
            .collect();
        let (pipeline, _, _, _) = pipeline(
            FakeEmbedder::new(4),
            FakeStore::with_matches(many),
            FakeGenerator::with_tokens(&["ok"]),
        );

        let response = pipeline
            .respond(Query::new("hotel"), 0.5, 3, None)
            .unwrap()
            .collect_all()
            .await;
        assert_eq!(response.references.len(), 3);
    }

    #[test]
    fn test_dimension_mismatch_rejected_at_construction() {
        let result = RagPipeline::new(
            Arc::new(FakeEmbedder::new(768)),
            Arc::new(FakeStore::with_matches(Vec::new())),
            Arc::new(FakeGenerator::with_tokens(&[])),
            RagConfig::default(),
        );
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_disconnected_store_rejected() {
        let result = RagPipeline::new(
            Arc::new(FakeEmbedder::new(4)),
            Arc::new(FakeStore::disconnected()),
            Arc::new(FakeGenerator::with_tokens(&[])),
            RagConfig::default(),
        );
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_independent() {
        let (pipeline, _, _, _) = pipeline(
            FakeEmbedder::new(4),
            FakeStore::with_matches(three_matches()),
            FakeGenerator::with_tokens(&["a", "b"]),
        );

        let first = pipeline.respond(Query::new("one"), 0.5, 5, None).unwrap();
        let second = pipeline.respond(Query::new("two"), 0.5, 2, None).unwrap();
        let (first, second) = futures::join!(first.collect_all(), second.collect_all());

        assert_eq!(first.answer(), "ab");
        assert_eq!(second.answer(), "ab");
        assert_eq!(first.references.len(), 3);
        assert_eq!(second.references.len(), 2);
    }
}
