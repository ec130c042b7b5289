//! In-memory fakes of the adapter traits

use async_trait::async_trait;
use futures::{StreamExt, stream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use hotelrag_core::{
    Embedding, EmbeddingProvider, Error, GenerativeBackend, Match, MatchSet, Result,
    SearchRequest, SimilarityStore, TextStream,
};

pub fn listing(id: &str, document: &str, reference: &str) -> Match {
    Match::new(id, document, reference).with_similarity(0.8)
}

pub struct FakeEmbedder {
    dimension: usize,
    fail: bool,
    pub calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(dimension: usize) -> Self {
        Self {
            fail: true,
            ..Self::new(dimension)
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::EmbeddingFailed("model not loaded".to_string()));
        }
        let seed = text.len() as f32;
        Ok((0..self.dimension).map(|i| seed + i as f32).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        "fake-embedder"
    }
}

pub struct FakeStore {
    matches: MatchSet,
    fail: bool,
    connected: bool,
    pub search_calls: AtomicUsize,
    requests: Mutex<Vec<SearchRequest>>,
}

impl FakeStore {
    pub fn with_matches(matches: MatchSet) -> Self {
        Self {
            matches,
            fail: false,
            connected: true,
            search_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            fail: true,
            ..Self::with_matches(Vec::new())
        }
    }

    pub fn disconnected() -> Self {
        Self {
            connected: false,
            ..Self::with_matches(Vec::new())
        }
    }

    pub fn last_request(&self) -> Option<SearchRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl SimilarityStore for FakeStore {
    async fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    async fn search(&self, request: &SearchRequest) -> Result<MatchSet> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(Error::StoreUnavailable("connection refused".to_string()));
        }
        Ok(self.matches.clone())
    }

    fn dimension(&self) -> usize {
        4
    }

    fn supports_filters(&self) -> bool {
        true
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

enum Script {
    Tokens(Vec<String>),
    Results(Mutex<Option<Vec<Result<String>>>>),
    Endless,
}

/// Sets its flag when the generation stream holding it is dropped.
struct DropFlag(Arc<AtomicBool>);

impl DropFlag {
    fn touch(&self) {}
}

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub struct FakeGenerator {
    script: Script,
    completion: Option<String>,
    pub stream_calls: AtomicUsize,
    pub completion_calls: AtomicUsize,
    pub stream_dropped: Arc<AtomicBool>,
    prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    fn scripted(script: Script, completion: Option<String>) -> Self {
        Self {
            script,
            completion,
            stream_calls: AtomicUsize::new(0),
            completion_calls: AtomicUsize::new(0),
            stream_dropped: Arc::new(AtomicBool::new(false)),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_tokens(tokens: &[&str]) -> Self {
        let tokens = tokens.iter().map(|t| t.to_string()).collect();
        Self::scripted(Script::Tokens(tokens), None)
    }

    /// Stream `results` once; later calls get an empty stream.
    pub fn with_results(results: Vec<Result<String>>) -> Self {
        Self::scripted(Script::Results(Mutex::new(Some(results))), None)
    }

    pub fn endless() -> Self {
        Self::scripted(Script::Endless, None)
    }

    pub fn with_completion(reply: &str) -> Self {
        Self::scripted(Script::Tokens(Vec::new()), Some(reply.to_string()))
    }

    pub fn failing_completion() -> Self {
        Self::scripted(Script::Tokens(Vec::new()), None)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl GenerativeBackend for FakeGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.completion_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.completion
            .clone()
            .ok_or_else(|| Error::GenerationFailed("quota exceeded".to_string()))
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TextStream> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        let items: TextStream = match &self.script {
            Script::Tokens(tokens) => stream::iter(tokens.clone().into_iter().map(Ok)).boxed(),
            Script::Results(results) => {
                let results = results.lock().unwrap().take().unwrap_or_default();
                stream::iter(results).boxed()
            }
            Script::Endless => stream::repeat_with(|| Ok("token ".to_string())).boxed(),
        };

        let guard = DropFlag(self.stream_dropped.clone());
        Ok(items
            .map(move |item| {
                guard.touch();
                item
            })
            .boxed())
    }

    fn model_id(&self) -> &str {
        "fake-generator"
    }
}
