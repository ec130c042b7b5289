//! Streamed response handed back to the caller

use futures::stream::{BoxStream, Stream, StreamExt};
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};
use tracing::Span;

use hotelrag_core::ResponseChunk;

/// Lazy, single-pass stream of response chunks.
///
/// No stage runs until the stream is first polled. Dropping the stream
/// cancels the call: any in-flight embedding, search, or generation request
/// is dropped with it and no further chunk is produced.
///
/// Each poll runs inside the call's span, so events from adapters, retries
/// and filter extraction carry its request id.
pub struct ResponseStream {
    chunks: BoxStream<'static, ResponseChunk>,
    references: Arc<OnceLock<Vec<String>>>,
    span: Span,
}

/// A fully drained response.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedResponse {
    pub chunks: Vec<ResponseChunk>,
    pub references: Vec<String>,
}

impl CollectedResponse {
    /// Concatenated generated text, excluding status and terminal chunks.
    pub fn answer(&self) -> String {
        self.chunks
            .iter()
            .filter_map(|chunk| match chunk {
                ResponseChunk::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl ResponseStream {
    pub(crate) fn new(
        chunks: BoxStream<'static, ResponseChunk>,
        references: Arc<OnceLock<Vec<String>>>,
        span: Span,
    ) -> Self {
        Self {
            chunks,
            references,
            span,
        }
    }

    /// Reference URLs of the matches the answer is grounded on, in match
    /// order. Empty until the search stage has returned matches.
    pub fn references(&self) -> &[String] {
        self.references.get().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Drain the stream.
    pub async fn collect_all(mut self) -> CollectedResponse {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.next().await {
            chunks.push(chunk);
        }
        CollectedResponse {
            chunks,
            references: self.references().to_vec(),
        }
    }
}

impl Stream for ResponseStream {
    type Item = ResponseChunk;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let _entered = this.span.enter();
        this.chunks.poll_next_unpin(cx)
    }
}
