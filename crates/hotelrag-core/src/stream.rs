//! Streaming helpers shared by the backend adapters

use futures::stream::{self, BoxStream, Stream, StreamExt};

use crate::Result;

/// Incremental text produced by a generative backend.
pub type TextStream = BoxStream<'static, Result<String>>;

/// Split a byte stream into lines as the bytes arrive.
///
/// Used to decode NDJSON and server-sent-event bodies without buffering the
/// whole response. Line terminators (`\n` or `\r\n`) are stripped; a trailing
/// unterminated line is emitted at end of input. After an error item the
/// stream ends.
pub fn byte_lines<S, B, E>(bytes: S) -> BoxStream<'static, std::result::Result<String, E>>
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Send + 'static,
{
    let state = (Box::pin(bytes), Vec::<u8>::new(), false);

    stream::unfold(state, |(mut bytes, mut buf, mut done)| async move {
        loop {
            if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                let text = String::from_utf8_lossy(&line)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                return Some((Ok(text), (bytes, buf, done)));
            }

            if done {
                if buf.is_empty() {
                    return None;
                }
                let text = String::from_utf8_lossy(&buf).trim_end_matches('\r').to_string();
                buf.clear();
                return Some((Ok(text), (bytes, buf, done)));
            }

            match bytes.next().await {
                Some(Ok(chunk)) => buf.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    buf.clear();
                    return Some((Err(e), (bytes, buf, true)));
                }
                None => done = true,
            }
        }
    })
    .boxed()
}
