//! Incremental JSON-Lines decoder.
//!
//! Bytes are pushed in whatever chunks the transport delivers; complete
//! top-level JSON values are pulled out one at a time. Only the undecoded
//! tail is kept in memory, so an unbounded stream never accumulates. A
//! single value larger than the pending limit ends the stream.

use std::fmt::Display;

use futures::{Stream, StreamExt};
use serde_json::Value;

use crate::error::BridgeError;
use crate::source::RawValueStream;

/// Largest incomplete value kept in memory by default. Icinga event lines
/// are a few KiB.
pub const DEFAULT_MAX_PENDING: usize = 4 * 1024 * 1024;

/// Buffers partial input and yields complete JSON values.
#[derive(Debug)]
pub struct JsonLinesDecoder {
    buf: Vec<u8>,
    max_pending: usize,
}

impl Default for JsonLinesDecoder {
    fn default() -> Self {
        Self::with_max_pending(DEFAULT_MAX_PENDING)
    }
}

impl JsonLinesDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that gives up once an incomplete value exceeds `max_pending`
    /// bytes.
    pub fn with_max_pending(max_pending: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_pending,
        }
    }

    /// Append a chunk of bytes received from the stream.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pull the next complete value, or `Ok(None)` if more input is needed.
    pub fn next_value(&mut self) -> Result<Option<Value>, BridgeError> {
        let (item, consumed) = {
            let mut iter = serde_json::Deserializer::from_slice(&self.buf).into_iter::<Value>();
            let item = iter.next();
            (item, iter.byte_offset())
        };

        match item {
            None => {
                // nothing but whitespace left
                self.buf.clear();
                Ok(None)
            }
            Some(Ok(value)) => {
                self.buf.drain(..consumed);
                Ok(Some(value))
            }
            Some(Err(e)) if e.is_eof() => {
                if self.buf.len() > self.max_pending {
                    return Err(BridgeError::Stream(format!(
                        "incomplete value exceeds {} bytes",
                        self.max_pending
                    )));
                }
                Ok(None)
            }
            Some(Err(e)) => Err(BridgeError::Decode(e)),
        }
    }

    /// Number of buffered bytes not yet decoded.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Check the buffer at end of stream: leftover non-whitespace input
    /// means the peer hung up mid-value.
    pub fn finish(&self) -> Result<(), BridgeError> {
        if self.buf.iter().all(u8::is_ascii_whitespace) {
            Ok(())
        } else {
            Err(BridgeError::Stream(format!(
                "stream truncated with {} undecoded bytes",
                self.buf.len()
            )))
        }
    }
}

struct BodyState<S> {
    body: std::pin::Pin<Box<S>>,
    decoder: JsonLinesDecoder,
    done: bool,
}

/// Turn a response body (a stream of byte chunks) into a [`RawValueStream`].
///
/// Values are yielded as soon as they are complete. The stream ends after
/// its first error: a decode error, a body read error, or [`BridgeError::Closed`]
/// when the peer finishes the body.
pub fn decode_stream<S, B, E>(body: S) -> RawValueStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = BodyState {
        body: Box::pin(body),
        decoder: JsonLinesDecoder::new(),
        done: false,
    };

    Box::pin(futures::stream::unfold(state, |mut st| async move {
        if st.done {
            return None;
        }
        loop {
            match st.decoder.next_value() {
                Ok(Some(value)) => return Some((Ok(value), st)),
                Ok(None) => {}
                Err(e) => {
                    st.done = true;
                    return Some((Err(e), st));
                }
            }

            match st.body.next().await {
                Some(Ok(chunk)) => st.decoder.push(chunk.as_ref()),
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(BridgeError::Stream(e.to_string())), st));
                }
                None => {
                    st.done = true;
                    let err = match st.decoder.finish() {
                        Ok(()) => BridgeError::Closed,
                        Err(e) => e,
                    };
                    return Some((Err(err), st));
                }
            }
        }
    }))
}
