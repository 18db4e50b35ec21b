//! Error taxonomy shared by every stage of the pipeline.

use thiserror::Error;

/// Errors raised while opening, reading or processing the event stream.
///
/// Every stage below the supervisor returns this type unchanged; only the
/// supervisor decides between reconnecting and aborting.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Network-level failure opening the stream (refused, timeout, TLS).
    #[error("connect to {url} failed: {reason}")]
    Connect { url: String, reason: String },

    /// Non-success status from the event-subscription endpoint.
    #[error("API HTTP request failed: {status}, {body}")]
    HttpStatus { status: u16, body: String },

    /// The response body failed while it was being read.
    #[error("stream read error: {0}")]
    Stream(String),

    /// The peer closed the stream.
    #[error("stream closed by peer")]
    Closed,

    /// A chunk of the stream was not valid JSON.
    #[error("stream decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A required field was missing or had the wrong type.
    #[error("malformed event: missing or invalid field `{field}`")]
    MalformedEvent { field: String },

    /// The `type` discriminator named an event kind we do not handle.
    #[error("unknown event type {kind}")]
    UnknownEventKind { kind: String },

    /// The check state code was outside `0..=3`.
    #[error("unknown state {value}")]
    UnknownStateCode { value: String },

    /// The metadata lookup for an entity failed.
    #[error("lookup for {entity} failed: {reason}")]
    Lookup {
        entity: String,
        status: Option<u16>,
        reason: String,
    },

    /// The downstream sink rejected or failed to store an event.
    #[error("sink error: {0}")]
    Sink(String),

    /// Invalid configuration; retrying cannot fix it.
    #[error("configuration error: {0}")]
    Config(String),

    /// The reconnect budget ran out.
    #[error("giving up after {attempts} reconnect attempts, last error: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl BridgeError {
    /// Returns `true` if reconnecting may resolve the error.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Config(_) | Self::RetriesExhausted { .. } => false,
            // auth failures and request-shape rejections will not heal on retry
            Self::HttpStatus { status, .. } => !matches!(status, 400 | 401 | 403 | 404),
            // a missing object may appear later, missing permissions will not
            Self::Lookup {
                status: Some(400 | 401 | 403),
                ..
            } => false,
            _ => true,
        }
    }

    /// Returns `true` if the stream delivered something that violates the
    /// expected event contract.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Self::Decode(_)
                | Self::MalformedEvent { .. }
                | Self::UnknownEventKind { .. }
                | Self::UnknownStateCode { .. }
        )
    }

    pub(crate) fn malformed(field: impl Into<String>) -> Self {
        Self::MalformedEvent {
            field: field.into(),
        }
    }
}
