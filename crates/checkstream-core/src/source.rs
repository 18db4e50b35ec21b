//! `EventSource` and `Enricher` traits — the seams between the supervisor
//! and the monitoring API.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;

use crate::error::BridgeError;
use crate::event::{ClassifiedEvent, EnrichmentResult};

/// Lazy sequence of raw values decoded from one open stream.
///
/// The stream ends after yielding its first error. It cannot be restarted;
/// call [`EventSource::open`] again for a new one.
pub type RawValueStream = Pin<Box<dyn Stream<Item = Result<Value, BridgeError>> + Send>>;

/// Opens event-subscription streams against the monitoring API.
#[async_trait]
pub trait EventSource: Send + Sync + 'static {
    /// Open a fresh stream. Fails without reading further on a non-success
    /// response.
    async fn open(&self) -> Result<RawValueStream, BridgeError>;

    /// Identifier for logs (endpoint URL or name).
    fn endpoint(&self) -> &str;
}

/// Fetches metadata for the entity a classified event concerns.
#[async_trait]
pub trait Enricher: Send + Sync + 'static {
    async fn enrich(&self, event: &ClassifiedEvent) -> Result<EnrichmentResult, BridgeError>;
}
