//! Downstream delivery: the `EventSink` trait, the dispatcher in front of it,
//! and two in-process sinks.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::event::CanonicalEvent;

/// External collaborator that durably delivers canonical events.
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    /// Deliver one event.
    async fn send(&self, event: &CanonicalEvent) -> Result<(), BridgeError>;

    /// Release the underlying connection. Called once on shutdown.
    async fn close(&self) -> Result<(), BridgeError> {
        Ok(())
    }
}

/// Hands canonical events to the sink. Never retries; a failure ends the
/// current stream session and the supervisor decides what happens next.
#[derive(Clone)]
pub struct Dispatcher {
    sink: Arc<dyn EventSink>,
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    pub async fn dispatch(&self, event: &CanonicalEvent) -> Result<(), BridgeError> {
        self.sink.send(event).await.map_err(|e| match e {
            BridgeError::Sink(_) => e,
            other => BridgeError::Sink(other.to_string()),
        })
    }

    pub async fn close(&self) -> Result<(), BridgeError> {
        self.sink.close().await
    }
}

/// Keeps every delivered event in memory, in delivery order.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<CanonicalEvent>>>,
    closed: Arc<Mutex<bool>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of delivered events.
    pub fn events(&self) -> Vec<CanonicalEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn send(&self, event: &CanonicalEvent) -> Result<(), BridgeError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn close(&self) -> Result<(), BridgeError> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}

/// Logs each event as JSON instead of delivering it. Used for dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    async fn send(&self, event: &CanonicalEvent) -> Result<(), BridgeError> {
        let json = serde_json::to_string(event).map_err(|e| BridgeError::Sink(e.to_string()))?;
        tracing::info!(event = %json, "dry run: event not delivered");
        Ok(())
    }
}
