//! `StreamSupervisor` — the top-level state machine.
//!
//! ```text
//! Idle → Connecting → Streaming ─┬→ Reconnecting → Connecting → ...
//!                                ├→ Cancelled   (shutdown signal)
//!                                └→ Fatal       (configuration-class error)
//! ```
//!
//! Each stream session runs in its own Tokio task: open the stream, then for
//! every value classify → enrich → translate → dispatch, strictly in arrival
//! order. The control task waits on that task and on the shutdown future at
//! the same time; on shutdown the session task is aborted, which drops the
//! in-flight HTTP request, and the sink is closed.

use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::classify::{classify, Classification, UnknownKindPolicy};
use crate::error::BridgeError;
use crate::policy::{Backoff, RetryConfig};
use crate::sink::{Dispatcher, EventSink};
use crate::source::{Enricher, EventSource};
use crate::translate::translate;

/// Immutable supervisor configuration.
#[derive(Debug, Clone, Default)]
pub struct SupervisorConfig {
    /// Reconnect backoff.
    pub retry: RetryConfig,
    /// Handling of unrecognised event kinds.
    pub unknown_kinds: UnknownKindPolicy,
    /// Log every decoded stream value at `debug`.
    pub log_raw_values: bool,
}

/// Lifecycle state of the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Connecting,
    Streaming,
    Reconnecting,
    Cancelled,
    Fatal,
}

impl SupervisorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Fatal)
    }
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting => write!(f, "connecting"),
            Self::Streaming => write!(f, "streaming"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// Metrics snapshot for the supervisor.
#[derive(Debug, Clone, Default)]
pub struct SupervisorMetrics {
    pub sessions_opened: u64,
    pub events_received: u64,
    pub events_dispatched: u64,
    pub events_skipped: u64,
    pub reconnects: u64,
    pub last_error: Option<String>,
}

/// How a stream session ended.
struct SessionOutcome {
    received: u64,
    dispatched: u64,
    error: BridgeError,
}

/// Everything a session task needs, cheaply cloneable into `tokio::spawn`.
#[derive(Clone)]
struct Pipeline {
    source: Arc<dyn EventSource>,
    enricher: Arc<dyn Enricher>,
    dispatcher: Dispatcher,
    unknown_kinds: UnknownKindPolicy,
    log_raw_values: bool,
    state: Arc<watch::Sender<SupervisorState>>,
    metrics: Arc<Mutex<SupervisorMetrics>>,
}

impl Pipeline {
    async fn run_session(self) -> SessionOutcome {
        let mut received = 0u64;
        let mut dispatched = 0u64;
        let error = match self.stream_events(&mut received, &mut dispatched).await {
            Ok(()) => BridgeError::Closed,
            Err(e) => e,
        };
        SessionOutcome {
            received,
            dispatched,
            error,
        }
    }

    async fn stream_events(&self, received: &mut u64, dispatched: &mut u64) -> Result<(), BridgeError> {
        let mut stream = self.source.open().await?;
        self.metrics.lock().unwrap().sessions_opened += 1;
        self.state.send_replace(SupervisorState::Streaming);
        info!(endpoint = %self.source.endpoint(), "event stream open");

        while let Some(item) = stream.next().await {
            let value = item?;
            *received += 1;
            self.metrics.lock().unwrap().events_received += 1;
            if self.process(value).await? {
                *dispatched += 1;
            }
        }
        Ok(())
    }

    /// Returns `true` if the value was delivered, `false` if it was skipped.
    async fn process(&self, value: Value) -> Result<bool, BridgeError> {
        if self.log_raw_values {
            debug!(value = %value, "decoded stream value");
        }

        let event = match classify(&value, self.unknown_kinds)? {
            Classification::Event(event) => event,
            Classification::Skip => {
                self.metrics.lock().unwrap().events_skipped += 1;
                return Ok(false);
            }
        };

        let enrichment = self.enricher.enrich(&event).await?;
        let canonical = translate(&event, enrichment);
        self.dispatcher.dispatch(&canonical).await?;

        self.metrics.lock().unwrap().events_dispatched += 1;
        debug!(
            entity = %canonical.entity,
            check = %canonical.check,
            state = %canonical.state,
            "event dispatched"
        );
        Ok(true)
    }
}

/// Owns the reconnect loop and the per-event pipeline.
pub struct StreamSupervisor {
    config: SupervisorConfig,
    pipeline: Pipeline,
}

impl StreamSupervisor {
    pub fn new(
        config: SupervisorConfig,
        source: Arc<dyn EventSource>,
        enricher: Arc<dyn Enricher>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let (state, _) = watch::channel(SupervisorState::Idle);
        let pipeline = Pipeline {
            source,
            enricher,
            dispatcher: Dispatcher::new(sink),
            unknown_kinds: config.unknown_kinds,
            log_raw_values: config.log_raw_values,
            state: Arc::new(state),
            metrics: Arc::new(Mutex::new(SupervisorMetrics::default())),
        };
        Self { config, pipeline }
    }

    /// Current state.
    pub fn state(&self) -> SupervisorState {
        *self.pipeline.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SupervisorState> {
        self.pipeline.state.subscribe()
    }

    /// Returns a snapshot of current metrics.
    pub fn metrics(&self) -> SupervisorMetrics {
        self.pipeline.metrics.lock().unwrap().clone()
    }

    fn set_state(&self, state: SupervisorState) {
        self.pipeline.state.send_replace(state);
    }

    /// Run until `shutdown` resolves (`Ok`) or a non-retryable error occurs
    /// (`Err`).
    pub async fn run<F>(&self, shutdown: F) -> Result<(), BridgeError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut backoff = Backoff::new(self.config.retry.clone());

        loop {
            self.set_state(SupervisorState::Connecting);
            info!(endpoint = %self.pipeline.source.endpoint(), "connecting to event stream");

            let mut session = tokio::spawn(self.pipeline.clone().run_session());

            let joined = tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested, aborting stream request");
                    session.abort();
                    let _ = session.await;
                    return self.cancel().await;
                }
                joined = &mut session => joined,
            };

            let outcome = joined.unwrap_or_else(|e| SessionOutcome {
                received: 0,
                dispatched: 0,
                error: BridgeError::Stream(format!("session task failed: {e}")),
            });
            let err = outcome.error;
            self.pipeline.metrics.lock().unwrap().last_error = Some(err.to_string());

            if !err.is_retryable() {
                return self.fail(err).await;
            }
            // a session that only fails on its input is not progress
            if outcome.dispatched > 0 {
                backoff.reset();
            }

            self.set_state(SupervisorState::Reconnecting);
            let Some(delay) = backoff.next_delay() else {
                let attempts = backoff.attempts().saturating_sub(1);
                return self
                    .fail(BridgeError::RetriesExhausted {
                        attempts,
                        last: err.to_string(),
                    })
                    .await;
            };
            self.pipeline.metrics.lock().unwrap().reconnects += 1;
            warn!(
                error = %err,
                received = outcome.received,
                delay_ms = delay.as_millis() as u64,
                "stream session ended, reconnecting"
            );

            tokio::select! {
                _ = &mut shutdown => return self.cancel().await,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn cancel(&self) -> Result<(), BridgeError> {
        self.set_state(SupervisorState::Cancelled);
        if let Err(e) = self.pipeline.dispatcher.close().await {
            warn!(error = %e, "failed to close event sink");
        }
        info!("supervisor cancelled");
        Ok(())
    }

    async fn fail(&self, err: BridgeError) -> Result<(), BridgeError> {
        self.set_state(SupervisorState::Fatal);
        error!(error = %err, "unrecoverable error, stopping");
        if let Err(e) = self.pipeline.dispatcher.close().await {
            warn!(error = %e, "failed to close event sink");
        }
        Err(err)
    }
}
