//! checkstream-core — event model and streaming pipeline for checkstream.
//!
//! # Overview
//!
//! checkstream follows a monitoring system's live event stream, enriches
//! each check result with object metadata, translates it into the alerting
//! system's event format and hands it to a downstream queue. This crate holds
//! everything that does not touch a particular transport:
//!
//! - [`decoder`] — incremental JSON-Lines decoding of the stream body
//! - [`classify`] — validating decode of raw values into typed events
//! - [`translate`] — classified event + tags → [`CanonicalEvent`]
//! - [`source`] — the [`EventSource`] and [`Enricher`] traits
//! - [`sink`] — the [`EventSink`] trait, dispatcher and in-process sinks
//! - [`cache`] — optional TTL cache in front of an enricher
//! - [`policy`] — reconnect backoff
//! - [`supervisor`] — the reconnecting, cancellable state machine
//!
//! ```text
//! StreamSupervisor
//!   └─ session task: EventSource::open → classify → Enricher → translate → EventSink
//! ```

pub mod cache;
pub mod classify;
pub mod decoder;
pub mod error;
pub mod event;
pub mod policy;
pub mod sink;
pub mod source;
pub mod supervisor;
pub mod translate;

pub use cache::CachingEnricher;
pub use classify::{classify, Classification, UnknownKindPolicy};
pub use decoder::{decode_stream, JsonLinesDecoder};
pub use error::BridgeError;
pub use event::{
    CanonicalEvent, CheckState, ClassifiedEvent, EnrichmentResult, EntityRef, EventKind,
    ObjectKind,
};
pub use sink::{Dispatcher, EventSink, LogSink, MemorySink};
pub use source::{Enricher, EventSource, RawValueStream};
pub use supervisor::{StreamSupervisor, SupervisorConfig, SupervisorMetrics, SupervisorState};
pub use translate::translate;
