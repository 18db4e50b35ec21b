//! checkstream-redis — Flapjack event sink for checkstream.
//!
//! [`FlapjackSink`] implements [`checkstream_core::EventSink`] by pushing
//! each event's JSON onto the Redis list Flapjack's processor consumes.

pub mod config;
pub mod sink;

pub use config::{FlapjackConfig, FlapjackVersion};
pub use sink::{encode, FlapjackSink};
