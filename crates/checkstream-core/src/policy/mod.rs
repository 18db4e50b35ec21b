//! Reliability policies for the stream supervisor.

pub mod retry;

pub use retry::{Backoff, RetryConfig, RetryPolicy};
