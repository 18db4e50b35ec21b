//! checkstream-http — Icinga 2 API clients for checkstream.
//!
//! - [`IcingaEventSource`] subscribes to `/v1/events` and yields one raw JSON
//!   value per streamed line.
//! - [`IcingaEnricher`] fetches `vars.tags` for the host or service an event
//!   refers to.
//!
//! Both authenticate with HTTP basic auth. Without a configured CA the server
//! certificate is not verified.

mod client;
pub mod config;
pub mod lookup;
pub mod stream;

pub use config::{validate_host_port, IcingaConfig, Scheme};
pub use lookup::{parse_tags, IcingaEnricher};
pub use stream::IcingaEventSource;
