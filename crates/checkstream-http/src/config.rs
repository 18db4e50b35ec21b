//! Connection settings for the Icinga 2 API and URL construction.

use std::time::Duration;

use reqwest::Url;

use checkstream_core::error::BridgeError;
use checkstream_core::event::{EntityRef, EventKind};

/// URL scheme of the API endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scheme {
    #[default]
    Https,
    Http,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Https => "https",
            Self::Http => "http",
        }
    }
}

/// Configuration for talking to the Icinga 2 API.
#[derive(Clone)]
pub struct IcingaConfig {
    /// API endpoint as `host:port`, e.g. `"localhost:5665"`.
    pub server: String,
    pub scheme: Scheme,
    /// Event queue name the subscription registers under.
    pub queue: String,
    /// Event types to subscribe to.
    pub types: Vec<EventKind>,
    pub user: String,
    pub password: String,
    /// PEM-encoded CA certificate(s) to trust. `None` skips server
    /// certificate verification.
    pub ca_pem: Option<Vec<u8>>,
    pub connect_timeout: Duration,
    pub keepalive: Duration,
    /// Overall timeout for a single object lookup.
    pub lookup_timeout: Duration,
}

impl Default for IcingaConfig {
    fn default() -> Self {
        Self {
            server: "localhost:5665".into(),
            scheme: Scheme::Https,
            queue: "flapjack".into(),
            types: EventKind::ALL.to_vec(),
            user: String::new(),
            password: String::new(),
            ca_pem: None,
            connect_timeout: Duration::from_millis(5_000),
            keepalive: Duration::from_millis(30_000),
            lookup_timeout: Duration::from_millis(10_000),
        }
    }
}

impl std::fmt::Debug for IcingaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IcingaConfig")
            .field("server", &self.server)
            .field("scheme", &self.scheme)
            .field("queue", &self.queue)
            .field("types", &self.types)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("ca_pem", &self.ca_pem.as_ref().map(|p| p.len()))
            .field("connect_timeout", &self.connect_timeout)
            .field("keepalive", &self.keepalive)
            .field("lookup_timeout", &self.lookup_timeout)
            .finish()
    }
}

impl IcingaConfig {
    /// Reject settings that no amount of reconnecting can fix.
    pub fn validate(&self) -> Result<(), BridgeError> {
        validate_host_port(&self.server)?;
        if self.queue.is_empty() {
            return Err(BridgeError::Config("event queue name must not be empty".into()));
        }
        if self.types.is_empty() {
            return Err(BridgeError::Config("at least one event type is required".into()));
        }
        Ok(())
    }

    fn base_url(&self) -> Result<Url, BridgeError> {
        Url::parse(&format!("{}://{}/", self.scheme.as_str(), self.server))
            .map_err(|e| BridgeError::Config(format!("invalid API address {}: {e}", self.server)))
    }

    /// `/v1/events?queue=<queue>&types=<kind>&types=<kind>...`
    pub fn events_url(&self) -> Result<Url, BridgeError> {
        let mut url = self.base_url()?;
        url.set_path("/v1/events");
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("queue", &self.queue);
            for kind in &self.types {
                query.append_pair("types", kind.as_str());
            }
        }
        Ok(url)
    }

    /// `/v1/objects/{hosts|services}/{name}`, with the name encoded as a
    /// single path segment.
    pub fn object_url(&self, entity: &EntityRef) -> Result<Url, BridgeError> {
        let mut url = self.base_url()?;
        url.path_segments_mut()
            .map_err(|_| BridgeError::Config(format!("API address {} cannot carry a path", self.server)))?
            .clear()
            .push("v1")
            .push("objects")
            .push(entity.kind.as_str())
            .push(&entity.name);
        Ok(url)
    }
}

/// Check a `host:port` address, the only form the API and Redis flags accept.
pub fn validate_host_port(addr: &str) -> Result<(), BridgeError> {
    let invalid = || {
        BridgeError::Config(format!(
            "invalid address {addr:?}: should be in format `host:port` (e.g. 127.0.0.1:5665)"
        ))
    };
    let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() || host.contains(':') || port.parse::<u16>().is_err() {
        return Err(invalid());
    }
    Ok(())
}
