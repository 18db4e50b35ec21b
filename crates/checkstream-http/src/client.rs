//! `reqwest` client construction shared by the stream and lookup clients.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};

use checkstream_core::error::BridgeError;

use crate::config::IcingaConfig;

/// Build a client for the Icinga API.
///
/// `request_timeout` bounds a whole request including the body; it must be
/// `None` for the event stream, which never finishes on its own.
pub(crate) fn build_client(
    config: &IcingaConfig,
    request_timeout: Option<Duration>,
) -> Result<reqwest::Client, BridgeError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .user_agent(concat!("checkstream/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(config.connect_timeout)
        .tcp_keepalive(config.keepalive);

    if let Some(timeout) = request_timeout {
        builder = builder.timeout(timeout);
    }

    builder = match &config.ca_pem {
        Some(pem) => {
            let cert = reqwest::Certificate::from_pem(pem)
                .map_err(|e| BridgeError::Config(format!("invalid CA certificate: {e}")))?;
            builder.add_root_certificate(cert)
        }
        None => builder.danger_accept_invalid_certs(true),
    };

    builder
        .build()
        .map_err(|e| BridgeError::Config(format!("failed to build HTTP client: {e}")))
}
