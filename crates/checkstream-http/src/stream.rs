//! `IcingaEventSource` — opens `/v1/events` subscriptions.
//!
//! Every [`open`](EventSource::open) builds its own `reqwest::Client`, so the
//! connection pool belongs to that one session and is dropped together with
//! the returned stream. Nothing is reused across reconnects.

use async_trait::async_trait;
use reqwest::Url;

use checkstream_core::decoder::decode_stream;
use checkstream_core::error::BridgeError;
use checkstream_core::source::{EventSource, RawValueStream};

use crate::client::build_client;
use crate::config::{IcingaConfig, Scheme};

/// Streaming client for the Icinga 2 event API.
pub struct IcingaEventSource {
    config: IcingaConfig,
    url: Url,
    endpoint: String,
}

impl IcingaEventSource {
    /// Validate `config` and prepare the subscription URL.
    pub fn new(config: IcingaConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        let url = config.events_url()?;
        if config.scheme == Scheme::Https && config.ca_pem.is_none() {
            tracing::warn!("no CA certificate configured, skipping verification of server TLS certificate");
        }
        Ok(Self {
            endpoint: url.to_string(),
            config,
            url,
        })
    }
}

#[async_trait]
impl EventSource for IcingaEventSource {
    async fn open(&self) -> Result<RawValueStream, BridgeError> {
        let client = build_client(&self.config, None)?;

        let resp = client
            .post(self.url.clone())
            .basic_auth(&self.config.user, Some(&self.config.password))
            .send()
            .await
            .map_err(|e| BridgeError::Connect {
                url: self.endpoint.clone(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        tracing::debug!(url = %self.endpoint, status = %status, "event stream response");

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BridgeError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(decode_stream(resp.bytes_stream()))
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
