//! `IcingaEnricher` — fetches object tags from `/v1/objects/{hosts|services}/{name}`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use checkstream_core::error::BridgeError;
use checkstream_core::event::{ClassifiedEvent, EnrichmentResult, EntityRef};
use checkstream_core::source::Enricher;

use crate::client::build_client;
use crate::config::IcingaConfig;

/// Object-lookup client. Every request is bounded by `lookup_timeout`.
///
/// The pooled `reqwest::Client` is shared by successful lookups. Any failed
/// lookup ends the stream session, so the client and its connections are
/// replaced together with the session's.
pub struct IcingaEnricher {
    config: IcingaConfig,
    http: Mutex<reqwest::Client>,
    generation: AtomicU64,
}

impl IcingaEnricher {
    pub fn new(config: IcingaConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        let http = build_client(&config, Some(config.lookup_timeout))?;
        Ok(Self {
            config,
            http: Mutex::new(http),
            generation: AtomicU64::new(0),
        })
    }

    /// How many times the HTTP client has been rebuilt.
    pub fn client_generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    fn client(&self) -> reqwest::Client {
        self.http.lock().unwrap().clone()
    }

    fn discard_client(&self) {
        match build_client(&self.config, Some(self.config.lookup_timeout)) {
            Ok(fresh) => {
                *self.http.lock().unwrap() = fresh;
                self.generation.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("lookup client replaced after failure");
            }
            Err(e) => tracing::warn!(error = %e, "cannot rebuild lookup client, keeping the old one"),
        }
    }

    async fn fetch(&self, entity: &EntityRef) -> Result<Vec<String>, BridgeError> {
        let url = self.config.object_url(entity)?;
        let fail = |status: Option<u16>, reason: String| BridgeError::Lookup {
            entity: entity.name.clone(),
            status,
            reason,
        };

        let resp = self
            .client()
            .get(url)
            .basic_auth(&self.config.user, Some(&self.config.password))
            .send()
            .await
            .map_err(|e| fail(None, e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(fail(
                Some(status.as_u16()),
                format!("HTTP {}: {}", status.as_u16(), body.trim()),
            ));
        }

        let envelope: Value = resp
            .json()
            .await
            .map_err(|e| fail(Some(status.as_u16()), format!("invalid response body: {e}")))?;
        parse_tags(&envelope).map_err(|reason| fail(Some(status.as_u16()), reason))
    }
}

#[async_trait]
impl Enricher for IcingaEnricher {
    async fn enrich(&self, event: &ClassifiedEvent) -> Result<EnrichmentResult, BridgeError> {
        let entity = EntityRef::for_event(event);
        match self.fetch(&entity).await {
            Ok(tags) => {
                tracing::debug!(entity = %entity, tags = ?tags, "object lookup complete");
                Ok(EnrichmentResult { tags })
            }
            Err(e) => {
                self.discard_client();
                Err(e)
            }
        }
    }
}

/// Extract `results[0].attrs.vars.tags` from a lookup envelope.
///
/// Absent `vars`, `vars: null` and absent `tags` all mean "no tags". Any
/// other deviation from the expected shape is an error.
pub fn parse_tags(envelope: &Value) -> Result<Vec<String>, String> {
    let results = envelope
        .get("results")
        .and_then(Value::as_array)
        .ok_or("response has no `results` array")?;
    let first = results.first().ok_or("empty result list")?;
    let attrs = first
        .get("attrs")
        .and_then(Value::as_object)
        .ok_or("result has no `attrs` object")?;

    let vars = match attrs.get("vars") {
        None | Some(Value::Null) => return Ok(vec![]),
        Some(Value::Object(vars)) => vars,
        Some(_) => return Err("`attrs.vars` is not an object".into()),
    };

    match vars.get("tags") {
        None | Some(Value::Null) => Ok(vec![]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|t| {
                t.as_str()
                    .map(String::from)
                    .ok_or_else(|| format!("non-string tag {t}"))
            })
            .collect(),
        Some(_) => Err("`vars.tags` is not an array".into()),
    }
}
