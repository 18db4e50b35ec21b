//! Short-lived enrichment cache.
//!
//! Event storms tend to repeat the same host or service many times per
//! second. Wrapping an [`Enricher`] in a [`CachingEnricher`] serves repeated
//! lookups for the same entity from memory until the TTL runs out. Failed
//! lookups are never cached.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::event::{ClassifiedEvent, EnrichmentResult, EntityRef};
use crate::source::Enricher;

struct CacheEntry {
    fetched_at: Instant,
    result: EnrichmentResult,
}

/// TTL cache in front of another enricher.
pub struct CachingEnricher {
    inner: Arc<dyn Enricher>,
    ttl: Duration,
    entries: Mutex<HashMap<EntityRef, CacheEntry>>,
}

impl CachingEnricher {
    pub fn new(inner: Arc<dyn Enricher>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lookup(&self, key: &EntityRef) -> Option<EnrichmentResult> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.fetched_at.elapsed() < self.ttl => Some(entry.result.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Number of entries currently held, fresh or stale.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Enricher for CachingEnricher {
    async fn enrich(&self, event: &ClassifiedEvent) -> Result<EnrichmentResult, BridgeError> {
        let key = EntityRef::for_event(event);
        if let Some(hit) = self.lookup(&key) {
            tracing::trace!(entity = %key, "enrichment cache hit");
            return Ok(hit);
        }

        let result = self.inner.enrich(event).await?;
        let mut entries = self.entries.lock().unwrap();
        // drop stale entries so the map tracks the working set
        entries.retain(|_, e| e.fetched_at.elapsed() < self.ttl);
        entries.insert(
            key,
            CacheEntry {
                fetched_at: Instant::now(),
                result: result.clone(),
            },
        );
        Ok(result)
    }
}
