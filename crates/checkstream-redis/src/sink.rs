//! `FlapjackSink` — pushes canonical events onto Flapjack's Redis queue.
//!
//! Flapjack consumes events from a Redis list (`events` by default). From
//! protocol version 2 on, the processor blocks on a companion list
//! `<queue>_actions` and expects one `+` per event, pushed in the same
//! transaction.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;

use checkstream_core::error::BridgeError;
use checkstream_core::event::CanonicalEvent;
use checkstream_core::sink::EventSink;

use crate::config::{FlapjackConfig, FlapjackVersion};

/// Redis-backed [`EventSink`] speaking the Flapjack queue protocol.
pub struct FlapjackSink {
    config: FlapjackConfig,
    client: redis::Client,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl FlapjackSink {
    /// Open the Redis connection. Fails if the server cannot be reached.
    pub async fn connect(config: FlapjackConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        let client = redis::Client::open(config.redis_url())
            .map_err(|e| BridgeError::Config(format!("invalid Redis address: {e}")))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BridgeError::Connect {
                url: config.redis_url(),
                reason: e.to_string(),
            })?;
        tracing::info!(
            redis = %config.server,
            db = config.database,
            queue = %config.events_queue,
            version = %config.version,
            "connected to Flapjack queue"
        );
        Ok(Self {
            config,
            client,
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Reuse the open connection or dial a new one after a failure.
    async fn connection(&self) -> Result<MultiplexedConnection, BridgeError> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BridgeError::Sink(format!("redis connect failed: {e}")))?;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn push(&self, conn: &mut MultiplexedConnection, payload: &str) -> redis::RedisResult<()> {
        match self.config.version {
            FlapjackVersion::V1 => {
                let _: i64 = redis::cmd("LPUSH")
                    .arg(&self.config.events_queue)
                    .arg(payload)
                    .query_async(conn)
                    .await?;
            }
            FlapjackVersion::V2 => {
                let _: () = redis::pipe()
                    .atomic()
                    .cmd("LPUSH")
                    .arg(&self.config.events_queue)
                    .arg(payload)
                    .ignore()
                    .cmd("LPUSH")
                    .arg(self.config.actions_queue())
                    .arg("+")
                    .ignore()
                    .query_async(conn)
                    .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EventSink for FlapjackSink {
    async fn send(&self, event: &CanonicalEvent) -> Result<(), BridgeError> {
        let payload = encode(event)?;
        let mut conn = self.connection().await?;
        if let Err(e) = self.push(&mut conn, &payload).await {
            if e.is_io_error() || e.is_connection_dropped() {
                // next send redials
                self.conn.lock().await.take();
            }
            return Err(BridgeError::Sink(format!("LPUSH to {} failed: {e}", self.config.events_queue)));
        }
        tracing::debug!(entity = %event.entity, check = %event.check, state = %event.state, "event queued");
        Ok(())
    }

    async fn close(&self) -> Result<(), BridgeError> {
        if self.conn.lock().await.take().is_some() {
            tracing::info!(redis = %self.config.server, "closed Flapjack queue connection");
        }
        Ok(())
    }
}

/// Check the fields Flapjack refuses to process and serialise the event.
pub fn encode(event: &CanonicalEvent) -> Result<String, BridgeError> {
    for (field, value) in [
        ("entity", &event.entity),
        ("check", &event.check),
        ("type", &event.event_type),
    ] {
        if value.trim().is_empty() {
            return Err(BridgeError::Sink(format!("event has empty `{field}`")));
        }
    }
    serde_json::to_string(event).map_err(|e| BridgeError::Sink(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkstream_core::event::CheckState;
    use serde_json::{json, Value};

    fn sample() -> CanonicalEvent {
        CanonicalEvent {
            entity: "web-01".into(),
            check: "HTTP".into(),
            event_type: "service".into(),
            time: 1467376032,
            state: CheckState::Warning,
            summary: "HTTP WARNING: slow".into(),
            details: "tags: [prod web]".into(),
            tags: vec!["prod".into(), "web".into()],
        }
    }

    #[test]
    fn encodes_flapjack_event_json() {
        let payload: Value = serde_json::from_str(&encode(&sample()).unwrap()).unwrap();
        assert_eq!(
            payload,
            json!({
                "entity": "web-01",
                "check": "HTTP",
                "type": "service",
                "time": 1467376032,
                "state": "warning",
                "summary": "HTTP WARNING: slow",
                "details": "tags: [prod web]",
                "tags": ["prod", "web"]
            })
        );
    }

    #[test]
    fn rejects_events_flapjack_would_drop() {
        let mut ev = sample();
        ev.entity = String::new();
        assert!(matches!(encode(&ev), Err(BridgeError::Sink(m)) if m.contains("entity")));

        let mut ev = sample();
        ev.check = "  ".into();
        assert!(matches!(encode(&ev), Err(BridgeError::Sink(m)) if m.contains("check")));
    }
}
