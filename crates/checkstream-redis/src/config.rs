//! Flapjack queue settings.

use checkstream_core::error::BridgeError;

/// Flapjack event-queue protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlapjackVersion {
    /// Events list only.
    V1,
    /// Events list plus one `+` per event on `<queue>_actions`.
    #[default]
    V2,
}

impl FlapjackVersion {
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::V1),
            2 => Some(Self::V2),
            _ => None,
        }
    }
}

impl std::fmt::Display for FlapjackVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V1 => write!(f, "1"),
            Self::V2 => write!(f, "2"),
        }
    }
}

/// Where and how to deliver events.
#[derive(Debug, Clone)]
pub struct FlapjackConfig {
    /// Redis server as `host:port`. Flapjack packages run their own Redis
    /// on 6380.
    pub server: String,
    pub database: i64,
    pub version: FlapjackVersion,
    /// Name of the Redis list Flapjack reads events from.
    pub events_queue: String,
}

impl Default for FlapjackConfig {
    fn default() -> Self {
        Self {
            server: "localhost:6380".into(),
            database: 0,
            version: FlapjackVersion::V2,
            events_queue: "events".into(),
        }
    }
}

impl FlapjackConfig {
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.events_queue.is_empty() {
            return Err(BridgeError::Config("Flapjack events queue name must not be empty".into()));
        }
        if self.database < 0 {
            return Err(BridgeError::Config(format!("invalid Redis database {}", self.database)));
        }
        Ok(())
    }

    pub fn redis_url(&self) -> String {
        format!("redis://{}/{}", self.server, self.database)
    }

    /// Companion list carrying the version 2 wake-up markers.
    pub fn actions_queue(&self) -> String {
        format!("{}_actions", self.events_queue)
    }
}
