//! Event types flowing through the pipeline.

use serde::{Deserialize, Serialize};

/// Check name Flapjack uses for host-level events.
pub const HOST_CHECK: &str = "HOST";

/// Discriminator written into every canonical event.
pub const EVENT_TYPE_SERVICE: &str = "service";

/// The monitoring event kinds this bridge understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    CheckResult,
    StateChange,
}

impl EventKind {
    /// All recognised kinds, in subscription order.
    pub const ALL: [EventKind; 2] = [EventKind::CheckResult, EventKind::StateChange];

    /// Wire name used both in the `type` field and the `types` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckResult => "CheckResult",
            Self::StateChange => "StateChange",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "CheckResult" => Some(Self::CheckResult),
            "StateChange" => Some(Self::StateChange),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check state, decoded from the monitoring system's numeric state code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl CheckState {
    /// Map a state code to a state. Only `0..=3` are valid.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::Warning),
            2 => Some(Self::Critical),
            3 => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for CheckState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed projection of a raw stream value for a recognised event kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedEvent {
    pub kind: EventKind,
    pub host_name: String,
    /// `None` means the event concerns the host itself.
    pub service_name: Option<String>,
    pub timestamp_secs: i64,
    pub state: CheckState,
    pub output: String,
}

/// Object collection an entity lives in on the monitoring API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Hosts,
    Services,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hosts => "hosts",
            Self::Services => "services",
        }
    }
}

/// Address of the object an event is about, as used by the lookup endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub kind: ObjectKind,
    /// `host` for hosts, `host!service` for services.
    pub name: String,
}

impl EntityRef {
    pub fn for_event(event: &ClassifiedEvent) -> Self {
        match &event.service_name {
            Some(service) => Self {
                kind: ObjectKind::Services,
                name: format!("{}!{}", event.host_name, service),
            },
            None => Self {
                kind: ObjectKind::Hosts,
                name: event.host_name.clone(),
            },
        }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind.as_str(), self.name)
    }
}

/// Metadata fetched for the entity an event concerns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentResult {
    pub tags: Vec<String>,
}

/// The record handed to the downstream alerting queue (Flapjack event format).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub entity: String,
    pub check: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub time: i64,
    pub state: CheckState,
    pub summary: String,
    pub details: String,
    pub tags: Vec<String>,
}
