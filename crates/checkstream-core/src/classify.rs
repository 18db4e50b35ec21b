//! Validating decode of raw stream values into [`ClassifiedEvent`]s.
//!
//! Every field is checked for presence and type; nothing is assumed. The
//! monitoring API encodes numbers as JSON doubles (`"state": 2.0`,
//! `"timestamp": 1467376032.234`), so integral doubles are accepted wherever
//! an integer is expected.

use serde_json::{Map, Value};

use crate::error::BridgeError;
use crate::event::{CheckState, ClassifiedEvent, EventKind};

/// What to do with a value whose `type` is not a recognised kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownKindPolicy {
    /// Fail with [`BridgeError::UnknownEventKind`], ending the stream session.
    #[default]
    Fail,
    /// Return [`Classification::Skip`] and keep reading.
    Skip,
}

/// Outcome of classifying one raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Event(ClassifiedEvent),
    Skip,
}

/// Classify a raw stream value.
pub fn classify(value: &Value, policy: UnknownKindPolicy) -> Result<Classification, BridgeError> {
    let obj = value
        .as_object()
        .ok_or_else(|| BridgeError::malformed("<root>"))?;

    let kind_str = required_str(obj, "type", "type")?;
    let kind = match EventKind::from_wire(kind_str) {
        Some(k) => k,
        None => {
            return match policy {
                UnknownKindPolicy::Fail => Err(BridgeError::UnknownEventKind {
                    kind: kind_str.to_string(),
                }),
                UnknownKindPolicy::Skip => {
                    tracing::debug!(kind = kind_str, "skipping unrecognised event kind");
                    Ok(Classification::Skip)
                }
            };
        }
    };

    let host_name = required_str(obj, "host", "host")?.to_string();
    let service_name = match obj.get("service") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(BridgeError::malformed("service")),
    };

    let timestamp_secs = obj
        .get("timestamp")
        .and_then(Value::as_f64)
        .map(|t| t.trunc() as i64)
        .ok_or_else(|| BridgeError::malformed("timestamp"))?;

    let check_result = obj
        .get("check_result")
        .and_then(Value::as_object)
        .ok_or_else(|| BridgeError::malformed("check_result"))?;

    let state = decode_state(check_result.get("state"))?;
    let output = required_str(check_result, "output", "check_result.output")?.to_string();

    Ok(Classification::Event(ClassifiedEvent {
        kind,
        host_name,
        service_name,
        timestamp_secs,
        state,
        output,
    }))
}

fn required_str<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a str, BridgeError> {
    obj.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| BridgeError::malformed(path))
}

fn decode_state(raw: Option<&Value>) -> Result<CheckState, BridgeError> {
    let n = match raw {
        Some(Value::Number(n)) => n,
        _ => return Err(BridgeError::malformed("check_result.state")),
    };
    let code = n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
            .map(|f| f as i64)
    });
    code.and_then(CheckState::from_code)
        .ok_or_else(|| BridgeError::UnknownStateCode {
            value: n.to_string(),
        })
}
