//! Device status returned by the authority.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lock message used when the authority does not supply one.
pub const DEFAULT_LOCK_MESSAGE: &str = "Device Locked";

/// The authorization state of a device, as reported by the authority.
///
/// Only `locked`, `lock_message` and `support_phone` drive enforcement.
/// The remaining fields are informational and kept in [`StatusDetails`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    /// Whether the device must be locked.
    pub locked: bool,
    /// Message shown on the lock overlay.
    pub lock_message: String,
    /// Support phone number offered on the lock overlay.
    pub support_phone: String,
    /// Informational fields.
    #[serde(flatten)]
    pub details: StatusDetails,
}

/// Informational fields sent alongside the lock decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDetails {
    /// Title the authority suggests for the overlay.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_title: Option<String>,
    /// Name of the financing provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finance_name: Option<String>,
    /// Next payment due date, as sent by the authority.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_due_date: Option<String>,
    /// Amount currently due.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_due: Option<f64>,
    /// Server-side timestamp of this check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<String>,
}

impl StatusDetails {
    /// Returns true if no informational field was present.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl DeviceStatus {
    /// Creates a locked status.
    pub fn locked(message: impl Into<String>, support_phone: impl Into<String>) -> Self {
        Self {
            locked: true,
            lock_message: message.into(),
            support_phone: support_phone.into(),
            details: StatusDetails::default(),
        }
    }

    /// Creates an unlocked status with default presentation fields.
    pub fn unlocked() -> Self {
        Self {
            locked: false,
            lock_message: DEFAULT_LOCK_MESSAGE.to_string(),
            support_phone: String::new(),
            details: StatusDetails::default(),
        }
    }

    /// Decodes a response body.
    ///
    /// The body must be a JSON object. Missing or `null` fields take their
    /// defaults; unknown fields are ignored. Loosely typed values are
    /// coerced: `"true"`/`"false"` strings count as booleans and numbers as
    /// text. A `locked` value that is not a boolean either way means unlocked.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        if !value.is_object() {
            return Err(ProtocolError::NotAnObject(kind_of(&value)));
        }
        let wire: WireStatus = serde_json::from_value(value)?;
        Ok(wire.into())
    }

    /// Encodes to the JSON wire form.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self::unlocked()
    }
}

/// Raw wire shape. Every field is loosely typed so that an odd value never
/// rejects the whole status.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireStatus {
    #[serde(default)]
    locked: Option<Value>,
    #[serde(default)]
    lock_message: Option<Value>,
    #[serde(default)]
    support_phone: Option<Value>,
    #[serde(default)]
    lock_title: Option<Value>,
    #[serde(default)]
    finance_name: Option<Value>,
    #[serde(default)]
    next_due_date: Option<Value>,
    #[serde(default)]
    amount_due: Option<Value>,
    #[serde(default)]
    last_sync: Option<Value>,
}

impl From<WireStatus> for DeviceStatus {
    fn from(wire: WireStatus) -> Self {
        Self {
            locked: wire.locked.and_then(flag).unwrap_or(false),
            lock_message: wire
                .lock_message
                .and_then(text)
                .unwrap_or_else(|| DEFAULT_LOCK_MESSAGE.to_string()),
            support_phone: wire.support_phone.and_then(text).unwrap_or_default(),
            details: StatusDetails {
                lock_title: wire.lock_title.and_then(text),
                finance_name: wire.finance_name.and_then(text),
                next_due_date: wire.next_due_date.and_then(text),
                amount_due: wire.amount_due.and_then(amount),
                last_sync: wire.last_sync.and_then(text),
            },
        }
    }
}

fn flag(value: Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

fn text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn amount(value: Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
