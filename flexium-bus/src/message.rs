use flexium_core::clock::now_ms;
use flexium_core::ids::new_id;
use serde_json::Value;

/// A dispatched bus message. Constructed by `emit`/`send_to`/`request`;
/// never constructed directly by subscribers.
#[derive(Clone, Debug)]
pub struct BusMessage {
    pub id: String,
    pub r#type: String,
    pub payload: Value,
    pub source: Option<String>,
    pub target: Option<String>,
    pub timestamp: f64,
}

impl BusMessage {
    pub(crate) fn new(r#type: impl Into<String>, payload: Value, source: Option<String>, target: Option<String>) -> Self {
        Self { id: new_id(), r#type: r#type.into(), payload, source, target, timestamp: now_ms() }
    }

    /// The `_requestId` the caller's `request()` stamped onto the payload,
    /// if this message carries one.
    pub fn request_id(&self) -> Option<&str> {
        self.payload.get("_requestId").and_then(Value::as_str)
    }
}
