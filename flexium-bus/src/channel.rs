use serde_json::Value;

use crate::bus::EventBus;
use crate::message::BusMessage;
use crate::topic::Topic;

/// A namespaced view over an `EventBus`: every topic name is transparently
/// prefixed with `"{prefix}:"`. Returned by `create_channel`.
#[derive(Clone)]
pub struct Channel {
    bus: EventBus,
    prefix: String,
}

impl Channel {
    pub fn new(bus: EventBus, prefix: impl Into<String>) -> Self {
        Self { bus, prefix: prefix.into() }
    }

    fn namespaced(&self, r#type: &str) -> String {
        format!("{}:{}", self.prefix, r#type)
    }

    pub fn emit(&self, r#type: impl AsRef<str>, payload: Value) -> BusMessage {
        self.bus.emit(self.namespaced(r#type.as_ref()), payload, None)
    }

    pub fn subscribe(&self, r#type: impl AsRef<str>, handler: impl FnMut(&BusMessage) + 'static) -> impl FnOnce() {
        self.bus.subscribe(Topic::literal(self.namespaced(r#type.as_ref())), handler)
    }

    pub fn once(&self, r#type: impl AsRef<str>, handler: impl FnMut(&BusMessage) + 'static) -> impl FnOnce() {
        self.bus.once(Topic::literal(self.namespaced(r#type.as_ref())), handler)
    }
}

/// Returns an isolated `{emit, subscribe, once}` view that namespaces every
/// topic with `prefix:`, so channels built on the same bus never collide.
pub fn create_channel(bus: &EventBus, prefix: impl Into<String>) -> Channel {
    Channel::new(bus.clone(), prefix)
}
