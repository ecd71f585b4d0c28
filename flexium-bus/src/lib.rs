//! Topic-based publish/subscribe bus shared by micro apps and the host.
//!
//! Dispatch is synchronous and single-threaded; literal, wildcard, and
//! regex subscriptions are combined in that order per message. History
//! append and dispatch happen inside one `flexium_reactive::batch` so
//! downstream reactive effects observe a single coherent update.

pub mod bus;
pub mod channel;
pub mod message;
pub mod topic;

pub use bus::{EventBus, SubscribeOptions};
pub use channel::{create_channel, Channel};
pub use message::BusMessage;
pub use topic::Topic;

#[cfg(target_arch = "wasm32")]
pub use bus::request;

use std::cell::OnceCell;

thread_local! {
    static DEFAULT_BUS: OnceCell<EventBus> = const { OnceCell::new() };
}

/// The process-wide default bus, shared by every caller that doesn't build
/// its own. `create_event_bus` builds an isolated alternative instead.
pub fn default_bus() -> EventBus {
    DEFAULT_BUS.with(|cell| cell.get_or_init(|| EventBus::new(None)).clone())
}

/// Returns an isolated bus with its own subscription tables and history,
/// independent of [`default_bus`]. Used to avoid cross-talk in tests or
/// when embedding more than one orchestrator instance in the same page.
pub fn create_event_bus(app_name: Option<String>) -> EventBus {
    EventBus::new(app_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bus_is_a_stable_singleton() {
        let a = default_bus();
        let b = default_bus();
        let count = std::rc::Rc::new(std::cell::Cell::new(0));
        let count2 = count.clone();
        let _unsub = a.subscribe("ping", move |_| count2.set(count2.get() + 1));
        b.emit("ping", serde_json::json!({}), None);
        assert_eq!(count.get(), 1, "default_bus() must always return the same underlying bus");
    }

    #[test]
    fn create_event_bus_is_isolated_from_default() {
        let isolated = create_event_bus(None);
        let count = std::rc::Rc::new(std::cell::Cell::new(0));
        let count2 = count.clone();
        let _unsub = isolated.subscribe("ping", move |_| count2.set(count2.get() + 1));
        default_bus().emit("ping", serde_json::json!({}), None);
        assert_eq!(count.get(), 0);
    }
}
