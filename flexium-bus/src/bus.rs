use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use serde_json::Value;

use flexium_core::error::{Error, Result};
use flexium_reactive::batch;

use crate::message::BusMessage;
use crate::topic::{Topic, TopicKey};

const DEFAULT_MAX_HISTORY: usize = 100;

pub type Handler = Box<dyn FnMut(&BusMessage)>;

/// Per-subscription filters, mirroring `subscribe(type, fn, options?)`.
#[derive(Default, Clone)]
pub struct SubscribeOptions {
    /// Drop the message unless it came from this `source` app.
    pub from_source: Option<String>,
    /// Drop the message unless its `target` equals the bus's own app name.
    pub only_targeted: bool,
    /// Auto-unsubscribe once this many messages have been delivered.
    pub max_messages: Option<u32>,
}

struct Subscription {
    id: String,
    topic: Topic,
    handler: RefCell<Handler>,
    options: SubscribeOptions,
    count: Cell<u32>,
}

struct Inner {
    app_name: Option<String>,
    literal: HashMap<String, Vec<Rc<Subscription>>>,
    wildcard: Vec<Rc<Subscription>>,
    regex: Vec<Rc<Subscription>>,
    by_id: HashMap<String, Rc<Subscription>>,
    by_topic: HashMap<TopicKey, Vec<String>>,
    history: VecDeque<BusMessage>,
    max_history: usize,
    next_sub_id: u64,
}

/// An in-process publish/subscribe bus for micro-app-to-micro-app and
/// host-to-micro-app messaging. Dispatch is synchronous, single-threaded,
/// and preserves subscription-insertion order within each topic bucket.
///
/// `EventBus` is a thin handle around shared interior-mutable state; clone
/// it freely — all clones observe the same subscriptions and history.
#[derive(Clone)]
pub struct EventBus {
    inner: Rc<RefCell<Inner>>,
}

impl EventBus {
    pub fn new(app_name: Option<String>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                app_name,
                literal: HashMap::new(),
                wildcard: Vec::new(),
                regex: Vec::new(),
                by_id: HashMap::new(),
                by_topic: HashMap::new(),
                history: VecDeque::new(),
                max_history: DEFAULT_MAX_HISTORY,
                next_sub_id: 0,
            })),
        }
    }

    pub fn with_max_history(app_name: Option<String>, max_history: usize) -> Self {
        let bus = Self::new(app_name);
        bus.inner.borrow_mut().max_history = max_history;
        bus
    }

    fn next_id(&self) -> String {
        let mut inner = self.inner.borrow_mut();
        inner.next_sub_id += 1;
        format!("sub-{}", inner.next_sub_id)
    }

    /// Assigns `id`/`timestamp`/`source`, appends to history, and dispatches.
    pub fn emit(&self, r#type: impl Into<String>, payload: Value, target: Option<String>) -> BusMessage {
        let r#type = r#type.into();
        let source = self.inner.borrow().app_name.clone();
        let message = BusMessage::new(r#type, payload, source, target);
        self.record_and_dispatch(message.clone());
        message
    }

    /// `emit` with `target` pre-filled.
    pub fn send_to(&self, target: impl Into<String>, r#type: impl Into<String>, payload: Value) -> BusMessage {
        self.emit(r#type, payload, Some(target.into()))
    }

    fn record_and_dispatch(&self, message: BusMessage) {
        let inner_rc = self.inner.clone();
        batch(move || {
            {
                let mut inner = inner_rc.borrow_mut();
                let max = inner.max_history;
                inner.history.push_back(message.clone());
                while inner.history.len() > max {
                    inner.history.pop_front();
                }
            }
            dispatch(&inner_rc, &message);
        });
    }

    /// Registers `handler` against `topic`. Returns a disposer.
    pub fn subscribe(&self, topic: impl Into<Topic>, handler: impl FnMut(&BusMessage) + 'static) -> impl FnOnce() {
        self.subscribe_with(topic, SubscribeOptions::default(), handler)
    }

    pub fn subscribe_with(
        &self,
        topic: impl Into<Topic>,
        options: SubscribeOptions,
        handler: impl FnMut(&BusMessage) + 'static,
    ) -> impl FnOnce() {
        let topic = topic.into();
        let id = self.next_id();
        let sub = Rc::new(Subscription {
            id: id.clone(),
            topic: topic.clone(),
            handler: RefCell::new(Box::new(handler)),
            options,
            count: Cell::new(0),
        });

        {
            let mut inner = self.inner.borrow_mut();
            match &topic {
                Topic::Literal(s) => inner.literal.entry(s.clone()).or_default().push(sub.clone()),
                Topic::Wildcard => inner.wildcard.push(sub.clone()),
                Topic::Regex(_) => inner.regex.push(sub.clone()),
            }
            inner.by_id.insert(id.clone(), sub.clone());
            inner.by_topic.entry(topic.identity_key()).or_default().push(id.clone());
        }

        let inner_rc = self.inner.clone();
        let disposer_id = id;
        move || {
            remove_subscription(&inner_rc, &disposer_id);
        }
    }

    /// Shorthand for `subscribe` with `max_messages = 1`.
    pub fn once(&self, topic: impl Into<Topic>, handler: impl FnMut(&BusMessage) + 'static) -> impl FnOnce() {
        self.subscribe_with(topic, SubscribeOptions { max_messages: Some(1), ..Default::default() }, handler)
    }

    /// Subscribes to `topic`; whenever a message carries `_requestId`,
    /// emits `${topic}:response:${requestId}` with the handler's result, or
    /// `{ _error: message }` if the handler returns `Err`.
    pub fn respond(
        &self,
        topic: impl Into<String>,
        mut handler: impl FnMut(&Value) -> std::result::Result<Value, String> + 'static,
    ) -> impl FnOnce() {
        let topic = topic.into();
        let bus = self.clone();
        self.subscribe(Topic::literal(topic.clone()), move |message| {
            let Some(request_id) = message.request_id() else {
                return;
            };
            let response_topic = format!("{topic}:response:{request_id}");
            let response = match handler(&message.payload) {
                Ok(value) => value,
                Err(err) => serde_json::json!({ "_error": err }),
            };
            bus.emit(response_topic, response, None);
        })
    }

    /// Drops all subscriptions for `topic`, or every subscription if `None`.
    pub fn unsubscribe_all(&self, topic: Option<Topic>) {
        let mut inner = self.inner.borrow_mut();
        match topic {
            None => {
                inner.literal.clear();
                inner.wildcard.clear();
                inner.regex.clear();
                inner.by_id.clear();
                inner.by_topic.clear();
            }
            Some(topic) => {
                let key = topic.identity_key();
                if let Some(ids) = inner.by_topic.remove(&key) {
                    for id in ids {
                        inner.by_id.remove(&id);
                    }
                }
                match &topic {
                    Topic::Literal(s) => {
                        inner.literal.remove(s);
                    }
                    Topic::Wildcard => inner.wildcard.clear(),
                    Topic::Regex(_) => {
                        let key = key.clone();
                        inner.regex.retain(|s| s.topic.identity_key() != key);
                    }
                }
            }
        }
    }

    pub fn get_message_history(&self) -> Vec<BusMessage> {
        self.inner.borrow().history.iter().cloned().collect()
    }

    pub fn clear_message_history(&self) {
        self.inner.borrow_mut().history.clear();
    }

    /// Re-dispatches messages from history (optionally filtered) through
    /// current subscribers, without appending them back into history.
    pub fn replay_messages(&self, filter: Option<&dyn Fn(&BusMessage) -> bool>) {
        let messages: Vec<BusMessage> = {
            let inner = self.inner.borrow();
            match filter {
                Some(f) => inner.history.iter().filter(|m| f(m)).cloned().collect(),
                None => inner.history.iter().cloned().collect(),
            }
        };
        let inner_rc = self.inner.clone();
        batch(move || {
            for message in &messages {
                dispatch(&inner_rc, message);
            }
        });
    }

    /// Number of distinct topic buckets currently holding a subscription
    /// (literal keys, the wildcard bucket if non-empty, and regex subs).
    pub fn topic_count(&self) -> usize {
        let inner = self.inner.borrow();
        inner.literal.len() + usize::from(!inner.wildcard.is_empty()) + inner.regex.len()
    }

    pub fn history_len(&self) -> usize {
        self.inner.borrow().history.len()
    }

    pub fn app_name(&self) -> Option<String> {
        self.inner.borrow().app_name.clone()
    }
}

fn remove_subscription(inner_rc: &Rc<RefCell<Inner>>, id: &str) {
    let mut inner = inner_rc.borrow_mut();
    let Some(sub) = inner.by_id.remove(id) else { return };
    match &sub.topic {
        Topic::Literal(s) => {
            if let Some(bucket) = inner.literal.get_mut(s) {
                bucket.retain(|s| s.id != id);
            }
        }
        Topic::Wildcard => inner.wildcard.retain(|s| s.id != id),
        Topic::Regex(_) => inner.regex.retain(|s| s.id != id),
    }
    if let Some(ids) = inner.by_topic.get_mut(&sub.topic.identity_key()) {
        ids.retain(|existing| existing != id);
    }
}

/// literal → wildcard → regex, deduplicated, each checked against
/// `from_source`/`only_targeted`/`max_messages` before invocation.
fn dispatch(inner_rc: &Rc<RefCell<Inner>>, message: &BusMessage) {
    let candidates: Vec<Rc<Subscription>> = {
        let inner = inner_rc.borrow();
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        if let Some(bucket) = inner.literal.get(&message.r#type) {
            for sub in bucket {
                if seen.insert(sub.id.clone()) {
                    out.push(sub.clone());
                }
            }
        }
        for sub in &inner.wildcard {
            if seen.insert(sub.id.clone()) {
                out.push(sub.clone());
            }
        }
        for sub in &inner.regex {
            if let Topic::Regex(re) = &sub.topic {
                if re.is_match(&message.r#type) && seen.insert(sub.id.clone()) {
                    out.push(sub.clone());
                }
            }
        }
        out
    };

    let app_name = inner_rc.borrow().app_name.clone();

    for sub in candidates {
        if let Some(expected) = &sub.options.from_source {
            if message.source.as_deref() != Some(expected.as_str()) {
                continue;
            }
        }
        if sub.options.only_targeted {
            let targeted = message.target.is_some() && message.target == app_name;
            if !targeted {
                continue;
            }
        }
        if let Some(limit) = sub.options.max_messages {
            if sub.count.get() >= limit {
                remove_subscription(inner_rc, &sub.id);
                continue;
            }
        }

        let handler = &sub.handler;
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            (handler.borrow_mut())(message);
        }));
        if result.is_err() {
            tracing::warn!(topic = %message.r#type, subscription = %sub.id, "bus subscriber panicked; other subscribers unaffected");
        }
        sub.count.set(sub.count.get() + 1);
        if let Some(limit) = sub.options.max_messages {
            if sub.count.get() >= limit {
                remove_subscription(inner_rc, &sub.id);
            }
        }
    }
}

/// Generates a `_requestId`, subscribes to the implicit response topic,
/// emits the enriched payload, and resolves on the first response or on
/// timeout — whichever comes first. Both outcomes dispose the response
/// subscription.
#[cfg(target_arch = "wasm32")]
pub async fn request(bus: &EventBus, r#type: impl Into<String>, mut payload: Value, timeout_ms: u32) -> Result<Value> {
    use futures_util::future::{select, Either};

    let r#type = r#type.into();
    let request_id = flexium_core::ids::new_id();
    match payload {
        Value::Object(ref mut map) => {
            map.insert("_requestId".to_string(), Value::String(request_id.clone()));
        }
        _ => {
            let mut map = serde_json::Map::new();
            map.insert("_requestId".to_string(), Value::String(request_id.clone()));
            map.insert("value".to_string(), payload);
            payload = Value::Object(map);
        }
    }

    let response_topic = format!("{type}:response:{request_id}");
    let (tx, rx) = futures::channel::oneshot::channel::<Value>();
    let tx = Rc::new(RefCell::new(Some(tx)));
    let tx_for_sub = tx.clone();
    let unsubscribe = bus.subscribe(Topic::literal(response_topic), move |message| {
        if let Some(tx) = tx_for_sub.borrow_mut().take() {
            let _ = tx.send(message.payload.clone());
        }
    });

    bus.emit(r#type.clone(), payload, None);

    let timeout = gloo_timers::future::TimeoutFuture::new(timeout_ms);
    let outcome = select(rx, timeout).await;
    unsubscribe();

    match outcome {
        Either::Left((Ok(value), _)) => Ok(value),
        _ => Err(Error::RequestTimeout { topic: r#type }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn emit_assigns_id_and_records_history() {
        let bus = EventBus::new(Some("host".into()));
        let message = bus.emit("ping", json!({"n": 1}), None);
        assert!(!message.id.is_empty());
        assert_eq!(message.source.as_deref(), Some("host"));
        assert_eq!(bus.history_len(), 1);
    }

    #[test]
    fn literal_subscriber_receives_matching_type_only() {
        let bus = EventBus::new(None);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = seen.clone();
        let _unsub = bus.subscribe("order:created", move |m| seen2.borrow_mut().push(m.r#type.clone()));
        bus.emit("order:created", json!({}), None);
        bus.emit("user:created", json!({}), None);
        assert_eq!(*seen.borrow(), vec!["order:created"]);
    }

    #[test]
    fn wildcard_subscriber_receives_everything() {
        let bus = EventBus::new(None);
        let count = Rc::new(Cell::new(0));
        let count2 = count.clone();
        let _unsub = bus.subscribe("*", move |_| count2.set(count2.get() + 1));
        bus.emit("a", json!({}), None);
        bus.emit("b", json!({}), None);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn regex_subscriber_matches_pattern() {
        let bus = EventBus::new(None);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = seen.clone();
        let re = regex::Regex::new(r"^order:.*$").unwrap();
        let _unsub = bus.subscribe(Topic::Regex(re), move |m| seen2.borrow_mut().push(m.r#type.clone()));
        bus.emit("order:created", json!({}), None);
        bus.emit("order:shipped", json!({}), None);
        bus.emit("user:created", json!({}), None);
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn once_auto_unsubscribes_after_first_message() {
        let bus = EventBus::new(None);
        let count = Rc::new(Cell::new(0));
        let count2 = count.clone();
        let _unsub = bus.once("ping", move |_| count2.set(count2.get() + 1));
        bus.emit("ping", json!({}), None);
        bus.emit("ping", json!({}), None);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn unsubscribe_disposer_stops_delivery() {
        let bus = EventBus::new(None);
        let count = Rc::new(Cell::new(0));
        let count2 = count.clone();
        let unsub = bus.subscribe("ping", move |_| count2.set(count2.get() + 1));
        bus.emit("ping", json!({}), None);
        unsub();
        bus.emit("ping", json!({}), None);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn only_targeted_drops_messages_for_other_apps() {
        let bus = EventBus::new(Some("app-a".into()));
        let count = Rc::new(Cell::new(0));
        let count2 = count.clone();
        let _unsub =
            bus.subscribe_with("ping", SubscribeOptions { only_targeted: true, ..Default::default() }, move |_| {
                count2.set(count2.get() + 1)
            });
        bus.send_to("app-b", "ping", json!({}));
        assert_eq!(count.get(), 0);
        bus.send_to("app-a", "ping", json!({}));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn from_source_filters_by_origin() {
        let bus = EventBus::new(Some("host".into()));
        let count = Rc::new(Cell::new(0));
        let count2 = count.clone();
        let _unsub = bus.subscribe_with(
            "ping",
            SubscribeOptions { from_source: Some("other".into()), ..Default::default() },
            move |_| count2.set(count2.get() + 1),
        );
        bus.emit("ping", json!({}), None); // source = "host", filtered out
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn unsubscribe_all_by_literal_topic_leaves_regex_for_same_text_alone() {
        let bus = EventBus::new(None);
        let _literal = bus.subscribe(Topic::literal("foo"), |_| {});
        let regex_fires = Rc::new(Cell::new(0));
        let regex_fires2 = regex_fires.clone();
        let _regex = bus.subscribe(Topic::Regex(regex::Regex::new("foo").unwrap()), move |_| {
            regex_fires2.set(regex_fires2.get() + 1)
        });
        bus.unsubscribe_all(Some(Topic::literal("foo")));
        bus.emit("foo", json!({}), None);
        assert_eq!(regex_fires.get(), 1, "regex subscription for the same topic text must survive");
    }

    #[test]
    fn unsubscribe_all_with_no_topic_clears_everything() {
        let bus = EventBus::new(None);
        let count = Rc::new(Cell::new(0));
        let count2 = count.clone();
        let _unsub = bus.subscribe("*", move |_| count2.set(count2.get() + 1));
        bus.unsubscribe_all(None);
        bus.emit("ping", json!({}), None);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn respond_emits_response_topic_with_request_id() {
        let bus = EventBus::new(None);
        let _responder = bus.respond("add", |payload| {
            let a = payload.get("a").and_then(Value::as_i64).unwrap_or(0);
            let b = payload.get("b").and_then(Value::as_i64).unwrap_or(0);
            Ok(json!(a + b))
        });
        let response = Rc::new(RefCell::new(None));
        let response2 = response.clone();
        let _unsub = bus.subscribe(
            Topic::Regex(regex::Regex::new(r"^add:response:.*$").unwrap()),
            move |m| *response2.borrow_mut() = Some(m.payload.clone()),
        );
        bus.emit("add", json!({"a": 2, "b": 3, "_requestId": "req-1"}), None);
        assert_eq!(*response.borrow(), Some(json!(5)));
    }

    #[test]
    fn respond_error_path_wraps_in_error_field() {
        let bus = EventBus::new(None);
        let _responder = bus.respond("divide", |payload| {
            let b = payload.get("b").and_then(Value::as_i64).unwrap_or(0);
            if b == 0 {
                Err("division by zero".to_string())
            } else {
                Ok(json!(payload.get("a").and_then(Value::as_i64).unwrap_or(0) / b))
            }
        });
        let response = Rc::new(RefCell::new(None));
        let response2 = response.clone();
        let _unsub = bus.subscribe(
            Topic::Regex(regex::Regex::new(r"^divide:response:.*$").unwrap()),
            move |m| *response2.borrow_mut() = Some(m.payload.clone()),
        );
        bus.emit("divide", json!({"a": 4, "b": 0, "_requestId": "req-2"}), None);
        assert_eq!(response.borrow().as_ref().unwrap()["_error"], json!("division by zero"));
    }

    #[test]
    fn replay_messages_redispatches_without_growing_history() {
        let bus = EventBus::new(None);
        bus.emit("ping", json!({}), None);
        let len_before = bus.history_len();
        let count = Rc::new(Cell::new(0));
        let count2 = count.clone();
        let _unsub = bus.subscribe("ping", move |_| count2.set(count2.get() + 1));
        bus.replay_messages(None);
        assert_eq!(count.get(), 1);
        assert_eq!(bus.history_len(), len_before);
    }

    #[test]
    fn history_is_capped_at_max_history() {
        let bus = EventBus::with_max_history(None, 3);
        for i in 0..5 {
            bus.emit("tick", json!({"i": i}), None);
        }
        assert_eq!(bus.history_len(), 3);
    }

    #[test]
    fn nested_emit_from_a_subscriber_appears_later_in_history() {
        let bus = EventBus::new(None);
        let bus2 = bus.clone();
        let _unsub = bus.subscribe("a", move |_| {
            bus2.emit("b", json!({}), None);
        });
        bus.emit("a", json!({}), None);
        let history = bus.get_message_history();
        assert_eq!(history.iter().map(|m| m.r#type.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use serde_json::json;
    use wasm_bindgen_test::wasm_bindgen_test;

    wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    async fn request_resolves_with_the_responders_value() {
        let bus = EventBus::new(None);
        let _responder = bus.respond("add", |payload| {
            let a = payload["a"].as_i64().unwrap_or(0);
            let b = payload["b"].as_i64().unwrap_or(0);
            Ok(json!(a + b))
        });

        let result = request(&bus, "add", json!({"a": 2, "b": 3}), 1_000).await;
        assert_eq!(result.unwrap(), json!(5));
    }

    #[wasm_bindgen_test]
    async fn request_resolves_ok_with_error_field_when_handler_fails() {
        let bus = EventBus::new(None);
        let _responder = bus.respond("boom", |_payload| Err("handler exploded".to_string()));

        let result = request(&bus, "boom", json!({}), 1_000).await;
        assert_eq!(result.unwrap(), json!({ "_error": "handler exploded" }));
    }

    #[wasm_bindgen_test]
    async fn request_times_out_when_nothing_responds() {
        let bus = EventBus::new(None);
        let result = request(&bus, "nobody-home", json!({}), 50).await;
        assert!(matches!(result, Err(Error::RequestTimeout { topic }) if topic == "nobody-home"));
    }
}
