use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use serde_json::Value;

use flexium_router::{match_path, Location};

/// The lifecycle state machine's seven states. Legal transitions:
/// `unloaded -> loading -> loaded -> bootstrapping -> loaded -> mounted
/// -> unmounting -> loaded`, with any hook failure moving straight to
/// `error` from whichever state it was raised in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppState {
    Unloaded,
    Loading,
    Loaded,
    Bootstrapping,
    Mounted,
    Unmounting,
    Error,
}

impl AppState {
    pub fn as_str(self) -> &'static str {
        match self {
            AppState::Unloaded => "unloaded",
            AppState::Loading => "loading",
            AppState::Loaded => "loaded",
            AppState::Bootstrapping => "bootstrapping",
            AppState::Mounted => "mounted",
            AppState::Unmounting => "unmounting",
            AppState::Error => "error",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadStrategy {
    Eager,
    Lazy,
}

impl Default for LoadStrategy {
    fn default() -> Self {
        LoadStrategy::Lazy
    }
}

/// `activeWhen`: a literal prefix, any of a list of prefixes, or an
/// arbitrary predicate over the router's current location. Registration
/// only stores this — translating it into mount/unmount decisions is the
/// orchestrator facade's job (it either feeds literals into
/// `Router::register_micro_route` or evaluates a predicate itself off
/// `Router::after_navigate`), keeping this crate router-agnostic beyond
/// the `RouteMounter` seam.
#[derive(Clone)]
pub enum ActiveWhen {
    Literal(String),
    AnyOf(Vec<String>),
    Predicate(Rc<dyn Fn(&Location) -> bool>),
}

impl ActiveWhen {
    pub fn matches(&self, location: &Location) -> bool {
        match self {
            ActiveWhen::Literal(prefix) => match_path(&location.pathname, prefix, false).matched,
            ActiveWhen::AnyOf(prefixes) => prefixes.iter().any(|p| match_path(&location.pathname, p, false).matched),
            ActiveWhen::Predicate(predicate) => predicate(location),
        }
    }
}

/// Where `mount` resolved an app's container to. `Virtual` stands in for
/// a real DOM element — used by native tests, and as the fallback
/// `unmount` target if a container was never recorded.
#[derive(Clone)]
pub enum MountTarget {
    #[cfg(target_arch = "wasm32")]
    Element(web_sys::Element),
    Virtual(String),
}

type HookResult = std::result::Result<(), String>;

/// `(container, props) -> Promise<void>`-shaped hook, used for `mount`/`unmount`.
pub type MountHook = Rc<dyn Fn(MountTarget, Value) -> LocalBoxFuture<'static, HookResult>>;
/// `(props) -> Promise<void>`-shaped hook, used for `bootstrap`/`update`.
pub type PropsHook = Rc<dyn Fn(Value) -> LocalBoxFuture<'static, HookResult>>;

/// The four lifecycle hooks a micro app exposes, either supplied inline
/// via `AppConfig::lifecycle` or resolved from a loaded remote entry's
/// `mount`/`unmount`/`bootstrap?`/`update?` exports.
#[derive(Clone)]
pub struct Lifecycle {
    pub bootstrap: Option<PropsHook>,
    pub mount: MountHook,
    pub unmount: MountHook,
    pub update: Option<PropsHook>,
}

/// A `mount()` container override, or the selector an `AppConfig` was
/// registered with.
#[derive(Clone)]
pub enum ContainerSelector {
    Css(String),
    #[cfg(target_arch = "wasm32")]
    Element(web_sys::Element),
}

/// Registration input for `LifecycleEngine::register`.
#[derive(Clone)]
pub struct AppConfig {
    pub name: String,
    pub entry: Option<String>,
    pub lifecycle: Option<Lifecycle>,
    pub container: Option<ContainerSelector>,
    pub active_when: Option<ActiveWhen>,
    pub props: Value,
    pub load_strategy: LoadStrategy,
    pub load_timeout_ms: u32,
    pub sandbox_styles: bool,
    pub on_error: Option<Rc<dyn Fn(&flexium_core::Error, &str)>>,
}

impl AppConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry: None,
            lifecycle: None,
            container: None,
            active_when: None,
            props: Value::Object(serde_json::Map::new()),
            load_strategy: LoadStrategy::default(),
            load_timeout_ms: 30_000,
            sandbox_styles: false,
            on_error: None,
        }
    }

    pub fn entry(mut self, url: impl Into<String>) -> Self {
        self.entry = Some(url.into());
        self
    }

    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn container(mut self, selector: ContainerSelector) -> Self {
        self.container = Some(selector);
        self
    }

    pub fn active_when(mut self, active_when: ActiveWhen) -> Self {
        self.active_when = Some(active_when);
        self
    }

    pub fn props(mut self, props: Value) -> Self {
        self.props = props;
        self
    }

    pub fn load_strategy(mut self, strategy: LoadStrategy) -> Self {
        self.load_strategy = strategy;
        self
    }

    pub fn load_timeout_ms(mut self, ms: u32) -> Self {
        self.load_timeout_ms = ms;
        self
    }

    pub fn sandbox_styles(mut self, sandbox: bool) -> Self {
        self.sandbox_styles = sandbox;
        self
    }

    pub fn on_error(mut self, cb: impl Fn(&flexium_core::Error, &str) + 'static) -> Self {
        self.on_error = Some(Rc::new(cb));
        self
    }
}

/// A registered app's live record: its config, current state, merged
/// props, resolved container (once mounted), and last error message.
pub struct MicroAppInstance {
    pub config: AppConfig,
    pub state: AppState,
    pub lifecycle: Option<Lifecycle>,
    pub props: Value,
    pub container: Option<MountTarget>,
    pub error: Option<String>,
}

impl MicroAppInstance {
    pub fn new(config: AppConfig) -> Self {
        let props = config.props.clone();
        Self { config, state: AppState::Unloaded, lifecycle: None, props, container: None, error: None }
    }
}

/// Reflection snapshot returned by `LifecycleEngine::status`/`statuses`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppStatus {
    pub name: String,
    pub state: &'static str,
    pub error: Option<String>,
}

pub(crate) fn merge_props(base: &Value, incoming: Value) -> Value {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(incoming_map)) => {
            let mut merged = base_map.clone();
            for (key, value) in incoming_map {
                merged.insert(key, value);
            }
            Value::Object(merged)
        }
        (_, incoming) => incoming,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_props_overlays_object_keys() {
        let base = json!({"a": 1, "b": 2});
        let merged = merge_props(&base, json!({"b": 3, "c": 4}));
        assert_eq!(merged, json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn merge_props_replaces_when_incoming_is_not_an_object() {
        let base = json!({"a": 1});
        let merged = merge_props(&base, json!("replaced"));
        assert_eq!(merged, json!("replaced"));
    }

    #[test]
    fn active_when_literal_is_a_prefix_match() {
        let active = ActiveWhen::Literal("/shop".to_string());
        let loc = Location { pathname: "/shop/cart".to_string(), ..Location::default() };
        assert!(active.matches(&loc));
        let other = Location { pathname: "/other".to_string(), ..Location::default() };
        assert!(!active.matches(&other));
    }

    #[test]
    fn active_when_any_of_matches_if_one_prefix_matches() {
        let active = ActiveWhen::AnyOf(vec!["/shop".to_string(), "/cart".to_string()]);
        let loc = Location { pathname: "/cart/5".to_string(), ..Location::default() };
        assert!(active.matches(&loc));
    }

    #[test]
    fn active_when_predicate_delegates_to_the_closure() {
        let active = ActiveWhen::Predicate(Rc::new(|loc: &Location| loc.pathname == "/only"));
        let loc = Location { pathname: "/only".to_string(), ..Location::default() };
        assert!(active.matches(&loc));
        let other = Location { pathname: "/other".to_string(), ..Location::default() };
        assert!(!active.matches(&other));
    }
}
