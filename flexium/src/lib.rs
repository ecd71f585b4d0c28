//! Flexium — a browser-side micro-frontend orchestrator.
//!
//! This is the thin façade: it wires the leaf crates (`flexium-style`,
//! `flexium-bus`, `flexium-state`, `flexium-loader`, `flexium-router`,
//! `flexium-lifecycle`) behind one [`Orchestrator`], sharing a single
//! [`flexium_core::OrchestratorConfig`]. Apps depend on this crate alone;
//! the sub-crates stay independently testable and independently embeddable
//! via `EventBus::new`/`StateRegistry::new`/`Router::new` directly,
//! bypassing the façade, when a host wants more than one isolated
//! orchestrator instance on the same page.

use std::rc::Rc;

use serde_json::Value;

pub use flexium_core::{self as core, Error, OrchestratorConfig, Result};
pub use flexium_reactive as reactive;
pub use flexium_style as style;

pub use flexium_bus::{self as bus, BusMessage, Channel, EventBus, SubscribeOptions, Topic};
pub use flexium_state::{self as state, KeyInfo, Reader, SharedOptions, StateRegistry, StateStore, Writer};
pub use flexium_loader as loader;
pub use flexium_router::{
    self as router, AfterCallback, BeforeGuard, HistoryDriver, Location, MatchResult, NavigateOptions, NavigationKind,
    Router, ScopedRouter,
};
pub use flexium_lifecycle::{
    self as lifecycle, ActiveWhen, AppConfig, AppState, AppStatus, ContainerSelector, Lifecycle, LifecycleEngine,
    LoadStrategy, MountHook, MountTarget, PropsHook,
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsValue;

#[cfg(target_arch = "wasm32")]
type RemoteValue = JsValue;
#[cfg(not(target_arch = "wasm32"))]
type RemoteValue = ();

/// The orchestrator process: one app registry, one bus, one shared-state
/// registry, one remote-module cache, one router, bundled behind a
/// builder-constructed facade instead of module-level statics (so a host
/// can run more than one, see the module doc above).
pub struct Orchestrator {
    config: OrchestratorConfig,
    lifecycle: Rc<LifecycleEngine>,
    router: Rc<Router>,
    bus: EventBus,
    state: StateRegistry,
    #[cfg(target_arch = "wasm32")]
    loader: Rc<flexium_loader::RemoteLoader<RemoteValue>>,
    predicate_apps: std::cell::RefCell<Vec<(String, ActiveWhen)>>,
    router_cleanup: std::cell::RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Orchestrator {
    /// Builds a fresh orchestrator from `config`. Does not touch the DOM or
    /// `history` yet — call [`Orchestrator::init`] once the host page is
    /// ready to hand over navigation.
    pub fn new(config: OrchestratorConfig) -> Rc<Self> {
        flexium_core::logging::init();

        let bus = EventBus::new(config.app_name_ref().map(str::to_string));
        let state = StateRegistry::new();
        let lifecycle = LifecycleEngine::new(config.clone());
        let router = Router::new(bus.clone());
        // `RouteMounter` is implemented on `Rc<LifecycleEngine>` itself (see
        // flexium-lifecycle), so the unsizing coercion needs one more level
        // of indirection to reach `Rc<dyn RouteMounter>`.
        router.set_mounter(Rc::new(lifecycle.clone()) as Rc<dyn flexium_router::RouteMounter>);

        let this = Rc::new(Self {
            config,
            lifecycle,
            router,
            bus,
            state,
            #[cfg(target_arch = "wasm32")]
            loader: Rc::new(flexium_loader::RemoteLoader::new()),
            predicate_apps: std::cell::RefCell::new(Vec::new()),
            router_cleanup: std::cell::RefCell::new(None),
        });

        let predicate_watcher = this.clone();
        let _after = this.router.after_navigate(Rc::new(move |to, _from, _kind| {
            predicate_watcher.evaluate_predicate_apps(to);
        }));
        // Deliberately leaked: this callback lives for the orchestrator's
        // whole lifetime, same as the app registry and bus it drives.
        std::mem::forget(_after);

        this
    }

    // ---- lifecycle -----------------------------------------------------

    /// Registers `config`. If `config.active_when` is a literal prefix (or
    /// list of prefixes), also registers the corresponding micro-route(s)
    /// so navigation drives mount/unmount; a `Predicate` is instead
    /// evaluated on every committed navigation (see `evaluate_predicate_apps`)
    /// since it has no router pattern to register.
    pub fn register(self: &Rc<Self>, config: AppConfig) -> Result<()> {
        let name = config.name.clone();
        let active_when = config.active_when.clone();
        self.lifecycle.register(config)?;

        match active_when {
            Some(ActiveWhen::Literal(path)) => {
                self.router.register_micro_route(path, name, false);
            }
            Some(ActiveWhen::AnyOf(paths)) => {
                for path in paths {
                    self.router.register_micro_route(path, name.clone(), false);
                }
            }
            Some(predicate @ ActiveWhen::Predicate(_)) => {
                self.predicate_apps.borrow_mut().push((name, predicate));
            }
            None => {}
        }
        Ok(())
    }

    fn evaluate_predicate_apps(self: &Rc<Self>, to: &Location) {
        let apps: Vec<(String, bool)> = self
            .predicate_apps
            .borrow()
            .iter()
            .map(|(name, active_when)| (name.clone(), active_when.matches(to)))
            .collect();

        for (name, should_be_mounted) in apps {
            let is_mounted = self.lifecycle.status(&name).map(|s| s.state == "mounted").unwrap_or(false);
            let lifecycle = self.lifecycle.clone();
            let name2 = name.clone();
            if should_be_mounted && !is_mounted {
                spawn(async move {
                    if let Err(err) = lifecycle.mount(&name2, None).await {
                        tracing::warn!(app = %name2, error = %err, "predicate-driven mount failed");
                    }
                });
            } else if !should_be_mounted && is_mounted {
                spawn(async move {
                    if let Err(err) = lifecycle.unmount(&name2).await {
                        tracing::warn!(app = %name2, error = %err, "predicate-driven unmount failed");
                    }
                });
            }
        }
    }

    pub async fn unregister(self: &Rc<Self>, name: &str) -> Result<()> {
        self.lifecycle.unregister(name).await
    }

    pub async fn load(self: &Rc<Self>, name: &str) -> Result<()> {
        self.lifecycle.load(name).await
    }

    pub async fn bootstrap(self: &Rc<Self>, name: &str) -> Result<()> {
        self.lifecycle.bootstrap(name).await
    }

    pub async fn mount(self: &Rc<Self>, name: &str) -> Result<()> {
        self.lifecycle.mount(name, None).await
    }

    pub async fn mount_into(self: &Rc<Self>, name: &str, container: ContainerSelector) -> Result<()> {
        self.lifecycle.mount(name, Some(container)).await
    }

    pub async fn unmount(self: &Rc<Self>, name: &str) -> Result<()> {
        self.lifecycle.unmount(name).await
    }

    pub async fn update(self: &Rc<Self>, name: &str, props: Value) -> Result<()> {
        self.lifecycle.update(name, props).await
    }

    pub fn status(&self, name: &str) -> Option<AppStatus> {
        self.lifecycle.status(name)
    }

    pub fn statuses(&self) -> Vec<AppStatus> {
        self.lifecycle.statuses()
    }

    // ---- router ---------------------------------------------------------

    /// Hands navigation over to this orchestrator: subscribes to
    /// `popstate`, monkey-patches `history.pushState`/`replaceState`, and
    /// runs an initial route evaluation. Returns a cleanup that restores
    /// the originals; also stashed internally so a repeat `init()` call is
    /// a safe no-op until that cleanup runs.
    pub fn init(self: &Rc<Self>) {
        if self.router_cleanup.borrow().is_some() {
            return;
        }
        let cleanup = self.router.init();
        *self.router_cleanup.borrow_mut() = Some(cleanup);
    }

    /// Restores the original `history` methods and detaches `popstate`.
    pub fn shutdown(self: &Rc<Self>) {
        if let Some(cleanup) = self.router_cleanup.borrow_mut().take() {
            cleanup();
        }
    }

    pub fn navigate(self: &Rc<Self>, path: impl Into<String>) -> futures_util::future::LocalBoxFuture<'static, bool> {
        self.router.navigate(path, NavigateOptions::default())
    }

    pub fn navigate_with(self: &Rc<Self>, path: impl Into<String>, opts: NavigateOptions) -> futures_util::future::LocalBoxFuture<'static, bool> {
        self.router.navigate(path, opts)
    }

    pub fn back(&self) {
        self.router.back();
    }

    pub fn forward(&self) {
        self.router.forward();
    }

    pub fn go(&self, delta: i32) {
        self.router.go(delta);
    }

    pub fn before_navigate(self: &Rc<Self>, guard: BeforeGuard) -> impl FnOnce() {
        self.router.before_navigate(guard)
    }

    pub fn after_navigate(self: &Rc<Self>, callback: AfterCallback) -> impl FnOnce() {
        self.router.after_navigate(callback)
    }

    pub fn current_location(&self) -> Location {
        self.router.current()
    }

    pub fn register_micro_route(self: &Rc<Self>, path: impl Into<String>, app_name: impl Into<String>, exact: bool) -> impl FnOnce() {
        self.router.register_micro_route(path, app_name, exact)
    }

    pub fn create_scoped_router(self: &Rc<Self>, base_path: impl Into<String>) -> ScopedRouter {
        self.router.create_scoped_router(base_path)
    }

    // ---- bus --------------------------------------------------------------

    pub fn emit(&self, r#type: impl Into<String>, payload: Value) -> BusMessage {
        self.bus.emit(r#type, payload, None)
    }

    pub fn send_to(&self, target: impl Into<String>, r#type: impl Into<String>, payload: Value) -> BusMessage {
        self.bus.send_to(target, r#type, payload)
    }

    pub fn subscribe(&self, topic: impl Into<Topic>, handler: impl FnMut(&BusMessage) + 'static) -> impl FnOnce() {
        self.bus.subscribe(topic, handler)
    }

    pub fn once(&self, topic: impl Into<Topic>, handler: impl FnMut(&BusMessage) + 'static) -> impl FnOnce() {
        self.bus.once(topic, handler)
    }

    pub fn respond(&self, topic: impl Into<String>, handler: impl FnMut(&Value) -> std::result::Result<Value, String> + 'static) -> impl FnOnce() {
        self.bus.respond(topic, handler)
    }

    /// `request()` needs a browser timer (`gloo_timers`) for its timeout
    /// race, so — like the rest of the remote-loader surface — it only
    /// exists on `wasm32`; native code drives request/response directly
    /// with `respond`/`subscribe` (see `flexium-bus`'s own tests).
    #[cfg(target_arch = "wasm32")]
    pub async fn request(&self, r#type: impl Into<String>, payload: Value, timeout_ms: u32) -> Result<Value> {
        flexium_bus::request(&self.bus, r#type, payload, timeout_ms).await
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn create_channel(&self, prefix: impl Into<String>) -> Channel {
        flexium_bus::create_channel(&self.bus, prefix)
    }

    // ---- shared state -------------------------------------------------------

    pub fn shared(&self, key: &str, initial: Value, opts: SharedOptions, caller_app: Option<&str>) -> (Reader, Writer) {
        self.state.shared(key, initial, opts, caller_app)
    }

    pub fn get_shared(&self, key: &str) -> Option<Value> {
        self.state.get(key)
    }

    pub fn set_shared(&self, key: &str, updater: impl FnOnce(&Value) -> Value) {
        self.state.set(key, updater);
    }

    pub fn delete_shared(&self, key: &str) {
        self.state.delete(key);
    }

    pub fn watch_shared(&self, key: &str, callback: impl FnMut(&Value, &Value) + 'static) -> Box<dyn FnOnce()> {
        self.state.watch(key, callback)
    }

    pub fn shared_keys(&self) -> Vec<String> {
        self.state.keys()
    }

    pub fn shared_info(&self, key: &str) -> Option<KeyInfo> {
        self.state.info(key)
    }

    pub fn create_state_store(&self, namespace: impl Into<String>, initial: std::collections::HashMap<String, Value>, persist: bool) -> StateStore {
        flexium_state::create_state_store(&self.state, namespace, initial, persist)
    }

    pub fn create_state_snapshot(&self) -> std::collections::HashMap<String, Value> {
        flexium_state::create_state_snapshot(&self.state)
    }

    pub fn restore_state_snapshot(&self, snapshot: std::collections::HashMap<String, Value>) -> Vec<String> {
        flexium_state::restore_state_snapshot(&self.state, snapshot)
    }

    #[cfg(target_arch = "wasm32")]
    pub fn enable_cross_tab_sync(&self, whitelist: Option<Vec<String>>) -> Box<dyn FnOnce()> {
        flexium_state::enable_cross_tab_sync(self.state.clone(), whitelist)
    }

    pub fn state_registry(&self) -> &StateRegistry {
        &self.state
    }

    // ---- remote loader (wasm32 only — no DOM/module loader elsewhere) -----

    #[cfg(target_arch = "wasm32")]
    pub fn init_federation(
        &self,
        name: impl Into<String>,
        remotes: Vec<flexium_loader::RemoteSpec>,
        shared: Vec<(String, flexium_loader::SharedModuleSpec<RemoteValue>)>,
    ) {
        for remote in self.loader.init_federation(name, remotes, shared) {
            let loader = self.loader.clone();
            spawn(async move {
                if let Err(err) = flexium_loader::load_remote(&loader, remote, None).await {
                    tracing::warn!(error = %err, "background remote preload failed");
                }
            });
        }
    }

    #[cfg(target_arch = "wasm32")]
    pub async fn load_remote(&self, spec: flexium_loader::RemoteSpec, timeout_ms: Option<u32>) -> Result<Rc<flexium_loader::RemoteContainer<RemoteValue>>> {
        flexium_loader::load_remote(&self.loader, spec, timeout_ms).await
    }

    #[cfg(target_arch = "wasm32")]
    pub async fn import_federated(&self, path: &str) -> Result<RemoteValue> {
        flexium_loader::import_federated(&self.loader, path).await
    }

    #[cfg(target_arch = "wasm32")]
    pub fn expose_modules(&self, modules: std::collections::HashMap<String, RemoteValue>) {
        self.loader.expose_modules(modules);
    }

    #[cfg(target_arch = "wasm32")]
    pub fn get_exposed_module(&self, name: &str) -> Option<RemoteValue> {
        self.loader.get_exposed_module(name)
    }

    #[cfg(target_arch = "wasm32")]
    pub fn preload_remotes(&self, urls: &[String]) {
        flexium_loader::preload_remotes(urls);
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }
}

fn spawn<F: std::future::Future<Output = ()> + 'static>(fut: F) {
    #[cfg(target_arch = "wasm32")]
    {
        wasm_bindgen_futures::spawn_local(fut);
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        futures::executor::block_on(fut);
    }
}

/// Convenience re-exports for `use flexium::prelude::*`.
pub mod prelude {
    pub use crate::{
        ActiveWhen, AppConfig, AppState, AppStatus, ContainerSelector, Error, Lifecycle, LifecycleEngine, Location,
        NavigateOptions, Orchestrator, OrchestratorConfig, Result, SharedOptions,
    };
}
