use std::cell::{Cell as StdCell, RefCell};
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use serde_json::json;

use flexium_bus::EventBus;
use flexium_reactive::{batch, Cell};

use crate::guards::{AfterCallback, BeforeGuard, GuardRegistry};
use crate::location::{Location, NavigationKind};
use crate::matcher::{match_path, normalize_path};
use crate::route_table::{apply_route_transition, RouteMounter, RouteTable};

/// Physical browser navigation, abstracted so the transition algorithm in
/// [`Router`] is testable without a DOM. The real implementation
/// (`flexium_router::history::BrowserHistoryDriver` on `wasm32`) calls the
/// *original* (pre-monkey-patch) `pushState`/`replaceState` so the
/// router's own navigations never re-enter its own `popstate`/wrapped-push
/// observation path.
pub trait HistoryDriver {
    fn push(&self, path: &str);
    fn replace(&self, path: &str);
    fn back(&self);
    fn forward(&self);
    fn go(&self, delta: i32);
}

#[derive(Clone, Copy, Default)]
pub struct NavigateOptions {
    pub replace: bool,
}

fn spawn<T: 'static>(fut: LocalBoxFuture<'static, T>) {
    #[cfg(target_arch = "wasm32")]
    {
        wasm_bindgen_futures::spawn_local(async move {
            fut.await;
        });
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        futures::executor::block_on(fut);
    }
}

/// The router bridge: a single owner of navigation for the page. Owns the
/// current [`Location`] as a reactive cell, the before/after-navigate
/// guard registry, the micro-route table, and (once wired by the
/// orchestrator facade) a [`RouteMounter`] and [`HistoryDriver`].
pub struct Router {
    bus: EventBus,
    current: Cell<Location>,
    guards: Rc<GuardRegistry>,
    routes: Rc<RouteTable>,
    mounter: RefCell<Option<Rc<dyn RouteMounter>>>,
    driver: RefCell<Option<Rc<dyn HistoryDriver>>>,
    initialized: StdCell<bool>,
}

impl Router {
    pub fn new(bus: EventBus) -> Rc<Self> {
        Rc::new(Self {
            bus,
            current: Cell::new(Location::root()),
            guards: Rc::new(GuardRegistry::new()),
            routes: Rc::new(RouteTable::new()),
            mounter: RefCell::new(None),
            driver: RefCell::new(None),
            initialized: StdCell::new(false),
        })
    }

    /// The present `{pathname, search, hash, params}` snapshot, read
    /// without registering a reactive dependency.
    pub fn current(&self) -> Location {
        self.current.peek()
    }

    pub fn set_mounter(&self, mounter: Rc<dyn RouteMounter>) {
        *self.mounter.borrow_mut() = Some(mounter);
    }

    pub fn set_history_driver(&self, driver: Rc<dyn HistoryDriver>) {
        *self.driver.borrow_mut() = Some(driver);
    }

    pub fn before_navigate(self: &Rc<Self>, guard: BeforeGuard) -> impl FnOnce() {
        self.guards.before_navigate(guard)
    }

    pub fn after_navigate(self: &Rc<Self>, callback: AfterCallback) -> impl FnOnce() {
        self.guards.after_navigate(callback)
    }

    /// `match(pathname, pattern, exact)`, exposed on `Router` for parity
    /// with the reference API; delegates to the pure [`match_path`].
    pub fn match_route(&self, pathname: &str, pattern: &str, exact: bool) -> crate::matcher::MatchResult {
        match_path(pathname, pattern, exact)
    }

    /// Returns a view of this router scoped to `base_path`: relative
    /// `navigate`/`is_active`/`relative_path` for a micro app that should
    /// not need to know where the host mounted it.
    pub fn create_scoped_router(self: &Rc<Self>, base_path: impl Into<String>) -> crate::scoped::ScopedRouter {
        crate::scoped::ScopedRouter::new(self.clone(), base_path)
    }

    /// Adds `{path, app_name, exact}` to the route table and, if the
    /// current path already matches, mounts the app immediately. Returns a
    /// disposer that removes the route (but does not itself unmount).
    pub fn register_micro_route(self: &Rc<Self>, path: impl Into<String>, app_name: impl Into<String>, exact: bool) -> impl FnOnce() {
        let path = path.into();
        let app_name = app_name.into();
        let id = self.routes.register(path.clone(), app_name.clone(), exact);

        let current_path = self.current.peek().pathname;
        if match_path(&current_path, &path, exact).matched {
            if let Some(mounter) = self.mounter.borrow().clone() {
                if !mounter.is_mounted(&app_name) {
                    spawn(mounter.mount(&app_name));
                }
            }
        }

        let routes = self.routes.clone();
        move || routes.unregister(id)
    }

    /// Runs guards; if blocked, returns `false` without touching the URL.
    /// Otherwise pushes/replaces the physical history entry (if a driver is
    /// configured) and delegates to [`Self::transition`].
    pub fn navigate(self: &Rc<Self>, path: impl Into<String>, opts: NavigateOptions) -> LocalBoxFuture<'static, bool> {
        let this = self.clone();
        let path = path.into();
        Box::pin(async move {
            let kind = if opts.replace { NavigationKind::Replace } else { NavigationKind::Push };
            this.transition(path, kind, true).await
        })
    }

    pub fn back(&self) {
        if let Some(driver) = self.driver.borrow().clone() {
            driver.back();
        }
    }

    pub fn forward(&self) {
        if let Some(driver) = self.driver.borrow().clone() {
            driver.forward();
        }
    }

    pub fn go(&self, delta: i32) {
        if let Some(driver) = self.driver.borrow().clone() {
            driver.go(delta);
        }
    }

    /// Entry point for navigations the router observed rather than
    /// initiated itself: a `popstate` event, or foreign code calling the
    /// (wrapped) global `history.pushState`/`replaceState` directly. Runs
    /// the full transition without re-pushing onto history (the URL has
    /// already moved).
    pub fn handle_external_navigation(self: &Rc<Self>, path: String, kind: NavigationKind) {
        let this = self.clone();
        spawn(Box::pin(async move {
            this.transition(path, kind, false).await;
        }));
    }

    /// The navigation transition: snapshot, run guards, commit atomically,
    /// emit `router:navigate`, drive route-table mount/unmount, fire
    /// after-callbacks. `push_physically` is `true` only for
    /// router-initiated navigations (`navigate()`); navigations the router
    /// merely observed (`handle_external_navigation`) must not re-push.
    async fn transition(self: &Rc<Self>, to_path: String, kind: NavigationKind, push_physically: bool) -> bool {
        let from = self.current.peek();
        let passed = self.guards.run_before(&to_path, &from.pathname).await;
        if !passed {
            if !push_physically {
                if let Some(driver) = self.driver.borrow().clone() {
                    driver.replace(&from.pathname);
                }
            }
            return false;
        }

        if push_physically {
            if let Some(driver) = self.driver.borrow().clone() {
                match kind {
                    NavigationKind::Replace => driver.replace(&to_path),
                    _ => driver.push(&to_path),
                }
            }
        }

        let pathname = normalize_path(&to_path);
        let params = self
            .routes
            .routes()
            .iter()
            .find_map(|route| {
                let matched = match_path(&pathname, &route.path, route.exact);
                matched.matched.then_some(matched.params)
            })
            .unwrap_or_default();

        let new_location = Location { pathname: pathname.clone(), search: String::new(), hash: String::new(), params: params.clone() };
        let current_cell = self.current.clone();
        let committed = new_location.clone();
        batch(move || current_cell.set(committed));

        self.bus.emit(
            "router:navigate",
            json!({ "from": from.pathname, "to": pathname, "params": params, "type": kind.as_str() }),
            None,
        );

        let pending = apply_route_transition(&self.routes, self.mounter.borrow().clone(), &new_location.pathname);
        for fut in pending {
            spawn(fut);
        }

        self.guards.run_after(&new_location, &from, kind);
        true
    }

    /// Subscribes to `popstate` and monkey-patches `history.pushState`/
    /// `replaceState` (wasm32 only; a no-op elsewhere). Idempotent: a
    /// second call before the first's cleanup runs is a no-op. Returns a
    /// cleanup that restores the originals and removes the listener.
    #[cfg(target_arch = "wasm32")]
    pub fn init(self: &Rc<Self>) -> Box<dyn FnOnce()> {
        if self.initialized.get() {
            return Box::new(|| {});
        }
        self.initialized.set(true);

        let this = self.clone();
        let on_change: Rc<dyn Fn(String, NavigationKind)> =
            Rc::new(move |path, kind| this.handle_external_navigation(path, kind));

        let Some(bridge) = crate::history::HistoryBridge::install(on_change) else {
            self.initialized.set(false);
            return Box::new(|| {});
        };

        self.set_history_driver(Rc::new(bridge.driver()));

        if let Some(window) = web_sys::window() {
            let pathname = window.location().pathname().unwrap_or_else(|_| "/".to_string());
            self.handle_external_navigation(pathname, NavigationKind::Push);
        }

        let this_for_cleanup = self.clone();
        Box::new(move || {
            bridge.uninstall();
            this_for_cleanup.initialized.set(false);
        })
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn init(self: &Rc<Self>) -> Box<dyn FnOnce()> {
        Box::new(|| {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;
    use std::collections::HashSet;
    use futures_util::FutureExt;

    struct RecordingDriver {
        pushes: StdRefCell<Vec<String>>,
        replaces: StdRefCell<Vec<String>>,
    }

    impl RecordingDriver {
        fn new() -> Rc<Self> {
            Rc::new(Self { pushes: StdRefCell::new(Vec::new()), replaces: StdRefCell::new(Vec::new()) })
        }
    }

    impl HistoryDriver for RecordingDriver {
        fn push(&self, path: &str) {
            self.pushes.borrow_mut().push(path.to_string());
        }
        fn replace(&self, path: &str) {
            self.replaces.borrow_mut().push(path.to_string());
        }
        fn back(&self) {}
        fn forward(&self) {}
        fn go(&self, _delta: i32) {}
    }

    struct FakeMounter {
        mounted: StdRefCell<HashSet<String>>,
    }

    impl FakeMounter {
        fn new() -> Rc<Self> {
            Rc::new(Self { mounted: StdRefCell::new(HashSet::new()) })
        }
    }

    impl RouteMounter for FakeMounter {
        fn mount(&self, app_name: &str) -> LocalBoxFuture<'static, ()> {
            self.mounted.borrow_mut().insert(app_name.to_string());
            futures_util::future::ready(()).boxed_local()
        }
        fn unmount(&self, app_name: &str) -> LocalBoxFuture<'static, ()> {
            self.mounted.borrow_mut().remove(app_name);
            futures_util::future::ready(()).boxed_local()
        }
        fn is_mounted(&self, app_name: &str) -> bool {
            self.mounted.borrow().contains(app_name)
        }
    }

    #[test]
    fn navigate_commits_location_and_emits_router_navigate() {
        let bus = EventBus::new(None);
        let router = Router::new(bus.clone());
        let driver = RecordingDriver::new();
        router.set_history_driver(driver.clone());

        let ok = futures::executor::block_on(router.navigate("/a", NavigateOptions::default()));
        assert!(ok);
        assert_eq!(router.current().pathname, "/a");
        assert_eq!(*driver.pushes.borrow(), vec!["/a".to_string()]);

        let history = bus.get_message_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].r#type, "router:navigate");
        assert_eq!(history[0].payload["to"], "/a");
        assert_eq!(history[0].payload["type"], "push");
    }

    #[test]
    fn guard_returning_false_blocks_navigation_and_does_not_emit() {
        let bus = EventBus::new(None);
        let router = Router::new(bus.clone());
        let _dispose = router.before_navigate(Rc::new(|_to, _from| futures_util::future::ready(false).boxed_local()));

        let ok = futures::executor::block_on(router.navigate("/y", NavigateOptions::default()));
        assert!(!ok);
        assert_eq!(router.current().pathname, "/", "pathname must be unchanged after a blocked navigation");
        assert!(bus.get_message_history().is_empty());
    }

    #[test]
    fn route_driven_mount_fires_on_matching_navigation() {
        let bus = EventBus::new(None);
        let router = Router::new(bus);
        let mounter = FakeMounter::new();
        router.set_mounter(mounter.clone());
        let _dispose = router.register_micro_route("/a", "app-a", true);

        futures::executor::block_on(router.navigate("/a", NavigateOptions::default()));
        assert!(mounter.is_mounted("app-a"));
    }

    #[test]
    fn navigating_away_unmounts_previously_matched_app() {
        let bus = EventBus::new(None);
        let router = Router::new(bus);
        let mounter = FakeMounter::new();
        router.set_mounter(mounter.clone());
        let _dispose = router.register_micro_route("/a", "app-a", true);

        futures::executor::block_on(router.navigate("/a", NavigateOptions::default()));
        assert!(mounter.is_mounted("app-a"));
        futures::executor::block_on(router.navigate("/b", NavigateOptions::default()));
        assert!(!mounter.is_mounted("app-a"));
    }

    #[test]
    fn register_micro_route_mounts_immediately_when_current_path_already_matches() {
        let bus = EventBus::new(None);
        let router = Router::new(bus);
        let mounter = FakeMounter::new();
        router.set_mounter(mounter.clone());

        futures::executor::block_on(router.navigate("/a", NavigateOptions::default()));
        let _dispose = router.register_micro_route("/a", "app-a", true);
        assert!(mounter.is_mounted("app-a"), "registering a route matching the current path must mount immediately");
    }

    #[test]
    fn external_navigation_blocked_by_a_guard_rolls_back_via_replace() {
        let bus = EventBus::new(None);
        let router = Router::new(bus);
        let driver = RecordingDriver::new();
        router.set_history_driver(driver.clone());
        futures::executor::block_on(router.navigate("/start", NavigateOptions::default()));
        driver.pushes.borrow_mut().clear();

        let _dispose = router.before_navigate(Rc::new(|_to, _from| futures_util::future::ready(false).boxed_local()));
        router.handle_external_navigation("/blocked".to_string(), NavigationKind::Pop);

        assert_eq!(router.current().pathname, "/start");
        assert_eq!(*driver.replaces.borrow(), vec!["/start".to_string()]);
    }

    #[test]
    fn params_are_populated_from_the_first_matching_route() {
        let bus = EventBus::new(None);
        let router = Router::new(bus);
        let mounter = FakeMounter::new();
        router.set_mounter(mounter);
        let _dispose = router.register_micro_route("/orders/:id", "orders-app", true);

        futures::executor::block_on(router.navigate("/orders/42", NavigateOptions::default()));
        assert_eq!(router.current().params.get("id"), Some(&"42".to_string()));
    }
}
