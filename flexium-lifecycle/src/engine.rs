use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use serde_json::Value;

use flexium_core::{Error, OrchestratorConfig, Result};
use flexium_router::RouteMounter;

use crate::instance::{merge_props, AppConfig, AppState, AppStatus, ContainerSelector, MicroAppInstance, MountTarget};
use crate::mutex::LocalMutex;

#[cfg(target_arch = "wasm32")]
fn spawn_local_task<T: 'static>(fut: LocalBoxFuture<'static, T>) {
    wasm_bindgen_futures::spawn_local(async move {
        fut.await;
    });
}

#[cfg(not(target_arch = "wasm32"))]
fn spawn_local_task<T: 'static>(fut: LocalBoxFuture<'static, T>) {
    futures::executor::block_on(fut);
}

/// Drives every registered app through `unloaded -> loading -> loaded ->
/// bootstrapping -> loaded -> mounted -> unmounting -> loaded`.
/// Implements `RouteMounter` (on `Rc<LifecycleEngine>`) so a
/// `flexium_router::Router` can drive `mount`/`unmount` off navigation
/// without this crate depending on the router crate's navigation types.
pub struct LifecycleEngine {
    instances: RefCell<HashMap<String, Rc<RefCell<MicroAppInstance>>>>,
    order: RefCell<Vec<String>>,
    locks: RefCell<HashMap<String, Rc<LocalMutex>>>,
    config: OrchestratorConfig,
    #[cfg(target_arch = "wasm32")]
    loader: Rc<flexium_loader::RemoteLoader<wasm_bindgen::JsValue>>,
}

impl LifecycleEngine {
    pub fn new(config: OrchestratorConfig) -> Rc<Self> {
        Rc::new(Self {
            instances: RefCell::new(HashMap::new()),
            order: RefCell::new(Vec::new()),
            locks: RefCell::new(HashMap::new()),
            config,
            #[cfg(target_arch = "wasm32")]
            loader: Rc::new(flexium_loader::RemoteLoader::new()),
        })
    }

    fn lock_for(&self, name: &str) -> Rc<LocalMutex> {
        self.locks.borrow_mut().entry(name.to_string()).or_insert_with(|| Rc::new(LocalMutex::new())).clone()
    }

    fn require(&self, name: &str) -> Result<Rc<RefCell<MicroAppInstance>>> {
        self.instances.borrow().get(name).cloned().ok_or_else(|| Error::NotRegistered(name.to_string()))
    }

    /// Adds `config` to the registry in the `unloaded` state. If
    /// `load_strategy` is `Eager` and an `entry` URL is present, schedules
    /// a background `load()` (fire-and-forget; failures surface through
    /// `on_error`/`status`, not through this call's return value).
    pub fn register(self: &Rc<Self>, config: AppConfig) -> Result<Rc<RefCell<MicroAppInstance>>> {
        let name = config.name.clone();
        if self.instances.borrow().contains_key(&name) {
            return Err(Error::AlreadyRegistered(name));
        }

        let eager = matches!(config.load_strategy, crate::instance::LoadStrategy::Eager) && config.entry.is_some();
        let instance = Rc::new(RefCell::new(MicroAppInstance::new(config)));
        self.instances.borrow_mut().insert(name.clone(), instance.clone());
        self.order.borrow_mut().push(name.clone());

        if eager {
            let this = self.clone();
            spawn_local_task(Box::pin(async move {
                let _ = this.load(&name).await;
            }));
        }

        Ok(instance)
    }

    /// Unmounts `name` if mounted, then removes it from the registry.
    pub async fn unregister(self: &Rc<Self>, name: &str) -> Result<()> {
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;
        let instance = self.require(name)?;
        if instance.borrow().state == AppState::Mounted {
            self.unmount_inner(name).await?;
        }
        self.instances.borrow_mut().remove(name);
        self.order.borrow_mut().retain(|n| n != name);
        drop(_guard);
        self.locks.borrow_mut().remove(name);
        Ok(())
    }

    pub async fn load(self: &Rc<Self>, name: &str) -> Result<()> {
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;
        self.load_inner(name).await
    }

    pub async fn bootstrap(self: &Rc<Self>, name: &str) -> Result<()> {
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;
        self.bootstrap_inner(name).await
    }

    pub async fn mount(self: &Rc<Self>, name: &str, container_override: Option<ContainerSelector>) -> Result<()> {
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;
        self.mount_inner(name, container_override).await
    }

    pub async fn unmount(self: &Rc<Self>, name: &str) -> Result<()> {
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;
        self.unmount_inner(name).await
    }

    /// Merges `new_props` into the stored props and, if the lifecycle
    /// exposes an `update` hook, awaits it with the merged props. Without
    /// one, falls back to an `unmount` immediately followed by `mount`
    /// with the new props — the common "re-render via remount" idiom.
    pub async fn update(self: &Rc<Self>, name: &str, new_props: Value) -> Result<()> {
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;
        self.update_inner(name, new_props).await
    }

    pub fn status(&self, name: &str) -> Option<AppStatus> {
        self.instances.borrow().get(name).map(|instance| {
            let instance = instance.borrow();
            AppStatus { name: name.to_string(), state: instance.state.as_str(), error: instance.error.clone() }
        })
    }

    pub fn statuses(&self) -> Vec<AppStatus> {
        self.order.borrow().iter().filter_map(|name| self.status(name)).collect()
    }

    async fn load_inner(self: &Rc<Self>, name: &str) -> Result<()> {
        let instance = self.require(name)?;
        {
            let inst = instance.borrow();
            if inst.lifecycle.is_some()
                && matches!(inst.state, AppState::Loaded | AppState::Bootstrapping | AppState::Mounted | AppState::Unmounting)
            {
                return Ok(());
            }
        }

        instance.borrow_mut().state = AppState::Loading;
        self.notify_state(name, AppState::Loading);

        let (entry, inline, timeout_ms) = {
            let inst = instance.borrow();
            (inst.config.entry.clone(), inst.config.lifecycle.clone(), inst.config.load_timeout_ms)
        };

        let resolved = if let Some(lifecycle) = inline {
            Ok(lifecycle)
        } else if let Some(entry) = entry {
            self.resolve_remote(name, &entry, timeout_ms).await
        } else {
            Err(Error::NoEntryOrLifecycle(name.to_string()))
        };

        match resolved {
            Ok(lifecycle) => {
                let mut inst = instance.borrow_mut();
                inst.lifecycle = Some(lifecycle);
                inst.state = AppState::Loaded;
                drop(inst);
                self.notify_state(name, AppState::Loaded);
                Ok(())
            }
            Err(err) => {
                self.fail(name, &instance, &err);
                Err(err)
            }
        }
    }

    #[cfg(target_arch = "wasm32")]
    async fn resolve_remote(&self, name: &str, entry: &str, timeout_ms: u32) -> Result<crate::instance::Lifecycle> {
        crate::remote_load::resolve_remote_lifecycle(&self.loader, name, entry, timeout_ms).await
    }

    #[cfg(not(target_arch = "wasm32"))]
    async fn resolve_remote(&self, name: &str, _entry: &str, _timeout_ms: u32) -> Result<crate::instance::Lifecycle> {
        Err(Error::MalformedEntry(name.to_string()))
    }

    async fn bootstrap_inner(self: &Rc<Self>, name: &str) -> Result<()> {
        self.load_inner(name).await?;
        let instance = self.require(name)?;
        if instance.borrow().state != AppState::Loaded {
            return Ok(());
        }

        instance.borrow_mut().state = AppState::Bootstrapping;
        self.notify_state(name, AppState::Bootstrapping);

        let (hook, props) = {
            let inst = instance.borrow();
            (inst.lifecycle.as_ref().and_then(|l| l.bootstrap.clone()), inst.props.clone())
        };

        if let Some(hook) = hook {
            if let Err(message) = hook(props).await {
                let err = Error::HookFailure { app: name.to_string(), phase: "bootstrap", message };
                self.fail(name, &instance, &err);
                return Err(err);
            }
        }

        instance.borrow_mut().state = AppState::Loaded;
        self.notify_state(name, AppState::Loaded);
        Ok(())
    }

    async fn mount_inner(self: &Rc<Self>, name: &str, container_override: Option<ContainerSelector>) -> Result<()> {
        {
            let instance = self.require(name)?;
            if instance.borrow().state == AppState::Mounted {
                return Ok(());
            }
        }

        self.bootstrap_inner(name).await?;
        let instance = self.require(name)?;
        if instance.borrow().state != AppState::Loaded {
            return Ok(());
        }

        let target = match self.resolve_container(name, &instance, container_override) {
            Ok(target) => target,
            Err(err) => {
                self.fail(name, &instance, &err);
                return Err(err);
            }
        };

        let (hook, props) = {
            let inst = instance.borrow();
            (inst.lifecycle.as_ref().map(|l| l.mount.clone()), inst.props.clone())
        };
        let Some(hook) = hook else {
            let err = Error::MalformedEntry(name.to_string());
            self.fail(name, &instance, &err);
            return Err(err);
        };

        match hook(target.clone(), props).await {
            Ok(()) => {
                let mut inst = instance.borrow_mut();
                inst.state = AppState::Mounted;
                inst.container = Some(target);
                drop(inst);
                self.notify_state(name, AppState::Mounted);
                Ok(())
            }
            Err(message) => {
                let err = Error::HookFailure { app: name.to_string(), phase: "mount", message };
                self.fail(name, &instance, &err);
                Err(err)
            }
        }
    }

    async fn unmount_inner(self: &Rc<Self>, name: &str) -> Result<()> {
        let instance = self.require(name)?;
        if instance.borrow().state != AppState::Mounted {
            return Ok(());
        }

        instance.borrow_mut().state = AppState::Unmounting;
        self.notify_state(name, AppState::Unmounting);

        let (hook, container, props) = {
            let inst = instance.borrow();
            (inst.lifecycle.as_ref().map(|l| l.unmount.clone()), inst.container.clone(), inst.props.clone())
        };
        let Some(hook) = hook else {
            let err = Error::MalformedEntry(name.to_string());
            self.fail(name, &instance, &err);
            return Err(err);
        };
        let target = container.unwrap_or_else(|| MountTarget::Virtual(name.to_string()));

        match hook(target, props).await {
            Ok(()) => {
                self.cleanup_container(&instance);
                let mut inst = instance.borrow_mut();
                inst.state = AppState::Loaded;
                inst.container = None;
                drop(inst);
                self.notify_state(name, AppState::Loaded);
                Ok(())
            }
            Err(message) => {
                let err = Error::HookFailure { app: name.to_string(), phase: "unmount", message };
                self.fail(name, &instance, &err);
                Err(err)
            }
        }
    }

    async fn update_inner(self: &Rc<Self>, name: &str, new_props: Value) -> Result<()> {
        let instance = self.require(name)?;
        if instance.borrow().state != AppState::Mounted {
            return Err(Error::HookFailure {
                app: name.to_string(),
                phase: "update",
                message: "app is not mounted".to_string(),
            });
        }

        let merged = merge_props(&instance.borrow().props, new_props);
        instance.borrow_mut().props = merged.clone();

        let hook = instance.borrow().lifecycle.as_ref().and_then(|l| l.update.clone());
        match hook {
            Some(hook) => match hook(merged).await {
                Ok(()) => Ok(()),
                Err(message) => {
                    let err = Error::HookFailure { app: name.to_string(), phase: "update", message };
                    self.fail(name, &instance, &err);
                    Err(err)
                }
            },
            None => {
                self.unmount_inner(name).await?;
                self.mount_inner(name, None).await
            }
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn resolve_container(
        &self,
        name: &str,
        instance: &Rc<RefCell<MicroAppInstance>>,
        container_override: Option<ContainerSelector>,
    ) -> Result<MountTarget> {
        let selector = container_override
            .or_else(|| instance.borrow().config.container.clone())
            .or_else(|| self.config.default_container_selector().map(|s| ContainerSelector::Css(s.to_string())));

        match selector {
            Some(ContainerSelector::Css(selector)) => Ok(MountTarget::Virtual(selector)),
            None => Err(Error::ContainerMissing { app: name.to_string(), selector: "(none configured)".to_string() }),
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn resolve_container(
        &self,
        name: &str,
        instance: &Rc<RefCell<MicroAppInstance>>,
        container_override: Option<ContainerSelector>,
    ) -> Result<MountTarget> {
        let sandbox = instance.borrow().config.sandbox_styles;
        let selector = container_override
            .or_else(|| instance.borrow().config.container.clone())
            .or_else(|| self.config.default_container_selector().map(|s| ContainerSelector::Css(s.to_string())));

        let element = match selector {
            Some(ContainerSelector::Element(element)) => element,
            Some(ContainerSelector::Css(selector)) => {
                let document = web_sys::window()
                    .and_then(|w| w.document())
                    .ok_or_else(|| Error::ContainerMissing { app: name.to_string(), selector: selector.clone() })?;
                document
                    .query_selector(&selector)
                    .ok()
                    .flatten()
                    .ok_or_else(|| Error::ContainerMissing { app: name.to_string(), selector: selector.clone() })?
            }
            None => return Err(Error::ContainerMissing { app: name.to_string(), selector: "(none configured)".to_string() }),
        };

        if !sandbox {
            return Ok(MountTarget::Element(element));
        }

        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| Error::ContainerMissing { app: name.to_string(), selector: "document".to_string() })?;
        let isolated = flexium_style::create_isolated_container(&document, &element, name, flexium_style::ContainerConfig::default())?;
        Ok(MountTarget::Element(isolated.container))
    }

    #[cfg(target_arch = "wasm32")]
    fn cleanup_container(&self, instance: &Rc<RefCell<MicroAppInstance>>) {
        if let Some(MountTarget::Element(element)) = &instance.borrow().container {
            element.set_inner_html("");
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn cleanup_container(&self, _instance: &Rc<RefCell<MicroAppInstance>>) {}

    fn fail(&self, name: &str, instance: &Rc<RefCell<MicroAppInstance>>, err: &Error) {
        let on_error = {
            let mut inst = instance.borrow_mut();
            inst.state = AppState::Error;
            inst.error = Some(err.to_string());
            inst.config.on_error.clone()
        };
        if let Some(cb) = on_error {
            cb(err, name);
        }
        self.config.notify_error(err, Some(name));
        self.notify_state(name, AppState::Error);
        tracing::error!(app = name, error = %err, "lifecycle hook failed");
    }

    fn notify_state(&self, name: &str, state: AppState) {
        if self.config.is_debug() {
            tracing::debug!(app = name, state = state.as_str(), "lifecycle transition");
        }
        self.config.notify_state_change(name, state.as_str());
    }
}

impl RouteMounter for Rc<LifecycleEngine> {
    fn mount(&self, app_name: &str) -> LocalBoxFuture<'static, ()> {
        let this = self.clone();
        let app_name = app_name.to_string();
        Box::pin(async move {
            if let Err(err) = LifecycleEngine::mount(&this, &app_name, None).await {
                tracing::warn!(app = %app_name, error = %err, "route-driven mount failed");
            }
        })
    }

    fn unmount(&self, app_name: &str) -> LocalBoxFuture<'static, ()> {
        let this = self.clone();
        let app_name = app_name.to_string();
        Box::pin(async move {
            if let Err(err) = LifecycleEngine::unmount(&this, &app_name).await {
                tracing::warn!(app = %app_name, error = %err, "route-driven unmount failed");
            }
        })
    }

    fn is_mounted(&self, app_name: &str) -> bool {
        self.status(app_name).map(|status| status.state == "mounted").unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{ActiveWhen, Lifecycle};
    use serde_json::json;
    use std::cell::RefCell as StdRefCell;

    fn recording_lifecycle(log: Rc<StdRefCell<Vec<&'static str>>>) -> Lifecycle {
        let bootstrap_log = log.clone();
        let mount_log = log.clone();
        let unmount_log = log.clone();
        Lifecycle {
            bootstrap: Some(Rc::new(move |_props| {
                bootstrap_log.borrow_mut().push("bootstrap");
                Box::pin(async { Ok(()) })
            })),
            mount: Rc::new(move |_container, _props| {
                mount_log.borrow_mut().push("mount");
                Box::pin(async { Ok(()) })
            }),
            unmount: Rc::new(move |_container, _props| {
                unmount_log.borrow_mut().push("unmount");
                Box::pin(async { Ok(()) })
            }),
            update: None,
        }
    }

    fn config_with(name: &str, log: Rc<StdRefCell<Vec<&'static str>>>) -> AppConfig {
        AppConfig::new(name).lifecycle(recording_lifecycle(log)).container(ContainerSelector::Css("#root".to_string()))
    }

    #[test]
    fn register_starts_unloaded_and_rejects_duplicates() {
        let engine = LifecycleEngine::new(OrchestratorConfig::new());
        let log = Rc::new(StdRefCell::new(Vec::new()));
        engine.register(config_with("a", log.clone())).unwrap();
        assert_eq!(engine.status("a").unwrap().state, "unloaded");
        assert!(matches!(engine.register(config_with("a", log)), Err(Error::AlreadyRegistered(_))));
    }

    #[test]
    fn mount_runs_bootstrap_then_mount_in_order() {
        let engine = LifecycleEngine::new(OrchestratorConfig::new());
        let log = Rc::new(StdRefCell::new(Vec::new()));
        engine.register(config_with("a", log.clone())).unwrap();

        futures::executor::block_on(engine.mount("a", None)).unwrap();

        assert_eq!(*log.borrow(), vec!["bootstrap", "mount"]);
        assert_eq!(engine.status("a").unwrap().state, "mounted");
    }

    #[test]
    fn mount_is_idempotent_once_mounted() {
        let engine = LifecycleEngine::new(OrchestratorConfig::new());
        let log = Rc::new(StdRefCell::new(Vec::new()));
        engine.register(config_with("a", log.clone())).unwrap();
        futures::executor::block_on(engine.mount("a", None)).unwrap();
        futures::executor::block_on(engine.mount("a", None)).unwrap();
        assert_eq!(*log.borrow(), vec!["bootstrap", "mount"]);
    }

    #[test]
    fn unmount_then_remount_runs_hooks_again() {
        let engine = LifecycleEngine::new(OrchestratorConfig::new());
        let log = Rc::new(StdRefCell::new(Vec::new()));
        engine.register(config_with("a", log.clone())).unwrap();
        futures::executor::block_on(engine.mount("a", None)).unwrap();
        futures::executor::block_on(engine.unmount("a")).unwrap();
        assert_eq!(engine.status("a").unwrap().state, "loaded");
        futures::executor::block_on(engine.mount("a", None)).unwrap();
        assert_eq!(*log.borrow(), vec!["bootstrap", "mount", "unmount", "bootstrap", "mount"]);
    }

    #[test]
    fn mount_without_a_container_fails_with_container_missing() {
        let engine = LifecycleEngine::new(OrchestratorConfig::new());
        let log = Rc::new(StdRefCell::new(Vec::new()));
        let config = AppConfig::new("a").lifecycle(recording_lifecycle(log));
        engine.register(config).unwrap();

        let err = futures::executor::block_on(engine.mount("a", None)).unwrap_err();
        assert!(matches!(err, Error::ContainerMissing { .. }));
        assert_eq!(engine.status("a").unwrap().state, "error");
    }

    #[test]
    fn load_without_entry_or_lifecycle_fails() {
        let engine = LifecycleEngine::new(OrchestratorConfig::new());
        engine.register(AppConfig::new("a")).unwrap();
        let err = futures::executor::block_on(engine.load("a")).unwrap_err();
        assert!(matches!(err, Error::NoEntryOrLifecycle(_)));
        assert_eq!(engine.status("a").unwrap().state, "error");
    }

    #[test]
    fn hook_failure_invokes_both_app_and_orchestrator_on_error() {
        let app_seen = Rc::new(StdRefCell::new(None));
        let orchestrator_seen = Rc::new(StdRefCell::new(None));

        let app_seen2 = app_seen.clone();
        let config = AppConfig::new("a")
            .container(ContainerSelector::Css("#root".to_string()))
            .lifecycle(Lifecycle {
                bootstrap: None,
                mount: Rc::new(|_c, _p| Box::pin(async { Err("boom".to_string()) })),
                unmount: Rc::new(|_c, _p| Box::pin(async { Ok(()) })),
                update: None,
            })
            .on_error(move |err, _name| {
                *app_seen2.borrow_mut() = Some(err.to_string());
            });

        let orchestrator_seen2 = orchestrator_seen.clone();
        let engine = LifecycleEngine::new(OrchestratorConfig::new().on_error(move |err, app| {
            *orchestrator_seen2.borrow_mut() = Some((err.to_string(), app.map(str::to_string)));
        }));
        engine.register(config).unwrap();

        let err = futures::executor::block_on(engine.mount("a", None)).unwrap_err();
        assert!(matches!(err, Error::HookFailure { phase: "mount", .. }));
        assert!(app_seen.borrow().is_some());
        assert_eq!(orchestrator_seen.borrow().as_ref().unwrap().1, Some("a".to_string()));
        assert_eq!(engine.status("a").unwrap().state, "error");
    }

    #[test]
    fn update_without_a_hook_remounts() {
        let engine = LifecycleEngine::new(OrchestratorConfig::new());
        let log = Rc::new(StdRefCell::new(Vec::new()));
        engine.register(config_with("a", log.clone())).unwrap();
        futures::executor::block_on(engine.mount("a", None)).unwrap();
        futures::executor::block_on(engine.update("a", json!({"x": 1}))).unwrap();
        assert_eq!(*log.borrow(), vec!["bootstrap", "mount", "unmount", "bootstrap", "mount"]);
    }

    #[test]
    fn update_while_not_mounted_fails() {
        let engine = LifecycleEngine::new(OrchestratorConfig::new());
        let log = Rc::new(StdRefCell::new(Vec::new()));
        engine.register(config_with("a", log)).unwrap();
        let err = futures::executor::block_on(engine.update("a", json!({}))).unwrap_err();
        assert!(matches!(err, Error::HookFailure { phase: "update", .. }));
    }

    #[test]
    fn unregister_unmounts_a_mounted_app_first() {
        let engine = LifecycleEngine::new(OrchestratorConfig::new());
        let log = Rc::new(StdRefCell::new(Vec::new()));
        engine.register(config_with("a", log.clone())).unwrap();
        futures::executor::block_on(engine.mount("a", None)).unwrap();
        futures::executor::block_on(engine.unregister("a")).unwrap();
        assert_eq!(*log.borrow(), vec!["bootstrap", "mount", "unmount"]);
        assert!(engine.status("a").is_none());
    }

    #[test]
    fn statuses_reports_every_registered_app_in_registration_order() {
        let engine = LifecycleEngine::new(OrchestratorConfig::new());
        let log = Rc::new(StdRefCell::new(Vec::new()));
        engine.register(config_with("a", log.clone())).unwrap();
        engine.register(config_with("b", log)).unwrap();
        let names: Vec<_> = engine.statuses().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn route_mounter_mounts_and_unmounts_by_name() {
        let engine = LifecycleEngine::new(OrchestratorConfig::new());
        let log = Rc::new(StdRefCell::new(Vec::new()));
        engine.register(config_with("a", log.clone())).unwrap();

        futures::executor::block_on(RouteMounter::mount(&engine, "a"));
        assert!(RouteMounter::is_mounted(&engine, "a"));

        futures::executor::block_on(RouteMounter::unmount(&engine, "a"));
        assert!(!RouteMounter::is_mounted(&engine, "a"));
        assert_eq!(*log.borrow(), vec!["bootstrap", "mount", "unmount"]);
    }

    #[test]
    fn active_when_is_stored_but_not_evaluated_by_the_engine() {
        let engine = LifecycleEngine::new(OrchestratorConfig::new());
        let log = Rc::new(StdRefCell::new(Vec::new()));
        let config = config_with("a", log).active_when(ActiveWhen::Literal("/a".to_string()));
        let instance = engine.register(config).unwrap();
        assert!(instance.borrow().config.active_when.is_some());
    }
}
