use std::cell::{RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;

use crate::container::{RemoteContainer, RemoteFormat};
use crate::shared::{SharedModuleRegistry, SharedModuleSpec};

#[derive(Clone)]
pub struct RemoteSpec {
    pub name: String,
    pub url: String,
    pub format: RemoteFormat,
    /// The global `window[global_name]` the exports live under once the
    /// `<script>` tag loads. Only consulted for `Umd`/`Global` formats;
    /// `esm`/`system` resolve their exports from the import itself.
    pub global_name: String,
}

impl RemoteSpec {
    /// Convenience for `esm`/`system` remotes, which never read `global_name`.
    pub fn new(name: impl Into<String>, url: impl Into<String>, format: RemoteFormat) -> Self {
        let name = name.into();
        Self { global_name: name.clone(), name, url: url.into(), format }
    }
}

/// Host-side federation state: registered remotes, the shared-module
/// singleton registry, and this host's outward-facing exposed modules.
///
/// Generic over `T`, the loaded-module representation — production code
/// instantiates this with a JS value type; the bookkeeping here (registry
/// wiring, memoization, exposed-module lookup) is exercised with a plain
/// stub type in tests.
pub struct RemoteLoader<T> {
    host_name: RefCell<Option<String>>,
    containers: RefCell<HashMap<String, Rc<RemoteContainer<T>>>>,
    shared: RefCell<SharedModuleRegistry<T>>,
    exposed: RefCell<HashMap<String, T>>,
}

impl<T: Clone> Default for RemoteLoader<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> RemoteLoader<T> {
    pub fn new() -> Self {
        Self {
            host_name: RefCell::new(None),
            containers: RefCell::new(HashMap::new()),
            shared: RefCell::new(SharedModuleRegistry::new()),
            exposed: RefCell::new(HashMap::new()),
        }
    }

    /// Records host config, registers every `shared` entry, and
    /// pre-creates an (unloaded) container per remote. Returns the list of
    /// remotes so the caller can kick off their background loads — this
    /// type has no executor of its own.
    pub fn init_federation(
        &self,
        name: impl Into<String>,
        remotes: Vec<RemoteSpec>,
        shared: Vec<(String, SharedModuleSpec<T>)>,
    ) -> Vec<RemoteSpec> {
        *self.host_name.borrow_mut() = Some(name.into());
        {
            let mut registry = self.shared.borrow_mut();
            for (module_name, spec) in shared {
                registry.register(module_name, spec);
            }
        }
        for remote in &remotes {
            self.register_remote(remote.clone());
        }
        remotes
    }

    pub fn host_name(&self) -> Option<String> {
        self.host_name.borrow().clone()
    }

    /// Returns the existing container for `name`, or creates a new
    /// (unloaded) one — `loadRemote` is memoized per name via this map.
    pub fn register_remote(&self, spec: RemoteSpec) -> Rc<RemoteContainer<T>> {
        self.containers
            .borrow_mut()
            .entry(spec.name.clone())
            .or_insert_with(|| Rc::new(RemoteContainer::new(spec.name, spec.url, spec.format)))
            .clone()
    }

    pub fn container(&self, name: &str) -> Option<Rc<RemoteContainer<T>>> {
        self.containers.borrow().get(name).cloned()
    }

    pub fn expose_modules(&self, modules: HashMap<String, T>) {
        self.exposed.borrow_mut().extend(modules);
    }

    pub fn get_exposed_module(&self, name: &str) -> Option<T> {
        self.exposed.borrow().get(name).cloned()
    }

    pub fn share_scope(&self) -> HashMap<String, T> {
        self.shared.borrow().share_scope()
    }

    pub fn shared_registry_mut(&self) -> RefMut<'_, SharedModuleRegistry<T>> {
        self.shared.borrow_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::SharedModuleSpec;

    #[test]
    fn init_federation_registers_shared_modules_and_remote_containers() {
        let loader: RemoteLoader<u32> = RemoteLoader::new();
        loader.init_federation(
            "host",
            vec![RemoteSpec::new("remote-a", "https://a/remote.js", RemoteFormat::Esm)],
            vec![("react".to_string(), SharedModuleSpec { version: "18.0.0".into(), singleton: true, required_version: None, value: 1 })],
        );
        assert_eq!(loader.host_name(), Some("host".to_string()));
        assert!(loader.container("remote-a").is_some());
        assert_eq!(loader.share_scope().get("react"), Some(&1));
    }

    #[test]
    fn register_remote_is_memoized_by_name() {
        let loader: RemoteLoader<u32> = RemoteLoader::new();
        let first = loader.register_remote(RemoteSpec::new("r", "u1", RemoteFormat::Esm));
        first.mark_loaded(7);
        let second = loader.register_remote(RemoteSpec::new("r", "u2-ignored", RemoteFormat::System));
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(second.value(), Some(7));
    }

    #[test]
    fn exposed_modules_are_retrievable_by_name() {
        let loader: RemoteLoader<u32> = RemoteLoader::new();
        let mut modules = HashMap::new();
        modules.insert("Button".to_string(), 42);
        loader.expose_modules(modules);
        assert_eq!(loader.get_exposed_module("Button"), Some(42));
        assert_eq!(loader.get_exposed_module("missing"), None);
    }
}
