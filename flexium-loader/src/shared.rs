use std::collections::HashMap;

/// A `shared` module registration, per the host's federation config.
#[derive(Clone)]
pub struct SharedModuleSpec<T> {
    pub version: String,
    /// `true` means "first registration wins" — a later registration of
    /// the same name warns and is ignored rather than replacing it.
    pub singleton: bool,
    /// Tracked as a string but never semver-compared; purely informational.
    pub required_version: Option<String>,
    pub value: T,
}

/// Tracks shared modules by name across remotes, enforcing the singleton
/// policy. Generic over `T` (the module's loaded value) so the policy
/// logic is testable without a JS runtime; production code instantiates
/// this with `T = js_sys::Object` (or similar).
#[derive(Default)]
pub struct SharedModuleRegistry<T> {
    modules: HashMap<String, SharedModuleSpec<T>>,
}

impl<T: Clone> SharedModuleRegistry<T> {
    pub fn new() -> Self {
        Self { modules: HashMap::new() }
    }

    /// Registers `spec` under `name`. If a singleton module with this name
    /// already exists, the registration is ignored (logged) and `false` is
    /// returned; otherwise the module is (re)registered and `true` is
    /// returned.
    pub fn register(&mut self, name: impl Into<String>, spec: SharedModuleSpec<T>) -> bool {
        let name = name.into();
        if let Some(existing) = self.modules.get(&name) {
            if existing.singleton {
                tracing::warn!(name, "shared module already registered as singleton; ignoring re-registration");
                return false;
            }
        }
        self.modules.insert(name, spec);
        true
    }

    pub fn get(&self, name: &str) -> Option<&SharedModuleSpec<T>> {
        self.modules.get(name)
    }

    /// A `{name -> sharedModule}` view of every already-loaded shared
    /// module, passed to `container.init(shareScope)`.
    pub fn share_scope(&self) -> HashMap<String, T> {
        self.modules.iter().map(|(k, v)| (k.clone(), v.value.clone())).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(version: &str, singleton: bool, value: u32) -> SharedModuleSpec<u32> {
        SharedModuleSpec { version: version.to_string(), singleton, required_version: None, value }
    }

    #[test]
    fn first_singleton_registration_wins() {
        let mut registry = SharedModuleRegistry::new();
        assert!(registry.register("react", spec("18.0.0", true, 1)));
        assert!(!registry.register("react", spec("19.0.0", true, 2)));
        assert_eq!(registry.get("react").unwrap().version, "18.0.0");
    }

    #[test]
    fn non_singleton_registrations_replace_freely() {
        let mut registry = SharedModuleRegistry::new();
        assert!(registry.register("utils", spec("1.0.0", false, 1)));
        assert!(registry.register("utils", spec("2.0.0", false, 2)));
        assert_eq!(registry.get("utils").unwrap().version, "2.0.0");
    }

    #[test]
    fn share_scope_reflects_every_registered_module() {
        let mut registry = SharedModuleRegistry::new();
        registry.register("a", spec("1.0.0", true, 10));
        registry.register("b", spec("1.0.0", true, 20));
        let scope = registry.share_scope();
        assert_eq!(scope.get("a"), Some(&10));
        assert_eq!(scope.get("b"), Some(&20));
    }
}
