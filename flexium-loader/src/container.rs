use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RemoteFormat {
    Esm,
    System,
    Umd,
    Global,
}

impl Default for RemoteFormat {
    fn default() -> Self {
        RemoteFormat::Esm
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum RemoteState {
    Unloaded,
    Loading,
    Loaded,
    Error,
}

/// A memoized remote entry: records loading state and (once loaded) the
/// container value plus a per-module-name factory-result cache, per
/// `loadRemoteModule`'s "results are cached on the container" rule.
///
/// Generic over `T` (the loaded container/module representation) so the
/// state machine is unit-testable without a JS runtime.
pub struct RemoteContainer<T> {
    pub name: String,
    pub url: String,
    pub format: RemoteFormat,
    state: RefCell<RemoteState>,
    value: RefCell<Option<T>>,
    module_cache: RefCell<HashMap<String, T>>,
    error: RefCell<Option<String>>,
}

impl<T: Clone> RemoteContainer<T> {
    pub fn new(name: impl Into<String>, url: impl Into<String>, format: RemoteFormat) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            format,
            state: RefCell::new(RemoteState::Unloaded),
            value: RefCell::new(None),
            module_cache: RefCell::new(HashMap::new()),
            error: RefCell::new(None),
        }
    }

    pub fn state(&self) -> RemoteState {
        self.state.borrow().clone()
    }

    pub fn is_loaded(&self) -> bool {
        *self.state.borrow() == RemoteState::Loaded
    }

    pub fn begin_loading(&self) {
        *self.state.borrow_mut() = RemoteState::Loading;
    }

    pub fn mark_loaded(&self, value: T) {
        *self.value.borrow_mut() = Some(value);
        *self.state.borrow_mut() = RemoteState::Loaded;
        *self.error.borrow_mut() = None;
    }

    pub fn mark_error(&self, message: impl Into<String>) {
        *self.error.borrow_mut() = Some(message.into());
        *self.state.borrow_mut() = RemoteState::Error;
    }

    pub fn value(&self) -> Option<T> {
        self.value.borrow().clone()
    }

    pub fn error(&self) -> Option<String> {
        self.error.borrow().clone()
    }

    pub fn cached_module(&self, module_name: &str) -> Option<T> {
        self.module_cache.borrow().get(module_name).cloned()
    }

    pub fn cache_module(&self, module_name: impl Into<String>, value: T) {
        self.module_cache.borrow_mut().insert(module_name.into(), value);
    }
}
