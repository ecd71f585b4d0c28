use std::cell::{Cell as StdCell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use serde_json::Value;

use flexium_core::clock::now_ms;
use flexium_reactive::{batch, run_effect, Cell};

use crate::persistence::{read_persisted, remove_persisted, storage_key_for, write_persisted};

pub type Validator = Rc<dyn Fn(&Value) -> std::result::Result<(), String>>;

/// Options accepted by `shared(key, initial, opts)`.
#[derive(Default, Clone)]
pub struct SharedOptions {
    pub persist: bool,
    pub storage_key: Option<String>,
    pub validate: Option<Validator>,
    /// Cross-tab sync normally bypasses `validate` for this key — a value
    /// written by another tab already passed validation there. Set this to
    /// re-run `validate` on every incoming cross-tab write anyway; a
    /// rejected write is dropped and logged, same as a local one. Defaults
    /// to `false`.
    pub validate_cross_tab_writes: bool,
}

/// Reflection snapshot returned by `info(key)`.
#[derive(Clone, Debug)]
pub struct KeyInfo {
    pub version: u64,
    pub last_update: f64,
    pub persist: bool,
    pub subscriber_count: usize,
}

pub(crate) struct Entry {
    pub(crate) cell: Cell<Value>,
    pub(crate) version: StdCell<u64>,
    pub(crate) last_update: StdCell<f64>,
    pub(crate) validate: Option<Validator>,
    pub(crate) validate_cross_tab_writes: bool,
    pub(crate) persist: bool,
    pub(crate) storage_key: String,
    pub(crate) subscriber_apps: RefCell<HashSet<String>>,
}

/// Process-wide (or isolated, per `StateRegistry::new`) table of named
/// reactive cells shared across micro apps.
#[derive(Clone)]
pub struct StateRegistry {
    entries: Rc<RefCell<HashMap<String, Rc<Entry>>>>,
}

impl Default for StateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StateRegistry {
    pub fn new() -> Self {
        Self { entries: Rc::new(RefCell::new(HashMap::new())) }
    }

    fn entry_for(&self, key: &str, initial: Value, opts: &SharedOptions) -> Rc<Entry> {
        if let Some(existing) = self.entries.borrow().get(key) {
            return existing.clone();
        }

        let storage_key = storage_key_for(key, opts.storage_key.as_deref());
        let starting_value = if opts.persist {
            read_persisted(&storage_key).unwrap_or(initial)
        } else {
            initial
        };

        let entry = Rc::new(Entry {
            cell: Cell::new(starting_value),
            version: StdCell::new(0),
            last_update: StdCell::new(now_ms()),
            validate: opts.validate.clone(),
            validate_cross_tab_writes: opts.validate_cross_tab_writes,
            persist: opts.persist,
            storage_key,
            subscriber_apps: RefCell::new(HashSet::new()),
        });

        self.entries.borrow_mut().insert(key.to_string(), entry.clone());
        entry
    }

    /// If `key` already exists, returns an accessor pair into the existing
    /// cell (recording `caller_app` as a subscriber). Otherwise creates a
    /// cell seeded from a persisted value (if `opts.persist` and the entry
    /// parses), else `initial`.
    pub fn shared(&self, key: &str, initial: Value, opts: SharedOptions, caller_app: Option<&str>) -> (Reader, Writer) {
        let entry = self.entry_for(key, initial, &opts);
        if let Some(app) = caller_app {
            entry.subscriber_apps.borrow_mut().insert(app.to_string());
        }
        (Reader { registry: self.clone(), key: key.to_string() }, Writer { registry: self.clone(), key: key.to_string() })
    }

    /// Direct read of the current value, or `None` if `key` was never
    /// registered via `shared`/`set`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.borrow().get(key).map(|e| e.cell.peek())
    }

    /// Direct write: resolves `updater` against the current value, runs
    /// `validate` (dropping the write on failure), bumps `version`/
    /// `last_update`, and persists if configured. No-op if `key` is
    /// unregistered.
    pub fn set(&self, key: &str, updater: impl FnOnce(&Value) -> Value) {
        let Some(entry) = self.entries.borrow().get(key).cloned() else { return };
        self.apply_write(&entry, updater, true);
    }

    /// Cross-tab sync's entry point: skips validation unless the key was
    /// registered with `validate_cross_tab_writes: true`, in which case it
    /// behaves like a normal validated write (rejected writes are dropped
    /// and logged, never applied).
    pub(crate) fn set_cross_tab(&self, key: &str, value: Value) {
        let Some(entry) = self.entries.borrow().get(key).cloned() else { return };
        if entry.validate_cross_tab_writes {
            if let Some(validate) = &entry.validate {
                if let Err(reason) = validate(&value) {
                    tracing::warn!(key, reason, "cross-tab write rejected by validator; ignored");
                    return;
                }
            }
        }
        entry.cell.set(value);
        entry.version.set(entry.version.get() + 1);
        entry.last_update.set(now_ms());
    }

    fn apply_write(&self, entry: &Rc<Entry>, updater: impl FnOnce(&Value) -> Value, persist_if_configured: bool) {
        let current = entry.cell.peek();
        let next = updater(&current);
        if let Some(validate) = &entry.validate {
            if let Err(reason) = validate(&next) {
                tracing::warn!(reason, "shared-state write rejected by validator; write dropped");
                return;
            }
        }
        entry.cell.set(next.clone());
        entry.version.set(entry.version.get() + 1);
        entry.last_update.set(now_ms());
        if persist_if_configured && entry.persist {
            write_persisted(&entry.storage_key, &next);
        }
    }

    /// Removes `key` and its persisted entry, if any.
    pub fn delete(&self, key: &str) {
        if let Some(entry) = self.entries.borrow_mut().remove(key) {
            if entry.persist {
                remove_persisted(&entry.storage_key);
            }
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    pub fn info(&self, key: &str) -> Option<KeyInfo> {
        self.entries.borrow().get(key).map(|e| KeyInfo {
            version: e.version.get(),
            last_update: e.last_update.get(),
            persist: e.persist,
            subscriber_count: e.subscriber_apps.borrow().len(),
        })
    }

    /// Registers a reactive effect firing `(next, prev)` on every distinct
    /// new value. Returns a disposer. No-op (never fires) if `key` is
    /// unregistered at call time.
    pub fn watch(&self, key: &str, mut callback: impl FnMut(&Value, &Value) + 'static) -> Box<dyn FnOnce()> {
        let Some(entry) = self.entries.borrow().get(key).cloned() else {
            return Box::new(|| {});
        };
        let prev: Rc<RefCell<Option<Value>>> = Rc::new(RefCell::new(None));
        let cell = entry.cell.clone();
        let dispose = run_effect(move || {
            let next = cell.read();
            let mut prev_slot = prev.borrow_mut();
            if let Some(previous) = prev_slot.clone() {
                if previous != next {
                    callback(&next, &previous);
                }
            }
            *prev_slot = Some(next);
        });
        Box::new(dispose)
    }

    /// Used by snapshot restore: re-runs `validate` and skips the key
    /// (returning `false`) rather than dropping the whole restore on one
    /// bad entry.
    pub(crate) fn restore_one(&self, key: &str, value: Value) -> bool {
        let Some(entry) = self.entries.borrow().get(key).cloned() else { return false };
        if let Some(validate) = &entry.validate {
            if validate(&value).is_err() {
                return false;
            }
        }
        entry.cell.set(value);
        entry.version.set(entry.version.get() + 1);
        entry.last_update.set(now_ms());
        true
    }

    pub(crate) fn all_snapshot(&self) -> HashMap<String, Value> {
        self.entries.borrow().iter().map(|(k, v)| (k.clone(), v.cell.peek())).collect()
    }

    /// Runs `f` inside a single `batch` so downstream effects observe one
    /// coherent update, used by bulk operations (`setAll`, `reset`,
    /// snapshot restore).
    pub(crate) fn batched<R>(&self, f: impl FnOnce() -> R) -> R {
        batch(f)
    }
}

/// Read half of a `shared()` accessor pair.
#[derive(Clone)]
pub struct Reader {
    registry: StateRegistry,
    key: String,
}

impl Reader {
    /// Reads the value, registering the enclosing reactive effect (if any).
    pub fn read(&self) -> Value {
        self.registry.entries.borrow().get(&self.key).map(|e| e.cell.read()).unwrap_or(Value::Null)
    }

    pub fn peek(&self) -> Value {
        self.registry.get(&self.key).unwrap_or(Value::Null)
    }
}

/// Write half of a `shared()` accessor pair.
#[derive(Clone)]
pub struct Writer {
    registry: StateRegistry,
    key: String,
}

impl Writer {
    pub fn set(&self, updater: impl FnOnce(&Value) -> Value) {
        self.registry.set(&self.key, updater);
    }

    pub fn assign(&self, value: Value) {
        self.registry.set(&self.key, move |_| value.clone());
    }
}
