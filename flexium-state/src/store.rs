use std::collections::HashMap;

use serde_json::Value;

use crate::entry::{SharedOptions, StateRegistry};

/// A typed record of cells whose keys are `${namespace}:${field}`, backed
/// by the same registry as plain `shared()` calls.
#[derive(Clone)]
pub struct StateStore {
    registry: StateRegistry,
    namespace: String,
    fields: Vec<String>,
    persist: bool,
}

impl StateStore {
    fn namespaced(&self, field: &str) -> String {
        format!("{}:{}", self.namespace, field)
    }

    pub fn get(&self, field: &str) -> Value {
        self.registry.get(&self.namespaced(field)).unwrap_or(Value::Null)
    }

    pub fn set(&self, field: &str, updater: impl FnOnce(&Value) -> Value) {
        self.registry.set(&self.namespaced(field), updater);
    }

    pub fn get_all(&self) -> HashMap<String, Value> {
        self.fields.iter().map(|f| (f.clone(), self.get(f))).collect()
    }

    /// Batched: every field is written inside a single `batch` so
    /// downstream effects observe one coherent update.
    pub fn set_all(&self, values: HashMap<String, Value>) {
        let registry = self.registry.clone();
        let namespace = self.namespace.clone();
        registry.clone().batched(move || {
            for (field, value) in values {
                registry.set(&format!("{namespace}:{field}"), move |_| value.clone());
            }
        });
    }

    pub fn subscribe(&self, field: &str, callback: impl FnMut(&Value, &Value) + 'static) -> Box<dyn FnOnce()> {
        self.registry.watch(&self.namespaced(field), callback)
    }

    /// Batched: restores every field to its initial value.
    pub fn reset(&self, initial: &HashMap<String, Value>) {
        self.set_all(initial.clone());
    }

    pub fn persists(&self) -> bool {
        self.persist
    }
}

/// Creates (or reattaches to) a namespaced record of cells, one per key in
/// `initial`.
pub fn create_state_store(registry: &StateRegistry, namespace: impl Into<String>, initial: HashMap<String, Value>, persist: bool) -> StateStore {
    let namespace = namespace.into();
    let fields: Vec<String> = initial.keys().cloned().collect();
    for (field, value) in &initial {
        let key = format!("{namespace}:{field}");
        registry.shared(&key, value.clone(), SharedOptions { persist, ..Default::default() }, None);
    }
    StateStore { registry: registry.clone(), namespace, fields, persist }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn store_namespaces_fields_under_the_registry() {
        let registry = StateRegistry::new();
        let mut initial = HashMap::new();
        initial.insert("count".to_string(), json!(0));
        let store = create_state_store(&registry, "counter", initial, false);

        store.set("count", |_| json!(5));
        assert_eq!(store.get("count"), json!(5));
        assert_eq!(registry.get("counter:count"), Some(json!(5)));
    }

    #[test]
    fn set_all_and_reset_are_batched_and_update_every_field() {
        let registry = StateRegistry::new();
        let mut initial = HashMap::new();
        initial.insert("a".to_string(), json!(1));
        initial.insert("b".to_string(), json!(2));
        let store = create_state_store(&registry, "ns", initial.clone(), false);

        let mut next = HashMap::new();
        next.insert("a".to_string(), json!(10));
        next.insert("b".to_string(), json!(20));
        store.set_all(next);
        assert_eq!(store.get("a"), json!(10));
        assert_eq!(store.get("b"), json!(20));

        store.reset(&initial);
        assert_eq!(store.get("a"), json!(1));
        assert_eq!(store.get("b"), json!(2));
    }
}
