use serde_json::Value;

pub fn storage_key_for(key: &str, custom: Option<&str>) -> String {
    format!("flexium:shared:{}", custom.unwrap_or(key))
}

pub fn read_persisted(storage_key: &str) -> Option<Value> {
    backend::read(storage_key).and_then(|raw| serde_json::from_str(&raw).ok())
}

/// Writes `value` as JSON under `storage_key`. Storage failures are logged
/// and never propagated — the in-memory cell update still stands.
pub fn write_persisted(storage_key: &str, value: &Value) {
    let serialized = match serde_json::to_string(value) {
        Ok(s) => s,
        Err(err) => {
            tracing::warn!(storage_key, error = %err, "failed to serialize value for persistence");
            return;
        }
    };
    if let Err(err) = backend::write(storage_key, &serialized) {
        tracing::warn!(storage_key, error = %err, "localStorage write failed; in-memory state unaffected");
    }
}

pub fn remove_persisted(storage_key: &str) {
    backend::remove(storage_key);
}

#[cfg(target_arch = "wasm32")]
mod backend {
    pub fn read(storage_key: &str) -> Option<String> {
        let storage = web_sys::window()?.local_storage().ok()??;
        storage.get_item(storage_key).ok()?
    }

    pub fn write(storage_key: &str, value: &str) -> Result<(), String> {
        let window = web_sys::window().ok_or("no window")?;
        let storage = window.local_storage().map_err(|_| "localStorage unavailable")?.ok_or("no localStorage")?;
        storage.set_item(storage_key, value).map_err(|_| "localStorage.setItem threw".to_string())
    }

    pub fn remove(storage_key: &str) {
        if let Ok(Some(storage)) = web_sys::window().map(|w| w.local_storage().ok().flatten()) {
            let _ = storage.remove_item(storage_key);
        }
    }
}

/// Native builds (and pure-logic unit tests) back the persistence layer
/// with an in-memory map instead of a real `localStorage`, so the
/// versioning/validation/persistence logic above is exercisable without a
/// DOM.
#[cfg(not(target_arch = "wasm32"))]
mod backend {
    use std::cell::RefCell;
    use std::collections::HashMap;

    thread_local! {
        static STORE: RefCell<HashMap<String, String>> = RefCell::new(HashMap::new());
    }

    pub fn read(storage_key: &str) -> Option<String> {
        STORE.with(|s| s.borrow().get(storage_key).cloned())
    }

    pub fn write(storage_key: &str, value: &str) -> Result<(), String> {
        STORE.with(|s| s.borrow_mut().insert(storage_key.to_string(), value.to_string()));
        Ok(())
    }

    pub fn remove(storage_key: &str) {
        STORE.with(|s| {
            s.borrow_mut().remove(storage_key);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn storage_key_defaults_to_key_when_no_custom_key_given() {
        assert_eq!(storage_key_for("count", None), "flexium:shared:count");
        assert_eq!(storage_key_for("count", Some("custom")), "flexium:shared:custom");
    }

    #[test]
    fn round_trip_through_persistence_backend() {
        let key = storage_key_for("rt-test-key", None);
        write_persisted(&key, &json!({"n": 1}));
        assert_eq!(read_persisted(&key), Some(json!({"n": 1})));
        remove_persisted(&key);
        assert_eq!(read_persisted(&key), None);
    }
}
