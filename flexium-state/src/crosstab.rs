use crate::entry::StateRegistry;

const PREFIX: &str = "flexium:shared:";

/// Applies one `storage`-event observation to `registry`: strips the
/// `flexium:shared:` prefix, checks the (optional) whitelist, parses
/// `new_value` as JSON, and writes it into the local cell. Validation is
/// skipped unless the key was registered with `validate_cross_tab_writes:
/// true` — by default a stricter validator in one tab must never diverge
/// from another tab's already-committed value.
///
/// Returns `true` if the event matched a key this call considered (whether
/// or not the write itself was accepted by a validator).
pub fn apply_storage_event(registry: &StateRegistry, storage_key: &str, new_value: Option<&str>, whitelist: Option<&[String]>) -> bool {
    let Some(key) = storage_key.strip_prefix(PREFIX) else { return false };
    if let Some(whitelist) = whitelist {
        if !whitelist.iter().any(|w| w == key) {
            return false;
        }
    }
    let Some(raw) = new_value else { return false };
    let Ok(value) = serde_json::from_str(raw) else {
        tracing::warn!(key, "cross-tab storage event carried unparseable JSON; ignored");
        return false;
    };
    registry.set_cross_tab(key, value);
    true
}

/// Attaches a `window` `storage` listener that feeds every same-origin,
/// other-tab mutation of a `flexium:shared:*` key into `registry` via
/// [`apply_storage_event`]. Returns a disposer that removes the listener.
#[cfg(target_arch = "wasm32")]
pub fn enable_cross_tab_sync(registry: StateRegistry, whitelist: Option<Vec<String>>) -> Box<dyn FnOnce()> {
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::JsCast;
    use web_sys::StorageEvent;

    let Some(window) = web_sys::window() else {
        return Box::new(|| {});
    };

    let closure = Closure::<dyn FnMut(StorageEvent)>::new(move |event: StorageEvent| {
        let Some(key) = event.key() else { return };
        apply_storage_event(&registry, &key, event.new_value().as_deref(), whitelist.as_deref());
    });

    let added = window
        .add_event_listener_with_callback("storage", closure.as_ref().unchecked_ref())
        .is_ok();

    if !added {
        return Box::new(|| {});
    }

    Box::new(move || {
        let _ = window.remove_event_listener_with_callback("storage", closure.as_ref().unchecked_ref());
        drop(closure);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::SharedOptions;
    use serde_json::json;

    #[test]
    fn applies_whitelisted_key_and_bypasses_validation() {
        let registry = StateRegistry::new();
        let validate: crate::entry::Validator = std::rc::Rc::new(|_| Err("always rejects".to_string()));
        let (reader, _writer) =
            registry.shared("k", json!(1), SharedOptions { validate: Some(validate), ..Default::default() }, None);

        let applied = apply_storage_event(&registry, "flexium:shared:k", Some("42"), Some(&["k".to_string()]));
        assert!(applied);
        assert_eq!(reader.peek(), json!(42));
    }

    #[test]
    fn ignores_keys_outside_whitelist() {
        let registry = StateRegistry::new();
        let (reader, _writer) = registry.shared("other", json!(1), SharedOptions::default(), None);
        let applied = apply_storage_event(&registry, "flexium:shared:other", Some("99"), Some(&["k".to_string()]));
        assert!(!applied);
        assert_eq!(reader.peek(), json!(1));
    }

    #[test]
    fn ignores_non_flexium_keys() {
        let registry = StateRegistry::new();
        let applied = apply_storage_event(&registry, "some-other-app:k", Some("99"), None);
        assert!(!applied);
    }

    #[test]
    fn validate_cross_tab_writes_opts_into_re_validation() {
        let registry = StateRegistry::new();
        let validate: crate::entry::Validator = std::rc::Rc::new(|v| {
            if v.as_i64().unwrap_or(-1) >= 0 {
                Ok(())
            } else {
                Err("must be non-negative".to_string())
            }
        });
        let (reader, _writer) = registry.shared(
            "k",
            json!(1),
            SharedOptions { validate: Some(validate), validate_cross_tab_writes: true, ..Default::default() },
            None,
        );

        let applied = apply_storage_event(&registry, "flexium:shared:k", Some("-5"), None);
        assert!(applied, "event still counts as considered even when the validator rejects it");
        assert_eq!(reader.peek(), json!(1), "cross-tab write must be dropped when validate_cross_tab_writes rejects it");

        apply_storage_event(&registry, "flexium:shared:k", Some("7"), None);
        assert_eq!(reader.peek(), json!(7));
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use crate::entry::SharedOptions;
    use serde_json::json;
    use wasm_bindgen::JsCast;
    use wasm_bindgen_test::wasm_bindgen_test;
    use web_sys::{StorageEvent, StorageEventInit};

    wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

    fn dispatch_storage_event(key: &str, new_value: &str) {
        let mut init = StorageEventInit::new();
        init.key(Some(key));
        init.new_value(Some(new_value));
        let event = StorageEvent::new_with_event_init_dict("storage", &init).unwrap();
        let window = web_sys::window().unwrap();
        let _ = window.dispatch_event(event.unchecked_ref());
    }

    #[wasm_bindgen_test]
    fn enable_cross_tab_sync_applies_then_stops_after_disposal() {
        let registry = StateRegistry::new();
        let (reader, _writer) = registry.shared("k", json!(1), SharedOptions::default(), None);

        let dispose = enable_cross_tab_sync(registry.clone(), None);

        dispatch_storage_event("flexium:shared:k", "42");
        assert_eq!(reader.peek(), json!(42), "a real storage event must flow through to the registry");

        dispose();

        dispatch_storage_event("flexium:shared:k", "99");
        assert_eq!(reader.peek(), json!(42), "after disposal no further storage events should be observed");
    }
}
