#![cfg(target_arch = "wasm32")]

use std::rc::Rc;

use js_sys::{Function, Reflect};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{History, PopStateEvent, Window};

use crate::location::NavigationKind;
use crate::router::HistoryDriver;

/// Drives the browser's real `history` object by calling the *original*
/// (pre-monkey-patch) `pushState`/`replaceState` directly. Used as the
/// router's own [`HistoryDriver`] so its own navigations never re-enter
/// [`HistoryBridge`]'s wrapped functions and get processed twice.
pub struct BrowserHistoryDriver {
    history: History,
    original_push: Function,
    original_replace: Function,
}

impl HistoryDriver for BrowserHistoryDriver {
    fn push(&self, path: &str) {
        let _ = self.original_push.call3(&self.history, &JsValue::NULL, &JsValue::from_str(""), &JsValue::from_str(path));
    }

    fn replace(&self, path: &str) {
        let _ =
            self.original_replace.call3(&self.history, &JsValue::NULL, &JsValue::from_str(""), &JsValue::from_str(path));
    }

    fn back(&self) {
        let _ = self.history.back();
    }

    fn forward(&self) {
        let _ = self.history.forward();
    }

    fn go(&self, delta: i32) {
        let _ = self.history.go_with_delta(delta);
    }
}

/// Captures `history.pushState`/`replaceState`, replaces them with
/// wrappers that call the originals and then notify `on_change`, and
/// subscribes to `popstate`. This is what lets navigations the router did
/// not initiate itself (another script calling `history.pushState`
/// directly, or the user pressing back/forward) still run the router's
/// transition algorithm. `uninstall` restores the originals and removes
/// the listener.
pub struct HistoryBridge {
    window: Window,
    history: History,
    original_push: Function,
    original_replace: Function,
    _push_closure: Closure<dyn Fn(JsValue, JsValue, JsValue)>,
    _replace_closure: Closure<dyn Fn(JsValue, JsValue, JsValue)>,
    _popstate_closure: Closure<dyn FnMut(PopStateEvent)>,
}

impl HistoryBridge {
    pub fn install(on_change: Rc<dyn Fn(String, NavigationKind)>) -> Option<Self> {
        let window = web_sys::window()?;
        let history = window.history().ok()?;

        let original_push: Function = Reflect::get(&history, &JsValue::from_str("pushState")).ok()?.dyn_into().ok()?;
        let original_replace: Function =
            Reflect::get(&history, &JsValue::from_str("replaceState")).ok()?.dyn_into().ok()?;

        let push_closure = {
            let history = history.clone();
            let original = original_push.clone();
            let window = window.clone();
            let on_change = on_change.clone();
            Closure::wrap(Box::new(move |state: JsValue, title: JsValue, url: JsValue| {
                let _ = original.call3(&history, &state, &title, &url);
                on_change(current_pathname(&window), NavigationKind::Push);
            }) as Box<dyn Fn(JsValue, JsValue, JsValue)>)
        };

        let replace_closure = {
            let history = history.clone();
            let original = original_replace.clone();
            let window = window.clone();
            let on_change = on_change.clone();
            Closure::wrap(Box::new(move |state: JsValue, title: JsValue, url: JsValue| {
                let _ = original.call3(&history, &state, &title, &url);
                on_change(current_pathname(&window), NavigationKind::Replace);
            }) as Box<dyn Fn(JsValue, JsValue, JsValue)>)
        };

        let _ = Reflect::set(&history, &JsValue::from_str("pushState"), push_closure.as_ref().unchecked_ref());
        let _ = Reflect::set(&history, &JsValue::from_str("replaceState"), replace_closure.as_ref().unchecked_ref());

        let popstate_closure = {
            let window = window.clone();
            let on_change = on_change.clone();
            Closure::wrap(Box::new(move |_event: PopStateEvent| {
                on_change(current_pathname(&window), NavigationKind::Pop);
            }) as Box<dyn FnMut(PopStateEvent)>)
        };
        let _ = window.add_event_listener_with_callback("popstate", popstate_closure.as_ref().unchecked_ref());

        Some(Self {
            window,
            history,
            original_push,
            original_replace,
            _push_closure: push_closure,
            _replace_closure: replace_closure,
            _popstate_closure: popstate_closure,
        })
    }

    pub fn driver(&self) -> BrowserHistoryDriver {
        BrowserHistoryDriver {
            history: self.history.clone(),
            original_push: self.original_push.clone(),
            original_replace: self.original_replace.clone(),
        }
    }

    pub fn uninstall(self) {
        let _ = Reflect::set(&self.history, &JsValue::from_str("pushState"), &self.original_push);
        let _ = Reflect::set(&self.history, &JsValue::from_str("replaceState"), &self.original_replace);
        let _ = self.window.remove_event_listener_with_callback("popstate", self._popstate_closure.as_ref().unchecked_ref());
    }
}

fn current_pathname(window: &Window) -> String {
    window.location().pathname().unwrap_or_else(|_| "/".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;

    wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

    fn recording_callback() -> (Rc<dyn Fn(String, NavigationKind)>, Rc<StdRefCell<Vec<(String, NavigationKind)>>>) {
        let seen = Rc::new(StdRefCell::new(Vec::new()));
        let seen2 = seen.clone();
        let on_change: Rc<dyn Fn(String, NavigationKind)> = Rc::new(move |path, kind| seen2.borrow_mut().push((path, kind)));
        (on_change, seen)
    }

    #[wasm_bindgen_test::wasm_bindgen_test]
    fn push_state_notifies_on_change_with_push_kind() {
        let (on_change, seen) = recording_callback();
        let bridge = HistoryBridge::install(on_change).expect("history bridge installs in a browser");

        let history = web_sys::window().unwrap().history().unwrap();
        history.push_state_with_url(&JsValue::NULL, "", Some("/bridge-test-push")).unwrap();

        let last = seen.borrow().last().cloned().unwrap();
        assert_eq!(last.0, "/bridge-test-push");
        assert_eq!(last.1, NavigationKind::Push);

        bridge.uninstall();
    }

    #[wasm_bindgen_test::wasm_bindgen_test]
    fn replace_state_notifies_on_change_with_replace_kind() {
        let (on_change, seen) = recording_callback();
        let bridge = HistoryBridge::install(on_change).expect("history bridge installs in a browser");

        let history = web_sys::window().unwrap().history().unwrap();
        history.replace_state_with_url(&JsValue::NULL, "", Some("/bridge-test-replace")).unwrap();

        let last = seen.borrow().last().cloned().unwrap();
        assert_eq!(last.0, "/bridge-test-replace");
        assert_eq!(last.1, NavigationKind::Replace);

        bridge.uninstall();
    }

    #[wasm_bindgen_test::wasm_bindgen_test]
    fn popstate_notifies_on_change_with_pop_kind() {
        let (on_change, seen) = recording_callback();
        let bridge = HistoryBridge::install(on_change).expect("history bridge installs in a browser");

        let window = web_sys::window().unwrap();
        let event = PopStateEvent::new("popstate").unwrap();
        window.dispatch_event(&event).unwrap();

        assert_eq!(seen.borrow().last().map(|(_, kind)| *kind), Some(NavigationKind::Pop));
        bridge.uninstall();
    }

    #[wasm_bindgen_test::wasm_bindgen_test]
    fn uninstall_restores_originals_and_stops_notifications() {
        let (on_change, seen) = recording_callback();
        let bridge = HistoryBridge::install(on_change).expect("history bridge installs in a browser");
        bridge.uninstall();

        let history = web_sys::window().unwrap().history().unwrap();
        history.push_state_with_url(&JsValue::NULL, "", Some("/after-uninstall")).unwrap();

        assert!(seen.borrow().is_empty(), "no notification should fire once the bridge is uninstalled");
    }
}
