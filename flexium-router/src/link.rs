#![cfg(target_arch = "wasm32")]

use std::rc::Rc;

use wasm_bindgen::JsCast;
use web_sys::{Event, HtmlAnchorElement, MouseEvent};

use crate::router::{NavigateOptions, Router};

/// Builds a click handler for opt-in link interception: attach it to a
/// container element with `addEventListener("click", ...)` and any
/// same-origin `<a href>` click inside it navigates through the router
/// instead of reloading the page. Ignores anchors without an `href`,
/// cross-origin links, hash-only links on the current page, `download`
/// links, `target="_blank"`, and clicks already handled (modifier keys,
/// non-primary button, or `preventDefault` already called).
pub fn link_interceptor(router: Rc<Router>) -> impl Fn(Event) {
    move |event: Event| {
        let Some(mouse_event) = event.dyn_ref::<MouseEvent>() else { return };
        if mouse_event.default_prevented() || mouse_event.button() != 0 {
            return;
        }
        if mouse_event.ctrl_key() || mouse_event.meta_key() || mouse_event.shift_key() || mouse_event.alt_key() {
            return;
        }

        let Some(target) = event.target() else { return };
        let Ok(anchor) = target.dyn_into::<HtmlAnchorElement>() else { return };

        let Ok(href) = anchor.href() else { return };
        if href.is_empty() {
            return;
        }
        if anchor.target() == "_blank" {
            return;
        }
        if anchor.has_attribute("download") {
            return;
        }
        if (href.starts_with("http://") || href.starts_with("https://")) && !is_same_origin(&href) {
            return;
        }

        let path = anchor.pathname().unwrap_or_default();
        if path.is_empty() {
            return;
        }
        let hash = anchor.hash().unwrap_or_default();
        if !hash.is_empty() && path == current_pathname() {
            return;
        }

        event.prevent_default();
        let router = router.clone();
        wasm_bindgen_futures::spawn_local(async move {
            router.navigate(path, NavigateOptions::default()).await;
        });
    }
}

fn is_same_origin(href: &str) -> bool {
    let Some(window) = web_sys::window() else { return false };
    let Ok(origin) = window.location().origin() else { return false };
    href.starts_with(&origin)
}

fn current_pathname() -> String {
    web_sys::window().and_then(|w| w.location().pathname().ok()).unwrap_or_else(|| "/".to_string())
}
