//! Actual remote-entry loading: dynamic `import()`, `System.import`, and
//! UMD/global script-tag loading. Only meaningful on `wasm32` — there is
//! no DOM or module loader to drive on native, so this module is entirely
//! `cfg(target_arch = "wasm32")`.

#![cfg(target_arch = "wasm32")]

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use futures_util::future::{select, Either};
use js_sys::{Object, Promise, Reflect};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

use flexium_core::error::{Error, Result};

use crate::container::{RemoteContainer, RemoteFormat};
use crate::federation::{RemoteLoader, RemoteSpec};

#[wasm_bindgen::prelude::wasm_bindgen(inline_js = "export function flexium_dynamic_import(url) { return import(/* webpackIgnore: true */ url); }")]
extern "C" {
    #[wasm_bindgen(catch)]
    fn flexium_dynamic_import(url: &str) -> std::result::Result<Promise, JsValue>;
}

fn default_timeout_ms() -> u32 {
    10_000
}

/// Loads (or returns the memoized) container for `name`. Builds a
/// `shareScope` object from every already-loaded shared module and calls
/// `container.init(shareScope)` once the module resolves.
pub async fn load_remote(loader: &RemoteLoader<JsValue>, spec: RemoteSpec, timeout_ms: Option<u32>) -> Result<Rc<RemoteContainer<JsValue>>> {
    let container = loader.register_remote(spec.clone());
    if container.is_loaded() {
        return Ok(container);
    }
    container.begin_loading();

    let import = import_module(&spec.url, spec.format, &spec.global_name);
    let timeout = gloo_timers::future::TimeoutFuture::new(timeout_ms.unwrap_or_else(default_timeout_ms));

    let module = match select(Box::pin(import), timeout).await {
        Either::Left((Ok(value), _)) => value,
        Either::Left((Err(message), _)) => {
            container.mark_error(message.clone());
            return Err(Error::HookFailure { app: spec.name.clone(), phase: "load", message });
        }
        Either::Right(_) => {
            let message = format!("Loading \"{}\" timed out", spec.url);
            container.mark_error(message.clone());
            return Err(Error::LoadTimeout { app: spec.name, url: spec.url });
        }
    };

    if let Ok(init_fn) = Reflect::get(&module, &JsValue::from_str("init")).map(|v| v.dyn_into::<js_sys::Function>()) {
        if let Ok(init_fn) = init_fn {
            let share_scope = Object::new();
            for (name, value) in loader.share_scope() {
                let _ = Reflect::set(&share_scope, &JsValue::from_str(&name), &value);
            }
            let _ = init_fn.call1(&module, &share_scope);
        }
    }

    container.mark_loaded(module);
    Ok(container)
}

async fn import_module(url: &str, format: RemoteFormat, global_name: &str) -> std::result::Result<JsValue, String> {
    match format {
        RemoteFormat::Esm => dynamic_import(url).await,
        RemoteFormat::System => {
            if let Some(window) = web_sys::window() {
                if let Ok(system) = Reflect::get(&window, &JsValue::from_str("System")) {
                    if !system.is_undefined() {
                        if let Ok(import_fn) = Reflect::get(&system, &JsValue::from_str("import")).and_then(|v| {
                            v.dyn_into::<js_sys::Function>().map_err(|_| JsValue::NULL)
                        }) {
                            let promise = import_fn
                                .call1(&system, &JsValue::from_str(url))
                                .map_err(|_| "System.import threw".to_string())?;
                            let promise: Promise = promise.dyn_into().map_err(|_| "System.import did not return a promise".to_string())?;
                            return JsFuture::from(promise).await.map_err(|e| format!("{e:?}"));
                        }
                    }
                }
            }
            dynamic_import(url).await
        }
        RemoteFormat::Umd | RemoteFormat::Global => load_via_script_tag(url, global_name).await,
    }
}

async fn dynamic_import(url: &str) -> std::result::Result<JsValue, String> {
    let promise = flexium_dynamic_import(url).map_err(|e| format!("{e:?}"))?;
    JsFuture::from(promise).await.map_err(|e| format!("{e:?}"))
}

/// Injects a `<script src=url>` tag and, once it loads, resolves with
/// `window[global_name]` — the UMD/global contract's expected exports
/// object (rejects if the script's `error` event fires instead).
async fn load_via_script_tag(url: &str, global_name: &str) -> std::result::Result<JsValue, String> {
    let window = web_sys::window().ok_or("no window")?;
    let document = window.document().ok_or("no document")?;
    let script = document.create_element("script").map_err(|_| "failed to create <script>")?;
    script.set_attribute("src", url).map_err(|_| "failed to set script src")?;

    let global_name = global_name.to_string();
    let promise = Promise::new(&mut |resolve, reject| {
        let resolve_clone = resolve.clone();
        let window_clone = window.clone();
        let global_name = global_name.clone();
        let onload = Closure::once(move || {
            let global = Reflect::get(&window_clone, &JsValue::from_str(&global_name)).unwrap_or(JsValue::UNDEFINED);
            let _ = resolve_clone.call1(&JsValue::NULL, &global);
        });
        let onerror = Closure::once(move || {
            let _ = reject.call1(&JsValue::NULL, &JsValue::from_str("script load failed"));
        });
        let _ = script.add_event_listener_with_callback("load", onload.as_ref().unchecked_ref());
        let _ = script.add_event_listener_with_callback("error", onerror.as_ref().unchecked_ref());
        onload.forget();
        onerror.forget();
        if let Some(head) = document.head() {
            let _ = head.append_child(&script);
        }
    });

    JsFuture::from(promise).await.map_err(|_| "script load failed".to_string())
}

/// Loads `remote_name` if needed, then calls `container.get(module_name)`
/// (a factory) and invokes the factory to yield the exported value.
/// Results are cached on the container by module name.
pub async fn load_remote_module(
    loader: &RemoteLoader<JsValue>,
    remote_name: &str,
    module_name: &str,
) -> Result<JsValue> {
    let container = match loader.container(remote_name) {
        Some(c) if c.is_loaded() => c,
        _ => return Err(Error::NotRegistered(remote_name.to_string())),
    };

    if let Some(cached) = container.cached_module(module_name) {
        return Ok(cached);
    }

    let Some(module_value) = container.value() else {
        return Err(Error::MalformedEntry(remote_name.to_string()));
    };
    let get_fn = Reflect::get(&module_value, &JsValue::from_str("get"))
        .ok()
        .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
        .ok_or_else(|| Error::MalformedEntry(remote_name.to_string()))?;

    let factory_promise = get_fn
        .call1(&module_value, &JsValue::from_str(module_name))
        .map_err(|_| Error::MalformedEntry(remote_name.to_string()))?;
    let factory = if let Ok(promise) = factory_promise.clone().dyn_into::<Promise>() {
        JsFuture::from(promise).await.map_err(|_| Error::MalformedEntry(remote_name.to_string()))?
    } else {
        factory_promise
    };

    let factory_fn: js_sys::Function = factory.dyn_into().map_err(|_| Error::MalformedEntry(remote_name.to_string()))?;
    let exported = factory_fn.call0(&JsValue::UNDEFINED).map_err(|_| Error::MalformedEntry(remote_name.to_string()))?;

    container.cache_module(module_name, exported.clone());
    Ok(exported)
}

/// `'remote/module/path'` shorthand for `load_remote_module`.
pub async fn import_federated(loader: &RemoteLoader<JsValue>, path: &str) -> Result<JsValue> {
    let mut parts = path.splitn(2, '/');
    let remote_name = parts.next().unwrap_or_default();
    let module_name = parts.next().unwrap_or_default();
    load_remote_module(loader, remote_name, module_name).await
}

/// Injects `<link rel="modulepreload">` for each URL; errors are
/// swallowed — preloading is a best-effort hint.
pub fn preload_remotes(urls: &[String]) {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else { return };
    let Some(head) = document.head() else { return };
    for url in urls {
        if let Ok(link) = document.create_element("link") {
            let _ = link.set_attribute("rel", "modulepreload");
            let _ = link.set_attribute("href", url);
            let _ = head.append_child(&link);
        }
    }
}

/// Returns an async component function that memoizes the first successful
/// import of `path`. On failure, calls `fallback` if given; otherwise
/// propagates the error.
pub fn federated_component(
    loader: Rc<RemoteLoader<JsValue>>,
    path: String,
    fallback: Option<Rc<dyn Fn() -> JsValue>>,
) -> impl Fn() -> Pin<Box<dyn Future<Output = Result<JsValue>>>> {
    let memo: Rc<RefCell<Option<JsValue>>> = Rc::new(RefCell::new(None));
    move || {
        let loader = loader.clone();
        let path = path.clone();
        let fallback = fallback.clone();
        let memo = memo.clone();
        Box::pin(async move {
            if let Some(cached) = memo.borrow().clone() {
                return Ok(cached);
            }
            match import_federated(&loader, &path).await {
                Ok(value) => {
                    *memo.borrow_mut() = Some(value.clone());
                    Ok(value)
                }
                Err(err) => match fallback {
                    Some(fallback) => Ok(fallback()),
                    None => Err(err),
                },
            }
        })
    }
}
