#![cfg(target_arch = "wasm32")]

use std::rc::Rc;

use js_sys::{Array, Function, Promise, Reflect};
use serde_json::Value;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

use flexium_core::error::{Error, Result};
use flexium_loader::{load_remote, RemoteFormat, RemoteLoader, RemoteSpec};

use crate::instance::{Lifecycle, MountTarget};

/// Imports `entry` as an ESM remote, then builds a `Lifecycle` from its
/// (or its `default` export's) `mount`/`unmount`/`bootstrap?`/`update?`
/// functions. Mirrors `load_remote_module`'s factory-call shape but reads
/// the exports directly rather than going through a federation `get()`.
pub async fn resolve_remote_lifecycle(
    loader: &Rc<RemoteLoader<JsValue>>,
    name: &str,
    entry: &str,
    timeout_ms: u32,
) -> Result<Lifecycle> {
    let spec = RemoteSpec::new(name, entry, RemoteFormat::Esm);
    let container = load_remote(loader, spec, Some(timeout_ms)).await?;
    let module = container.value().ok_or_else(|| Error::MalformedEntry(name.to_string()))?;

    let exports = match Reflect::get(&module, &JsValue::from_str("default")) {
        Ok(default) if !default.is_undefined() && !default.is_null() => default,
        _ => module,
    };

    let mount_fn = get_function(&exports, "mount").ok_or_else(|| Error::MalformedEntry(name.to_string()))?;
    let unmount_fn = get_function(&exports, "unmount").ok_or_else(|| Error::MalformedEntry(name.to_string()))?;
    let bootstrap_fn = get_function(&exports, "bootstrap");
    let update_fn = get_function(&exports, "update");

    Ok(Lifecycle {
        bootstrap: bootstrap_fn.map(wrap_props_hook),
        mount: wrap_mount_hook(mount_fn),
        unmount: wrap_mount_hook(unmount_fn),
        update: update_fn.map(wrap_props_hook),
    })
}

fn get_function(object: &JsValue, key: &str) -> Option<Function> {
    Reflect::get(object, &JsValue::from_str(key)).ok().and_then(|v| v.dyn_into::<Function>().ok())
}

fn mount_target_to_js(target: &MountTarget) -> JsValue {
    match target {
        MountTarget::Element(el) => el.clone().into(),
        MountTarget::Virtual(selector) => JsValue::from_str(selector),
    }
}

fn props_to_js(props: &Value) -> JsValue {
    serde_wasm_bindgen::to_value(props).unwrap_or(JsValue::UNDEFINED)
}

async fn call_js_hook(f: &Function, args: &[JsValue]) -> std::result::Result<(), String> {
    let this = JsValue::UNDEFINED;
    let result = match args.len() {
        0 => f.call0(&this),
        1 => f.call1(&this, &args[0]),
        2 => f.call2(&this, &args[0], &args[1]),
        _ => {
            let arr = Array::new();
            for arg in args {
                arr.push(arg);
            }
            f.apply(&this, &arr)
        }
    }
    .map_err(|e| format!("{e:?}"))?;

    if let Ok(promise) = result.dyn_into::<Promise>() {
        JsFuture::from(promise).await.map(|_| ()).map_err(|e| format!("{e:?}"))
    } else {
        Ok(())
    }
}

fn wrap_mount_hook(f: Function) -> crate::instance::MountHook {
    Rc::new(move |target, props| {
        let f = f.clone();
        Box::pin(async move { call_js_hook(&f, &[mount_target_to_js(&target), props_to_js(&props)]).await })
    })
}

fn wrap_props_hook(f: Function) -> crate::instance::PropsHook {
    Rc::new(move |props| {
        let f = f.clone();
        Box::pin(async move { call_js_hook(&f, &[props_to_js(&props)]).await })
    })
}
