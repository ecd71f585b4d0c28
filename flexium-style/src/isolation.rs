#![cfg(target_arch = "wasm32")]

use std::cell::Cell as StdCell;

use js_sys::Reflect;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlStyleElement, ShadowRoot, ShadowRootInit, ShadowRootMode};

use flexium_core::error::{Error, Result};

use crate::scope::scope_styles;

thread_local! {
    static SCOPE_COUNTER: StdCell<u64> = const { StdCell::new(0) };
}

fn next_scope_id(app_name: &str) -> String {
    let n = SCOPE_COUNTER.with(|c| {
        let next = c.get() + 1;
        c.set(next);
        next
    });
    format!("{app_name}-{n}")
}

/// Configuration shared by both container flavors.
#[derive(Default, Clone)]
pub struct ContainerConfig {
    /// For `createIsolatedContainer`: copy same-origin document stylesheets
    /// into the new shadow root at creation time.
    pub inherit_styles: bool,
}

/// Handle returned by `create_isolated_container`.
pub struct IsolatedContainer {
    pub container: Element,
    pub shadow_root: ShadowRoot,
    host: Element,
}

impl IsolatedContainer {
    /// Injects a raw `<style>` block into the shadow root.
    pub fn add_styles(&self, css: &str) -> Result<()> {
        let document = self.shadow_root.host().owner_document().ok_or_else(|| {
            Error::ContainerMissing { app: "isolated".into(), selector: "owner document".into() }
        })?;
        let style: HtmlStyleElement = document
            .create_element("style")
            .map_err(|_| Error::ContainerMissing { app: "isolated".into(), selector: "style element".into() })?
            .dyn_into()
            .map_err(|_| Error::ContainerMissing { app: "isolated".into(), selector: "style element".into() })?;
        style.set_text_content(Some(css));
        self.shadow_root
            .append_child(&style)
            .map_err(|_| Error::ContainerMissing { app: "isolated".into(), selector: "shadow root".into() })?;
        Ok(())
    }

    /// Injects an external stylesheet `<link rel="stylesheet">` into the shadow root.
    pub fn add_stylesheet(&self, href: &str) -> Result<()> {
        let document = self.shadow_root.host().owner_document().ok_or_else(|| {
            Error::ContainerMissing { app: "isolated".into(), selector: "owner document".into() }
        })?;
        let link = document
            .create_element("link")
            .map_err(|_| Error::ContainerMissing { app: "isolated".into(), selector: "link element".into() })?;
        link.set_attribute("rel", "stylesheet").ok();
        link.set_attribute("href", href).ok();
        self.shadow_root
            .append_child(&link)
            .map_err(|_| Error::ContainerMissing { app: "isolated".into(), selector: "shadow root".into() })?;
        Ok(())
    }

    /// Removes the host element (and everything inside it, shadow root included).
    pub fn cleanup(&self) {
        if let Some(parent) = self.host.parent_node() {
            let _ = parent.remove_child(&self.host);
        }
    }
}

/// Appends `<div data-micro-app data-isolated>` under `parent`, attaches an
/// open shadow root, and creates an inner `<div data-shadow-container>`.
/// With `cfg.inherit_styles`, same-origin document stylesheets are copied
/// into the shadow via [`adopt_styles`].
pub fn create_isolated_container(
    document: &Document,
    parent: &Element,
    app_name: &str,
    cfg: ContainerConfig,
) -> Result<IsolatedContainer> {
    let host = document
        .create_element("div")
        .map_err(|_| Error::ContainerMissing { app: app_name.into(), selector: "host div".into() })?;
    host.set_attribute("data-micro-app", app_name).ok();
    host.set_attribute("data-isolated", "").ok();
    parent
        .append_child(&host)
        .map_err(|_| Error::ContainerMissing { app: app_name.into(), selector: "parent".into() })?;

    let init = ShadowRootInit::new(ShadowRootMode::Open);
    let shadow_root = host
        .attach_shadow(&init)
        .map_err(|_| Error::ContainerMissing { app: app_name.into(), selector: "shadow root".into() })?;

    let container = document
        .create_element("div")
        .map_err(|_| Error::ContainerMissing { app: app_name.into(), selector: "shadow container".into() })?;
    container.set_attribute("data-shadow-container", "").ok();
    shadow_root
        .append_child(&container)
        .map_err(|_| Error::ContainerMissing { app: app_name.into(), selector: "shadow root".into() })?;

    let handle = IsolatedContainer { container, shadow_root, host };

    if cfg.inherit_styles {
        if let Some(sheets) = document_stylesheets(document) {
            adopt_styles(&handle.shadow_root, &sheets);
        }
    }

    Ok(handle)
}

fn document_stylesheets(document: &Document) -> Option<Vec<web_sys::CssStyleSheet>> {
    let list = document.style_sheets();
    let len = list.length();
    let mut out = Vec::with_capacity(len as usize);
    for i in 0..len {
        if let Some(sheet) = list.item(i) {
            if let Ok(css_sheet) = sheet.dyn_into::<web_sys::CssStyleSheet>() {
                out.push(css_sheet);
            }
        }
    }
    Some(out)
}

/// Handle returned by `create_scoped_container`.
pub struct ScopedContainer {
    pub container: Element,
    pub scope_id: String,
    document: Document,
    style_node: std::cell::RefCell<Option<HtmlStyleElement>>,
}

impl ScopedContainer {
    /// Rewrites `css` with [`scope_styles`] and injects it into `document.head`,
    /// reusing the same `<style>` node across repeated calls.
    pub fn add_styles(&self, css: &str) -> Result<()> {
        let scoped = scope_styles(css, &self.scope_id);
        let mut slot = self.style_node.borrow_mut();
        if let Some(existing) = slot.as_ref() {
            let prev = existing.text_content().unwrap_or_default();
            existing.set_text_content(Some(&format!("{prev}\n{scoped}")));
            return Ok(());
        }
        let head = self
            .document
            .head()
            .ok_or_else(|| Error::ContainerMissing { app: self.scope_id.clone(), selector: "document head".into() })?;
        let style: HtmlStyleElement = self
            .document
            .create_element("style")
            .map_err(|_| Error::ContainerMissing { app: self.scope_id.clone(), selector: "style element".into() })?
            .dyn_into()
            .map_err(|_| Error::ContainerMissing { app: self.scope_id.clone(), selector: "style element".into() })?;
        style.set_attribute("data-flexium-scope", &self.scope_id).ok();
        style.set_text_content(Some(&scoped));
        head.append_child(&style)
            .map_err(|_| Error::ContainerMissing { app: self.scope_id.clone(), selector: "document head".into() })?;
        *slot = Some(style);
        Ok(())
    }

    /// Removes injected styles and the container itself.
    pub fn cleanup(&self) {
        if let Some(style) = self.style_node.borrow_mut().take() {
            if let Some(parent) = style.parent_node() {
                let _ = parent.remove_child(&style);
            }
        }
        if let Some(parent) = self.container.parent_node() {
            let _ = parent.remove_child(&self.container);
        }
    }
}

/// No shadow DOM: generates `scopeId = ${appName}-${++counter}`, stamps it
/// via `data-scope` on a freshly appended container, and returns a handle
/// whose `add_styles` runs [`scope_styles`] and injects into `document.head`.
pub fn create_scoped_container(document: &Document, parent: &Element, app_name: &str) -> Result<ScopedContainer> {
    let scope_id = next_scope_id(app_name);
    let container = document
        .create_element("div")
        .map_err(|_| Error::ContainerMissing { app: app_name.into(), selector: "scoped container".into() })?;
    container.set_attribute("data-micro-app", app_name).ok();
    container.set_attribute("data-scope", &scope_id).ok();
    parent
        .append_child(&container)
        .map_err(|_| Error::ContainerMissing { app: app_name.into(), selector: "parent".into() })?;

    Ok(ScopedContainer {
        container,
        scope_id,
        document: document.clone(),
        style_node: std::cell::RefCell::new(None),
    })
}

/// Adopts `sheets` into `shadow_root`: uses `adoptedStyleSheets` when the
/// host supports it, otherwise clones each sheet's `cssRules` into a
/// fallback `<style>` child.
pub fn adopt_styles(shadow_root: &ShadowRoot, sheets: &[web_sys::CssStyleSheet]) {
    if sheets.is_empty() {
        return;
    }
    let supports_adopted = Reflect::has(shadow_root, &wasm_bindgen::JsValue::from_str("adoptedStyleSheets")).unwrap_or(false);
    if supports_adopted {
        let array = js_sys::Array::new();
        for sheet in sheets {
            array.push(sheet);
        }
        let _ = Reflect::set(shadow_root, &wasm_bindgen::JsValue::from_str("adoptedStyleSheets"), &array);
        return;
    }

    if let Some(document) = shadow_root.host().owner_document() {
        for sheet in sheets {
            let rules = match sheet.css_rules() {
                Ok(r) => r,
                Err(_) => continue,
            };
            let mut css = String::new();
            for i in 0..rules.length() {
                if let Some(rule) = rules.item(i) {
                    css.push_str(&rule.css_text());
                    css.push('\n');
                }
            }
            if let Ok(style) = document.create_element("style") {
                style.set_text_content(Some(&css));
                let _ = shadow_root.append_child(&style);
            }
        }
    }
}
