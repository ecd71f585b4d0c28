use std::rc::Rc;

use crate::error::Error;

/// The orchestrator-wide configuration surface:
/// `{debug?, defaultContainer?, onError?(err, appName?), onStateChange?(appName, state)}`.
///
/// Chained-setter builder rather than loaded from YAML/env — there is no
/// filesystem or process environment to layer config files onto inside a
/// browser tab (see DESIGN.md).
#[derive(Clone, Default)]
pub struct OrchestratorConfig {
    debug: bool,
    default_container: Option<String>,
    app_name: Option<String>,
    on_error: Option<Rc<dyn Fn(&Error, Option<&str>)>>,
    on_state_change: Option<Rc<dyn Fn(&str, &str)>>,
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables verbose tracing for lifecycle transitions, dispatch, and navigation.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Fallback mount target (a CSS selector) used when an app's own
    /// `AppConfig::container` and any `mount()` override are both absent.
    pub fn default_container(mut self, selector: impl Into<String>) -> Self {
        self.default_container = Some(selector.into());
        self
    }

    /// This process's identity, used as the bus `source` on emitted
    /// messages and as the comparand for `onlyTargeted` subscriptions.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Orchestrator-wide error callback, invoked alongside any per-app
    /// `AppConfig::on_error` whenever a lifecycle hook fails.
    pub fn on_error(mut self, cb: impl Fn(&Error, Option<&str>) + 'static) -> Self {
        self.on_error = Some(Rc::new(cb));
        self
    }

    /// Fired on every committed lifecycle transition, with the app name and
    /// the new state's name.
    pub fn on_state_change(mut self, cb: impl Fn(&str, &str) + 'static) -> Self {
        self.on_state_change = Some(Rc::new(cb));
        self
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn default_container_selector(&self) -> Option<&str> {
        self.default_container.as_deref()
    }

    pub fn app_name_ref(&self) -> Option<&str> {
        self.app_name.as_deref()
    }

    pub fn notify_error(&self, err: &Error, app: Option<&str>) {
        if let Some(cb) = &self.on_error {
            cb(err, app);
        }
    }

    pub fn notify_state_change(&self, app: &str, state: &str) {
        if let Some(cb) = &self.on_state_change {
            cb(app, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn builder_round_trip() {
        let cfg = OrchestratorConfig::new().debug(true).default_container("#root").app_name("shell");
        assert!(cfg.is_debug());
        assert_eq!(cfg.default_container_selector(), Some("#root"));
        assert_eq!(cfg.app_name_ref(), Some("shell"));
    }

    #[test]
    fn on_state_change_fires_with_app_and_state() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = seen.clone();
        let cfg = OrchestratorConfig::new().on_state_change(move |app, state| {
            seen2.borrow_mut().push((app.to_string(), state.to_string()));
        });
        cfg.notify_state_change("cart", "mounted");
        assert_eq!(seen.borrow()[0], ("cart".to_string(), "mounted".to_string()));
    }

    #[test]
    fn no_callback_configured_is_a_silent_no_op() {
        let cfg = OrchestratorConfig::new();
        cfg.notify_state_change("cart", "mounted");
        cfg.notify_error(&Error::NotRegistered("cart".into()), Some("cart"));
    }
}
