use std::rc::Rc;

use futures_util::future::LocalBoxFuture;

use crate::location::{Location, NavigationKind};
use crate::matcher::match_path;
use crate::router::{NavigateOptions, Router};

/// A view of [`Router`] scoped to one micro app's mount path: `navigate`
/// and `is_active` take paths relative to `base_path`, and
/// `relative_path` reports the current location the same way. Lets a
/// micro app route internally without knowing where the host mounted it.
pub struct ScopedRouter {
    router: Rc<Router>,
    base_path: String,
}

impl ScopedRouter {
    pub(crate) fn new(router: Rc<Router>, base_path: impl Into<String>) -> Self {
        Self { router, base_path: normalize_base(&base_path.into()) }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn navigate(&self, path: impl AsRef<str>, opts: NavigateOptions) -> LocalBoxFuture<'static, bool> {
        let full = join(&self.base_path, path.as_ref());
        self.router.navigate(full, opts)
    }

    /// Whether the current location matches `base_path` joined with
    /// `path` (`exact` has the same meaning as in [`crate::matcher::match_path`]).
    pub fn is_active(&self, path: impl AsRef<str>, exact: bool) -> bool {
        let full = join(&self.base_path, path.as_ref());
        match_path(&self.router.current().pathname, &full, exact).matched
    }

    /// The current pathname relative to `base_path` (e.g. `/orders/5`
    /// under base path `/shop` becomes `/orders/5`; outside `base_path` it
    /// falls back to the full pathname unchanged).
    pub fn relative_path(&self) -> String {
        strip_base(&self.router.current().pathname, &self.base_path)
    }

    pub fn on_navigate(&self, callback: Rc<dyn Fn(&Location, &Location, NavigationKind)>) -> impl FnOnce() {
        self.router.after_navigate(callback)
    }
}

fn normalize_base(base: &str) -> String {
    if base.is_empty() || base == "/" {
        return String::new();
    }
    let trimmed = base.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn join(base: &str, path: &str) -> String {
    if base.is_empty() {
        return if path.starts_with('/') { path.to_string() } else { format!("/{path}") };
    }
    let path = path.strip_prefix('/').unwrap_or(path);
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}

fn strip_base(pathname: &str, base: &str) -> String {
    if base.is_empty() {
        return pathname.to_string();
    }
    match pathname.strip_prefix(base) {
        Some(rest) if rest.is_empty() => "/".to_string(),
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        _ => pathname.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flexium_bus::EventBus;

    #[test]
    fn navigate_joins_base_path_and_relative_path() {
        let router = Router::new(EventBus::new(None));
        let scoped = router.create_scoped_router("/shop");
        futures::executor::block_on(scoped.navigate("/orders/5", NavigateOptions::default()));
        assert_eq!(router.current().pathname, "/shop/orders/5");
    }

    #[test]
    fn relative_path_strips_base_path() {
        let router = Router::new(EventBus::new(None));
        let scoped = router.create_scoped_router("/shop");
        futures::executor::block_on(router.navigate("/shop/orders/5", NavigateOptions::default()));
        assert_eq!(scoped.relative_path(), "/orders/5");
    }

    #[test]
    fn relative_path_outside_base_path_falls_back_to_full_pathname() {
        let router = Router::new(EventBus::new(None));
        let scoped = router.create_scoped_router("/shop");
        futures::executor::block_on(router.navigate("/other", NavigateOptions::default()));
        assert_eq!(scoped.relative_path(), "/other");
    }

    #[test]
    fn is_active_checks_against_joined_path() {
        let router = Router::new(EventBus::new(None));
        let scoped = router.create_scoped_router("/shop");
        futures::executor::block_on(router.navigate("/shop/orders", NavigateOptions::default()));
        assert!(scoped.is_active("/orders", true));
        assert!(!scoped.is_active("/cart", true));
    }

    #[test]
    fn empty_base_path_is_a_passthrough() {
        let router = Router::new(EventBus::new(None));
        let scoped = router.create_scoped_router("/");
        futures::executor::block_on(scoped.navigate("/a", NavigateOptions::default()));
        assert_eq!(router.current().pathname, "/a");
        assert_eq!(scoped.relative_path(), "/a");
    }
}
