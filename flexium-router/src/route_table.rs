use std::cell::RefCell;
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;

use crate::matcher::match_path;

/// The lifecycle engine's half of the router↔lifecycle contract. Kept as a
/// trait here (rather than `flexium-router` depending on `flexium-lifecycle`
/// directly) so the crate dependency order stays leaves-first: the router
/// bridge defines the interface it needs, and `flexium-lifecycle` implements
/// it. The orchestrator facade wires a concrete engine in via
/// [`Router::set_mounter`](crate::router::Router::set_mounter).
pub trait RouteMounter {
    fn mount(&self, app_name: &str) -> LocalBoxFuture<'static, ()>;
    fn unmount(&self, app_name: &str) -> LocalBoxFuture<'static, ()>;
    fn is_mounted(&self, app_name: &str) -> bool;
}

/// A path → app registration made via `registerMicroRoute`.
#[derive(Clone)]
pub struct MicroRoute {
    pub id: u64,
    pub path: String,
    pub app_name: String,
    pub exact: bool,
}

#[derive(Default)]
pub struct RouteTable {
    routes: RefCell<Vec<MicroRoute>>,
    next_id: RefCell<u64>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, path: impl Into<String>, app_name: impl Into<String>, exact: bool) -> u64 {
        let id = {
            let mut next = self.next_id.borrow_mut();
            *next += 1;
            *next
        };
        self.routes.borrow_mut().push(MicroRoute { id, path: path.into(), app_name: app_name.into(), exact });
        id
    }

    pub fn unregister(&self, id: u64) {
        self.routes.borrow_mut().retain(|r| r.id != id);
    }

    pub fn routes(&self) -> Vec<MicroRoute> {
        self.routes.borrow().clone()
    }
}

/// For every route whose pattern matches `pathname`, mounts its app if not
/// already mounted; for every route that does not match, unmounts its app
/// if mounted. Iterates the route table in registration order; mount/unmount
/// futures are fired without being awaited here — callers needing "all
/// mounted" semantics must await the returned futures themselves.
pub fn apply_route_transition(
    table: &RouteTable,
    mounter: Option<Rc<dyn RouteMounter>>,
    pathname: &str,
) -> Vec<LocalBoxFuture<'static, ()>> {
    let Some(mounter) = mounter else { return Vec::new() };
    let mut pending = Vec::new();
    for route in table.routes() {
        let is_match = match_path(pathname, &route.path, route.exact).matched;
        let mounted = mounter.is_mounted(&route.app_name);
        if is_match && !mounted {
            pending.push(mounter.mount(&route.app_name));
        } else if !is_match && mounted {
            pending.push(mounter.unmount(&route.app_name));
        }
    }
    pending
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;
    use std::collections::HashSet;
    use futures_util::FutureExt;

    struct FakeMounter {
        mounted: StdRefCell<HashSet<String>>,
        calls: StdRefCell<Vec<(String, &'static str)>>,
    }

    impl FakeMounter {
        fn new() -> Rc<Self> {
            Rc::new(Self { mounted: StdRefCell::new(HashSet::new()), calls: StdRefCell::new(Vec::new()) })
        }
    }

    impl RouteMounter for Rc<FakeMounter> {
        fn mount(&self, app_name: &str) -> LocalBoxFuture<'static, ()> {
            self.mounted.borrow_mut().insert(app_name.to_string());
            self.calls.borrow_mut().push((app_name.to_string(), "mount"));
            futures_util::future::ready(()).boxed_local()
        }

        fn unmount(&self, app_name: &str) -> LocalBoxFuture<'static, ()> {
            self.mounted.borrow_mut().remove(app_name);
            self.calls.borrow_mut().push((app_name.to_string(), "unmount"));
            futures_util::future::ready(()).boxed_local()
        }

        fn is_mounted(&self, app_name: &str) -> bool {
            self.mounted.borrow().contains(app_name)
        }
    }

    #[test]
    fn matching_route_mounts_and_non_matching_unmounts() {
        let table = RouteTable::new();
        table.register("/a", "app-a", true);
        table.register("/b", "app-b", true);
        let mounter = FakeMounter::new();
        mounter.mount("app-b"); // pretend app-b was mounted from a previous route

        let pending = apply_route_transition(&table, Some(mounter.clone() as Rc<dyn RouteMounter>), "/a");
        assert_eq!(pending.len(), 2); // mount app-a, unmount app-b
        assert_eq!(
            *mounter.calls.borrow(),
            vec![("app-a".to_string(), "mount"), ("app-b".to_string(), "unmount")]
        );
    }

    #[test]
    fn already_mounted_matching_app_is_a_no_op() {
        let table = RouteTable::new();
        table.register("/a", "app-a", true);
        let mounter = FakeMounter::new();
        mounter.mount("app-a");
        mounter.calls.borrow_mut().clear();

        let pending = apply_route_transition(&table, Some(mounter.clone() as Rc<dyn RouteMounter>), "/a");
        assert!(pending.is_empty());
    }

    #[test]
    fn no_mounter_configured_yields_no_pending_work() {
        let table = RouteTable::new();
        table.register("/a", "app-a", true);
        let pending = apply_route_transition(&table, None, "/a");
        assert!(pending.is_empty());
    }

    #[test]
    fn unregister_removes_route_from_future_transitions() {
        let table = RouteTable::new();
        let id = table.register("/a", "app-a", true);
        table.unregister(id);
        let mounter = FakeMounter::new();
        let pending = apply_route_transition(&table, Some(mounter.clone() as Rc<dyn RouteMounter>), "/a");
        assert!(pending.is_empty());
    }
}
