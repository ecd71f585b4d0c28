use std::cell::RefCell;
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;

use crate::location::{Location, NavigationKind};

/// `async (to, from) -> bool`. Guards run sequentially; the first falsy
/// result aborts the navigation. A guard that panics is treated as a
/// synchronous `false` by [`GuardRegistry::run_before`] rather than
/// unwinding into the router (a single misbehaving guard must not wedge
/// every navigation).
pub type BeforeGuard = Rc<dyn Fn(&str, &str) -> LocalBoxFuture<'static, bool>>;
pub type AfterCallback = Rc<dyn Fn(&Location, &Location, NavigationKind)>;

struct Entry<T> {
    id: u64,
    value: T,
}

/// Ordered, disposable registries for `beforeNavigate`/`afterNavigate`.
#[derive(Default)]
pub struct GuardRegistry {
    before: RefCell<Vec<Entry<BeforeGuard>>>,
    after: RefCell<Vec<Entry<AfterCallback>>>,
    next_id: RefCell<u64>,
}

impl GuardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> u64 {
        let mut id = self.next_id.borrow_mut();
        *id += 1;
        *id
    }

    /// Registers a before-navigate guard. Returns a disposer that removes it.
    pub fn before_navigate(self: &Rc<Self>, guard: BeforeGuard) -> impl FnOnce() {
        let id = self.next_id();
        self.before.borrow_mut().push(Entry { id, value: guard });
        let this = self.clone();
        move || this.before.borrow_mut().retain(|e| e.id != id)
    }

    /// Registers an after-navigate callback. Returns a disposer.
    pub fn after_navigate(self: &Rc<Self>, callback: AfterCallback) -> impl FnOnce() {
        let id = self.next_id();
        self.after.borrow_mut().push(Entry { id, value: callback });
        let this = self.clone();
        move || this.after.borrow_mut().retain(|e| e.id != id)
    }

    /// Runs every before-guard in registration order, awaiting each before
    /// starting the next. Stops at (and returns `false` from) the first
    /// falsy result.
    pub async fn run_before(&self, to: &str, from: &str) -> bool {
        let guards: Vec<BeforeGuard> = self.before.borrow().iter().map(|e| e.value.clone()).collect();
        for guard in guards {
            let built = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| guard(to, from)));
            let passed = match built {
                Ok(future) => std::panic::AssertUnwindSafe(future).catch_unwind().await.unwrap_or_else(|_| {
                    tracing::warn!(to, from, "navigation guard panicked; treating as blocked");
                    false
                }),
                Err(_) => {
                    tracing::warn!(to, from, "navigation guard panicked; treating as blocked");
                    false
                }
            };
            if !passed {
                return false;
            }
        }
        true
    }

    pub fn run_after(&self, to: &Location, from: &Location, kind: NavigationKind) {
        let callbacks: Vec<AfterCallback> = self.after.borrow().iter().map(|e| e.value.clone()).collect();
        for callback in callbacks {
            callback(to, from, kind);
        }
    }
}
