//! A small, single-threaded, fine-grained-reactive primitive: four
//! operations — `Cell`, `run_effect`, `batch`, `untrack` — in the
//! `Rc<RefCell<_>>` idiom used throughout the browser-side Rust ecosystem
//! (see e.g. `yew::scheduler::Shared<T>`). The rest of the workspace
//! depends on this crate only through that four-function surface, so a
//! maintained signals library (e.g. `leptos_reactive`) could stand in for
//! it without touching any consumer.
//!
//! Dependency tracking is push-based and deliberately conservative: an
//! effect that reads a cell subscribes to it for the lifetime of the
//! effect (or until the effect is disposed), even if a later run no
//! longer reads that cell. This trades a small amount of over-notification
//! for a simpler, easier-to-audit implementation — acceptable here since
//! the primitive is explicitly out of scope for the orchestrator itself.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

struct EffectNode {
    runner: RefCell<Box<dyn FnMut()>>,
    disposed: RefCell<bool>,
}

thread_local! {
    static EFFECT_STACK: RefCell<Vec<Rc<EffectNode>>> = const { RefCell::new(Vec::new()) };
    static UNTRACK_DEPTH: RefCell<u32> = const { RefCell::new(0) };
    static BATCH_DEPTH: RefCell<u32> = const { RefCell::new(0) };
    static BATCH_QUEUE: RefCell<Vec<Rc<EffectNode>>> = const { RefCell::new(Vec::new()) };
}

fn current_effect() -> Option<Rc<EffectNode>> {
    let tracking = UNTRACK_DEPTH.with(|d| *d.borrow() == 0);
    if !tracking {
        return None;
    }
    EFFECT_STACK.with(|s| s.borrow().last().cloned())
}

fn schedule(effect: Rc<EffectNode>) {
    let batching = BATCH_DEPTH.with(|d| *d.borrow() > 0);
    if batching {
        BATCH_QUEUE.with(|q| {
            let mut q = q.borrow_mut();
            if !q.iter().any(|e| Rc::ptr_eq(e, &effect)) {
                q.push(effect);
            }
        });
    } else {
        run_effect_node(&effect);
    }
}

fn run_effect_node(node: &Rc<EffectNode>) {
    if *node.disposed.borrow() {
        return;
    }
    EFFECT_STACK.with(|s| s.borrow_mut().push(node.clone()));
    // `runner` is only ever borrowed here, and reentrant scheduling during a
    // run is queued (batched) rather than re-entering this borrow.
    let mut runner = node.runner.borrow_mut();
    (runner)();
    drop(runner);
    EFFECT_STACK.with(|s| {
        s.borrow_mut().pop();
    });
}

/// One reactive slot: a value with change notification.
///
/// Corresponds to the consumed `createCell(initial) -> {read, write, peek}`
/// contract. `T` must be `Clone + PartialEq` — writes are only considered
/// "distinct" (and therefore notify subscribers) when `PartialEq` says so,
/// matching `watch()`'s "fires on every distinct new value" requirement
/// upstream.
pub struct Cell<T> {
    inner: Rc<RefCell<CellInner<T>>>,
}

struct CellInner<T> {
    value: T,
    subscribers: Vec<Weak<EffectNode>>,
}

impl<T> Clone for Cell<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T: Clone + PartialEq> Cell<T> {
    pub fn new(initial: T) -> Self {
        Self { inner: Rc::new(RefCell::new(CellInner { value: initial, subscribers: Vec::new() })) }
    }

    /// Reads the current value, registering the enclosing `run_effect` (if
    /// any, and if not inside `untrack`) as a subscriber.
    pub fn read(&self) -> T {
        if let Some(effect) = current_effect() {
            let mut inner = self.inner.borrow_mut();
            let already = inner.subscribers.iter().any(|w| w.upgrade().map(|e| Rc::ptr_eq(&e, &effect)).unwrap_or(false));
            if !already {
                inner.subscribers.push(Rc::downgrade(&effect));
            }
        }
        self.inner.borrow().value.clone()
    }

    /// Reads the current value without registering any dependency.
    pub fn peek(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Writes a new value computed from the previous one. Subscribers are
    /// notified (immediately, or queued if inside `batch`) only when the
    /// new value differs from the old one by `PartialEq`.
    pub fn write(&self, updater: impl FnOnce(&T) -> T) {
        let (changed, to_notify) = {
            let mut inner = self.inner.borrow_mut();
            let next = updater(&inner.value);
            if next == inner.value {
                (false, Vec::new())
            } else {
                inner.value = next;
                let live: Vec<Weak<EffectNode>> =
                    inner.subscribers.iter().filter(|w| w.strong_count() > 0).cloned().collect();
                inner.subscribers = live.clone();
                (true, live)
            }
        };
        if changed {
            for weak in to_notify {
                if let Some(effect) = weak.upgrade() {
                    schedule(effect);
                }
            }
        }
    }

    /// Convenience for `write(|_| value)`.
    pub fn set(&self, value: T) {
        self.write(|_| value.clone());
    }
}

/// Runs `f` now and re-runs it whenever a cell it read (outside `untrack`)
/// is written with a distinct value. Returns a disposer; calling it stops
/// future re-runs (a disposed effect's remaining weak subscriptions are
/// skipped rather than eagerly removed from their cells).
pub fn run_effect(mut f: impl FnMut() + 'static) -> impl FnOnce() {
    let node = Rc::new(EffectNode { runner: RefCell::new(Box::new(move || f())), disposed: RefCell::new(false) });
    run_effect_node(&node);
    let disposer_handle = node.clone();
    move || {
        *disposer_handle.disposed.borrow_mut() = true;
    }
}

/// Coalesces writes made inside `f`: subscriber effects scheduled by any
/// cell write during `f` run once, after `f` returns, deduplicated by
/// effect identity. Nested `batch` calls defer to the outermost one.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    BATCH_DEPTH.with(|d| *d.borrow_mut() += 1);
    let result = f();
    let is_outermost = BATCH_DEPTH.with(|d| {
        let mut d = d.borrow_mut();
        *d -= 1;
        *d == 0
    });
    if is_outermost {
        loop {
            let next = BATCH_QUEUE.with(|q| {
                let mut q = q.borrow_mut();
                if q.is_empty() {
                    None
                } else {
                    Some(std::mem::take(&mut *q))
                }
            });
            match next {
                Some(effects) => {
                    for effect in effects {
                        run_effect_node(&effect);
                    }
                }
                None => break,
            }
        }
    }
    result
}

/// Runs `f` without registering any cell reads inside it as dependencies
/// of the enclosing effect (if any).
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    UNTRACK_DEPTH.with(|d| *d.borrow_mut() += 1);
    let result = f();
    UNTRACK_DEPTH.with(|d| *d.borrow_mut() -= 1);
    result
}
