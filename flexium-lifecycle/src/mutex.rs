use std::cell::RefCell;
use std::collections::VecDeque;

use futures::channel::oneshot;

/// A minimal non-reentrant async mutex for single-threaded `Rc`-based
/// code. Used to serialize one app's lifecycle transitions: each
/// transition must be awaited before the next is entered for a given app,
/// but the router drives `mount`/`unmount` by spawning futures without
/// awaiting them, so two transitions for the same app can otherwise race.
pub struct LocalMutex {
    locked: RefCell<bool>,
    waiters: RefCell<VecDeque<oneshot::Sender<()>>>,
}

impl LocalMutex {
    pub fn new() -> Self {
        Self { locked: RefCell::new(false), waiters: RefCell::new(VecDeque::new()) }
    }

    pub async fn lock(&self) -> LocalMutexGuard<'_> {
        if !*self.locked.borrow() {
            *self.locked.borrow_mut() = true;
        } else {
            let (tx, rx) = oneshot::channel();
            self.waiters.borrow_mut().push_back(tx);
            let _ = rx.await;
        }
        LocalMutexGuard { mutex: self }
    }
}

impl Default for LocalMutex {
    fn default() -> Self {
        Self::new()
    }
}

pub struct LocalMutexGuard<'a> {
    mutex: &'a LocalMutex,
}

impl Drop for LocalMutexGuard<'_> {
    fn drop(&mut self) {
        match self.mutex.waiters.borrow_mut().pop_front() {
            Some(tx) => {
                let _ = tx.send(());
            }
            None => {
                *self.mutex.locked.borrow_mut() = false;
            }
        }
    }
}
