//! Observer Identity and the Active-Observer Context
//!
//! Dependency tracking needs to answer one question at every property
//! read: "which computation is running right now?" This module owns that
//! answer.
//!
//! Each thread keeps a stack of the observers currently on the call
//! stack. Entering a tracked run pushes the observer and returns a guard;
//! dropping the guard pops it. Because the pop lives in `Drop`, a
//! panicking callback restores the previous observer on unwind, and a
//! computation that starts another computation mid-run gets correct
//! attribution when the inner one finishes.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::graph::DepRef;

/// Unique identifier for a subscriber.
///
/// Used as the membership key in subscriber sets, so one observer is never
/// registered twice for the same property within a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Anything that can sit in a subscriber set and be told that one of its
/// dependencies changed.
pub(crate) trait Subscriber: Send + Sync {
    /// The tracking state shared by every observer kind.
    fn core(&self) -> &ObserverCore;

    /// React to a dependency change: run the reschedule callback if one
    /// was supplied, otherwise re-run directly.
    fn notify(&self);
}

/// Tracking state embedded in every observer.
///
/// Holds the observer's identity, its active flag, the optional reschedule
/// callback, and the back-reference list of every subscriber set the
/// observer currently belongs to. The back references make cleanup O(sets
/// joined) instead of a scan of the whole graph.
pub(crate) struct ObserverCore {
    id: SubscriberId,
    active: AtomicBool,
    scheduler: Option<Box<dyn Fn() + Send + Sync>>,
    deps: Mutex<SmallVec<[DepRef; 4]>>,
}

impl ObserverCore {
    pub(crate) fn new(scheduler: Option<Box<dyn Fn() + Send + Sync>>) -> Self {
        Self {
            id: SubscriberId::new(),
            active: AtomicBool::new(true),
            scheduler,
            deps: Mutex::new(SmallVec::new()),
        }
    }

    pub(crate) fn id(&self) -> SubscriberId {
        self.id
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Flip to stopped. Returns true on the first call, false once stopped.
    pub(crate) fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn scheduler(&self) -> Option<&(dyn Fn() + Send + Sync)> {
        self.scheduler.as_deref()
    }

    /// Remember a subscriber set this observer just joined.
    pub(crate) fn record_dep(&self, dep: DepRef) {
        self.deps.lock().push(dep);
    }

    /// Leave every subscriber set joined so far and forget them.
    ///
    /// Runs at the start of every tracked run (so stale branches drop off)
    /// and on stop.
    pub(crate) fn clear_deps(&self) {
        let deps = std::mem::take(&mut *self.deps.lock());
        for dep in deps {
            dep.remove(self.id);
        }
    }

    #[cfg(test)]
    pub(crate) fn dep_count(&self) -> usize {
        self.deps.lock().len()
    }
}

thread_local! {
    static ACTIVE_OBSERVERS: RefCell<Vec<Arc<dyn Subscriber>>> = RefCell::new(Vec::new());
}

/// Install `observer` as the active one until the guard drops.
pub(crate) fn push(observer: Arc<dyn Subscriber>) -> ObserverGuard {
    let id = observer.core().id();
    ACTIVE_OBSERVERS.with(|stack| stack.borrow_mut().push(observer));
    ObserverGuard { id }
}

/// The innermost running observer, if any.
pub(crate) fn current() -> Option<Arc<dyn Subscriber>> {
    ACTIVE_OBSERVERS.with(|stack| stack.borrow().last().cloned())
}

/// Identity of the innermost running observer, if any.
pub(crate) fn current_id() -> Option<SubscriberId> {
    ACTIVE_OBSERVERS.with(|stack| stack.borrow().last().map(|o| o.core().id()))
}

/// Guard that restores the previously active observer when dropped.
pub(crate) struct ObserverGuard {
    id: SubscriberId,
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        ACTIVE_OBSERVERS.with(|stack| {
            let popped = stack.borrow_mut().pop();
            if let Some(observer) = popped {
                debug_assert_eq!(
                    observer.core().id(),
                    self.id,
                    "observer stack mismatch on exit"
                );
            }
        });
    }
}
