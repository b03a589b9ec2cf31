//! Dependency Graph
//!
//! The graph records which observer reads which property of which record,
//! and re-invokes those observers when the property changes.
//!
//! # Shape
//!
//! A three-level association:
//!
//! ```text
//! record identity -> property key -> subscriber set (Dep)
//! ```
//!
//! Each [`Dep`] is shared: the graph holds it so `trigger` can find it,
//! and every subscribed observer holds it in its back-reference list so
//! cleanup can leave the set without rescanning the graph. Subscriber
//! entries are weak; an observer whose last strong handle is dropped
//! simply stops being reachable and is pruned on the next dispatch.
//!
//! # Dispatch
//!
//! Triggering always iterates a snapshot of the subscriber set, never the
//! live set. A re-running observer removes itself from the set and then
//! re-adds itself while the trigger is still in flight; iterating the
//! live set under that churn can loop forever or skip entries. The
//! snapshot guarantees termination and exactly-once dispatch per
//! subscriber per trigger.
//!
//! Dispatch is synchronous and recursive: an observer run by a trigger
//! may write and trigger further observers inline. The engine does not
//! bound that fan-out; a reschedule callback is the only deferral seam,
//! and settling cyclic write chains is the caller's responsibility.

use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::Mutex;

use super::observer::{self, Subscriber, SubscriberId};
use crate::value::{ObjectId, Value};

/// Shared handle to a subscriber set.
pub(crate) type DepRef = Arc<Dep>;

/// The set of observers subscribed to one property (or to one derived
/// value). Membership is what matters; order is irrelevant.
pub(crate) struct Dep {
    subscribers: Mutex<IndexMap<SubscriberId, Weak<dyn Subscriber>>>,
}

impl Dep {
    pub(crate) fn new() -> DepRef {
        Arc::new(Self {
            subscribers: Mutex::new(IndexMap::new()),
        })
    }

    /// Subscribe the currently active observer, if any.
    ///
    /// Also appends this set to the observer's back-reference list, but
    /// only on first insertion: re-reading the same property within one
    /// run must not duplicate either side of the linkage.
    pub(crate) fn track(this: &DepRef) {
        let Some(active) = observer::current() else {
            return;
        };
        let id = active.core().id();
        let newly_added = {
            let mut subscribers = this.subscribers.lock();
            if subscribers.contains_key(&id) {
                false
            } else {
                subscribers.insert(id, Arc::downgrade(&active));
                true
            }
        };
        if newly_added {
            active.core().record_dep(Arc::clone(this));
            tracing::trace!(subscriber = ?id, "tracked dependency");
        }
    }

    /// Remove one observer from the set. Called from observer cleanup via
    /// the back-reference list.
    pub(crate) fn remove(&self, id: SubscriberId) {
        self.subscribers.lock().swap_remove(&id);
    }

    /// Copy out the live subscribers, dropping dead weak entries as a side
    /// effect.
    fn snapshot(&self) -> Vec<Arc<dyn Subscriber>> {
        let mut subscribers = self.subscribers.lock();
        let mut live = Vec::with_capacity(subscribers.len());
        subscribers.retain(|_, weak| match weak.upgrade() {
            Some(subscriber) => {
                live.push(subscriber);
                true
            }
            None => false,
        });
        live
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

// Global target map. Keyed by record identity; purged from ObjInner::drop,
// so entries never outlive the records they describe.
static TARGETS: OnceLock<DashMap<ObjectId, IndexMap<String, DepRef>>> = OnceLock::new();

fn targets() -> &'static DashMap<ObjectId, IndexMap<String, DepRef>> {
    TARGETS.get_or_init(DashMap::new)
}

/// Record that the currently active observer reads `(target, key)`.
///
/// Reads outside any observer are untracked: no graph entry is created.
pub(crate) fn track(target: ObjectId, key: &str) {
    if observer::current().is_none() {
        return;
    }
    let dep = {
        let mut keys = targets().entry(target).or_default();
        keys.entry(key.to_owned()).or_insert_with(Dep::new).clone()
    };
    // The shard guard is released above; subscribers re-entering the
    // graph during nested runs must not find it held.
    Dep::track(&dep);
}

/// Notify every observer subscribed to `(target, key)`.
///
/// `new` and `old` are diagnostic only; the decision to trigger was
/// already made by the wrapper's strict-inequality check.
pub(crate) fn trigger(target: ObjectId, key: &str, new: &Value, old: &Value) {
    let dep = targets()
        .get(&target)
        .and_then(|keys| keys.get(key).cloned());
    let Some(dep) = dep else {
        // Property was never read inside an observer.
        return;
    };
    tracing::trace!(record = ?target, key, ?new, ?old, "triggering subscribers");
    dispatch(&dep);
}

/// Shared dispatch routine.
///
/// Used by property triggers and by derived values fanning out to their
/// own subscriber sets. Skips the currently active observer so a
/// computation that writes a property it also reads cannot re-enter
/// itself; everything else is rescheduled if it carries a reschedule
/// callback, or run inline otherwise.
pub(crate) fn dispatch(dep: &Dep) {
    let snapshot = dep.snapshot();
    let active = observer::current_id();
    for subscriber in snapshot {
        if active == Some(subscriber.core().id()) {
            continue;
        }
        subscriber.notify();
    }
}

/// Drop every subscriber set recorded for `target`.
pub(crate) fn purge(target: ObjectId) {
    if let Some(map) = TARGETS.get() {
        map.remove(&target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Obj;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    use super::super::observer::ObserverCore;

    struct MockSubscriber {
        core: ObserverCore,
        runs: AtomicI32,
        reschedules: AtomicI32,
    }

    impl MockSubscriber {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                core: ObserverCore::new(None),
                runs: AtomicI32::new(0),
                reschedules: AtomicI32::new(0),
            })
        }

        fn with_scheduler() -> Arc<Self> {
            Arc::new_cyclic(|weak: &std::sync::Weak<Self>| {
                let weak = weak.clone();
                let scheduler: Box<dyn Fn() + Send + Sync> = Box::new(move || {
                    if let Some(this) = weak.upgrade() {
                        this.reschedules.fetch_add(1, Ordering::SeqCst);
                    }
                });
                Self {
                    core: ObserverCore::new(Some(scheduler)),
                    runs: AtomicI32::new(0),
                    reschedules: AtomicI32::new(0),
                }
            })
        }
    }

    impl Subscriber for MockSubscriber {
        fn core(&self) -> &ObserverCore {
            &self.core
        }

        fn notify(&self) {
            if let Some(scheduler) = self.core.scheduler() {
                scheduler();
            } else {
                self.runs.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn track_as(subscriber: Arc<MockSubscriber>, target: ObjectId, key: &str) {
        let _guard = observer::push(subscriber);
        track(target, key);
    }

    #[test]
    fn untracked_read_creates_no_entry() {
        let obj = Obj::new();
        track(obj.id(), "a");

        let count = targets()
            .get(&obj.id())
            .map(|keys| keys.len())
            .unwrap_or(0);
        assert_eq!(count, 0);
    }

    #[test]
    fn trigger_runs_subscribers() {
        let obj = Obj::new();
        let subscriber = MockSubscriber::new();

        track_as(subscriber.clone(), obj.id(), "a");
        trigger(obj.id(), "a", &Value::Int(2), &Value::Int(1));

        assert_eq!(subscriber.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn trigger_on_unread_key_is_a_no_op() {
        let obj = Obj::new();
        let subscriber = MockSubscriber::new();

        track_as(subscriber.clone(), obj.id(), "a");
        trigger(obj.id(), "b", &Value::Int(2), &Value::Int(1));

        assert_eq!(subscriber.runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn repeated_reads_subscribe_once() {
        let obj = Obj::new();
        let subscriber = MockSubscriber::new();

        {
            let _guard = observer::push(subscriber.clone());
            track(obj.id(), "a");
            track(obj.id(), "a");
            track(obj.id(), "a");
        }

        assert_eq!(subscriber.core.dep_count(), 1);

        trigger(obj.id(), "a", &Value::Int(2), &Value::Int(1));
        assert_eq!(subscriber.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn scheduler_preempts_direct_run() {
        let obj = Obj::new();
        let subscriber = MockSubscriber::with_scheduler();

        track_as(subscriber.clone(), obj.id(), "a");
        trigger(obj.id(), "a", &Value::Int(2), &Value::Int(1));

        assert_eq!(subscriber.runs.load(Ordering::SeqCst), 0);
        assert_eq!(subscriber.reschedules.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispatch_skips_the_active_observer() {
        let obj = Obj::new();
        let subscriber = MockSubscriber::new();

        track_as(subscriber.clone(), obj.id(), "a");

        {
            // Trigger while the same observer is active, as happens when a
            // computation writes a property it also reads.
            let _guard = observer::push(subscriber.clone());
            trigger(obj.id(), "a", &Value::Int(2), &Value::Int(1));
        }

        assert_eq!(subscriber.runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cleanup_leaves_every_joined_set() {
        let obj = Obj::new();
        let subscriber = MockSubscriber::new();

        {
            let _guard = observer::push(subscriber.clone());
            track(obj.id(), "a");
            track(obj.id(), "b");
        }
        assert_eq!(subscriber.core.dep_count(), 2);

        subscriber.core.clear_deps();
        assert_eq!(subscriber.core.dep_count(), 0);

        trigger(obj.id(), "a", &Value::Int(2), &Value::Int(1));
        trigger(obj.id(), "b", &Value::Int(2), &Value::Int(1));
        assert_eq!(subscriber.runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dead_subscribers_are_pruned_on_dispatch() {
        let obj = Obj::new();
        let dep = {
            let subscriber = MockSubscriber::new();
            track_as(subscriber.clone(), obj.id(), "a");
            targets()
                .get(&obj.id())
                .and_then(|keys| keys.get("a").cloned())
                .expect("dep should exist after tracking")
        };

        // Subscriber dropped above; only its weak entry remains.
        assert_eq!(dep.subscriber_count(), 1);
        dispatch(&dep);
        assert_eq!(dep.subscriber_count(), 0);
    }

    #[test]
    fn dropping_the_record_purges_its_entries() {
        let id = {
            let obj = Obj::new();
            let subscriber = MockSubscriber::new();
            track_as(subscriber, obj.id(), "a");
            assert!(targets().contains_key(&obj.id()));
            obj.id()
        };

        assert!(!targets().contains_key(&id));
    }
}
