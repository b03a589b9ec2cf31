//! Computed Implementation
//!
//! A [`Computed`] is a cached derived value built on the same computation
//! unit as [`Effect`](super::Effect), plus a dirty flag and a subscriber
//! set of its own.
//!
//! # How Computeds Work
//!
//! 1. The getter never runs eagerly; the first [`get`](Computed::get)
//!    evaluates it and caches the result.
//!
//! 2. The internal unit's reschedule callback does not recompute. It only
//!    flips the dirty flag and, on the clean-to-dirty transition, fans
//!    out to the computed's own subscribers — consumers are invalidated
//!    without forcing the getter to run.
//!
//! 3. Reads between invalidations cost one cached clone, not a getter
//!    execution.
//!
//! A computed is itself observable: an effect that reads it subscribes to
//! it exactly as it would to a record property.

use std::sync::Arc;

use parking_lot::RwLock;

use super::effect::EffectInner;
use super::graph::{self, Dep, DepRef};

/// A memoized derived value that is itself observable.
///
/// # Example
///
/// ```
/// use weft_core::{Computed, Obj, Reactive};
///
/// let order = Obj::new();
/// order.set("subtotal", 40);
/// let order = Reactive::new(order);
///
/// let total = {
///     let order = order.clone();
///     Computed::new(move || order.get("subtotal").as_int().unwrap_or(0) + 5)
/// };
///
/// assert_eq!(total.get(), 45);
/// order.set("subtotal", 100);
/// assert_eq!(total.get(), 105);
/// ```
pub struct Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<ComputedInner<T>>,
}

struct ComputedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// The getter, wrapped in a computation unit so its reads are tracked.
    effect: Arc<EffectInner<T>>,

    /// Subscribers that read this computed inside their own runs.
    dep: DepRef,

    /// Cache staleness plus the cached value. Guarded together so a
    /// recomputation is observed atomically.
    cache: RwLock<Cache<T>>,

    /// Optional write delegate. Absent for read-only computeds.
    setter: Option<Box<dyn Fn(T) + Send + Sync>>,
}

struct Cache<T> {
    dirty: bool,
    value: Option<T>,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a read-only computed from a getter.
    ///
    /// Writing to it is a logged no-op; a derived value may legitimately
    /// have no meaningful inverse.
    pub fn new<G>(getter: G) -> Self
    where
        G: Fn() -> T + Send + Sync + 'static,
    {
        Self::build(getter, None)
    }

    /// Create a writable computed from a getter and a setter.
    ///
    /// The setter only delegates; it never touches the dirty flag. A
    /// computed's staleness is driven exclusively by its upstream reads.
    pub fn with_setter<G, S>(getter: G, setter: S) -> Self
    where
        G: Fn() -> T + Send + Sync + 'static,
        S: Fn(T) + Send + Sync + 'static,
    {
        Self::build(getter, Some(Box::new(setter)))
    }

    fn build<G>(getter: G, setter: Option<Box<dyn Fn(T) + Send + Sync>>) -> Self
    where
        G: Fn() -> T + Send + Sync + 'static,
    {
        let inner = Arc::new_cyclic(|weak: &std::sync::Weak<ComputedInner<T>>| {
            let weak = weak.clone();
            let scheduler: Box<dyn Fn() + Send + Sync> = Box::new(move || {
                if let Some(computed) = weak.upgrade() {
                    computed.invalidate();
                }
            });
            ComputedInner {
                effect: EffectInner::new(getter, Some(scheduler)),
                dep: Dep::new(),
                cache: RwLock::new(Cache {
                    dirty: true,
                    value: None,
                }),
                setter,
            }
        });
        Self { inner }
    }

    /// Read the derived value, recomputing only if an upstream dependency
    /// changed since the last read.
    ///
    /// If called inside an observer's run, that observer is subscribed to
    /// this computed before any recomputation happens.
    pub fn get(&self) -> T {
        Dep::track(&self.inner.dep);

        if self.inner.cache.read().dirty {
            let value = self.inner.effect.run();
            let mut cache = self.inner.cache.write();
            cache.value = Some(value.clone());
            cache.dirty = false;
            return value;
        }

        self.inner
            .cache
            .read()
            .value
            .clone()
            .expect("clean computed holds a value")
    }

    /// Write through to the setter. Read-only computeds log and ignore
    /// the write.
    pub fn set(&self, value: T) {
        match &self.inner.setter {
            Some(setter) => setter(value),
            None => tracing::warn!("computed is read-only; ignoring write"),
        }
    }

    /// True while an upstream change is pending a recomputation.
    pub fn is_dirty(&self) -> bool {
        self.inner.cache.read().dirty
    }
}

impl<T> ComputedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Upstream dependency changed: mark stale and, on the first such
    /// change since the last read, invalidate our own subscribers.
    fn invalidate(&self) {
        let newly_dirty = {
            let mut cache = self.cache.write();
            let was_clean = !cache.dirty;
            cache.dirty = true;
            was_clean
        };
        if newly_dirty {
            tracing::trace!("computed invalidated");
            graph::dispatch(&self.dep);
        }
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("dirty", &self.is_dirty())
            .finish()
    }
}
