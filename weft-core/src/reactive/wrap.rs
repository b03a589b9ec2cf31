//! Wrapper Layer
//!
//! A [`Reactive`] is the interception facade over exactly one [`Obj`].
//! Reads through it feed the dependency graph's track path; writes feed
//! the trigger path. Raw access on the `Obj` itself stays invisible to
//! the reactive system.
//!
//! # Identity stability
//!
//! For a given record there is at most one live wrapper. Wrappers are
//! cached in a global identity-keyed registry holding weak handles, so
//! the registry neither keeps a wrapper alive nor prevents the record
//! from being dropped. When the last handle to a record goes away, its
//! registry entry is purged along with its dependency-graph entries.
//!
//! If every handle to a wrapper is dropped while the record lives on,
//! the next [`wrap`] call constructs a fresh facade. Tracking is keyed by
//! the record's identity, not the facade's, so subscriptions made through
//! the old facade keep firing.
//!
//! # Deep reactivity
//!
//! Reading a record-valued property returns it wrapped. Nested records
//! therefore become reactive the first time they are reached, never
//! eagerly.

use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;

use super::graph;
use crate::value::{Obj, ObjectId, Value};

/// Reserved property name answered by every wrapper without tracking.
///
/// Reading it through [`Reactive::get`] yields `Value::Bool(true)` and
/// records no dependency. Callers should normally prefer [`is_reactive`].
pub const IS_REACTIVE_KEY: &str = "__is_reactive";

// Registry of live wrappers, keyed by record identity. Weak on purpose:
// the registry is a cache, not an owner.
static REGISTRY: OnceLock<DashMap<ObjectId, Weak<ReactiveInner>>> = OnceLock::new();

fn registry() -> &'static DashMap<ObjectId, Weak<ReactiveInner>> {
    REGISTRY.get_or_init(DashMap::new)
}

/// Make a value observable.
///
/// - A plain record comes back wrapped, reusing the cached wrapper if one
///   is live (identity stability).
/// - An already-wrapped value comes back unchanged (idempotence).
/// - Anything else passes through unchanged; scalars have no properties
///   to observe.
///
/// # Example
///
/// ```
/// use weft_core::{is_reactive, wrap, Obj, Value};
///
/// let settings = Obj::new();
/// let wrapped = wrap(Value::from(settings.clone()));
///
/// assert!(is_reactive(&wrapped));
/// assert_eq!(wrap(wrapped.clone()), wrapped);
/// assert_eq!(wrap(Value::Int(3)), Value::Int(3));
/// ```
pub fn wrap(value: Value) -> Value {
    match value {
        Value::Reactive(wrapper) => Value::Reactive(wrapper),
        Value::Obj(target) => Value::Reactive(Reactive::new(target)),
        passthrough => passthrough,
    }
}

/// True only for values produced by [`wrap`].
pub fn is_reactive(value: &Value) -> bool {
    matches!(value, Value::Reactive(_))
}

/// Forget the registry entry for a record. Called when the record's last
/// handle drops; by then the entry can only be dead.
pub(crate) fn forget(target: ObjectId) {
    if let Some(map) = REGISTRY.get() {
        map.remove(&target);
    }
}

/// The observing facade over one record.
///
/// Cloning a `Reactive` clones the handle; all clones are the same
/// wrapper. Equality is wrapper identity.
#[derive(Clone)]
pub struct Reactive {
    inner: Arc<ReactiveInner>,
}

pub(crate) struct ReactiveInner {
    target: Obj,
}

impl Reactive {
    /// Wrap a record, reusing the cached wrapper when one is live.
    pub fn new(target: Obj) -> Self {
        let id = target.id();

        if let Some(inner) = registry().get(&id).and_then(|entry| entry.upgrade()) {
            return Self { inner };
        }

        let inner = Arc::new(ReactiveInner { target });
        registry().insert(id, Arc::downgrade(&inner));
        tracing::debug!(record = ?id, "installed wrapper");
        Self { inner }
    }

    /// Tracked property read.
    ///
    /// Registers the currently active observer (if any) as a subscriber
    /// of `(record, key)`, then delegates to the raw read. Record-valued
    /// results come back wrapped.
    pub fn get(&self, key: &str) -> Value {
        if key == IS_REACTIVE_KEY {
            return Value::Bool(true);
        }
        graph::track(self.inner.target.id(), key);
        wrap(self.inner.target.get(key))
    }

    /// Observable property write.
    ///
    /// Captures the old value, performs the raw write, and notifies
    /// subscribers only if the new value is not strictly equal to the
    /// old one. Writes that change nothing stay silent.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        let old = self.inner.target.get(key);
        self.inner.target.set(key, value.clone());
        if value != old {
            graph::trigger(self.inner.target.id(), key, &value, &old);
        }
    }

    /// The underlying record, for raw (untracked) access.
    pub fn target(&self) -> &Obj {
        &self.inner.target
    }

    /// True if both handles are the same wrapper.
    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl std::fmt::Debug for Reactive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactive")
            .field("target", &self.inner.target)
            .finish()
    }
}
