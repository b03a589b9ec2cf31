//! Dynamic Value Model
//!
//! Weft observes caller-owned, string-keyed records rather than a fixed set
//! of typed cells. This module defines the two halves of that model:
//!
//! - [`Value`]: a cheap-to-clone dynamic value. Scalars compare by value,
//!   records compare by identity, so the write path can use strict
//!   inequality to decide whether a mutation is observable.
//!
//! - [`Obj`]: a shared mutable record. It is the raw, untracked target;
//!   reads and writes through an `Obj` never touch the dependency graph.
//!   Tracked access goes through [`Reactive`](crate::reactive::Reactive).
//!
//! Records are identified by the address of their shared allocation. When
//! the last handle to an `Obj` is dropped, its entries in the dependency
//! graph and the wrapper registry are purged, so a forgotten record leaves
//! nothing behind.

use std::fmt::Debug;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::reactive::wrap::Reactive;
use crate::reactive::{graph, wrap};

/// Identity of a tracked record, derived from its allocation address.
///
/// Stable for the lifetime of the record; never reused while any handle to
/// the record is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(usize);

/// A dynamic value stored in a record property.
///
/// Equality is strict: scalar variants compare by value, `Obj` and
/// `Reactive` compare by identity, and values of different variants are
/// never equal. A write that stores an equal value is invisible to the
/// reactive system.
#[derive(Debug, Clone)]
pub enum Value {
    /// The absent value. Reading a property that was never set yields this.
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A plain record. Becomes reactive the first time it is read through
    /// a wrapper.
    Obj(Obj),
    /// A record wrapper produced by [`wrap`](crate::reactive::wrap()).
    Reactive(Reactive),
}

impl Value {
    /// True for record-shaped values, wrapped or not.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Obj(_) | Value::Reactive(_))
    }

    /// True for the absent value.
    pub fn is_unit(&self) -> bool {
        matches!(self, Value::Unit)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_obj(&self) -> Option<&Obj> {
        match self {
            Value::Obj(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_reactive(&self) -> Option<&Reactive> {
        match self {
            Value::Reactive(r) => Some(r),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Obj(a), Value::Obj(b)) => a.ptr_eq(b),
            (Value::Reactive(a), Value::Reactive(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Obj> for Value {
    fn from(o: Obj) -> Self {
        Value::Obj(o)
    }
}

impl From<Reactive> for Value {
    fn from(r: Reactive) -> Self {
        Value::Reactive(r)
    }
}

/// A caller-owned mutable record.
///
/// Cloning an `Obj` clones the handle, not the record; all clones see the
/// same fields. Accessors here are raw: they never track or trigger. Use
/// [`wrap`](crate::reactive::wrap()) to obtain the observing facade.
///
/// # Example
///
/// ```
/// use weft_core::{Obj, Value};
///
/// let user = Obj::new();
/// user.set("name", "ada");
/// user.set("logins", 1);
///
/// assert_eq!(user.get("name"), Value::from("ada"));
/// assert!(user.get("email").is_unit());
/// ```
#[derive(Clone)]
pub struct Obj {
    inner: Arc<ObjInner>,
}

struct ObjInner {
    fields: RwLock<IndexMap<String, Value>>,
}

impl Obj {
    /// Create an empty record.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ObjInner {
                fields: RwLock::new(IndexMap::new()),
            }),
        }
    }

    /// The record's identity.
    pub fn id(&self) -> ObjectId {
        ObjectId(Arc::as_ptr(&self.inner) as usize)
    }

    /// Read a property without tracking. Missing properties read as
    /// [`Value::Unit`].
    pub fn get(&self, key: &str) -> Value {
        self.inner
            .fields
            .read()
            .get(key)
            .cloned()
            .unwrap_or(Value::Unit)
    }

    /// Write a property without notifying subscribers.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner.fields.write().insert(key.into(), value.into());
    }

    /// Remove a property, returning its previous value if it was present.
    /// Raw like the other accessors here; no notification.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.fields.write().swap_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.fields.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.fields.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.fields.read().is_empty()
    }

    /// Property names in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.fields.read().keys().cloned().collect()
    }

    /// True if both handles refer to the same record.
    pub fn ptr_eq(&self, other: &Obj) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Obj {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Obj {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl FromIterator<(String, Value)> for Obj {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let obj = Obj::new();
        {
            let mut fields = obj.inner.fields.write();
            for (key, value) in iter {
                fields.insert(key, value);
            }
        }
        obj
    }
}

impl Debug for Obj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Obj")
            .field("id", &self.id())
            .field("len", &self.len())
            .finish()
    }
}

impl Drop for ObjInner {
    fn drop(&mut self) {
        // Last handle gone: no wrapper can exist either (wrappers hold the
        // record strongly), so both registries only hold dead entries.
        let id = ObjectId(self as *const ObjInner as usize);
        graph::purge(id);
        wrap::forget(id);
    }
}
