//! Weft Core
//!
//! This crate provides the dependency-tracking runtime for the Weft
//! reactive state framework. It implements:
//!
//! - Identity-stable wrappers over caller-owned records
//! - A property-level dependency graph with track/trigger semantics
//! - Reactive computations (effects) with automatic re-subscription
//! - Cached derived values (computeds) with explicit invalidation
//!
//! Rendering, templating, and scheduling policy live in other layers;
//! the only extension point offered here is the per-effect reschedule
//! callback.
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `value`: the dynamic record/value model the runtime observes
//! - `reactive`: wrappers, the dependency graph, effects, and computeds
//!
//! # Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicI64, Ordering};
//! use std::sync::Arc;
//! use weft_core::{Computed, Effect, Obj, Reactive};
//!
//! let cart = Obj::new();
//! cart.set("items", 2);
//! cart.set("price_each", 40);
//! let cart = Reactive::new(cart);
//!
//! let total = {
//!     let cart = cart.clone();
//!     Computed::new(move || {
//!         cart.get("items").as_int().unwrap_or(0)
//!             * cart.get("price_each").as_int().unwrap_or(0)
//!     })
//! };
//!
//! let shown = Arc::new(AtomicI64::new(0));
//! let _banner = {
//!     let (total, shown) = (total.clone(), Arc::clone(&shown));
//!     Effect::new(move || {
//!         shown.store(total.get(), Ordering::SeqCst);
//!     })
//! };
//! assert_eq!(shown.load(Ordering::SeqCst), 80);
//!
//! cart.set("items", 3);
//! assert_eq!(shown.load(Ordering::SeqCst), 120);
//! ```

pub mod reactive;
pub mod value;

pub use reactive::wrap::wrap;
pub use reactive::{is_reactive, Computed, Effect, Reactive, SubscriberId, IS_REACTIVE_KEY};
pub use value::{Obj, ObjectId, Value};
