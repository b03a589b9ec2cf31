//! Reactive Engine
//!
//! This module implements the tracking/triggering engine and its two
//! client abstractions: effects and computeds.
//!
//! # Concepts
//!
//! ## Wrappers
//!
//! A [`Reactive`] wrapper intercepts property access on a caller-owned
//! record. Reads inside a running computation register that computation
//! as a subscriber of the property; effective writes notify every
//! subscriber.
//!
//! ## Effects
//!
//! An [`Effect`] is a side-effecting computation that re-runs whenever a
//! property it read on its last run changes. Dependencies are
//! rediscovered on every run, so branches that stop being taken stop
//! being watched.
//!
//! ## Computeds
//!
//! A [`Computed`] is a cached derived value. It recomputes lazily, on the
//! first read after an upstream change, and is itself observable by other
//! computations.
//!
//! # Implementation Notes
//!
//! Tracking relies on a thread-local "active observer" maintained with an
//! RAII guard, so nested computations and panicking callbacks both
//! restore attribution correctly. Trigger dispatch always iterates a
//! snapshot of the subscriber set and skips the observer that caused the
//! write. This design ("transparent reactivity") follows the scheme used
//! by Vue 3, SolidJS, and Leptos.

mod computed;
mod effect;
pub(crate) mod graph;
mod observer;
pub(crate) mod wrap;

pub use computed::Computed;
pub use effect::Effect;
pub use observer::SubscriberId;
pub use wrap::{is_reactive, wrap, Reactive, IS_REACTIVE_KEY};
