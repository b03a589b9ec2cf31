//! Effect Implementation
//!
//! An effect is a restartable, trackable computation wrapping an
//! arbitrary side-effecting closure.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its closure immediately to discover
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect re-runs — or, if it carries
//!    a reschedule callback, that callback is invoked instead. The
//!    callback is the only seam for deferred or batched execution; the
//!    engine itself never defers.
//!
//! 3. Every run starts by leaving all previously joined subscriber sets,
//!    so dependencies that vary by branch never leave a stale
//!    subscription behind.
//!
//! # Stopping
//!
//! [`Effect::stop`] is terminal: it detaches the effect from every
//! subscriber set and no dependency change will run it again. A stopped
//! effect can still be invoked one-off via [`Effect::run`]; such runs are
//! untracked and leave no trace in the graph.

use std::sync::{Arc, Weak};

use super::observer::{self, ObserverCore, Subscriber};

/// The shared computation unit behind [`Effect`] and
/// [`Computed`](super::Computed).
///
/// Generic over the closure's result so a derived value's getter can be
/// run through the same tracking discipline as a side-effecting closure.
pub(crate) struct EffectInner<T> {
    core: ObserverCore,
    // Self-handle so `notify` can re-run through an owning pointer.
    weak_self: Weak<EffectInner<T>>,
    callback: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T: Send + Sync + 'static> EffectInner<T> {
    /// Build a computation unit without running it.
    pub(crate) fn new<F>(
        callback: F,
        scheduler: Option<Box<dyn Fn() + Send + Sync>>,
    ) -> Arc<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Arc::new_cyclic(|weak| Self {
            core: ObserverCore::new(scheduler),
            weak_self: weak.clone(),
            callback: Box::new(callback),
        })
    }

    /// Run the closure with dependency tracking.
    ///
    /// Stopped units run the closure directly, with no tracking, so a
    /// disposed computation can still be invoked without poisoning the
    /// graph. Active units first leave every subscriber set joined on the
    /// previous run, then install themselves as the active observer for
    /// the duration of the closure. The previous observer is restored by
    /// the guard even if the closure panics.
    pub(crate) fn run(&self) -> T {
        if !self.core.is_active() {
            return (self.callback)();
        }
        self.core.clear_deps();
        let this = self
            .weak_self
            .upgrade()
            .expect("running computation must be owned by an Arc");
        let _guard = observer::push(this);
        (self.callback)()
    }

    /// Detach from every subscriber set and refuse future tracked runs.
    /// Idempotent.
    pub(crate) fn stop(&self) {
        if self.core.deactivate() {
            self.core.clear_deps();
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.core.is_active()
    }
}

impl<T: Send + Sync + 'static> Subscriber for EffectInner<T> {
    fn core(&self) -> &ObserverCore {
        &self.core
    }

    fn notify(&self) {
        if let Some(scheduler) = self.core.scheduler() {
            scheduler();
        } else if let Some(this) = self.weak_self.upgrade() {
            this.run();
        }
    }
}

/// A reactive computation that re-runs when its dependencies change.
///
/// Created with a closure that is executed once immediately; every
/// property read through a wrapper during that run subscribes the effect
/// to the property.
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicI64, Ordering};
/// use std::sync::Arc;
/// use weft_core::{Effect, Obj, Reactive};
///
/// let counter = Obj::new();
/// counter.set("count", 1);
/// let counter = Reactive::new(counter);
///
/// let seen = Arc::new(AtomicI64::new(0));
/// let effect = {
///     let (counter, seen) = (counter.clone(), Arc::clone(&seen));
///     Effect::new(move || {
///         seen.store(counter.get("count").as_int().unwrap_or(0), Ordering::SeqCst);
///     })
/// };
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
///
/// counter.set("count", 2);
/// assert_eq!(seen.load(Ordering::SeqCst), 2);
///
/// effect.stop();
/// counter.set("count", 3);
/// assert_eq!(seen.load(Ordering::SeqCst), 2);
/// ```
pub struct Effect {
    inner: Arc<EffectInner<()>>,
}

impl Effect {
    /// Create an effect and run it once to discover its dependencies.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::build(callback, None)
    }

    /// Create an effect whose dependency changes invoke `scheduler`
    /// instead of re-running the closure.
    ///
    /// The initial discovery run still happens; only subsequent triggers
    /// are redirected. Re-running is then the scheduler's job, typically
    /// by calling [`Effect::run`] at a time of its choosing.
    pub fn with_scheduler<F, S>(callback: F, scheduler: S) -> Self
    where
        F: Fn() + Send + Sync + 'static,
        S: Fn() + Send + Sync + 'static,
    {
        Self::build(callback, Some(Box::new(scheduler)))
    }

    fn build<F>(callback: F, scheduler: Option<Box<dyn Fn() + Send + Sync>>) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let inner = EffectInner::new(callback, scheduler);
        inner.run();
        Self { inner }
    }

    /// Re-run the closure with tracking (untracked once stopped).
    pub fn run(&self) {
        self.inner.run();
    }

    /// Stop the effect: detach it from every dependency, permanently.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// False once [`stop`](Effect::stop) has been called.
    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::wrap::Reactive;
    use crate::value::Obj;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn effect_runs_on_creation() {
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();

        let _effect = Effect::new(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effect_reruns_on_dependency_change() {
        let obj = Obj::new();
        obj.set("a", 1);
        let wrapper = Reactive::new(obj);

        let runs = Arc::new(AtomicI32::new(0));
        let _effect = {
            let (wrapper, runs) = (wrapper.clone(), runs.clone());
            Effect::new(move || {
                wrapper.get("a");
                runs.fetch_add(1, Ordering::SeqCst);
            })
        };
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        wrapper.set("a", 2);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn scheduler_replaces_direct_rerun() {
        let obj = Obj::new();
        obj.set("a", 1);
        let wrapper = Reactive::new(obj);

        let runs = Arc::new(AtomicI32::new(0));
        let reschedules = Arc::new(AtomicI32::new(0));

        let _effect = {
            let (wrapper, runs) = (wrapper.clone(), runs.clone());
            let reschedules = reschedules.clone();
            Effect::with_scheduler(
                move || {
                    wrapper.get("a");
                    runs.fetch_add(1, Ordering::SeqCst);
                },
                move || {
                    reschedules.fetch_add(1, Ordering::SeqCst);
                },
            )
        };
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        wrapper.set("a", 2);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(reschedules.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_detaches_from_dependencies() {
        let obj = Obj::new();
        obj.set("a", 1);
        let wrapper = Reactive::new(obj);

        let runs = Arc::new(AtomicI32::new(0));
        let effect = {
            let (wrapper, runs) = (wrapper.clone(), runs.clone());
            Effect::new(move || {
                wrapper.get("a");
                runs.fetch_add(1, Ordering::SeqCst);
            })
        };
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        effect.stop();
        assert!(!effect.is_active());

        wrapper.set("a", 2);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // Stopping again is fine.
        effect.stop();
    }

    #[test]
    fn stopped_effect_runs_untracked() {
        let obj = Obj::new();
        obj.set("a", 1);
        let wrapper = Reactive::new(obj);

        let runs = Arc::new(AtomicI32::new(0));
        let effect = {
            let (wrapper, runs) = (wrapper.clone(), runs.clone());
            Effect::new(move || {
                wrapper.get("a");
                runs.fetch_add(1, Ordering::SeqCst);
            })
        };

        effect.stop();
        effect.run();
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        // The one-off run must not have resubscribed.
        wrapper.set("a", 2);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn manual_rerun_tracks_fresh_dependencies() {
        let obj = Obj::new();
        obj.set("a", 1);
        let wrapper = Reactive::new(obj);

        let runs = Arc::new(AtomicI32::new(0));
        let effect = {
            let (wrapper, runs) = (wrapper.clone(), runs.clone());
            Effect::new(move || {
                wrapper.get("a");
                runs.fetch_add(1, Ordering::SeqCst);
            })
        };

        effect.run();
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        wrapper.set("a", 5);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
