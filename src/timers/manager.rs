//! Deferred callback manager
//!
//! One [`DeferredCallback`] belongs to one component instance. It is rendered once
//! per render of its owner:
//!
//! - the callback passed on every render replaces the stored one, without touching
//!   the schedule;
//! - the timer is (re)armed only when the dependency slice differs from the one
//!   seen on the previous render, or on the first render;
//! - dropping the manager is the component teardown and cancels whatever is armed.
//!
//! The scheduled invocation never captures a callback value. It reads the most
//! recently supplied callback when it fires.

use super::backend::TimerBackend;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Lifecycle of the current scheduled invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    /// Never armed
    Unarmed,
    /// Scheduled and waiting to fire
    Armed,
    /// The scheduled invocation ran
    Fired,
    /// Cancelled explicitly or by teardown
    Cancelled,
}

/// Shared between the manager and the scheduled invocation
struct CallbackSlot {
    latest: RefCell<Option<Rc<dyn Fn()>>>,
    phase: Cell<TimerPhase>,
    generation: Cell<u64>,
}

impl CallbackSlot {
    fn fire(&self, generation: u64) {
        if self.generation.get() != generation || self.phase.get() != TimerPhase::Armed {
            warn!(
                "Ignoring stale timer invocation (generation {}, current {}, phase {:?})",
                generation,
                self.generation.get(),
                self.phase.get()
            );
            return;
        }
        self.phase.set(TimerPhase::Fired);

        // Clone out so the callback may render its owner again while running
        let callback = self.latest.borrow().clone();
        if let Some(callback) = callback {
            trace!("Timer generation {} fired", generation);
            callback();
        }
    }
}

struct Inner<B: TimerBackend> {
    backend: B,
    active: RefCell<Option<B::Handle>>,
    slot: Rc<CallbackSlot>,
}

impl<B: TimerBackend> Inner<B> {
    fn cancel_active(&self) {
        if let Some(handle) = self.active.borrow().as_ref() {
            self.backend.cancel(handle);
        }
        if self.slot.phase.get() == TimerPhase::Armed {
            self.slot.phase.set(TimerPhase::Cancelled);
            debug!("Cancelled timer generation {}", self.slot.generation.get());
        }
    }
}

/// Restartable, leak-safe deferred callback owned by one component instance
///
/// `D` is the element type of the dependency slice. Managers that never pass
/// dependencies use the default `()` and [`render_default`](Self::render_default).
pub struct DeferredCallback<B: TimerBackend, D = ()> {
    inner: Rc<Inner<B>>,
    deps: Option<Vec<D>>,
}

impl<B: TimerBackend> DeferredCallback<B> {
    /// Create a manager that takes no dependencies
    pub fn new(backend: B) -> Self {
        Self::with_dependencies(backend)
    }
}

impl<B: TimerBackend, D: PartialEq + Clone> DeferredCallback<B, D> {
    /// Create a manager keyed by dependencies of type `D`
    pub fn with_dependencies(backend: B) -> Self {
        Self {
            inner: Rc::new(Inner {
                backend,
                active: RefCell::new(None),
                slot: Rc::new(CallbackSlot {
                    latest: RefCell::new(None),
                    phase: Cell::new(TimerPhase::Unarmed),
                    generation: Cell::new(0),
                }),
            }),
            deps: None,
        }
    }

    /// Run once per render of the owning component
    ///
    /// Stores `callback` as the one to run, then arms the timer if this is the
    /// first render or `deps` differs from the previous render's. Returns a
    /// handle that cancels whichever invocation is armed when it is used.
    pub fn render<F>(&mut self, callback: F, delay: Duration, deps: &[D]) -> CancelHandle<B>
    where
        F: Fn() + 'static,
    {
        *self.inner.slot.latest.borrow_mut() = Some(Rc::new(callback));
        trace!("Stored latest callback");

        if self.deps.as_deref() != Some(deps) {
            self.deps = Some(deps.to_vec());
            self.arm(delay);
        }

        self.cancel_handle()
    }

    /// Same as [`render`](Self::render) with an empty dependency slice: the timer
    /// is armed on the first render only
    pub fn render_default<F>(&mut self, callback: F, delay: Duration) -> CancelHandle<B>
    where
        F: Fn() + 'static,
    {
        self.render(callback, delay, &[])
    }
}

impl<B: TimerBackend, D> DeferredCallback<B, D> {
    fn arm(&self, delay: Duration) {
        let previous = self.inner.active.borrow_mut().take();
        if let Some(handle) = previous {
            self.inner.backend.cancel(&handle);
            debug!(
                "Disarmed timer generation {} for rearm",
                self.inner.slot.generation.get()
            );
        }

        let slot = &self.inner.slot;
        let generation = slot.generation.get().wrapping_add(1);
        slot.generation.set(generation);
        // Set before scheduling, a backend may fire inside `schedule`
        slot.phase.set(TimerPhase::Armed);

        let fire_slot = Rc::clone(slot);
        let handle = self
            .inner
            .backend
            .schedule(Box::new(move || fire_slot.fire(generation)), delay);
        *self.inner.active.borrow_mut() = Some(handle);

        debug!("Armed timer generation {} ({:?})", generation, delay);
    }

    /// Cancel the currently armed invocation, if any
    pub fn cancel(&self) {
        self.inner.cancel_active();
    }

    /// A handle that cancels whatever is armed at the time it is used
    pub fn cancel_handle(&self) -> CancelHandle<B> {
        CancelHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Phase of the most recent scheduled invocation
    pub fn phase(&self) -> TimerPhase {
        self.inner.slot.phase.get()
    }

    /// Whether an invocation is scheduled and has not fired or been cancelled
    pub fn is_armed(&self) -> bool {
        self.phase() == TimerPhase::Armed
    }

    /// The backend this manager schedules on
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }
}

impl<B: TimerBackend, D> Drop for DeferredCallback<B, D> {
    fn drop(&mut self) {
        let active = self.inner.active.borrow_mut().take();
        if let Some(handle) = active {
            self.inner.backend.cancel(&handle);
            debug!(
                "Teardown cancelled timer generation {}",
                self.inner.slot.generation.get()
            );
        }
        if self.inner.slot.phase.get() == TimerPhase::Armed {
            self.inner.slot.phase.set(TimerPhase::Cancelled);
        }
        // Release whatever the callback captured
        self.inner.slot.latest.borrow_mut().take();
    }
}

impl<B: TimerBackend, D: fmt::Debug> fmt::Debug for DeferredCallback<B, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredCallback")
            .field("phase", &self.phase())
            .field("generation", &self.inner.slot.generation.get())
            .field("deps", &self.deps)
            .finish()
    }
}

/// Cancels the invocation armed by a [`DeferredCallback`]
///
/// Stays valid across rearms: it always targets the handle current when
/// [`cancel`](Self::cancel) runs. Once the manager is dropped it does nothing.
pub struct CancelHandle<B: TimerBackend> {
    inner: Weak<Inner<B>>,
}

impl<B: TimerBackend> CancelHandle<B> {
    /// Cancel the armed invocation; repeated or late calls are no-ops
    pub fn cancel(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.cancel_active();
        }
    }
}

impl<B: TimerBackend> Clone for CancelHandle<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<B: TimerBackend> fmt::Debug for CancelHandle<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("live", &(self.inner.strong_count() > 0))
            .finish()
    }
}
