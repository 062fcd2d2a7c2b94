//! Timer backend abstraction
//!
//! A backend realizes "run this once after a delay" and "don't run it after all".
//! The manager only ever talks to a backend through [`TimerBackend`], so the host
//! scheduler can be swapped for a deterministic one in tests or alternate hosts.

use std::rc::Rc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::{AbortHandle, LocalSet};

/// Scheduled invocation handed to a backend
pub type ScheduledFn = Box<dyn FnOnce()>;

/// Backend errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Tokio backend needs a LocalSet to spawn on")]
    LocalSetRequired,
}

/// One-shot delayed execution capability
///
/// Implementations must make `cancel` a silent no-op for handles that already
/// fired or were already cancelled.
pub trait TimerBackend {
    /// Opaque token identifying one scheduled invocation
    type Handle;

    /// Run `callback` once, no earlier than `delay` from now
    fn schedule(&self, callback: ScheduledFn, delay: Duration) -> Self::Handle;

    /// Prevent a scheduled invocation from running if it has not run yet
    fn cancel(&self, handle: &Self::Handle);
}

impl<T: TimerBackend + ?Sized> TimerBackend for Rc<T> {
    type Handle = T::Handle;

    fn schedule(&self, callback: ScheduledFn, delay: Duration) -> Self::Handle {
        (**self).schedule(callback, delay)
    }

    fn cancel(&self, handle: &Self::Handle) {
        (**self).cancel(handle)
    }
}

/// Default backend on top of the Tokio timer
///
/// Invocations are spawned onto the [`LocalSet`] given at construction, so
/// scheduling never needs a local context of its own. They run while that set is
/// driven (`run_until` or awaiting it), all on the one thread driving it. A
/// panicking callback is reported through Tokio's task panic handling, it is not
/// caught here.
#[derive(Debug, Clone)]
pub struct TokioTimerBackend {
    local: Rc<LocalSet>,
}

impl TokioTimerBackend {
    /// Create a backend that spawns onto `local`
    pub fn new(local: Rc<LocalSet>) -> Self {
        Self { local }
    }

    /// The set invocations are spawned onto
    pub fn local_set(&self) -> &Rc<LocalSet> {
        &self.local
    }
}

impl TimerBackend for TokioTimerBackend {
    type Handle = AbortHandle;

    fn schedule(&self, callback: ScheduledFn, delay: Duration) -> AbortHandle {
        let task = self.local.spawn_local(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
        task.abort_handle()
    }

    fn cancel(&self, handle: &AbortHandle) {
        // Aborting a finished task does nothing
        handle.abort();
    }
}
