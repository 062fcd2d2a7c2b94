//! Deterministic backends for tests and hosts without a real clock

use super::backend::{ScheduledFn, TimerBackend};
use std::cell::{Cell, RefCell};
use std::time::Duration;
use tracing::trace;

/// Handle issued by [`ManualTimerBackend`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ManualHandle(u64);

impl ManualHandle {
    /// Raw identifier
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// A call observed by [`ManualTimerBackend`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendCall {
    Schedule { handle: ManualHandle, delay: Duration },
    /// `was_pending` is false for stale, fired or already cancelled handles
    Cancel { handle: ManualHandle, was_pending: bool },
}

struct PendingEntry {
    handle: ManualHandle,
    deadline: Duration,
    callback: ScheduledFn,
}

/// Backend driven by a virtual clock
///
/// Nothing fires until [`advance`](Self::advance) or
/// [`run_until_idle`](Self::run_until_idle) is called. Due invocations fire in
/// deadline order, ties broken by scheduling order.
pub struct ManualTimerBackend {
    now: Cell<Duration>,
    next_id: Cell<u64>,
    pending: RefCell<Vec<PendingEntry>>,
    calls: RefCell<Vec<BackendCall>>,
}

impl ManualTimerBackend {
    /// Create a backend with its clock at zero
    pub fn new() -> Self {
        Self {
            now: Cell::new(Duration::ZERO),
            next_id: Cell::new(1),
            pending: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.now.get()
    }

    /// Number of invocations waiting to fire
    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Whether `handle` is still waiting to fire
    pub fn is_pending(&self, handle: ManualHandle) -> bool {
        self.pending.borrow().iter().any(|e| e.handle == handle)
    }

    /// Every schedule/cancel call seen so far, oldest first
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.borrow().clone()
    }

    /// Forget the recorded calls
    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Number of `schedule` calls seen so far
    pub fn schedule_count(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, BackendCall::Schedule { .. }))
            .count()
    }

    /// Number of `cancel` calls seen so far
    pub fn cancel_count(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, BackendCall::Cancel { .. }))
            .count()
    }

    /// Move the clock forward by `by`, firing everything that becomes due
    ///
    /// Returns the number of invocations fired. Invocations scheduled by a
    /// firing callback also fire if they fall inside the window.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now.get().saturating_add(by);
        let mut fired = 0;
        while let Some(entry) = self.pop_due(Some(target)) {
            self.now.set(entry.deadline.max(self.now.get()));
            trace!("Firing manual timer {}", entry.handle.0);
            (entry.callback)();
            fired += 1;
        }
        self.now.set(target);
        fired
    }

    /// Fire pending invocations in order until none are left
    pub fn run_until_idle(&self) -> usize {
        let mut fired = 0;
        while let Some(entry) = self.pop_due(None) {
            self.now.set(entry.deadline.max(self.now.get()));
            trace!("Firing manual timer {}", entry.handle.0);
            (entry.callback)();
            fired += 1;
        }
        fired
    }

    // The pending borrow is released before the caller invokes the entry.
    fn pop_due(&self, limit: Option<Duration>) -> Option<PendingEntry> {
        let mut pending = self.pending.borrow_mut();
        let idx = pending
            .iter()
            .enumerate()
            .filter(|(_, e)| limit.map_or(true, |l| e.deadline <= l))
            .min_by_key(|(_, e)| (e.deadline, e.handle))
            .map(|(i, _)| i)?;
        Some(pending.remove(idx))
    }
}

impl Default for ManualTimerBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerBackend for ManualTimerBackend {
    type Handle = ManualHandle;

    fn schedule(&self, callback: ScheduledFn, delay: Duration) -> ManualHandle {
        let id = self.next_id.get();
        self.next_id.set(id.wrapping_add(1));
        let handle = ManualHandle(id);

        self.pending.borrow_mut().push(PendingEntry {
            handle,
            deadline: self.now.get().saturating_add(delay),
            callback,
        });
        self.calls
            .borrow_mut()
            .push(BackendCall::Schedule { handle, delay });
        handle
    }

    fn cancel(&self, handle: &ManualHandle) {
        let was_pending = {
            let mut pending = self.pending.borrow_mut();
            let before = pending.len();
            pending.retain(|e| e.handle != *handle);
            pending.len() != before
        };
        self.calls.borrow_mut().push(BackendCall::Cancel {
            handle: *handle,
            was_pending,
        });
    }
}

/// Handle issued by [`ImmediateTimerBackend`]; there is never anything to cancel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImmediateHandle;

/// Backend that runs every invocation synchronously inside `schedule`
///
/// The delay is ignored. Useful for hosts that have no scheduler at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateTimerBackend;

impl TimerBackend for ImmediateTimerBackend {
    type Handle = ImmediateHandle;

    fn schedule(&self, callback: ScheduledFn, _delay: Duration) -> ImmediateHandle {
        callback();
        ImmediateHandle
    }

    fn cancel(&self, _handle: &ImmediateHandle) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn counter() -> (Rc<Cell<u32>>, impl Fn() -> ScheduledFn) {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        (hits, move || {
            let h = Rc::clone(&h);
            Box::new(move || h.set(h.get() + 1)) as ScheduledFn
        })
    }

    #[test]
    fn test_manual_fires_only_when_due() {
        let backend = ManualTimerBackend::new();
        let (hits, make) = counter();
        backend.schedule(make(), Duration::from_millis(100));

        assert_eq!(backend.advance(Duration::from_millis(99)), 0);
        assert_eq!(hits.get(), 0);
        assert_eq!(backend.advance(Duration::from_millis(1)), 1);
        assert_eq!(hits.get(), 1);
        assert_eq!(backend.now(), Duration::from_millis(100));
        assert_eq!(backend.pending_count(), 0);
    }

    #[test]
    fn test_manual_fires_in_deadline_order() {
        let backend = ManualTimerBackend::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for (tag, ms) in [("late", 30u64), ("early", 10), ("mid", 20), ("mid2", 20)] {
            let order = Rc::clone(&order);
            backend.schedule(
                Box::new(move || order.borrow_mut().push(tag)),
                Duration::from_millis(ms),
            );
        }

        assert_eq!(backend.run_until_idle(), 4);
        assert_eq!(*order.borrow(), vec!["early", "mid", "mid2", "late"]);
    }

    #[test]
    fn test_manual_cancel_is_idempotent() {
        let backend = ManualTimerBackend::new();
        let (hits, make) = counter();
        let handle = backend.schedule(make(), Duration::from_millis(5));

        backend.cancel(&handle);
        backend.cancel(&handle);
        assert_eq!(backend.advance(Duration::from_millis(10)), 0);
        assert_eq!(hits.get(), 0);

        let calls = backend.calls();
        assert_eq!(
            &calls[1..],
            &[
                BackendCall::Cancel { handle, was_pending: true },
                BackendCall::Cancel { handle, was_pending: false },
            ]
        );
    }

    #[test]
    fn test_manual_cancel_after_fire_is_noop() {
        let backend = ManualTimerBackend::new();
        let (hits, make) = counter();
        let handle = backend.schedule(make(), Duration::ZERO);
        backend.run_until_idle();
        backend.cancel(&handle);

        assert_eq!(hits.get(), 1);
        assert!(!backend.is_pending(handle));
        assert_eq!(
            backend.calls().last(),
            Some(&BackendCall::Cancel { handle, was_pending: false })
        );
    }

    #[test]
    fn test_manual_callback_can_schedule_more_work() {
        let backend = Rc::new(ManualTimerBackend::new());
        let (hits, make) = counter();
        let inner = Rc::clone(&backend);
        let follow_up = make();
        backend.schedule(
            Box::new(move || {
                inner.schedule(follow_up, Duration::from_millis(5));
            }),
            Duration::from_millis(5),
        );

        assert_eq!(backend.advance(Duration::from_millis(10)), 2);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_manual_max_delay_never_fires() {
        let backend = ManualTimerBackend::new();
        let (hits, make) = counter();
        backend.advance(Duration::from_millis(1));
        let handle = backend.schedule(make(), Duration::MAX);

        assert_eq!(backend.advance(Duration::from_secs(3600)), 0);
        assert_eq!(backend.now(), Duration::from_millis(1) + Duration::from_secs(3600));
        assert!(backend.is_pending(handle));
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_immediate_runs_inside_schedule() {
        let backend = ImmediateTimerBackend;
        let (hits, make) = counter();
        let handle = backend.schedule(make(), Duration::from_secs(60));
        assert_eq!(hits.get(), 1);
        backend.cancel(&handle);
        assert_eq!(hits.get(), 1);
    }
}
