//! Deferred callbacks for component lifecycles
//!
//! A [`DeferredCallback`] arms a one-shot timer through a pluggable
//! [`TimerBackend`], rearms it when its dependencies change, always runs the most
//! recently supplied callback, and cancels on teardown.

pub mod backend;
pub mod configured;
pub mod manager;
pub mod manual;

pub use backend::{BackendError, ScheduledFn, TimerBackend, TokioTimerBackend};
pub use configured::{ConfiguredBackend, ConfiguredHandle};
pub use manager::{CancelHandle, DeferredCallback, TimerPhase};
pub use manual::{
    BackendCall, ImmediateHandle, ImmediateTimerBackend, ManualHandle, ManualTimerBackend,
};
