//! Deferred callbacks - leak-safe, restartable one-shot timers for component runtimes
//!
//! This crate provides a timer primitive meant to be driven from a component's
//! render cycle. A component owns one [`DeferredCallback`]; on every render it hands
//! over its current callback, a delay and a dependency slice, and gets back a
//! [`CancelHandle`].
//!
//! ## Design Principles
//!
//! 1. **Rearm on dependencies only**: the timer restarts when the dependency slice changes
//! 2. **Latest callback wins**: the callback that runs is the one supplied most recently,
//!    even if it arrived after the timer was armed
//! 3. **Leak-safe**: rearming, explicit cancellation and teardown all cancel the armed invocation
//! 4. **Pluggable backend**: scheduling goes through [`TimerBackend`], so a deterministic
//!    backend can replace the Tokio timer
//!
//! All state lives on one thread; managers are `!Send`.

pub mod config;
pub mod timers;
pub mod utils;

pub use config::{BackendKind, DeferredConfig, LoggingConfig};
pub use timers::{
    BackendError, CancelHandle, DeferredCallback, ManualTimerBackend, TimerBackend, TimerPhase,
    TokioTimerBackend,
};
