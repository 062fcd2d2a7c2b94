//! Backend chosen at runtime from configuration

use super::backend::{ScheduledFn, TimerBackend, TokioTimerBackend};
use super::manual::{ImmediateHandle, ImmediateTimerBackend, ManualHandle, ManualTimerBackend};
use std::rc::Rc;
use std::time::Duration;
use tokio::task::AbortHandle;

/// One of the built-in backends
#[derive(Clone)]
pub enum ConfiguredBackend {
    Tokio(TokioTimerBackend),
    Manual(Rc<ManualTimerBackend>),
    Immediate(ImmediateTimerBackend),
}

/// Handle issued by a [`ConfiguredBackend`]
#[derive(Debug, Clone)]
pub enum ConfiguredHandle {
    Tokio(AbortHandle),
    Manual(ManualHandle),
    Immediate(ImmediateHandle),
}

impl ConfiguredBackend {
    /// The manual backend, if that is what was configured
    pub fn as_manual(&self) -> Option<&Rc<ManualTimerBackend>> {
        match self {
            ConfiguredBackend::Manual(backend) => Some(backend),
            _ => None,
        }
    }
}

impl TimerBackend for ConfiguredBackend {
    type Handle = ConfiguredHandle;

    fn schedule(&self, callback: ScheduledFn, delay: Duration) -> ConfiguredHandle {
        match self {
            ConfiguredBackend::Tokio(b) => ConfiguredHandle::Tokio(b.schedule(callback, delay)),
            ConfiguredBackend::Manual(b) => ConfiguredHandle::Manual(b.schedule(callback, delay)),
            ConfiguredBackend::Immediate(b) => {
                ConfiguredHandle::Immediate(b.schedule(callback, delay))
            }
        }
    }

    fn cancel(&self, handle: &ConfiguredHandle) {
        match (self, handle) {
            (ConfiguredBackend::Tokio(b), ConfiguredHandle::Tokio(h)) => b.cancel(h),
            (ConfiguredBackend::Manual(b), ConfiguredHandle::Manual(h)) => b.cancel(h),
            (ConfiguredBackend::Immediate(b), ConfiguredHandle::Immediate(h)) => b.cancel(h),
            // Foreign handle, nothing of ours to cancel
            _ => {}
        }
    }
}
