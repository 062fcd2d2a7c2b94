//! Configuration management for deferred callbacks
//!
//! Handles configuration loading and backend selection.

use crate::timers::{
    BackendError, ConfiguredBackend, ImmediateTimerBackend, ManualTimerBackend, TokioTimerBackend,
};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use std::time::Duration;
use tokio::task::LocalSet;

/// Which timer backend to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Tokio timer on a `LocalSet` (default)
    #[default]
    Tokio,
    /// Virtual clock advanced by hand
    Manual,
    /// Fire synchronously when scheduled
    Immediate,
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeferredConfig {
    /// Delay used by callers that don't pick their own, in milliseconds
    #[serde(default = "default_delay_ms")]
    pub default_delay_ms: u64,

    /// Timer backend
    #[serde(default)]
    pub backend: BackendKind,

    /// Logging configuration
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

fn default_delay_ms() -> u64 {
    1000
}

impl Default for DeferredConfig {
    fn default() -> Self {
        Self {
            default_delay_ms: default_delay_ms(),
            backend: BackendKind::default(),
            logging: None,
        }
    }
}

impl DeferredConfig {
    /// Load configuration from file (supports JSON and TOML)
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;

        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            let config: DeferredConfig = toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse TOML config: {}", e))?;
            Ok(config)
        } else {
            // Default to JSON
            let config: DeferredConfig = serde_json::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse JSON config: {}", e))?;
            Ok(config)
        }
    }

    /// Save configuration to file (TOML by extension, JSON otherwise)
    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let content = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::to_string_pretty(self)
                .map_err(|e| anyhow::anyhow!("Failed to serialize TOML config: {}", e))?
        } else {
            serde_json::to_string_pretty(self)?
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default delay as a `Duration`
    pub fn default_delay(&self) -> Duration {
        Duration::from_millis(self.default_delay_ms)
    }

    /// Build the configured backend when it needs no host context
    ///
    /// The Tokio backend has to spawn onto a `LocalSet`, so it is refused here
    /// with [`BackendError::LocalSetRequired`]; use [`build_backend_on`](Self::build_backend_on).
    pub fn build_backend(&self) -> Result<ConfiguredBackend, BackendError> {
        self.build(None)
    }

    /// Build the configured backend, spawning Tokio timers onto `local`
    pub fn build_backend_on(&self, local: &Rc<LocalSet>) -> Result<ConfiguredBackend, BackendError> {
        self.build(Some(local))
    }

    fn build(&self, local: Option<&Rc<LocalSet>>) -> Result<ConfiguredBackend, BackendError> {
        let backend = match self.backend {
            BackendKind::Tokio => {
                let local = local.ok_or(BackendError::LocalSetRequired)?;
                ConfiguredBackend::Tokio(TokioTimerBackend::new(Rc::clone(local)))
            }
            BackendKind::Manual => ConfiguredBackend::Manual(Rc::new(ManualTimerBackend::new())),
            BackendKind::Immediate => ConfiguredBackend::Immediate(ImmediateTimerBackend),
        };
        tracing::debug!("Built {:?} timer backend", self.backend);
        Ok(backend)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "blvm_deferred=trace")
    /// If not set, uses RUST_LOG environment variable or defaults to "info"
    #[serde(default)]
    pub filter: Option<String>,

    /// Enable JSON logging format (for log aggregation systems)
    #[serde(default)]
    pub json_format: bool,
}
