// src/utils/config.rs
//! Scheduler configuration
//!
//! The execution mode, pool size, and timeout are fixed for the lifetime of
//! a scheduler: the config struct is built once (programmatically or via
//! [`SchedulerConfig::load`]) and handed to the `TickScheduler` constructor.
//! There is no runtime reconfiguration and no global mode toggle.

use crate::utils::errors::{Result, SchedulerError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a tick's step units are dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One unit at a time, in input order. Reference semantics for tests.
    Sequential,

    /// Single logical thread of control; units interleave at their own
    /// suspension points. Blocking units fall back to an auxiliary pool.
    Cooperative,

    /// Every unit runs on a bounded pool of OS worker threads.
    WorkerPool,
}

/// Scheduler configuration, fixed per run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Dispatch mode (default: cooperative)
    #[serde(default = "default_mode")]
    pub mode: ExecutionMode,

    /// Number of worker slots for blocking steps (default: 4)
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Default per-unit deadline in milliseconds; `None` means no timeout
    #[serde(default)]
    pub step_timeout_ms: Option<u64>,

    /// Maximum suspending units in flight at once in cooperative mode
    /// (default: 64). Keeps fan-out against external services bounded.
    #[serde(default = "default_suspend_cap")]
    pub suspend_cap: usize,
}

fn default_mode() -> ExecutionMode {
    ExecutionMode::Cooperative
}

fn default_pool_size() -> usize {
    4
}

fn default_suspend_cap() -> usize {
    64
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            pool_size: default_pool_size(),
            step_timeout_ms: None,
            suspend_cap: default_suspend_cap(),
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from an optional `tickweave` config file plus
    /// `TICKWEAVE_*` environment variables (env wins).
    pub fn load() -> Result<Self> {
        let raw = config::Config::builder()
            .add_source(config::File::with_name("tickweave").required(false))
            .add_source(config::Environment::with_prefix("TICKWEAVE").try_parsing(true))
            .build()
            .map_err(|e| SchedulerError::InvalidConfig(e.to_string()))?;

        let cfg: SchedulerConfig = raw
            .try_deserialize()
            .map_err(|e| SchedulerError::InvalidConfig(e.to_string()))?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from a specific file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let raw = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()
            .map_err(|e| SchedulerError::InvalidConfig(e.to_string()))?;

        let cfg: SchedulerConfig = raw
            .try_deserialize()
            .map_err(|e| SchedulerError::InvalidConfig(e.to_string()))?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(SchedulerError::InvalidConfig(
                "pool_size cannot be 0".into(),
            ));
        }
        if self.suspend_cap == 0 {
            return Err(SchedulerError::InvalidConfig(
                "suspend_cap cannot be 0".into(),
            ));
        }
        if self.step_timeout_ms == Some(0) {
            return Err(SchedulerError::InvalidConfig(
                "step_timeout_ms cannot be 0".into(),
            ));
        }
        Ok(())
    }

    /// Default per-unit deadline as a `Duration`
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_ms.map(Duration::from_millis)
    }
}
