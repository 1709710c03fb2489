// src/utils/errors.rs
//! Scheduler error types
//!
//! These are usage and configuration errors surfaced directly to the caller
//! of the scheduler API. Failures of individual step operations are never
//! represented here; they are captured per agent as failure outcomes so a
//! tick always completes for the rest of the population.

use thiserror::Error;

/// Errors surfaced by the scheduler API
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A step was submitted after the worker pool was shut down
    #[error("worker pool is closed")]
    PoolClosed,

    /// `run_tick` was called while a previous tick was still running
    #[error("a tick is already in flight")]
    TickInFlight,

    /// The scheduler configuration failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, SchedulerError>;
