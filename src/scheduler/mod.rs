// src/scheduler/mod.rs
//! The concurrency core: concurrent per-tick agent stepping
//!
//! This module advances a population of independent agents through discrete
//! simulation ticks. Each agent contributes one step unit per tick, and the
//! scheduler runs the tick's units concurrently so one agent's long-latency
//! external call never serializes the whole population.
//!
//! - **step_unit**: agent identity, capability tag, per-tick unit of work
//! - **outcome**: per-agent results and the ordered per-tick result set
//! - **worker_pool**: bounded OS worker slots for blocking units
//! - **cooperative**: single-thread-of-control dispatch for suspending units
//! - **fallback**: transparent pool fallback for blocking units under
//!   cooperative dispatch
//! - **tick**: the driver-facing `TickScheduler` root
//!
//! # Guarantees
//!
//! - Every unit submitted to a tick yields exactly one outcome
//! - Outcomes are returned in input order, never completion order
//! - One unit's failure never cancels or corrupts sibling units
//! - At most one step unit per agent per tick (by construction), so an
//!   agent's state is never touched by two workers at once

pub mod cooperative;
pub mod fallback;
pub mod outcome;
pub mod step_unit;
pub mod tick;
pub mod worker_pool;

// Re-export commonly used types
pub use cooperative::CooperativeDispatcher;
pub use fallback::{AdaptedUnit, FallbackAdapter};
pub use outcome::{FailureKind, Outcome, StepFailure, TickResult};
pub use step_unit::{AgentId, Capability, StepUnit};
pub use tick::TickScheduler;
pub use worker_pool::{PendingStep, PoolStats, WorkerPool};
