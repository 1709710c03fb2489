// src/lib.rs
//! Tickweave: concurrent tick scheduling for agent-based simulations
//!
//! Tickweave runs a population of independent agents through discrete
//! simulation ticks. An agent's per-tick step may be a long-latency
//! external call (a remote reasoning request, say) or a short local
//! computation; the scheduler overlaps them within a tick while keeping the
//! result set deterministic and order-stable.
//!
//! # Modules
//!
//! - **scheduler**: step units, worker pool, cooperative dispatch, the
//!   `TickScheduler` root
//! - **observability**: tracing initialization
//! - **utils**: error types and configuration
//!
//! # Example
//!
//! ```no_run
//! use tickweave::{SchedulerConfig, StepUnit, TickScheduler};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let scheduler = TickScheduler::new(SchedulerConfig::default())?;
//!
//! let units = vec![
//!     StepUnit::suspending("agent-0", async { Ok("pondered".to_string()) }),
//!     StepUnit::blocking("agent-1", || Ok("computed".to_string())),
//! ];
//!
//! let result = scheduler.run_tick(units).await?;
//! assert_eq!(result.len(), 2);
//! scheduler.shutdown();
//! # Ok(())
//! # }
//! ```

// Public module exports
pub mod observability;
pub mod scheduler;
pub mod utils;

// Re-export commonly used types
pub use scheduler::cooperative::CooperativeDispatcher;
pub use scheduler::fallback::FallbackAdapter;
pub use scheduler::outcome::{FailureKind, Outcome, StepFailure, TickResult};
pub use scheduler::step_unit::{AgentId, Capability, StepUnit};
pub use scheduler::tick::TickScheduler;
pub use scheduler::worker_pool::{PendingStep, WorkerPool};
pub use utils::config::{ExecutionMode, SchedulerConfig};
pub use utils::errors::{Result, SchedulerError};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
