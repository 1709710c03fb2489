// src/scheduler/tick.rs
//! Tick scheduler: the driver-facing root of the concurrency core
//!
//! The model driver calls [`TickScheduler::run_tick`] once per simulation
//! step with the tick's step units in agent order. The scheduler routes the
//! units to the dispatch strategy fixed at construction, collects one
//! outcome per unit, and returns them in input order. Ticks never overlap:
//! a second `run_tick` while one is in flight is a usage error, not a
//! tolerated race.
//!
//! ```text
//!                    ┌──────────────────┐
//!  run_tick(units) → │  TickScheduler   │
//!                    └────────┬─────────┘
//!              ┌──────────────┼────────────────┐
//!         Sequential     Cooperative       WorkerPool
//!         one at a    FallbackAdapter →   every unit →
//!         time, in    CooperativeDisp.    bounded slots
//!         input order + auxiliary pool
//!              └──────────────┼────────────────┘
//!                    TickResult (input order)
//! ```

use crate::scheduler::cooperative::CooperativeDispatcher;
use crate::scheduler::fallback::FallbackAdapter;
use crate::scheduler::outcome::{Outcome, StepFailure, TickResult};
use crate::scheduler::step_unit::{StepOp, StepUnit};
use crate::scheduler::worker_pool::WorkerPool;
use crate::utils::config::{ExecutionMode, SchedulerConfig};
use crate::utils::errors::{Result, SchedulerError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, trace};

/// Mode-specific dispatch state, fixed at construction
enum Dispatch<O> {
    Sequential,
    Cooperative {
        dispatcher: CooperativeDispatcher,
        pool: Arc<WorkerPool<O>>,
    },
    WorkerPool {
        pool: Arc<WorkerPool<O>>,
    },
}

/// Advances a population of agents through discrete, non-overlapping ticks
pub struct TickScheduler<O> {
    config: SchedulerConfig,
    dispatch: Dispatch<O>,
    in_flight: AtomicBool,
    ticks: AtomicU64,
}

impl<O: Send + 'static> TickScheduler<O> {
    /// Create a scheduler from a validated configuration
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;

        let dispatch = match config.mode {
            ExecutionMode::Sequential => Dispatch::Sequential,
            ExecutionMode::Cooperative => Dispatch::Cooperative {
                dispatcher: CooperativeDispatcher::new(config.suspend_cap),
                pool: Arc::new(WorkerPool::new(config.pool_size)),
            },
            ExecutionMode::WorkerPool => Dispatch::WorkerPool {
                pool: Arc::new(WorkerPool::new(config.pool_size)),
            },
        };

        info!(
            mode = ?config.mode,
            pool_size = config.pool_size,
            suspend_cap = config.suspend_cap,
            "tick scheduler initialized"
        );

        Ok(Self {
            config,
            dispatch,
            in_flight: AtomicBool::new(false),
            ticks: AtomicU64::new(0),
        })
    }

    /// Run one tick over `units`, returning outcomes in input order
    ///
    /// Exactly one outcome is produced per unit; a unit's failure is
    /// captured in its own outcome and never aborts the tick for siblings.
    /// Fails with `TickInFlight` if a previous tick has not finished, and
    /// with `PoolClosed` after `shutdown` in pool-backed modes.
    pub async fn run_tick(&self, units: Vec<StepUnit<O>>) -> Result<TickResult<O>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SchedulerError::TickInFlight);
        }
        let _guard = InFlightGuard {
            flag: &self.in_flight,
        };

        match &self.dispatch {
            Dispatch::Cooperative { pool, .. } | Dispatch::WorkerPool { pool } => {
                if pool.is_closed() {
                    return Err(SchedulerError::PoolClosed);
                }
            }
            Dispatch::Sequential => {}
        }

        let submitted = units.len();
        let units = self.apply_default_deadline(units);
        let started = Instant::now();

        let outcomes = match &self.dispatch {
            Dispatch::Sequential => run_sequential(units).await,
            Dispatch::Cooperative { dispatcher, pool } => {
                let adapter = FallbackAdapter::new(Arc::clone(pool));
                let adapted = units.into_iter().map(|u| adapter.adapt(u)).collect();
                dispatcher.run(adapted).await
            }
            Dispatch::WorkerPool { pool } => {
                let mut handles = Vec::with_capacity(units.len());
                for unit in units {
                    handles.push(pool.submit(unit)?);
                }
                pool.await_all(handles).await
            }
        };

        let elapsed = started.elapsed();
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed);
        let failures = outcomes.iter().filter(|o| !o.is_success()).count();
        info!(
            tick,
            agents = submitted,
            failures,
            elapsed_ms = elapsed.as_millis() as u64,
            "tick complete"
        );

        Ok(TickResult {
            tick,
            outcomes,
            elapsed,
        })
    }

    /// Fill in the configured default deadline for units without one
    fn apply_default_deadline(&self, units: Vec<StepUnit<O>>) -> Vec<StepUnit<O>> {
        match self.config.step_timeout() {
            Some(default) => units
                .into_iter()
                .map(|unit| {
                    if unit.deadline().is_none() {
                        unit.with_deadline(default)
                    } else {
                        unit
                    }
                })
                .collect(),
            None => units,
        }
    }
}

impl<O> TickScheduler<O> {
    /// The configuration this scheduler was built with
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Number of completed ticks
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Release pool resources; idempotent
    ///
    /// After shutdown, pool-backed modes fail `run_tick` with `PoolClosed`.
    pub fn shutdown(&self) {
        match &self.dispatch {
            Dispatch::Sequential => {}
            Dispatch::Cooperative { pool, .. } | Dispatch::WorkerPool { pool } => pool.shutdown(),
        }
    }
}

impl<O> Drop for TickScheduler<O> {
    fn drop(&mut self) {
        // Teardown stays reachable from abnormal exit paths.
        self.shutdown();
    }
}

struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Reference dispatch: one unit at a time, in input order
///
/// Units still run on their own task so a panic is isolated into the
/// offending unit's outcome, but the next unit starts only after the
/// previous one resolved.
async fn run_sequential<O: Send + 'static>(units: Vec<StepUnit<O>>) -> Vec<Outcome<O>> {
    let mut outcomes = Vec::with_capacity(units.len());

    for unit in units {
        let (id, op, deadline) = unit.into_parts();
        trace!(agent = %id, "running sequential step");

        let result = match op {
            StepOp::Suspending(future) => {
                await_step(tokio::spawn(future), deadline, true).await
            }
            StepOp::Blocking(op) => {
                await_step(tokio::task::spawn_blocking(op), deadline, false).await
            }
        };

        outcomes.push(Outcome { id, result });
    }

    outcomes
}

/// Await a spawned step, honoring its deadline
///
/// Suspending steps are aborted on expiry (cancellation lands at the next
/// suspension point); blocking steps run to completion in the background
/// with their late result discarded.
async fn await_step<O>(
    mut handle: JoinHandle<anyhow::Result<O>>,
    deadline: Option<Duration>,
    abort_on_timeout: bool,
) -> std::result::Result<O, StepFailure> {
    match deadline {
        Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
            Ok(join) => flatten_join(join),
            Err(_) => {
                if abort_on_timeout {
                    handle.abort();
                }
                Err(StepFailure::timeout(limit))
            }
        },
        None => flatten_join(handle.await),
    }
}

fn flatten_join<O>(
    join: std::result::Result<anyhow::Result<O>, JoinError>,
) -> std::result::Result<O, StepFailure> {
    match join {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(StepFailure::from(err)),
        Err(err) => Err(StepFailure::from_join_error(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::outcome::FailureKind;
    use crate::scheduler::step_unit::AgentId;

    fn config(mode: ExecutionMode) -> SchedulerConfig {
        SchedulerConfig {
            mode,
            pool_size: 2,
            ..Default::default()
        }
    }

    fn population(n: usize) -> Vec<StepUnit<String>> {
        (0..n)
            .map(|i| {
                let id = format!("agent-{i}");
                if i % 2 == 0 {
                    let value = id.clone();
                    StepUnit::suspending(id, async move { Ok(value) })
                } else {
                    let value = id.clone();
                    StepUnit::blocking(id, move || Ok(value))
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_sequential_preserves_order() {
        let scheduler = TickScheduler::new(config(ExecutionMode::Sequential)).unwrap();
        let result = scheduler.run_tick(population(6)).await.unwrap();

        assert_eq!(result.len(), 6);
        for (i, outcome) in result.iter().enumerate() {
            assert_eq!(outcome.id, AgentId::new(format!("agent-{i}")));
            assert_eq!(outcome.result.as_deref().ok(), Some(format!("agent-{i}").as_str()));
        }
    }

    #[tokio::test]
    async fn test_empty_tick() {
        let scheduler: TickScheduler<String> =
            TickScheduler::new(config(ExecutionMode::Cooperative)).unwrap();
        let result = scheduler.run_tick(Vec::new()).await.unwrap();
        assert!(result.is_empty());
        scheduler.shutdown();
    }

    #[tokio::test]
    async fn test_tick_counter_advances() {
        let scheduler = TickScheduler::new(config(ExecutionMode::Sequential)).unwrap();
        assert_eq!(scheduler.tick_count(), 0);

        let first = scheduler.run_tick(population(2)).await.unwrap();
        let second = scheduler.run_tick(population(2)).await.unwrap();
        assert_eq!(first.tick, 0);
        assert_eq!(second.tick, 1);
        assert_eq!(scheduler.tick_count(), 2);
    }

    #[tokio::test]
    async fn test_overlapping_ticks_rejected() {
        let scheduler: Arc<TickScheduler<()>> = Arc::new(
            TickScheduler::new(config(ExecutionMode::Cooperative)).unwrap(),
        );

        let slow = vec![StepUnit::suspending("slow", async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })];

        let background = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.run_tick(slow).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let overlapping = scheduler.run_tick(Vec::new()).await;
        assert!(matches!(overlapping, Err(SchedulerError::TickInFlight)));

        let finished = background.await.unwrap().unwrap();
        assert_eq!(finished.len(), 1);

        // Once the first tick resolved, the scheduler accepts new ticks.
        assert!(scheduler.run_tick(Vec::new()).await.is_ok());
        scheduler.shutdown();
    }

    #[tokio::test]
    async fn test_run_after_shutdown_fails() {
        let scheduler: TickScheduler<String> =
            TickScheduler::new(config(ExecutionMode::WorkerPool)).unwrap();
        scheduler.shutdown();

        let rejected = scheduler.run_tick(population(2)).await;
        assert!(matches!(rejected, Err(SchedulerError::PoolClosed)));
    }

    #[tokio::test]
    async fn test_default_deadline_applies_to_units_without_one() {
        let cfg = SchedulerConfig {
            mode: ExecutionMode::Sequential,
            step_timeout_ms: Some(40),
            ..Default::default()
        };
        let scheduler: TickScheduler<&'static str> = TickScheduler::new(cfg).unwrap();

        let units = vec![
            StepUnit::suspending("hung", futures::future::pending()),
            StepUnit::suspending("fine", async { Ok("fine") }),
        ];
        let result = scheduler.run_tick(units).await.unwrap();

        assert_eq!(result.outcomes[0].failure_kind(), Some(FailureKind::Timeout));
        assert_eq!(result.outcomes[1].result.as_ref().ok(), Some(&"fine"));
    }

    #[tokio::test]
    async fn test_sequential_isolates_panics() {
        let scheduler: TickScheduler<u32> =
            TickScheduler::new(config(ExecutionMode::Sequential)).unwrap();

        let units: Vec<StepUnit<u32>> = vec![
            StepUnit::blocking("a", || Ok(1)),
            StepUnit::blocking("b", || panic!("deliberate panic")),
            StepUnit::suspending("c", async { Ok(3) }),
        ];
        let result = scheduler.run_tick(units).await.unwrap();

        assert!(result.outcomes[0].is_success());
        assert_eq!(
            result.outcomes[1].failure_kind(),
            Some(FailureKind::OperationFailure)
        );
        assert!(result.outcomes[2].is_success());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let cfg = SchedulerConfig {
            pool_size: 0,
            ..Default::default()
        };
        let rejected: Result<TickScheduler<()>> = TickScheduler::new(cfg);
        assert!(matches!(rejected, Err(SchedulerError::InvalidConfig(_))));
    }
}
