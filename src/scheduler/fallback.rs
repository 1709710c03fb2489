// src/scheduler/fallback.rs
//! Transparent fallback for blocking units under cooperative dispatch
//!
//! The cooperative dispatcher only drives futures. Agents that expose just
//! a blocking operation still participate in a cooperative tick: the
//! adapter wraps their unit in a future that hands the work to an auxiliary
//! worker pool and suspends on the pending handle, so the cooperative
//! thread of control never stalls on blocking work.
//!
//! Adaptation has no side effects: the pool submission happens on first
//! poll of the wrapped future, never when the unit is adapted.

use crate::scheduler::outcome::StepFailure;
use crate::scheduler::step_unit::{AgentId, StepOp, StepUnit};
use crate::scheduler::worker_pool::WorkerPool;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// A step unit normalized for cooperative dispatch
pub struct AdaptedUnit<O> {
    id: AgentId,
    deadline: Option<Duration>,
    future: BoxFuture<'static, Result<O, StepFailure>>,
}

impl<O> AdaptedUnit<O> {
    pub(crate) fn new(
        id: AgentId,
        deadline: Option<Duration>,
        future: BoxFuture<'static, Result<O, StepFailure>>,
    ) -> Self {
        Self {
            id,
            deadline,
            future,
        }
    }

    /// The agent this unit belongs to
    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        AgentId,
        Option<Duration>,
        BoxFuture<'static, Result<O, StepFailure>>,
    ) {
        (self.id, self.deadline, self.future)
    }
}

/// Adapts step units of either capability for the cooperative dispatcher
pub struct FallbackAdapter<O> {
    pool: Arc<WorkerPool<O>>,
}

impl<O: Send + 'static> FallbackAdapter<O> {
    /// Create an adapter delegating blocking units to `pool`
    pub fn new(pool: Arc<WorkerPool<O>>) -> Self {
        Self { pool }
    }

    /// Normalize a unit for cooperative dispatch
    ///
    /// Suspending units pass through; blocking units are wrapped for lazy
    /// submission to the auxiliary worker pool.
    pub fn adapt(&self, unit: StepUnit<O>) -> AdaptedUnit<O> {
        let (id, op, deadline) = unit.into_parts();

        match op {
            StepOp::Suspending(future) => AdaptedUnit::new(
                id,
                deadline,
                Box::pin(async move { future.await.map_err(StepFailure::from) }),
            ),
            StepOp::Blocking(_) => {
                let pool = Arc::clone(&self.pool);
                let agent = id.clone();
                AdaptedUnit::new(
                    id,
                    deadline,
                    Box::pin(async move {
                        trace!(agent = %agent, "routing blocking step to worker pool");
                        let unit = StepUnit::from_parts(agent, op, deadline);
                        let pending = pool.submit(unit).map_err(|e| {
                            StepFailure::operation(format!("fallback submission failed: {e}"))
                        })?;
                        pending.resolve().await.result
                    }),
                )
            }
        }
    }
}
