// src/scheduler/cooperative.rs
//! Cooperative dispatcher for suspension-capable step units
//!
//! Drives all of a tick's units on one logical thread of control: each unit
//! is spawned as a task that suspends only at the operation's own await
//! points, so one unit's pending external call never stalls another's
//! progress. In-flight units are gated by a semaphore so fan-out against
//! external services stays bounded instead of growing with the population.
//!
//! Ordering: results are collected by awaiting handles in spawn order, so
//! the returned outcomes match input order no matter when units complete.
//! Failure isolation is structural: a unit's error or panic is captured at
//! the task boundary and becomes that unit's failure outcome while sibling
//! units continue untouched.

use crate::scheduler::fallback::AdaptedUnit;
use crate::scheduler::outcome::{Outcome, StepFailure};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, trace};

/// Single-thread-of-control dispatcher for one tick's adapted units
pub struct CooperativeDispatcher {
    /// Caps concurrently executing units
    limiter: Arc<Semaphore>,
}

impl CooperativeDispatcher {
    /// Create a dispatcher allowing at most `suspend_cap` units in flight
    pub fn new(suspend_cap: usize) -> Self {
        debug!(suspend_cap, "cooperative dispatcher initialized");
        Self {
            limiter: Arc::new(Semaphore::new(suspend_cap)),
        }
    }

    /// Run every unit to completion, returning outcomes in input order
    ///
    /// A unit with a deadline is cancelled cooperatively on expiry: the
    /// timeout takes effect only at the operation's suspension points, and
    /// code between suspension points completes before cancellation lands.
    pub async fn run<O: Send + 'static>(&self, units: Vec<AdaptedUnit<O>>) -> Vec<Outcome<O>> {
        let mut handles = Vec::with_capacity(units.len());

        for unit in units {
            let (id, deadline, future) = unit.into_parts();
            let limiter = Arc::clone(&self.limiter);

            trace!(agent = %id, "launching cooperative step");
            let task = tokio::spawn(async move {
                let _permit = match limiter.acquire_owned().await {
                    Ok(permit) => permit,
                    // The semaphore is never closed while the dispatcher lives.
                    Err(_) => return Err(StepFailure::operation("dispatcher limiter closed")),
                };

                match deadline {
                    Some(limit) => match tokio::time::timeout(limit, future).await {
                        Ok(result) => result,
                        Err(_) => Err(StepFailure::timeout(limit)),
                    },
                    None => future.await,
                }
            });
            handles.push((id, task));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (id, task) in handles {
            let result = match task.await {
                Ok(result) => result,
                Err(err) => Err(StepFailure::from_join_error(err)),
            };
            outcomes.push(Outcome { id, result });
        }
        outcomes
    }
}
