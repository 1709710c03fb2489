// src/scheduler/outcome.rs
//! Per-agent outcomes and the per-tick result set

use crate::scheduler::step_unit::AgentId;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinError;

/// Classification of an agent-level step failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The step operation itself returned an error or panicked
    OperationFailure,

    /// The step exceeded its deadline
    Timeout,
}

/// An agent-level step failure, captured locally to the offending agent
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct StepFailure {
    kind: FailureKind,
    message: String,
}

impl StepFailure {
    /// A failed or panicked operation
    pub fn operation(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::OperationFailure,
            message: message.into(),
        }
    }

    /// A deadline expiry
    pub fn timeout(deadline: Duration) -> Self {
        Self {
            kind: FailureKind::Timeout,
            message: format!("step exceeded its {}ms deadline", deadline.as_millis()),
        }
    }

    /// Failure classification
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Human-readable failure message
    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "step operation panicked".to_string()
        };
        Self::operation(format!("step operation panicked: {message}"))
    }

    pub(crate) fn from_join_error(err: JoinError) -> Self {
        if err.is_panic() {
            Self::from_panic(err.into_panic())
        } else {
            Self::operation("step task was cancelled before completion")
        }
    }
}

impl From<anyhow::Error> for StepFailure {
    fn from(err: anyhow::Error) -> Self {
        Self::operation(format!("{err:#}"))
    }
}

/// The per-agent result of one step unit
#[derive(Debug)]
pub struct Outcome<O> {
    /// Identity of the agent that ran the step
    pub id: AgentId,

    /// Success value or captured failure
    pub result: Result<O, StepFailure>,
}

impl<O> Outcome<O> {
    /// Whether the step succeeded
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Failure classification, if the step failed
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.result.as_ref().err().map(|f| f.kind())
    }
}

/// The complete, order-stable set of outcomes for one tick
///
/// Outcomes appear in the same order as the tick's input units, regardless
/// of completion order. Built fresh per tick and handed to the driver; the
/// scheduler keeps no outcome history.
#[derive(Debug)]
pub struct TickResult<O> {
    /// Monotonic tick index
    pub tick: u64,

    /// One outcome per submitted unit, in input order
    pub outcomes: Vec<Outcome<O>>,

    /// Wall-clock duration of the tick
    pub elapsed: Duration,
}

impl<O> TickResult<O> {
    /// Number of outcomes (equals the number of input units)
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether the tick ran with no units
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Number of successful outcomes
    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of failure outcomes
    pub fn failures(&self) -> usize {
        self.outcomes.len() - self.successes()
    }

    /// Iterate outcomes in input order
    pub fn iter(&self) -> impl Iterator<Item = &Outcome<O>> {
        self.outcomes.iter()
    }

    /// Consume the result, yielding outcomes in input order
    pub fn into_outcomes(self) -> Vec<Outcome<O>> {
        self.outcomes
    }
}
