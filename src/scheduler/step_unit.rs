// src/scheduler/step_unit.rs
//! Step units: one agent's scheduled unit of work for a tick
//!
//! A `StepUnit` pairs an agent identity with a no-argument operation and a
//! capability tag. The tag is resolved once at construction time, so the
//! dispatch hot path never probes the operation to find out what it is.
//! Units are built fresh each tick and are immutable once constructed;
//! construction never invokes the operation.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Opaque, stable agent identity
///
/// Owned by the caller's agent population; the scheduler only reads it and
/// uses it to correlate a step unit with its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(String);

impl AgentId {
    /// Create an agent identity
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// View the identity as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AgentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Whether a step operation can suspend at I/O or runs to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// The operation may pause at its own await points (e.g., a remote
    /// call) without occupying a dedicated worker
    Suspending,

    /// The operation, once started, runs to completion on its worker
    Blocking,
}

/// The operation carried by a step unit
pub(crate) enum StepOp<O> {
    /// Lazily-polled future; nothing runs until a dispatcher drives it
    Suspending(BoxFuture<'static, anyhow::Result<O>>),

    /// Closure run to completion on a worker slot
    Blocking(Box<dyn FnOnce() -> anyhow::Result<O> + Send + 'static>),
}

impl<O> StepOp<O> {
    pub(crate) fn capability(&self) -> Capability {
        match self {
            StepOp::Suspending(_) => Capability::Suspending,
            StepOp::Blocking(_) => Capability::Blocking,
        }
    }
}

/// One agent's unit of work for a tick
pub struct StepUnit<O> {
    id: AgentId,
    op: StepOp<O>,
    deadline: Option<Duration>,
}

impl<O> StepUnit<O> {
    /// Create a suspension-capable unit from a future
    pub fn suspending(
        id: impl Into<AgentId>,
        operation: impl Future<Output = anyhow::Result<O>> + Send + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            op: StepOp::Suspending(Box::pin(operation)),
            deadline: None,
        }
    }

    /// Create a blocking unit from a closure
    pub fn blocking(
        id: impl Into<AgentId>,
        operation: impl FnOnce() -> anyhow::Result<O> + Send + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            op: StepOp::Blocking(Box::new(operation)),
            deadline: None,
        }
    }

    /// Attach a per-unit deadline, overriding the configured default
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// The agent this unit belongs to
    pub fn id(&self) -> &AgentId {
        &self.id
    }

    /// Capability tag resolved at construction
    pub fn capability(&self) -> Capability {
        self.op.capability()
    }

    /// Per-unit deadline, if any
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub(crate) fn from_parts(id: AgentId, op: StepOp<O>, deadline: Option<Duration>) -> Self {
        Self { id, op, deadline }
    }

    pub(crate) fn into_parts(self) -> (AgentId, StepOp<O>, Option<Duration>) {
        (self.id, self.op, self.deadline)
    }
}

impl<O> fmt::Debug for StepUnit<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepUnit")
            .field("id", &self.id)
            .field("capability", &self.capability())
            .field("deadline", &self.deadline)
            .finish()
    }
}
