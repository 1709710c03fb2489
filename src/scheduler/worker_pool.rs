// src/scheduler/worker_pool.rs
//! Bounded worker pool for blocking step units
//!
//! A fixed set of reusable OS worker slots drains a FIFO job queue. At most
//! `size` units execute concurrently; excess submissions queue in arrival
//! order until a slot frees. Each slot runs one unit to completion before
//! taking the next, and catches operation errors and panics at the slot
//! boundary so the slot survives to serve the next unit.
//!
//! Every slot owns a current-thread tokio runtime: in worker-pool mode all
//! units land here regardless of capability, and a suspension-capable unit
//! is simply driven to completion on the slot's own runtime.

use crate::scheduler::outcome::{Outcome, StepFailure};
use crate::scheduler::step_unit::{AgentId, StepOp, StepUnit};
use crate::utils::errors::{Result, SchedulerError};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, error, info, trace, warn};

/// A queued unit of work for a worker slot
struct Job<O> {
    id: AgentId,
    op: StepOp<O>,
    reply: oneshot::Sender<std::result::Result<O, StepFailure>>,
    cancelled: Arc<AtomicBool>,
}

/// Handle to a submitted, not-yet-resolved step
pub struct PendingStep<O> {
    id: AgentId,
    rx: oneshot::Receiver<std::result::Result<O, StepFailure>>,
    deadline: Option<Duration>,
    submitted_at: Instant,
    cancelled: Arc<AtomicBool>,
}

impl<O> PendingStep<O> {
    /// The agent this pending step belongs to
    pub fn id(&self) -> &AgentId {
        &self.id
    }

    /// Resolve this step into an outcome, honoring its deadline
    ///
    /// The deadline is measured from submission time. On expiry the step is
    /// marked cancelled so a still-queued unit is skipped before it starts;
    /// a unit already running on its slot runs to completion and its late
    /// result is discarded.
    pub(crate) async fn resolve(self) -> Outcome<O> {
        let PendingStep {
            id,
            rx,
            deadline,
            submitted_at,
            cancelled,
        } = self;

        let result = match deadline {
            Some(limit) => {
                let remaining = limit.saturating_sub(submitted_at.elapsed());
                match tokio::time::timeout(remaining, rx).await {
                    Ok(recv) => flatten_recv(recv),
                    Err(_) => {
                        cancelled.store(true, Ordering::Relaxed);
                        trace!(agent = %id, "step deadline elapsed");
                        Err(StepFailure::timeout(limit))
                    }
                }
            }
            None => flatten_recv(rx.await),
        };

        Outcome { id, result }
    }
}

fn flatten_recv<O>(
    recv: std::result::Result<std::result::Result<O, StepFailure>, oneshot::error::RecvError>,
) -> std::result::Result<O, StepFailure> {
    match recv {
        Ok(result) => result,
        // Only possible if the pool is torn down with the job still queued.
        Err(_) => Err(StepFailure::operation("worker slot dropped the step")),
    }
}

/// Bounded pool of reusable worker slots
pub struct WorkerPool<O> {
    sender: Mutex<Option<Sender<Job<O>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
    size: usize,
}

impl<O: Send + 'static> WorkerPool<O> {
    /// Create a pool with `size` worker slots
    ///
    /// Pool size is fixed for the lifetime of the pool.
    pub fn new(size: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();

        let workers = (0..size)
            .map(|slot| {
                let jobs: Receiver<Job<O>> = receiver.clone();
                std::thread::spawn(move || worker_loop(slot, jobs))
            })
            .collect();

        info!(size, "worker pool initialized");

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            closed: AtomicBool::new(false),
            size,
        }
    }

    /// Enqueue a step unit for execution
    ///
    /// Never blocks beyond the queue send. Fails with `PoolClosed` after
    /// shutdown.
    pub fn submit(&self, unit: StepUnit<O>) -> Result<PendingStep<O>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SchedulerError::PoolClosed);
        }

        let guard = self.sender.lock();
        let sender = guard.as_ref().ok_or(SchedulerError::PoolClosed)?;

        let (id, op, deadline) = unit.into_parts();
        let (reply, rx) = oneshot::channel();
        let cancelled = Arc::new(AtomicBool::new(false));

        let job = Job {
            id: id.clone(),
            op,
            reply,
            cancelled: Arc::clone(&cancelled),
        };
        sender.send(job).map_err(|_| SchedulerError::PoolClosed)?;
        trace!(agent = %id, "step queued");

        Ok(PendingStep {
            id,
            rx,
            deadline,
            submitted_at: Instant::now(),
            cancelled,
        })
    }

    /// Resolve every pending step, in submission order
    ///
    /// Returns once each submitted unit has produced an outcome (success,
    /// failure, or timeout). Order of the returned outcomes equals handle
    /// submission order, never completion order.
    pub async fn await_all(&self, handles: Vec<PendingStep<O>>) -> Vec<Outcome<O>> {
        let mut outcomes = Vec::with_capacity(handles.len());
        for pending in handles {
            outcomes.push(pending.resolve().await);
        }
        outcomes
    }
}

impl<O> WorkerPool<O> {
    /// Whether the pool has been shut down
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of worker slots
    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue and lifecycle statistics
    pub fn stats(&self) -> PoolStats {
        let queued = self.sender.lock().as_ref().map_or(0, |s| s.len());
        PoolStats {
            size: self.size,
            queued,
            closed: self.is_closed(),
        }
    }

    /// Stop intake, drain in-flight units, and release all worker slots
    ///
    /// Idempotent; repeat calls return immediately.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("shutting down worker pool");
        // Dropping the sender closes intake; slots finish queued jobs and exit.
        *self.sender.lock() = None;

        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if handle.join().is_err() {
                warn!("worker slot panicked during drain");
            }
        }
        debug!("worker pool shut down");
    }
}

impl<O> Drop for WorkerPool<O> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Pool statistics
#[derive(Debug, Clone)]
pub struct PoolStats {
    /// Number of worker slots
    pub size: usize,

    /// Jobs queued and not yet picked up by a slot
    pub queued: usize,

    /// Whether the pool has been shut down
    pub closed: bool,
}

/// One worker slot: runs queued units to completion, one at a time
fn worker_loop<O: Send + 'static>(slot: usize, jobs: Receiver<Job<O>>) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(slot, "worker slot failed to build runtime: {e}");
            return;
        }
    };

    for job in jobs.iter() {
        if job.cancelled.load(Ordering::Relaxed) {
            trace!(slot, agent = %job.id, "skipping cancelled step");
            continue;
        }

        trace!(slot, agent = %job.id, "running step");
        let caught = match job.op {
            StepOp::Blocking(op) => std::panic::catch_unwind(AssertUnwindSafe(op)),
            StepOp::Suspending(fut) => {
                std::panic::catch_unwind(AssertUnwindSafe(|| runtime.block_on(fut)))
            }
        };

        let result = match caught {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                warn!(slot, agent = %job.id, "step failed: {err:#}");
                Err(StepFailure::from(err))
            }
            Err(payload) => {
                warn!(slot, agent = %job.id, "step panicked");
                Err(StepFailure::from_panic(payload))
            }
        };

        if job.reply.send(result).is_err() {
            trace!(slot, agent = %job.id, "step result discarded (deadline elapsed)");
        }
    }

    debug!(slot, "worker slot drained");
}
