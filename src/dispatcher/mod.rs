//! The dispatch engine: one serialized control loop that owns every
//! cross-worker state transition.
//!
//! The loop is the single writer for the job registry and the only place
//! scheduling decisions happen, so no lock guards any of it. Callers block
//! on a oneshot reply; for acquire and conclude that reply comes from the
//! worker that ends up holding the job, not from the dispatcher itself
//! (caller -> dispatcher -> worker -> caller).

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::DispatchError;
use crate::scheduler::job::{Job, JobId, JobKind, JobStatus, WorkerId};
use crate::scheduler::policy::{QueueEntry, QueuePolicy};
use crate::scheduler::registry::JobRegistry;
use crate::worker::{Assignment, Conclusion, IdleWorker, ReplyTx, WorkerHandle};

/// Request to hand the next pending job to an idle worker.
#[derive(Debug)]
pub struct AcquireRequest {
    pub reply: ReplyTx,
}

/// Request to route a conclude instruction to the worker holding `job_id`.
#[derive(Debug)]
pub struct ConcludeRequest {
    pub job_id: JobId,
    pub reply: ReplyTx,
}

/// Registry operations: creation and snapshot reads. Routed through the
/// loop like everything else, so no caller ever touches the map directly.
#[derive(Debug)]
pub enum RegistryRequest {
    Submit { kind: JobKind, reply: ReplyTx },
    Lookup { id: JobId, reply: ReplyTx },
    List { reply: oneshot::Sender<Vec<Job>> },
}

pub struct Dispatcher {
    registry: JobRegistry,
    policy: Box<dyn QueuePolicy>,
    idle_rx: mpsc::Receiver<IdleWorker>,
    workers: HashMap<WorkerId, WorkerHandle>,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub(crate) fn new(
        policy: Box<dyn QueuePolicy>,
        idle_rx: mpsc::Receiver<IdleWorker>,
        workers: HashMap<WorkerId, WorkerHandle>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry: JobRegistry::new(),
            policy,
            idle_rx,
            workers,
            cancel,
        }
    }

    /// Run the dispatch loop until cancelled.
    ///
    /// One request is handled to completion per iteration, so concurrent
    /// callers are strictly serialized. The loop never awaits anything but
    /// its own request channels; every internal poll is non-blocking.
    pub async fn run(
        mut self,
        mut acquire_rx: mpsc::Receiver<AcquireRequest>,
        mut conclude_rx: mpsc::Receiver<ConcludeRequest>,
        mut registry_rx: mpsc::Receiver<RegistryRequest>,
    ) {
        let cancel = self.cancel.clone();
        loop {
            tokio::select! {
                Some(req) = acquire_rx.recv() => self.handle_acquire(req),
                Some(req) = conclude_rx.recv() => self.handle_conclude(req),
                Some(req) = registry_rx.recv() => self.handle_registry(req),
                _ = cancel.cancelled() => break,
                else => break,
            }
        }
        tracing::info!("Dispatcher stopped");
    }

    /// Matchmaking only: pick a pending job and an idle worker and hand the
    /// job over. The worker's own report satisfies the caller.
    fn handle_acquire(&mut self, AcquireRequest { reply }: AcquireRequest) {
        // Check for a pending job before touching the idle queue, so a
        // worker slot is never consumed when there is nothing to run.
        let Some(entry) = self.policy.next() else {
            tracing::debug!("No jobs pending");
            let _ = reply.send(Err(DispatchError::NoJobPending));
            return;
        };

        let Ok(ticket) = self.idle_rx.try_recv() else {
            self.policy.restore(entry);
            tracing::debug!(job_id = entry.id, "All workers busy");
            let _ = reply.send(Err(DispatchError::NoWorkerIdle));
            return;
        };

        let Some(job) = self.registry.snapshot(entry.id) else {
            // A buffered entry always has a record; submit creates both in
            // one step. Report the breach instead of dying on it.
            self.policy.restore(entry);
            let _ = reply.send(Err(self.inconsistency(format!(
                "queued job {} has no registry record",
                entry.id
            ))));
            return;
        };

        tracing::info!(job_id = entry.id, worker_id = ticket.id, "Dispatching job");

        match ticket.assign_tx.try_send(Assignment { job, reply }) {
            Ok(()) => {
                // Applied before the next request is read, so a caller that
                // hears back from the worker and immediately looks the job
                // up observes InProgress.
                self.registry.assign(entry.id, ticket.id);
            }
            Err(err) => {
                // An advertised worker always has a free inbox slot; this
                // only fires if the pool is tearing down underneath us.
                self.policy.restore(entry);
                let Assignment { reply, .. } = err.into_inner();
                let _ = reply.send(Err(self.inconsistency(format!(
                    "idle worker {} refused assignment of job {}",
                    ticket.id, entry.id
                ))));
            }
        }
    }

    /// Validate the conclude request against the registry, then route the
    /// instruction to the specific worker holding the job.
    fn handle_conclude(&mut self, ConcludeRequest { job_id, reply }: ConcludeRequest) {
        let (status, assigned) = match self.registry.get(job_id) {
            Some(job) => (job.status, job.assigned_worker),
            None => {
                let _ = reply.send(Err(DispatchError::JobNotFound(job_id)));
                return;
            }
        };

        if status != JobStatus::InProgress {
            let _ = reply.send(Err(DispatchError::NotInProgress { id: job_id, status }));
            return;
        }

        // InProgress implies a worker reference; a hole here, or a worker id
        // outside the known set, is a protocol breach reported to the
        // caller, never a fatal condition.
        let Some(worker_id) = assigned else {
            let _ = reply.send(Err(self.inconsistency(format!(
                "job {job_id} is in progress with no assigned worker"
            ))));
            return;
        };

        let Some(handle) = self.workers.get(&worker_id) else {
            let _ = reply.send(Err(self.inconsistency(format!(
                "job {job_id} is assigned to unknown worker {worker_id}"
            ))));
            return;
        };

        tracing::info!(job_id, worker_id, "Routing conclude instruction");

        match handle.conclude_tx.try_send(Conclusion { reply }) {
            Ok(()) => {
                // The busy worker is parked on its conclude inbox, so the
                // slot is free; flip the record before the next request so
                // follow-up lookups read Concluded.
                self.registry.conclude(job_id);
            }
            Err(err) => {
                let Conclusion { reply } = err.into_inner();
                let _ = reply.send(Err(self.inconsistency(format!(
                    "worker {worker_id} refused conclude instruction for job {job_id}"
                ))));
            }
        }
    }

    fn handle_registry(&mut self, req: RegistryRequest) {
        match req {
            RegistryRequest::Submit { kind, reply } => {
                if self.policy.is_full() {
                    tracing::warn!("Submission buffer full, rejecting job");
                    let _ = reply.send(Err(DispatchError::QueueFull));
                    return;
                }
                let job = self.registry.create(kind);
                let accepted = self.policy.enqueue(QueueEntry {
                    id: job.id,
                    kind: job.kind,
                });
                debug_assert!(accepted, "policy rejected a job below capacity");
                tracing::info!(job_id = job.id, kind = ?job.kind, "Job submitted");
                let _ = reply.send(Ok(job));
            }
            RegistryRequest::Lookup { id, reply } => {
                let result = self
                    .registry
                    .snapshot(id)
                    .ok_or(DispatchError::JobNotFound(id));
                let _ = reply.send(result);
            }
            RegistryRequest::List { reply } => {
                let jobs = self.registry.all().into_iter().cloned().collect();
                let _ = reply.send(jobs);
            }
        }
    }

    /// Log and build the recoverable replacement for what would otherwise
    /// be a fatal protocol breach.
    fn inconsistency(&self, detail: String) -> DispatchError {
        tracing::error!(%detail, "Internal consistency failure");
        DispatchError::InternalInconsistency(detail)
    }
}
