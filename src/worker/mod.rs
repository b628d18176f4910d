//! Reactive worker units that hold at most one job between assignment and
//! conclusion.
//!
//! A worker's whole life is the loop in [`Worker::run`]: drop an idle ticket
//! into the shared queue, wait for one job, report it in progress, hold it
//! until a conclude instruction arrives, report it concluded, advertise
//! again. Workers never pick work themselves and never finish a job on
//! their own; every transition is driven by a message.

pub mod pool;

pub use pool::WorkerPool;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::{DispatchError, Result};
use crate::scheduler::job::{Job, WorkerId};

/// Reply channel for a caller blocked on a dispatch round-trip. Oneshot, so
/// each request resolves exactly once and an abandoned caller absorbs the
/// eventual reply without leaking a task.
pub type ReplyTx = oneshot::Sender<Result<Job>>;

/// A job handed to a worker, carrying the acquire caller's reply channel.
#[derive(Debug)]
pub struct Assignment {
    pub job: Job,
    pub reply: ReplyTx,
}

/// Instruction to finish the currently held job, carrying the conclude
/// caller's reply channel.
#[derive(Debug)]
pub struct Conclusion {
    pub reply: ReplyTx,
}

/// Ticket a worker drops into the shared idle queue when it is ready for
/// its next job.
#[derive(Debug)]
pub struct IdleWorker {
    pub id: WorkerId,
    pub assign_tx: mpsc::Sender<Assignment>,
}

/// Dispatcher-side handle to a worker's private conclude inbox.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    pub conclude_tx: mpsc::Sender<Conclusion>,
}

/// A single worker unit. `Idle -> Busy -> Idle -> ... -> Stopped`.
pub struct Worker {
    id: WorkerId,
    idle_tx: mpsc::Sender<IdleWorker>,
    assign_tx: mpsc::Sender<Assignment>,
    assign_rx: mpsc::Receiver<Assignment>,
    conclude_rx: mpsc::Receiver<Conclusion>,
    current_job: Option<Job>,
    cancel: CancellationToken,
}

impl Worker {
    /// One slot per private inbox. The dispatcher only sends an assignment
    /// to a worker whose idle ticket it consumed, and only sends a
    /// conclusion to the worker the registry says holds the job, so a
    /// single slot is never contended.
    const INBOX_CAPACITY: usize = 1;

    pub(crate) fn new(
        id: WorkerId,
        idle_tx: mpsc::Sender<IdleWorker>,
        cancel: CancellationToken,
    ) -> (Self, WorkerHandle) {
        let (assign_tx, assign_rx) = mpsc::channel(Self::INBOX_CAPACITY);
        let (conclude_tx, conclude_rx) = mpsc::channel(Self::INBOX_CAPACITY);
        let worker = Self {
            id,
            idle_tx,
            assign_tx,
            assign_rx,
            conclude_rx,
            current_job: None,
            cancel,
        };
        (worker, WorkerHandle { conclude_tx })
    }

    /// Run the worker until cancelled.
    pub async fn run(mut self) {
        let cancel = self.cancel.clone();
        loop {
            if cancel.is_cancelled() {
                break;
            }

            let ticket = IdleWorker {
                id: self.id,
                assign_tx: self.assign_tx.clone(),
            };
            if self.idle_tx.send(ticket).await.is_err() {
                // Dispatcher gone; nothing left to work for.
                break;
            }
            tracing::debug!(worker_id = self.id, "Worker idle");

            tokio::select! {
                assignment = self.assign_rx.recv() => {
                    match assignment {
                        Some(assignment) => self.work(assignment).await,
                        None => break,
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
        tracing::debug!(worker_id = self.id, "Worker stopped");
    }

    /// Accept one job, hold it until concluded, and report both transitions
    /// to the callers waiting on them.
    async fn work(&mut self, assignment: Assignment) {
        let Assignment { mut job, reply } = assignment;
        job.assign(self.id);
        tracing::info!(worker_id = self.id, job_id = job.id, "Worker picked up job");
        self.current_job = Some(job.clone());

        // The acquire caller is satisfied here, not by the dispatcher.
        let _ = reply.send(Ok(job));

        // Hold the job until told to finish it. There is no job processor
        // in this design; the hold is the work.
        let cancel = self.cancel.clone();
        tokio::select! {
            conclusion = self.conclude_rx.recv() => {
                if let Some(conclusion) = conclusion {
                    self.finish(conclusion);
                }
            }
            _ = cancel.cancelled() => {
                // Stopped while holding a job. The record stays in progress;
                // nothing survives the process anyway.
            }
        }
    }

    fn finish(&mut self, conclusion: Conclusion) {
        let Conclusion { reply } = conclusion;
        match self.current_job.take() {
            Some(mut job) => {
                job.conclude();
                tracing::info!(worker_id = self.id, job_id = job.id, "Worker concluded job");
                let _ = reply.send(Ok(job));
            }
            None => {
                tracing::error!(worker_id = self.id, "Conclude instruction with no job held");
                let _ = reply.send(Err(DispatchError::InternalInconsistency(format!(
                    "worker {} received a conclude instruction while holding no job",
                    self.id
                ))));
            }
        }
    }
}
