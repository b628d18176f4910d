//! Public facade over the dispatch engine.
//!
//! All state is built here and handed to the spawned tasks; there are no
//! globals. Every operation is a synchronous round-trip from the caller's
//! perspective: a bounded channel send plus a oneshot reply resolved
//! exactly once. When the engine has stopped, operations surface
//! [`DispatchError::Unavailable`] instead of hanging.

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ServiceConfig;
use crate::dispatcher::{AcquireRequest, ConcludeRequest, Dispatcher, RegistryRequest};
use crate::error::{DispatchError, Result};
use crate::scheduler::job::{Job, JobId, JobKind};
use crate::scheduler::policy::{FifoPolicy, QueuePolicy};
use crate::worker::WorkerPool;

pub struct JobService {
    acquire_tx: mpsc::Sender<AcquireRequest>,
    conclude_tx: mpsc::Sender<ConcludeRequest>,
    registry_tx: mpsc::Sender<RegistryRequest>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl JobService {
    /// Boot the worker pool and dispatcher with the default FIFO submission
    /// buffer. Must be called from within a tokio runtime.
    pub fn start(config: ServiceConfig) -> Self {
        let policy = Box::new(FifoPolicy::new(config.queue_depth));
        Self::start_with_policy(config, policy)
    }

    /// Boot with a custom queueing discipline for the submission buffer.
    pub fn start_with_policy(config: ServiceConfig, policy: Box<dyn QueuePolicy>) -> Self {
        let cancel = CancellationToken::new();
        let pool = WorkerPool::spawn(config.workers, &cancel);

        let (acquire_tx, acquire_rx) = mpsc::channel(config.request_buffer);
        let (conclude_tx, conclude_rx) = mpsc::channel(config.request_buffer);
        let (registry_tx, registry_rx) = mpsc::channel(config.request_buffer);

        tracing::info!(
            workers = pool.size(),
            queue_depth = config.queue_depth,
            "Starting job service"
        );

        let WorkerPool {
            idle_rx,
            handles,
            tasks: worker_tasks,
        } = pool;

        let dispatcher = Dispatcher::new(policy, idle_rx, handles, cancel.child_token());

        let mut tasks = vec![tokio::spawn(dispatcher.run(
            acquire_rx,
            conclude_rx,
            registry_rx,
        ))];
        tasks.extend(worker_tasks);

        Self {
            acquire_tx,
            conclude_tx,
            registry_tx,
            cancel,
            tasks: Mutex::new(tasks),
        }
    }

    /// Submit a new job; returns the created record in `Queued` state.
    pub async fn submit(&self, kind: JobKind) -> Result<Job> {
        let (reply, reply_rx) = oneshot::channel();
        self.registry_tx
            .send(RegistryRequest::Submit { kind, reply })
            .await
            .map_err(|_| DispatchError::Unavailable)?;
        reply_rx.await.map_err(|_| DispatchError::Unavailable)?
    }

    /// Hand the next pending job to an idle worker and return it, now in
    /// `InProgress` state. The reply comes from the worker that accepted
    /// the job.
    pub async fn acquire_next(&self) -> Result<Job> {
        let (reply, reply_rx) = oneshot::channel();
        self.acquire_tx
            .send(AcquireRequest { reply })
            .await
            .map_err(|_| DispatchError::Unavailable)?;
        reply_rx.await.map_err(|_| DispatchError::Unavailable)?
    }

    /// Instruct the worker holding `id` to finish it; returns the finalized
    /// record. The reply comes from that worker.
    pub async fn conclude(&self, id: JobId) -> Result<Job> {
        let (reply, reply_rx) = oneshot::channel();
        self.conclude_tx
            .send(ConcludeRequest { job_id: id, reply })
            .await
            .map_err(|_| DispatchError::Unavailable)?;
        reply_rx.await.map_err(|_| DispatchError::Unavailable)?
    }

    /// Snapshot of a single job record.
    pub async fn lookup(&self, id: JobId) -> Result<Job> {
        let (reply, reply_rx) = oneshot::channel();
        self.registry_tx
            .send(RegistryRequest::Lookup { id, reply })
            .await
            .map_err(|_| DispatchError::Unavailable)?;
        reply_rx.await.map_err(|_| DispatchError::Unavailable)?
    }

    /// Snapshot of every job record, ordered by id.
    pub async fn list(&self) -> Result<Vec<Job>> {
        let (reply, reply_rx) = oneshot::channel();
        self.registry_tx
            .send(RegistryRequest::List { reply })
            .await
            .map_err(|_| DispatchError::Unavailable)?;
        reply_rx.await.map_err(|_| DispatchError::Unavailable)
    }

    /// Stop the dispatcher and workers and wait for them to exit. Requests
    /// still queued when the loop stops are answered by their reply
    /// channels dropping, which callers see as [`DispatchError::Unavailable`].
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down job service");
        self.cancel.cancel();
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            let _ = task.await;
        }
    }
}
