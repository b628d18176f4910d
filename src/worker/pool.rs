use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::scheduler::job::WorkerId;
use crate::worker::{IdleWorker, Worker, WorkerHandle};

/// The fixed set of workers plus the dispatcher's view of them.
///
/// Spawned once at startup; the pool size caps in-flight jobs for the
/// process lifetime. No worker is ever added or removed at runtime.
pub struct WorkerPool {
    pub(crate) idle_rx: mpsc::Receiver<IdleWorker>,
    pub(crate) handles: HashMap<WorkerId, WorkerHandle>,
    pub(crate) tasks: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `size` workers (ids `1..=size`) sharing one idle queue of the
    /// same capacity, so every worker can always re-advertise without
    /// blocking.
    pub fn spawn(size: usize, cancel: &CancellationToken) -> Self {
        let (idle_tx, idle_rx) = mpsc::channel(size.max(1));
        let mut handles = HashMap::with_capacity(size);
        let mut tasks = Vec::with_capacity(size);

        for id in 1..=size as WorkerId {
            let (worker, handle) = Worker::new(id, idle_tx.clone(), cancel.child_token());
            handles.insert(id, handle);
            tracing::info!(worker_id = id, "Starting worker");
            tasks.push(tokio::spawn(worker.run()));
        }

        Self {
            idle_rx,
            handles,
            tasks,
        }
    }

    pub fn size(&self) -> usize {
        self.tasks.len()
    }
}
