use std::collections::HashMap;

use crate::scheduler::job::{Job, JobId, JobKind, WorkerId};

/// Authoritative `id -> Job` mapping plus the id allocator.
///
/// Owned exclusively by the dispatcher loop; nothing else mutates a record.
/// Records are retained after conclusion so lookups keep working for the
/// process lifetime.
#[derive(Debug)]
pub struct JobRegistry {
    jobs: HashMap<JobId, Job>,
    next_id: JobId,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
            next_id: 1,
        }
    }

    /// Create a new job in `Queued` state with a freshly allocated id and
    /// return a copy of the stored record.
    pub fn create(&mut self, kind: JobKind) -> Job {
        let id = self.next_id;
        self.next_id += 1;
        let job = Job::new(id, kind);
        self.jobs.insert(id, job.clone());
        job
    }

    /// Snapshot of a job record, by value.
    pub fn snapshot(&self, id: JobId) -> Option<Job> {
        self.jobs.get(&id).cloned()
    }

    /// Get a job by id.
    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    /// Flip a job to `InProgress` under `worker`. Returns false for an
    /// unknown id.
    pub fn assign(&mut self, id: JobId, worker: WorkerId) -> bool {
        match self.jobs.get_mut(&id) {
            Some(job) => {
                job.assign(worker);
                true
            }
            None => false,
        }
    }

    /// Flip a job to `Concluded` and clear its worker reference. Returns
    /// false for an unknown id.
    pub fn conclude(&mut self, id: JobId) -> bool {
        match self.jobs.get_mut(&id) {
            Some(job) => {
                job.conclude();
                true
            }
            None => false,
        }
    }

    /// All job records ordered by id.
    pub fn all(&self) -> Vec<&Job> {
        let mut jobs: Vec<&Job> = self.jobs.values().collect();
        jobs.sort_by_key(|j| j.id);
        jobs
    }

    /// Returns the number of records ever created and still retained.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
