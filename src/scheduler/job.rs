use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique job identifier, monotonically assigned starting at 1.
pub type JobId = u64;

/// Worker identifier, `1..=N` and stable for the process lifetime.
pub type WorkerId = u64;

/// How time-sensitive a job is. Carried through the system but not acted
/// upon by the FIFO policy; a priority policy would order by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobKind {
    #[serde(rename = "TIME_CRITICAL")]
    Critical,
    #[serde(rename = "NON_TIME_CRITICAL")]
    NonCritical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    InProgress,
    Concluded,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::InProgress => write!(f, "in progress"),
            JobStatus::Concluded => write!(f, "concluded"),
        }
    }
}

/// A job record. `assigned_worker` is set exactly while the job is
/// `InProgress`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub assigned_worker: Option<WorkerId>,
    pub submitted_at: DateTime<Utc>,
    pub concluded_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(id: JobId, kind: JobKind) -> Self {
        Self {
            id,
            kind,
            status: JobStatus::Queued,
            assigned_worker: None,
            submitted_at: Utc::now(),
            concluded_at: None,
        }
    }

    /// Mark the job as picked up by `worker`. The dispatcher applies this to
    /// the registry record and the worker to its own copy; both owners run
    /// the same transition.
    pub fn assign(&mut self, worker: WorkerId) {
        self.status = JobStatus::InProgress;
        self.assigned_worker = Some(worker);
    }

    /// Mark the job as finished and release the worker reference.
    pub fn conclude(&mut self) {
        self.status = JobStatus::Concluded;
        self.assigned_worker = None;
        self.concluded_at = Some(Utc::now());
    }
}
