use thiserror::Error;

use crate::scheduler::job::{JobId, JobStatus};

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    #[error("job {id} is not in progress (currently {status})")]
    NotInProgress { id: JobId, status: JobStatus },

    #[error("no jobs pending")]
    NoJobPending,

    #[error("no idle workers")]
    NoWorkerIdle,

    #[error("submission buffer is full")]
    QueueFull,

    #[error("internal consistency failure: {0}")]
    InternalInconsistency(String),

    #[error("dispatcher is not running")]
    Unavailable,
}

impl DispatchError {
    /// True for the two causes a caller may want to collapse into a single
    /// "no job available" condition: nothing pending, or nobody free.
    pub fn is_no_job_available(&self) -> bool {
        matches!(
            self,
            DispatchError::NoJobPending | DispatchError::NoWorkerIdle
        )
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
