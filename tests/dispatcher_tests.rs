//! Integration tests for the dispatch protocol, driven through the public
//! `JobService` surface.
//!
//! A worker re-advertises itself asynchronously after concluding a job, so
//! tests that need the next assignment retry briefly instead of assuming
//! the ticket is already back in the idle queue.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dispatch_lite::config::ServiceConfig;
use dispatch_lite::error::DispatchError;
use dispatch_lite::scheduler::job::{Job, JobKind, JobStatus};
use dispatch_lite::service::JobService;

fn test_config(workers: usize, queue_depth: usize) -> ServiceConfig {
    ServiceConfig::new(workers, queue_depth)
}

/// Acquire with a short retry loop, for the window where a worker has not
/// yet advertised itself back into the idle queue.
async fn acquire_eventually(service: &JobService) -> Job {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        match service.acquire_next().await {
            Ok(job) => return job,
            Err(err) if err.is_no_job_available() => {
                assert!(
                    tokio::time::Instant::now() < deadline,
                    "no job became available in time"
                );
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            Err(err) => panic!("unexpected dispatch error: {err}"),
        }
    }
}

#[tokio::test]
async fn test_submit_ids_unique_and_increasing() {
    let service = JobService::start(test_config(2, 100));

    let mut last = 0;
    for _ in 0..20 {
        let job = service.submit(JobKind::NonCritical).await.unwrap();
        assert!(job.id > last, "ids must be strictly increasing");
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.assigned_worker.is_none());
        last = job.id;
    }

    service.shutdown().await;
}

#[tokio::test]
async fn test_acquire_returns_in_progress_job() {
    let service = JobService::start(test_config(1, 10));
    let submitted = service.submit(JobKind::Critical).await.unwrap();

    let acquired = acquire_eventually(&service).await;
    assert_eq!(acquired.id, submitted.id);
    assert_eq!(acquired.status, JobStatus::InProgress);
    assert_eq!(acquired.assigned_worker, Some(1));

    // The registry observed the same transition.
    let looked_up = service.lookup(acquired.id).await.unwrap();
    assert_eq!(looked_up.status, JobStatus::InProgress);
    assert_eq!(looked_up.assigned_worker, Some(1));

    service.shutdown().await;
}

#[tokio::test]
async fn test_acquire_with_nothing_pending() {
    let service = JobService::start(test_config(1, 10));

    let err = service.acquire_next().await.unwrap_err();
    assert!(matches!(err, DispatchError::NoJobPending));
    assert!(err.is_no_job_available());

    service.shutdown().await;
}

/// Single worker: submit A, acquire A, submit B; the second acquire reports
/// no capacity until A concludes, then B is handed out.
#[tokio::test]
async fn test_single_worker_full_cycle() {
    let service = JobService::start(test_config(1, 10));

    let a = service.submit(JobKind::NonCritical).await.unwrap();
    let acquired = acquire_eventually(&service).await;
    assert_eq!(acquired.id, a.id);
    assert_eq!(acquired.status, JobStatus::InProgress);

    let b = service.submit(JobKind::NonCritical).await.unwrap();
    let err = service.acquire_next().await.unwrap_err();
    assert!(matches!(err, DispatchError::NoWorkerIdle));
    assert!(err.is_no_job_available());

    let concluded = service.conclude(a.id).await.unwrap();
    assert_eq!(concluded.status, JobStatus::Concluded);
    assert_eq!(concluded.assigned_worker, None);
    assert!(concluded.concluded_at.is_some());

    let next = acquire_eventually(&service).await;
    assert_eq!(next.id, b.id);

    service.shutdown().await;
}

#[tokio::test]
async fn test_pool_bounds_in_flight_jobs() {
    let service = JobService::start(test_config(2, 10));

    for _ in 0..3 {
        service.submit(JobKind::NonCritical).await.unwrap();
    }

    let first = acquire_eventually(&service).await;
    let second = acquire_eventually(&service).await;
    assert_ne!(first.id, second.id, "a job is never handed out twice");

    // Both workers hold a job; the third acquire finds nobody idle.
    let err = service.acquire_next().await.unwrap_err();
    assert!(matches!(err, DispatchError::NoWorkerIdle));

    service.shutdown().await;
}

#[tokio::test]
async fn test_acquired_jobs_are_distinct() {
    let service = JobService::start(test_config(5, 10));

    for _ in 0..5 {
        service.submit(JobKind::Critical).await.unwrap();
    }

    let mut seen = HashSet::new();
    for _ in 0..5 {
        let job = acquire_eventually(&service).await;
        assert_eq!(job.status, JobStatus::InProgress);
        assert!(seen.insert(job.id), "job {} handed out twice", job.id);
    }

    service.shutdown().await;
}

#[tokio::test]
async fn test_conclude_queued_job_rejected() {
    let service = JobService::start(test_config(1, 10));
    let job = service.submit(JobKind::Critical).await.unwrap();

    let err = service.conclude(job.id).await.unwrap_err();
    assert!(matches!(
        err,
        DispatchError::NotInProgress {
            status: JobStatus::Queued,
            ..
        }
    ));

    // The job is untouched and still dispatchable.
    let acquired = acquire_eventually(&service).await;
    assert_eq!(acquired.id, job.id);

    service.shutdown().await;
}

#[tokio::test]
async fn test_conclude_twice_rejected() {
    let service = JobService::start(test_config(1, 10));
    let job = service.submit(JobKind::NonCritical).await.unwrap();

    acquire_eventually(&service).await;
    service.conclude(job.id).await.unwrap();

    let err = service.conclude(job.id).await.unwrap_err();
    assert!(matches!(
        err,
        DispatchError::NotInProgress {
            status: JobStatus::Concluded,
            ..
        }
    ));

    service.shutdown().await;
}

#[tokio::test]
async fn test_conclude_unknown_job() {
    let service = JobService::start(test_config(1, 10));

    let err = service.conclude(12345).await.unwrap_err();
    assert!(matches!(err, DispatchError::JobNotFound(12345)));

    service.shutdown().await;
}

#[tokio::test]
async fn test_lookup_unknown_job() {
    let service = JobService::start(test_config(1, 10));

    let err = service.lookup(12345).await.unwrap_err();
    assert!(matches!(err, DispatchError::JobNotFound(12345)));

    service.shutdown().await;
}

/// Status is monotonic through the whole lifecycle as seen by lookup.
#[tokio::test]
async fn test_lookup_tracks_lifecycle() {
    let service = JobService::start(test_config(1, 10));
    let job = service.submit(JobKind::Critical).await.unwrap();

    assert_eq!(
        service.lookup(job.id).await.unwrap().status,
        JobStatus::Queued
    );

    acquire_eventually(&service).await;
    let running = service.lookup(job.id).await.unwrap();
    assert_eq!(running.status, JobStatus::InProgress);
    assert_eq!(running.assigned_worker, Some(1));

    service.conclude(job.id).await.unwrap();
    let done = service.lookup(job.id).await.unwrap();
    assert_eq!(done.status, JobStatus::Concluded);
    assert_eq!(done.assigned_worker, None);
    assert!(done.concluded_at.is_some());

    service.shutdown().await;
}

#[tokio::test]
async fn test_submit_rejected_when_buffer_full() {
    let service = JobService::start(test_config(1, 2));

    service.submit(JobKind::NonCritical).await.unwrap();
    service.submit(JobKind::NonCritical).await.unwrap();

    let err = service.submit(JobKind::NonCritical).await.unwrap_err();
    assert!(matches!(err, DispatchError::QueueFull));

    // The rejected job was never recorded.
    assert_eq!(service.list().await.unwrap().len(), 2);

    service.shutdown().await;
}

/// A worker cycles back to idle after concluding and picks up later jobs.
#[tokio::test]
async fn test_worker_reused_across_jobs() {
    let service = JobService::start(test_config(1, 10));

    for _ in 0..3 {
        let job = service.submit(JobKind::NonCritical).await.unwrap();
        let acquired = acquire_eventually(&service).await;
        assert_eq!(acquired.id, job.id);
        assert_eq!(acquired.assigned_worker, Some(1));
        service.conclude(job.id).await.unwrap();
    }

    service.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_submissions_get_unique_ids() {
    let service = Arc::new(JobService::start(test_config(4, 100)));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.submit(JobKind::NonCritical).await.unwrap().id
        }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        let id = handle.await.unwrap();
        assert!(ids.insert(id), "duplicate id {id}");
    }

    service.shutdown().await;
}

#[tokio::test]
async fn test_list_is_ordered_and_complete() {
    let service = JobService::start(test_config(2, 10));

    let a = service.submit(JobKind::Critical).await.unwrap();
    let b = service.submit(JobKind::NonCritical).await.unwrap();
    acquire_eventually(&service).await;

    let jobs = service.list().await.unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].id, a.id);
    assert_eq!(jobs[1].id, b.id);

    service.shutdown().await;
}

#[tokio::test]
async fn test_operations_fail_cleanly_after_shutdown() {
    let service = JobService::start(test_config(1, 10));
    service.shutdown().await;

    let err = service.submit(JobKind::Critical).await.unwrap_err();
    assert!(matches!(err, DispatchError::Unavailable));

    let err = service.acquire_next().await.unwrap_err();
    assert!(matches!(err, DispatchError::Unavailable));

    let err = service.conclude(1).await.unwrap_err();
    assert!(matches!(err, DispatchError::Unavailable));
}

/// Shutdown while a worker is holding a job still stops everything.
#[tokio::test]
async fn test_shutdown_with_job_in_flight() {
    let service = JobService::start(test_config(1, 10));

    service.submit(JobKind::NonCritical).await.unwrap();
    acquire_eventually(&service).await;

    tokio::time::timeout(Duration::from_secs(2), service.shutdown())
        .await
        .expect("shutdown should not hang with a held job");
}
