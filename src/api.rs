//! Thin HTTP adapter over [`JobService`].
//!
//! Transport only: request/response shapes, status-code mapping, and
//! routing. All job state lives behind the facade.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::error::DispatchError;
use crate::scheduler::job::{JobId, JobKind};
use crate::service::JobService;

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<JobService>,
}

#[derive(Deserialize)]
struct EnqueueRequest {
    kind: JobKind,
}

#[derive(Serialize)]
struct EnqueueResponse {
    id: JobId,
}

/// JSON error envelope for every non-2xx response.
#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/enqueue", post(enqueue))
        .route("/jobs/dequeue", post(dequeue))
        .route("/jobs/{id}/conclude", post(conclude))
        .route("/jobs/{id}", get(get_job))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve the API until the token is cancelled.
pub async fn serve(
    addr: SocketAddr,
    state: ApiState,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let app = router(state);

    tracing::info!(addr = %addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

async fn enqueue(State(state): State<ApiState>, Json(req): Json<EnqueueRequest>) -> Response {
    match state.service.submit(req.kind).await {
        Ok(job) => Json(EnqueueResponse { id: job.id }).into_response(),
        Err(err) => error_response(err),
    }
}

async fn dequeue(State(state): State<ApiState>) -> Response {
    match state.service.acquire_next().await {
        Ok(job) => Json(job).into_response(),
        Err(err) => error_response(err),
    }
}

async fn conclude(State(state): State<ApiState>, Path(id): Path<JobId>) -> Response {
    match state.service.conclude(id).await {
        Ok(job) => (StatusCode::ACCEPTED, Json(job)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn get_job(State(state): State<ApiState>, Path(id): Path<JobId>) -> Response {
    match state.service.lookup(id).await {
        Ok(job) => Json(job).into_response(),
        Err(err) => error_response(err),
    }
}

async fn list_jobs(State(state): State<ApiState>) -> Response {
    match state.service.list().await {
        Ok(jobs) => Json(jobs).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: DispatchError) -> Response {
    let status = match &err {
        DispatchError::JobNotFound(_) => StatusCode::NOT_FOUND,
        DispatchError::NotInProgress { .. } => StatusCode::CONFLICT,
        // Both "nothing pending" and "nobody free" are a 404 for the
        // dequeue caller; the body says which it was.
        DispatchError::NoJobPending | DispatchError::NoWorkerIdle => StatusCode::NOT_FOUND,
        DispatchError::QueueFull => StatusCode::TOO_MANY_REQUESTS,
        DispatchError::InternalInconsistency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        DispatchError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    };
    (
        status,
        Json(ErrorBody {
            message: err.to_string(),
        }),
    )
        .into_response()
}
