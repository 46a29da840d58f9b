//! # Sync API Handlers
//!
//! Triggering syncs (queued and inline) and inspecting the sync job queue.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, conflict, not_found};
use crate::handlers::UserId;
use crate::models::sync_job;
use crate::orchestrator::{SyncFailure, SyncReport};
use crate::repositories::{AccountRepository, SyncJobRepository, sync_job::EnqueueOutcome};
use crate::server::AppState;

/// Request body for triggering a sync.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TriggerSyncRequest {
    /// Whether the sync should also fetch Q&A threads (default: true)
    #[serde(default = "default_include_questions")]
    pub include_questions: bool,
}

fn default_include_questions() -> bool {
    true
}

/// Sync job representation returned by the API.
#[derive(Debug, Serialize, ToSchema)]
pub struct JobInfo {
    /// Unique identifier for the sync job
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,
    /// Account this job syncs
    pub gmb_account_id: Uuid,
    /// Sync scope (`full` or `locations_reviews`)
    #[schema(example = "full")]
    pub sync_type: String,
    /// Current status of the job
    #[schema(example = "pending")]
    pub status: String,
    /// Number of attempts made so far
    pub attempts: i32,
    /// Structured error details from the last failed attempt, if any
    pub error: Option<serde_json::Value>,
    /// When the job was created
    pub created_at: String,
    /// When the job last changed state
    pub updated_at: String,
}

impl From<sync_job::Model> for JobInfo {
    fn from(job: sync_job::Model) -> Self {
        Self {
            id: job.id,
            gmb_account_id: job.gmb_account_id,
            sync_type: job.sync_type,
            status: job.status,
            attempts: job.attempts,
            error: job.error,
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
        }
    }
}

/// Enqueue a background sync for an account
#[utoipa::path(
    post,
    path = "/accounts/{id}/sync",
    request_body = TriggerSyncRequest,
    params(
        ("id" = Uuid, Path, description = "Account row id")
    ),
    responses(
        (status = 202, description = "Sync job enqueued", body = JobInfo),
        (status = 404, description = "Account not found"),
        (status = 409, description = "A sync is already in flight for this account")
    ),
    tag = "sync"
)]
pub async fn trigger_sync(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    body: Option<Json<TriggerSyncRequest>>,
) -> Result<(StatusCode, Json<JobInfo>), ApiError> {
    let request = body.map(|Json(req)| req).unwrap_or_default();
    let scope = sync_job::SyncScope::from_include_questions(request.include_questions);

    let account = AccountRepository::new(state.db.clone())
        .find_by_id(account_id)
        .await?
        .ok_or_else(|| not_found("Account not found"))?;

    let outcome = SyncJobRepository::new(state.db.clone())
        .enqueue(account.user_id, account.id, scope)
        .await?;

    match outcome {
        EnqueueOutcome::Created(job) => Ok((StatusCode::ACCEPTED, Json(job.into()))),
        EnqueueOutcome::AlreadyQueued(_) => {
            Err(conflict("A sync is already in flight for this account"))
        }
    }
}

/// Run a sync inline and wait for the result
#[utoipa::path(
    post,
    path = "/accounts/{id}/sync/run",
    request_body = TriggerSyncRequest,
    params(
        ("id" = Uuid, Path, description = "Account row id")
    ),
    responses(
        (status = 200, description = "Sync completed", body = SyncReport),
        (status = 404, description = "Account not found"),
        (status = 409, description = "A sync is already in flight for this account"),
        (status = 502, description = "Provider failure")
    ),
    tag = "sync"
)]
pub async fn run_sync(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    body: Option<Json<TriggerSyncRequest>>,
) -> Result<Json<SyncReport>, ApiError> {
    let request = body.map(|Json(req)| req).unwrap_or_default();

    let report = state
        .orchestrator
        .perform_sync(account_id, request.include_questions)
        .await
        .map_err(sync_failure_to_api_error)?;

    Ok(Json(report))
}

fn sync_failure_to_api_error(failure: SyncFailure) -> ApiError {
    match &failure {
        SyncFailure::AccountNotFound => not_found("Account not found"),
        SyncFailure::AlreadyRunning => conflict("A sync is already in flight for this account"),
        SyncFailure::Provider(_) => ApiError::new(
            StatusCode::BAD_GATEWAY,
            "PROVIDER_ERROR",
            &failure.to_string(),
        ),
        SyncFailure::Commit(_) | SyncFailure::Queue(_) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            &failure.to_string(),
        ),
    }
}

/// List recent sync jobs for the calling user
#[utoipa::path(
    get,
    path = "/sync-jobs",
    responses(
        (status = 200, description = "Recent sync jobs, newest first", body = [JobInfo]),
        (status = 400, description = "Missing or invalid x-user-id header")
    ),
    tag = "sync"
)]
pub async fn list_jobs(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> Result<Json<Vec<JobInfo>>, ApiError> {
    let jobs = SyncJobRepository::new(state.db.clone())
        .list_for_user(user_id, 50)
        .await?;

    Ok(Json(jobs.into_iter().map(JobInfo::from).collect()))
}

/// Fetch one sync job by id
#[utoipa::path(
    get,
    path = "/sync-jobs/{id}",
    params(
        ("id" = Uuid, Path, description = "Sync job id")
    ),
    responses(
        (status = 200, description = "Sync job", body = JobInfo),
        (status = 404, description = "Job not found for this user")
    ),
    tag = "sync"
)]
pub async fn get_job(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobInfo>, ApiError> {
    let job = SyncJobRepository::new(state.db.clone())
        .find_for_user(user_id, job_id)
        .await?
        .ok_or_else(|| not_found("Sync job not found"))?;

    Ok(Json(job.into()))
}
