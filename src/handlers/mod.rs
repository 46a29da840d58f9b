//! # API Handlers
//!
//! HTTP endpoint handlers for the GBP sync API.

pub mod dashboard;
pub mod sync;

use axum::extract::{FromRequestParts, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::Json;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::ServiceInfo;
use crate::server::AppState;

/// Calling user, taken from the `x-user-id` header. Session handling lives
/// upstream; by the time a request reaches this service the gateway has
/// already resolved the user.
#[derive(Debug, Clone, Copy)]
pub struct UserId(pub Uuid);

impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                ApiError::new(
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_FAILED",
                    "Missing x-user-id header",
                )
            })?;

        let user_id = Uuid::parse_str(header).map_err(|_| {
            ApiError::new(
                StatusCode::BAD_REQUEST,
                "VALIDATION_FAILED",
                "x-user-id header must be a UUID",
            )
        })?;

        Ok(UserId(user_id))
    }
}

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

/// Liveness/readiness check backed by a database ping
#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Database unreachable")
    ),
    tag = "health"
)]
pub async fn healthz(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    crate::db::health_check(&state.db).await.map_err(|err| {
        tracing::error!(error = %err, "health check failed");
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "Database unreachable",
        )
    })?;

    let pending_jobs = crate::repositories::SyncJobRepository::new(state.db.clone())
        .count_by_status(crate::models::sync_job::STATUS_PENDING)
        .await?;

    Ok(Json(
        serde_json::json!({ "status": "ok", "pending_jobs": pending_jobs }),
    ))
}
