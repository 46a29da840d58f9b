//! # Dashboard API Handlers
//!
//! Serves the cached per-account dashboard aggregates.

use axum::extract::{Path, State};
use axum::response::Json;
use uuid::Uuid;

use crate::error::{ApiError, not_found};
use crate::repositories::{AccountRepository, DashboardAggregates};
use crate::server::AppState;

/// Dashboard aggregates for an account
#[utoipa::path(
    get,
    path = "/accounts/{id}/dashboard",
    params(
        ("id" = Uuid, Path, description = "Account row id")
    ),
    responses(
        (status = 200, description = "Aggregated dashboard counters", body = DashboardAggregates),
        (status = 404, description = "Account not found")
    ),
    tag = "dashboard"
)]
pub async fn get_dashboard(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<DashboardAggregates>, ApiError> {
    let account = AccountRepository::new(state.db.clone())
        .find_by_id(account_id)
        .await?
        .ok_or_else(|| not_found("Account not found"))?;

    let aggregates = state
        .cache
        .get(account.id)
        .await
        .ok_or_else(|| ApiError::from(crate::error::ErrorType::InternalServerError))?;

    Ok(Json(aggregates))
}
