//! # Server Configuration
//!
//! Server setup and wiring for the GBP sync API: shared state construction,
//! route table, and the background executor.

use std::num::NonZeroUsize;
use std::sync::Arc;

use axum::{
    Router,
    extract::Request,
    middleware::Next,
    response::{Json, Response},
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::cache::DashboardCache;
use crate::committer::TransactionalCommitter;
use crate::config::AppConfig;
use crate::executor::SyncExecutor;
use crate::handlers;
use crate::orchestrator::SyncOrchestrator;
use crate::progress::ProgressPublisher;
use crate::provider::{GbpClient, ProviderApi, StaticTokenResolver};
use crate::telemetry::{self, TraceContext};

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub cache: Arc<DashboardCache>,
    pub progress: Arc<ProgressPublisher>,
}

/// Build shared state from configuration: provider client, committer,
/// progress publisher, dashboard cache, and the orchestrator on top.
pub fn build_state(
    config: &AppConfig,
    db: DatabaseConnection,
) -> Result<AppState, Box<dyn std::error::Error>> {
    let tokens = Arc::new(StaticTokenResolver::new(config.provider_token.clone()));
    let provider: Arc<dyn ProviderApi> = Arc::new(GbpClient::from_config(config, tokens)?);

    let committer = TransactionalCommitter::new(db.clone(), &config.commit_retry);
    let progress = Arc::new(ProgressPublisher::new(
        NonZeroUsize::new(config.progress_buffer).unwrap_or(NonZeroUsize::MIN),
    ));
    let cache = Arc::new(DashboardCache::new(
        db.clone(),
        NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN),
    ));

    let orchestrator = Arc::new(SyncOrchestrator::new(
        db.clone(),
        provider,
        committer,
        progress.clone(),
        cache.clone(),
    ));

    Ok(AppState {
        db,
        orchestrator,
        cache,
        progress,
    })
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/accounts/{id}/sync", post(handlers::sync::trigger_sync))
        .route("/accounts/{id}/sync/run", post(handlers::sync::run_sync))
        .route(
            "/accounts/{id}/dashboard",
            get(handlers::dashboard::get_dashboard),
        )
        .route("/sync-jobs", get(handlers::sync::list_jobs))
        .route("/sync-jobs/{id}", get(handlers::sync::get_job))
        .route("/openapi.json", get(openapi_json))
        .layer(axum::middleware::from_fn(trace_context_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Scope every request to a trace id, honoring an upstream `x-request-id`
/// when one is supplied.
async fn trace_context_middleware(request: Request, next: Next) -> Response {
    let trace_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    telemetry::with_trace_context(TraceContext { trace_id }, next.run(request)).await
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Starts the API server and the background queue executor.
pub async fn run_server(
    config: AppConfig,
    db: DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = build_state(&config, db.clone())?;

    let executor = Arc::new(SyncExecutor::new(
        db,
        state.orchestrator.clone(),
        config.executor.clone(),
    ));
    tokio::spawn(executor.run());

    let app = create_app(state);

    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, profile = %config.profile, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::sync::trigger_sync,
        crate::handlers::sync::run_sync,
        crate::handlers::sync::list_jobs,
        crate::handlers::sync::get_job,
        crate::handlers::dashboard::get_dashboard,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::handlers::sync::TriggerSyncRequest,
            crate::handlers::sync::JobInfo,
            crate::orchestrator::SyncReport,
            crate::repositories::DashboardAggregates,
            crate::error::ApiError,
        )
    ),
    info(
        title = "GBP Sync API",
        description = "Sync pipeline for Google Business Profile data",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
