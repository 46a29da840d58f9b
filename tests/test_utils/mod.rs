//! Test utilities for database and pipeline testing.
//!
//! Sets up in-memory SQLite databases with migrations applied and wires the
//! sync pipeline against a mock provider server.

#![allow(dead_code)]

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use serde_json::json;
use uuid::Uuid;

use gbp_sync::cache::DashboardCache;
use gbp_sync::committer::TransactionalCommitter;
use gbp_sync::config::CommitRetryConfig;
use gbp_sync::migration::{Migrator, MigratorTrait};
use gbp_sync::models::gmb_account;
use gbp_sync::orchestrator::SyncOrchestrator;
use gbp_sync::progress::ProgressPublisher;
use gbp_sync::provider::{GbpClient, ProviderApi, StaticTokenResolver};

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Inserts a GMB account fixture owned by `user_id`.
pub async fn insert_account(
    db: &DatabaseConnection,
    user_id: Uuid,
    google_account_id: &str,
) -> Result<gmb_account::Model> {
    let now = Utc::now().fixed_offset();
    let account = gmb_account::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        google_account_id: Set(google_account_id.to_string()),
        display_name: Set(Some("Test Business".to_string())),
        created_at: Set(now),
        updated_at: Set(now),
    };

    Ok(account.insert(db).await?)
}

/// Retry settings tuned for tests: small budget, tiny delays.
pub fn test_retry_config() -> CommitRetryConfig {
    CommitRetryConfig {
        max_attempts: 2,
        base_delay_ms: 1,
        max_delay_ms: 5,
        jitter_factor: 0.0,
        timeout_ms: 5_000,
    }
}

/// Pipeline components wired against a provider base URL (usually a
/// wiremock server).
pub struct TestPipeline {
    pub orchestrator: Arc<SyncOrchestrator>,
    pub progress: Arc<ProgressPublisher>,
    pub cache: Arc<DashboardCache>,
}

pub fn build_pipeline(db: DatabaseConnection, provider_base: &str) -> TestPipeline {
    let tokens = Arc::new(StaticTokenResolver::new(Some("test-token".to_string())));
    let provider: Arc<dyn ProviderApi> = Arc::new(GbpClient::new(
        provider_base,
        Duration::from_secs(5),
        tokens,
    ));

    let committer = TransactionalCommitter::new(db.clone(), &test_retry_config());
    let progress = Arc::new(ProgressPublisher::new(NonZeroUsize::new(64).unwrap()));
    let cache = Arc::new(DashboardCache::new(
        db.clone(),
        NonZeroUsize::new(16).unwrap(),
    ));

    let orchestrator = Arc::new(SyncOrchestrator::new(
        db,
        provider,
        committer,
        progress.clone(),
        cache.clone(),
    ));

    TestPipeline {
        orchestrator,
        progress,
        cache,
    }
}

/// Canonical provider fixture: one location with a replied five-star review
/// and one answered question, matching resource ids under account `123`.
pub fn location_fixture() -> serde_json::Value {
    json!({
        "locations": [{
            "name": "accounts/123/locations/loc1",
            "title": "My Test Location",
            "primaryCategory": { "displayName": "Restaurant" },
            "storefrontAddress": {
                "addressLines": ["123 Main St"],
                "locality": "Springfield",
                "administrativeArea": "IL"
            },
            "phoneNumbers": { "primaryPhone": "+1 555 0100" },
            "websiteUri": "https://example.com",
            "latlng": { "latitude": 39.78, "longitude": -89.65 },
            "averageRating": 4.5,
            "reviewCount": 12
        }]
    })
}

pub fn review_fixture() -> serde_json::Value {
    json!({
        "reviews": [{
            "reviewId": "rev1",
            "name": "accounts/123/locations/loc1/reviews/rev1",
            "reviewer": { "displayName": "Jane" },
            "starRating": "STAR_FIVE",
            "comment": "Great food!",
            "createTime": "2025-05-01T12:00:00Z",
            "reviewReply": {
                "comment": "Thank you!",
                "updateTime": "2025-05-02T08:30:00Z"
            }
        }]
    })
}

pub fn question_fixture() -> serde_json::Value {
    json!({
        "questions": [{
            "name": "accounts/123/locations/loc1/questions/q1",
            "author": { "displayName": "Bob", "type": "REGULAR_USER" },
            "text": "Are you open weekdays?",
            "createTime": "2025-04-10T09:00:00Z",
            "upvoteCount": 2,
            "totalAnswerCount": 1,
            "topAnswers": [{
                "name": "accounts/123/locations/loc1/questions/q1/answers/a1",
                "author": { "displayName": "Owner", "type": "MERCHANT" },
                "text": "Yes, 9am-5pm",
                "createTime": "2025-04-10T10:00:00Z",
                "upvoteCount": 3
            }]
        }]
    })
}
