//! Queue executor tests: claiming, single-flight, and job completion.

mod test_utils;

use std::sync::Arc;
use std::time::Duration;

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gbp_sync::config::ExecutorConfig;
use gbp_sync::executor::SyncExecutor;
use gbp_sync::models::sync_job::{self, SyncScope};
use gbp_sync::repositories::{SyncJobRepository, sync_job::EnqueueOutcome};

use test_utils::{
    build_pipeline, insert_account, location_fixture, question_fixture, review_fixture,
    setup_test_db,
};

fn executor_config() -> ExecutorConfig {
    ExecutorConfig {
        tick_ms: 10,
        concurrency: 2,
        claim_batch: 10,
    }
}

async fn mount_happy_path(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/accounts/123/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(location_fixture()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/accounts/123/locations/loc1/reviews"))
        .respond_with(ResponseTemplate::new(200).set_body_json(review_fixture()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/accounts/123/locations/loc1/questions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(question_fixture()))
        .mount(server)
        .await;
}

async fn wait_for_status(
    db: &sea_orm::DatabaseConnection,
    job_id: Uuid,
    status: &str,
) -> sync_job::Model {
    for _ in 0..100 {
        let job = sync_job::Entity::find_by_id(job_id)
            .one(db)
            .await
            .unwrap()
            .unwrap();
        if job.status == status {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {} never reached status {}", job_id, status);
}

#[tokio::test]
async fn test_enqueued_job_is_claimed_and_completed() {
    let server = MockServer::start().await;
    mount_happy_path(&server).await;

    let db = setup_test_db().await.unwrap();
    let account = insert_account(&db, Uuid::new_v4(), "123").await.unwrap();
    let pipeline = build_pipeline(db.clone(), &server.uri());

    let jobs = SyncJobRepository::new(db.clone());
    let job = match jobs
        .enqueue(account.user_id, account.id, SyncScope::Full)
        .await
        .unwrap()
    {
        EnqueueOutcome::Created(job) => job,
        EnqueueOutcome::AlreadyQueued(_) => panic!("queue should have been empty"),
    };
    assert_eq!(job.status, sync_job::STATUS_PENDING);

    let executor = Arc::new(SyncExecutor::new(
        db.clone(),
        pipeline.orchestrator.clone(),
        executor_config(),
    ));
    let claimed = executor.tick_once().await.unwrap();
    assert_eq!(claimed, 1);

    let done = wait_for_status(&db, job.id, sync_job::STATUS_COMPLETED).await;
    assert_eq!(done.attempts, 1);
    assert!(done.finished_at.is_some());
}

#[tokio::test]
async fn test_enqueue_rejects_second_job_for_same_account() {
    let db = setup_test_db().await.unwrap();
    let account = insert_account(&db, Uuid::new_v4(), "123").await.unwrap();
    let jobs = SyncJobRepository::new(db.clone());

    let first = jobs
        .enqueue(account.user_id, account.id, SyncScope::Full)
        .await
        .unwrap();
    assert!(matches!(first, EnqueueOutcome::Created(_)));

    let second = jobs
        .enqueue(account.user_id, account.id, SyncScope::LocationsReviews)
        .await
        .unwrap();
    assert!(matches!(second, EnqueueOutcome::AlreadyQueued(_)));

    let pending = sync_job::Entity::find()
        .filter(sync_job::Column::GmbAccountId.eq(account.id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn test_claim_skips_account_with_processing_job() {
    let server = MockServer::start().await;
    let db = setup_test_db().await.unwrap();
    let account = insert_account(&db, Uuid::new_v4(), "123").await.unwrap();
    let other = insert_account(&db, Uuid::new_v4(), "456").await.unwrap();
    let pipeline = build_pipeline(db.clone(), &server.uri());
    let jobs = SyncJobRepository::new(db.clone());

    // The first account already has a processing job; its pending job must
    // not be claimed. Bypass the single-flight guard to set the scene.
    jobs.try_begin(account.user_id, account.id, SyncScope::Full)
        .await
        .unwrap();
    let now = chrono::Utc::now().fixed_offset();
    let blocked = sync_job::ActiveModel {
        id: sea_orm::Set(Uuid::new_v4()),
        user_id: sea_orm::Set(account.user_id),
        gmb_account_id: sea_orm::Set(account.id),
        sync_type: sea_orm::Set("full".to_string()),
        status: sea_orm::Set(sync_job::STATUS_PENDING.to_string()),
        attempts: sea_orm::Set(0),
        scheduled_at: sea_orm::Set(now),
        retry_after: sea_orm::Set(None),
        started_at: sea_orm::Set(None),
        finished_at: sea_orm::Set(None),
        error: sea_orm::Set(None),
        created_at: sea_orm::Set(now),
        updated_at: sea_orm::Set(now),
    };
    use sea_orm::ActiveModelTrait;
    let blocked = blocked.insert(&db).await.unwrap();

    let runnable = match jobs
        .enqueue(other.user_id, other.id, SyncScope::Full)
        .await
        .unwrap()
    {
        EnqueueOutcome::Created(job) => job,
        EnqueueOutcome::AlreadyQueued(_) => panic!("other account had no jobs"),
    };

    // Mock only the other account so an unexpected claim would fail loudly.
    Mock::given(method("GET"))
        .and(path("/accounts/456/locations"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "locations": [] })),
        )
        .mount(&server)
        .await;

    let executor = Arc::new(SyncExecutor::new(
        db.clone(),
        pipeline.orchestrator.clone(),
        executor_config(),
    ));
    let claimed = executor.tick_once().await.unwrap();
    assert_eq!(claimed, 1);

    wait_for_status(&db, runnable.id, sync_job::STATUS_COMPLETED).await;

    let still_pending = sync_job::Entity::find_by_id(blocked.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(still_pending.status, sync_job::STATUS_PENDING);
}

#[tokio::test]
async fn test_retryable_failure_requeues_with_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/123/locations"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let db = setup_test_db().await.unwrap();
    let account = insert_account(&db, Uuid::new_v4(), "123").await.unwrap();
    let pipeline = build_pipeline(db.clone(), &server.uri());
    let jobs = SyncJobRepository::new(db.clone());

    let job = match jobs
        .enqueue(account.user_id, account.id, SyncScope::Full)
        .await
        .unwrap()
    {
        EnqueueOutcome::Created(job) => job,
        EnqueueOutcome::AlreadyQueued(_) => panic!("queue should have been empty"),
    };

    let executor = Arc::new(SyncExecutor::new(
        db.clone(),
        pipeline.orchestrator.clone(),
        executor_config(),
    ));
    executor.tick_once().await.unwrap();

    // First attempt fails against the 503 provider and goes back to pending
    // with a retry_after in the future. Poll on attempts to avoid racing the
    // initial pending state.
    let mut requeued = None;
    for _ in 0..100 {
        let job = sync_job::Entity::find_by_id(job.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        if job.attempts == 1 && job.status == sync_job::STATUS_PENDING {
            requeued = Some(job);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let requeued = requeued.expect("job was never requeued");
    assert_eq!(requeued.attempts, 1);
    assert!(requeued.retry_after.is_some());
    assert!(requeued.retry_after.unwrap() > chrono::Utc::now().fixed_offset());
    assert_eq!(requeued.error.unwrap()["type"], "provider");
}
