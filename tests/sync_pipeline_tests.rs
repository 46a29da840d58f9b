//! End-to-end sync pipeline tests against a mock provider server.

mod test_utils;

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tokio::sync::broadcast;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gbp_sync::models::{location, question, review, sync_job};
use gbp_sync::orchestrator::SyncFailure;
use gbp_sync::progress::{ProgressEvent, SyncStage};
use gbp_sync::provider::ProviderError;

use test_utils::{
    build_pipeline, insert_account, location_fixture, question_fixture, review_fixture,
    setup_test_db,
};

fn drain_stages(rx: &mut broadcast::Receiver<ProgressEvent>) -> Vec<SyncStage> {
    let mut stages = Vec::new();
    while let Ok(event) = rx.try_recv() {
        stages.push(event.stage);
    }
    stages
}

async fn mount_happy_path(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/accounts/123/locations"))
        .and(header("authorization", "Bearer test-token"))
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

#[tokio::test]
async fn test_full_sync_end_to_end() {
    let server = MockServer::start().await;
    mount_happy_path(&server).await;

    let db = setup_test_db().await.unwrap();
    let user_id = Uuid::new_v4();
    let account = insert_account(&db, user_id, "123").await.unwrap();

    let pipeline = build_pipeline(db.clone(), &server.uri());
    let mut rx = pipeline.progress.subscribe();

    let report = pipeline
        .orchestrator
        .perform_sync(account.id, true)
        .await
        .unwrap();

    assert_eq!(report.locations_synced, 1);
    assert_eq!(report.reviews_synced, 1);
    assert_eq!(report.questions_synced, 1);

    assert_eq!(
        drain_stages(&mut rx),
        vec![
            SyncStage::Init,
            SyncStage::LocationsFetch,
            SyncStage::ReviewsFetch,
            SyncStage::QuestionsFetch,
            SyncStage::Transaction,
            SyncStage::CacheRefresh,
            SyncStage::Complete,
        ]
    );

    // Committed rows carry mapped fields and the tenant stamp.
    let loc = location::Entity::find()
        .filter(location::Column::GmbAccountId.eq(account.id))
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loc.name, "My Test Location");
    assert_eq!(loc.location_id, "loc1");
    assert_eq!(loc.user_id, user_id);
    assert_eq!(loc.address.as_deref(), Some("123 Main St, Springfield, IL"));
    assert_eq!(loc.completeness_score, 100);

    let rev = review::Entity::find()
        .filter(review::Column::GmbAccountId.eq(account.id))
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rev.rating, 5);
    assert!(rev.has_reply);
    assert_eq!(rev.status, "responded");
    assert_eq!(rev.reply_text.as_deref(), Some("Thank you!"));

    let q = question::Entity::find()
        .filter(question::Column::GmbAccountId.eq(account.id))
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(q.status, "answered");
    assert_eq!(q.answer_text.as_deref(), Some("Yes, 9am-5pm"));
    assert_eq!(q.answer_author.as_deref(), Some("Owner"));

    // Job row reached its terminal state.
    let job = sync_job::Entity::find_by_id(report.job_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, sync_job::STATUS_COMPLETED);

    // Cache was refreshed during the run.
    let aggregates = pipeline.cache.peek(account.id).unwrap();
    assert_eq!(aggregates.location_count, 1);
    assert_eq!(aggregates.review_count, 1);
    assert_eq!(aggregates.pending_review_count, 0);
    assert_eq!(aggregates.unanswered_question_count, 0);
}

#[tokio::test]
async fn test_sync_without_questions_skips_questions_fetch() {
    let server = MockServer::start().await;
    mount_happy_path(&server).await;

    let db = setup_test_db().await.unwrap();
    let account = insert_account(&db, Uuid::new_v4(), "123").await.unwrap();

    let pipeline = build_pipeline(db.clone(), &server.uri());
    let mut rx = pipeline.progress.subscribe();

    let report = pipeline
        .orchestrator
        .perform_sync(account.id, false)
        .await
        .unwrap();

    assert_eq!(report.questions_synced, 0);
    let stages = drain_stages(&mut rx);
    assert!(!stages.contains(&SyncStage::QuestionsFetch));
    assert_eq!(stages.last(), Some(&SyncStage::Complete));

    let question_count = question::Entity::find().all(&db).await.unwrap().len();
    assert_eq!(question_count, 0);
}

#[tokio::test]
async fn test_rerunning_sync_is_idempotent() {
    let server = MockServer::start().await;
    mount_happy_path(&server).await;

    let db = setup_test_db().await.unwrap();
    let account = insert_account(&db, Uuid::new_v4(), "123").await.unwrap();
    let pipeline = build_pipeline(db.clone(), &server.uri());

    let first = pipeline
        .orchestrator
        .perform_sync(account.id, true)
        .await
        .unwrap();
    let second = pipeline
        .orchestrator
        .perform_sync(account.id, true)
        .await
        .unwrap();

    assert_eq!(first.locations_synced, 1);
    assert_eq!(second.locations_synced, 1);

    // Upserts on the natural keys: still exactly one row per entity.
    assert_eq!(location::Entity::find().all(&db).await.unwrap().len(), 1);
    assert_eq!(review::Entity::find().all(&db).await.unwrap().len(), 1);
    assert_eq!(question::Entity::find().all(&db).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_provider_outage_fails_job_with_failed_stage() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/123/locations"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let db = setup_test_db().await.unwrap();
    let account = insert_account(&db, Uuid::new_v4(), "123").await.unwrap();

    let pipeline = build_pipeline(db.clone(), &server.uri());
    let mut rx = pipeline.progress.subscribe();

    let failure = pipeline
        .orchestrator
        .perform_sync(account.id, true)
        .await
        .unwrap_err();
    assert!(matches!(
        failure,
        SyncFailure::Provider(ProviderError::Unavailable { .. })
    ));

    let stages = drain_stages(&mut rx);
    assert_eq!(stages.last(), Some(&SyncStage::Failed));

    let job = sync_job::Entity::find()
        .filter(sync_job::Column::GmbAccountId.eq(account.id))
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, sync_job::STATUS_FAILED);
    let error = job.error.unwrap();
    assert_eq!(error["type"], "provider");
}

#[tokio::test]
async fn test_expired_credentials_fail_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/123/locations"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let db = setup_test_db().await.unwrap();
    let account = insert_account(&db, Uuid::new_v4(), "123").await.unwrap();
    let pipeline = build_pipeline(db.clone(), &server.uri());

    let failure = pipeline
        .orchestrator
        .perform_sync(account.id, true)
        .await
        .unwrap_err();
    assert!(matches!(
        failure,
        SyncFailure::Provider(ProviderError::AuthExpired { status: 401 })
    ));
}

#[tokio::test]
async fn test_unknown_account_is_rejected() {
    let server = MockServer::start().await;
    let db = setup_test_db().await.unwrap();
    let pipeline = build_pipeline(db.clone(), &server.uri());

    let failure = pipeline
        .orchestrator
        .perform_sync(Uuid::new_v4(), true)
        .await
        .unwrap_err();
    assert!(matches!(failure, SyncFailure::AccountNotFound));
}

#[tokio::test]
async fn test_concurrent_sync_for_account_is_rejected() {
    let server = MockServer::start().await;
    mount_happy_path(&server).await;

    let db = setup_test_db().await.unwrap();
    let account = insert_account(&db, Uuid::new_v4(), "123").await.unwrap();
    let pipeline = build_pipeline(db.clone(), &server.uri());

    // Simulate an in-flight run by enqueueing a job for the same account.
    use gbp_sync::repositories::SyncJobRepository;
    SyncJobRepository::new(db.clone())
        .enqueue(account.user_id, account.id, sync_job::SyncScope::Full)
        .await
        .unwrap();

    let failure = pipeline
        .orchestrator
        .perform_sync(account.id, true)
        .await
        .unwrap_err();
    assert!(matches!(failure, SyncFailure::AlreadyRunning));
}

#[tokio::test]
async fn test_unmappable_records_are_skipped_not_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/123/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "locations": [
                { "name": "accounts/123/locations/loc1", "title": "My Test Location" },
                { "name": "accounts/123/locations/loc2" }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/accounts/123/locations/loc1/reviews"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "reviews": [] })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/accounts/123/locations/loc1/questions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "questions": [] })),
        )
        .mount(&server)
        .await;

    let db = setup_test_db().await.unwrap();
    let account = insert_account(&db, Uuid::new_v4(), "123").await.unwrap();
    let pipeline = build_pipeline(db.clone(), &server.uri());

    // loc2 has no title and cannot be mapped; the sync still completes with
    // the mappable location.
    let report = pipeline
        .orchestrator
        .perform_sync(account.id, true)
        .await
        .unwrap();
    assert_eq!(report.locations_synced, 1);
}
