//! Sync orchestration: fetch, map, commit, refresh, report.
//!
//! The orchestrator drives one sync run end to end. Fetches are strictly
//! sequential: all locations first, then each location's reviews, then each
//! location's questions when the scope asks for them. Records that fail
//! mapping are skipped and logged; the run continues. Failures below the
//! orchestrator come back as typed results, so every run reaches a terminal
//! state and the progress stream sees at most one terminal stage per attempt.

use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration as ChronoDuration, Utc};
use metrics::{counter, histogram};
use sea_orm::{DatabaseConnection, DbErr};
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::cache::DashboardCache;
use crate::committer::{
    CommitError, CommitResult, StampedLocation, StampedQuestion, StampedReview,
    SyncTransactionPayload, TransactionalCommitter,
};
use crate::models::gmb_account::Model as GmbAccount;
use crate::models::sync_job::{Model as SyncJob, SyncScope};
use crate::normalization::{self, MappedLocation};
use crate::progress::{ProgressPublisher, SyncStage};
use crate::provider::{ProviderApi, ProviderError};
use crate::repositories::{AccountRepository, SyncJobRepository, sync_job::EnqueueOutcome};

/// Queue-level attempt budget for retryable failures.
const MAX_JOB_ATTEMPTS: i32 = 3;

/// Base delay before a requeued job becomes eligible again.
const REQUEUE_BASE_DELAY_SECS: i64 = 60;

/// Typed sync failures surfaced to callers and recorded on the job row.
#[derive(Debug, Error)]
pub enum SyncFailure {
    #[error("account not found")]
    AccountNotFound,
    #[error("a sync is already running for this account")]
    AlreadyRunning,
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("commit error: {0}")]
    Commit(#[from] CommitError),
    #[error("queue error: {0}")]
    Queue(#[from] DbErr),
}

impl SyncFailure {
    /// Whether requeueing the job could help.
    fn is_retryable(&self) -> bool {
        match self {
            SyncFailure::Provider(err) => err.is_retryable(),
            SyncFailure::Commit(err) => err.is_retryable(),
            SyncFailure::Queue(_) => true,
            SyncFailure::AccountNotFound | SyncFailure::AlreadyRunning => false,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            SyncFailure::AccountNotFound => "account_not_found",
            SyncFailure::AlreadyRunning => "already_running",
            SyncFailure::Provider(_) => "provider",
            SyncFailure::Commit(_) => "commit",
            SyncFailure::Queue(_) => "queue",
        }
    }

    /// Structured error payload stored on the job row.
    fn as_json(&self) -> serde_json::Value {
        json!({
            "type": self.kind(),
            "message": self.to_string(),
        })
    }
}

/// Successful sync summary returned to callers.
#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub struct SyncReport {
    pub job_id: Uuid,
    pub sync_id: Uuid,
    pub locations_synced: usize,
    pub reviews_synced: usize,
    pub questions_synced: usize,
}

impl SyncReport {
    fn new(job_id: Uuid, result: CommitResult) -> Self {
        Self {
            job_id,
            sync_id: result.sync_id,
            locations_synced: result.locations_synced,
            reviews_synced: result.reviews_synced,
            questions_synced: result.questions_synced,
        }
    }
}

/// Drives sync runs against the provider, committer, and cache.
pub struct SyncOrchestrator {
    accounts: AccountRepository,
    jobs: SyncJobRepository,
    provider: Arc<dyn ProviderApi>,
    committer: TransactionalCommitter,
    progress: Arc<ProgressPublisher>,
    cache: Arc<DashboardCache>,
}

impl SyncOrchestrator {
    pub fn new(
        db: DatabaseConnection,
        provider: Arc<dyn ProviderApi>,
        committer: TransactionalCommitter,
        progress: Arc<ProgressPublisher>,
        cache: Arc<DashboardCache>,
    ) -> Self {
        Self {
            accounts: AccountRepository::new(db.clone()),
            jobs: SyncJobRepository::new(db),
            provider,
            committer,
            progress,
            cache,
        }
    }

    /// Run a sync synchronously for an account, outside the queue's claim
    /// loop. Creates its own `processing` job row, subject to the
    /// one-sync-per-account rule.
    #[instrument(skip(self), fields(gmb_account_id = %account_row_id))]
    pub async fn perform_sync(
        &self,
        account_row_id: Uuid,
        include_questions: bool,
    ) -> Result<SyncReport, SyncFailure> {
        let account = self
            .accounts
            .find_by_id(account_row_id)
            .await?
            .ok_or(SyncFailure::AccountNotFound)?;

        let scope = SyncScope::from_include_questions(include_questions);
        let job = match self.jobs.try_begin(account.user_id, account.id, scope).await? {
            EnqueueOutcome::Created(job) => job,
            EnqueueOutcome::AlreadyQueued(_) => return Err(SyncFailure::AlreadyRunning),
        };

        match self.run_pipeline(&job, &account, scope).await {
            Ok(result) => {
                self.finish_success(&job, &account, result).await
            }
            Err(failure) => {
                // Direct runs do not requeue; the caller sees the failure now.
                self.finish_failure(&job, &account, failure).await
            }
        }
    }

    /// Run a job the executor already claimed (status `processing`).
    /// Retryable failures within the attempt budget requeue the job with
    /// backoff instead of failing it terminally.
    #[instrument(skip(self, job), fields(job_id = %job.id, gmb_account_id = %job.gmb_account_id, attempt = job.attempts))]
    pub async fn run_claimed_job(&self, job: &SyncJob) -> Result<SyncReport, SyncFailure> {
        let scope = SyncScope::parse(&job.sync_type).unwrap_or(SyncScope::Full);

        let account = match self.accounts.find_by_id(job.gmb_account_id).await? {
            Some(account) => account,
            None => {
                let failure = SyncFailure::AccountNotFound;
                self.jobs.mark_failed(job.id, failure.as_json()).await?;
                self.progress.publish(
                    job.id,
                    job.gmb_account_id,
                    SyncStage::Failed,
                    Some(&failure.to_string()),
                );
                counter!("gbp_sync_jobs_total", "outcome" => "failed").increment(1);
                return Err(failure);
            }
        };

        match self.run_pipeline(job, &account, scope).await {
            Ok(result) => self.finish_success(job, &account, result).await,
            Err(failure) if failure.is_retryable() && job.attempts < MAX_JOB_ATTEMPTS => {
                let delay_secs = REQUEUE_BASE_DELAY_SECS << (job.attempts.max(1) - 1).min(8);
                let retry_after = (Utc::now() + ChronoDuration::seconds(delay_secs)).fixed_offset();

                warn!(
                    job_id = %job.id,
                    attempt = job.attempts,
                    delay_secs,
                    error = %failure,
                    "sync attempt failed, requeueing"
                );
                self.jobs
                    .reschedule(job.id, retry_after, failure.as_json())
                    .await?;
                // Next attempt starts a fresh stage sequence.
                self.progress.reset(job.id);
                counter!("gbp_sync_jobs_total", "outcome" => "requeued").increment(1);
                Err(failure)
            }
            Err(failure) => self.finish_failure(job, &account, failure).await,
        }
    }

    async fn finish_success(
        &self,
        job: &SyncJob,
        account: &GmbAccount,
        result: CommitResult,
    ) -> Result<SyncReport, SyncFailure> {
        self.jobs.mark_completed(job.id).await?;
        self.progress
            .publish(job.id, account.id, SyncStage::Complete, None);

        info!(
            job_id = %job.id,
            sync_id = %result.sync_id,
            locations = result.locations_synced,
            reviews = result.reviews_synced,
            questions = result.questions_synced,
            "sync completed"
        );
        counter!("gbp_sync_jobs_total", "outcome" => "completed").increment(1);

        Ok(SyncReport::new(job.id, result))
    }

    async fn finish_failure(
        &self,
        job: &SyncJob,
        account: &GmbAccount,
        failure: SyncFailure,
    ) -> Result<SyncReport, SyncFailure> {
        if let Err(db_err) = self.jobs.mark_failed(job.id, failure.as_json()).await {
            error!(job_id = %job.id, error = %db_err, "failed to record job failure");
        }
        self.progress.publish(
            job.id,
            account.id,
            SyncStage::Failed,
            Some(&failure.to_string()),
        );

        error!(job_id = %job.id, error = %failure, "sync failed");
        counter!("gbp_sync_jobs_total", "outcome" => "failed").increment(1);

        Err(failure)
    }

    /// Fetch, map, commit, and refresh for one attempt. Emits every
    /// non-terminal stage; terminal stages are the caller's responsibility.
    async fn run_pipeline(
        &self,
        job: &SyncJob,
        account: &GmbAccount,
        scope: SyncScope,
    ) -> Result<CommitResult, SyncFailure> {
        let started = Instant::now();
        self.progress
            .publish(job.id, account.id, SyncStage::Init, None);

        self.progress
            .publish(job.id, account.id, SyncStage::LocationsFetch, None);
        let raw_locations = self.provider.fetch_locations(account).await?;
        let locations = self.map_locations(account, &raw_locations);

        self.progress
            .publish(job.id, account.id, SyncStage::ReviewsFetch, None);
        let mut reviews = Vec::new();
        for location in &locations {
            let raw_reviews = self
                .provider
                .fetch_reviews(account, &location.resource_name)
                .await?;
            for raw in &raw_reviews {
                match normalization::map_review(raw, &location.resource_name) {
                    Ok(record) => reviews.push(StampedReview {
                        user_id: account.user_id,
                        gmb_account_id: account.id,
                        record,
                    }),
                    Err(err) => {
                        warn!(
                            gmb_account_id = %account.id,
                            location_id = %location.location_id,
                            error = %err,
                            "skipping unmappable review"
                        );
                        counter!("gbp_sync_records_skipped_total", "entity" => "review")
                            .increment(1);
                    }
                }
            }
        }

        let mut questions = Vec::new();
        if scope.includes_questions() {
            self.progress
                .publish(job.id, account.id, SyncStage::QuestionsFetch, None);
            for location in &locations {
                let raw_questions = self
                    .provider
                    .fetch_questions(account, &location.resource_name)
                    .await?;
                for raw in &raw_questions {
                    match normalization::map_question(raw, &location.resource_name) {
                        Ok(record) => questions.push(StampedQuestion {
                            user_id: account.user_id,
                            gmb_account_id: account.id,
                            record,
                        }),
                        Err(err) => {
                            warn!(
                                gmb_account_id = %account.id,
                                location_id = %location.location_id,
                                error = %err,
                                "skipping unmappable question"
                            );
                            counter!("gbp_sync_records_skipped_total", "entity" => "question")
                                .increment(1);
                        }
                    }
                }
            }
        }

        self.progress
            .publish(job.id, account.id, SyncStage::Transaction, None);
        let payload = SyncTransactionPayload {
            account: account.clone(),
            locations: locations
                .into_iter()
                .map(|record| StampedLocation {
                    user_id: account.user_id,
                    gmb_account_id: account.id,
                    record,
                })
                .collect(),
            reviews,
            questions,
        };
        let result = self.committer.commit(&payload).await?;

        self.progress
            .publish(job.id, account.id, SyncStage::CacheRefresh, None);
        self.cache.refresh(account.id).await;

        histogram!("gbp_sync_duration_ms").record(started.elapsed().as_millis() as f64);
        Ok(result)
    }

    fn map_locations(&self, account: &GmbAccount, raws: &[crate::provider::LocationRaw]) -> Vec<MappedLocation> {
        let mut mapped = Vec::with_capacity(raws.len());
        for raw in raws {
            match normalization::map_location(raw) {
                Ok(record) => mapped.push(record),
                Err(err) => {
                    warn!(
                        gmb_account_id = %account.id,
                        error = %err,
                        "skipping unmappable location"
                    );
                    counter!("gbp_sync_records_skipped_total", "entity" => "location").increment(1);
                }
            }
        }
        mapped
    }
}
