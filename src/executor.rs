//! Background consumer of the sync job queue.
//!
//! Polls for due `pending` jobs, claims a batch atomically, and runs each
//! claimed job through the orchestrator under a concurrency limit. The claim
//! enforces single-flight per account: a job is skipped while another job for
//! the same account is `processing`.

use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, gauge};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    QueryTrait, TransactionTrait,
};
use tokio::sync::Semaphore;
use tokio::time::{Duration, interval};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::ExecutorConfig;
use crate::models::sync_job::{self, STATUS_PENDING, STATUS_PROCESSING};
use crate::orchestrator::SyncOrchestrator;

/// Queue executor polling for due jobs.
pub struct SyncExecutor {
    db: DatabaseConnection,
    orchestrator: Arc<SyncOrchestrator>,
    config: ExecutorConfig,
    semaphore: Arc<Semaphore>,
}

impl SyncExecutor {
    pub fn new(
        db: DatabaseConnection,
        orchestrator: Arc<SyncOrchestrator>,
        config: ExecutorConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
        Self {
            db,
            orchestrator,
            config,
            semaphore,
        }
    }

    /// Run the polling loop until the process shuts down.
    pub async fn run(self: Arc<Self>) {
        info!(
            tick_ms = self.config.tick_ms,
            concurrency = self.config.concurrency,
            claim_batch = self.config.claim_batch,
            "sync executor started"
        );

        let mut tick = interval(Duration::from_millis(self.config.tick_ms));
        loop {
            tick.tick().await;
            if let Err(err) = self.clone().tick_once().await {
                error!(error = %err, "executor tick failed");
            }
        }
    }

    /// Claim due jobs and dispatch them. Public so tests can drive single
    /// ticks without the timer loop.
    pub async fn tick_once(self: Arc<Self>) -> Result<usize, DbErr> {
        let claimed = self.claim_jobs().await?;
        let count = claimed.len();
        if count > 0 {
            debug!(count, "claimed sync jobs");
        }
        gauge!("gbp_sync_executor_claimed_gauge").set(count as f64);

        for job in claimed {
            let executor = self.clone();
            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                // Closed semaphore means we are shutting down.
                Err(_) => return Ok(count),
            };

            tokio::spawn(async move {
                let _permit = permit;
                counter!("gbp_sync_executor_jobs_total").increment(1);
                // Terminal handling (complete/fail/requeue) happens inside.
                let _ = executor.orchestrator.run_claimed_job(&job).await;
            });
        }

        Ok(count)
    }

    /// Atomically claim up to `claim_batch` due jobs, honoring single-flight
    /// per account.
    async fn claim_jobs(&self) -> Result<Vec<sync_job::Model>, DbErr> {
        let now = Utc::now().fixed_offset();
        let txn = self.db.begin().await?;

        let eligible: Vec<Uuid> = sync_job::Entity::find()
            .select_only()
            .column(sync_job::Column::Id)
            .filter(
                sync_job::Column::Status
                    .eq(STATUS_PENDING)
                    .and(sync_job::Column::ScheduledAt.lte(now))
                    .and(
                        sync_job::Column::RetryAfter
                            .is_null()
                            .or(sync_job::Column::RetryAfter.lte(now)),
                    ),
            )
            .filter(
                sync_job::Column::GmbAccountId.not_in_subquery(
                    sync_job::Entity::find()
                        .select_only()
                        .column(sync_job::Column::GmbAccountId)
                        .filter(sync_job::Column::Status.eq(STATUS_PROCESSING))
                        .into_query(),
                ),
            )
            .order_by_asc(sync_job::Column::ScheduledAt)
            .limit(Some(self.config.claim_batch as u64))
            .into_tuple::<Uuid>()
            .all(&txn)
            .await?;

        if eligible.is_empty() {
            txn.commit().await?;
            return Ok(Vec::new());
        }

        let update_result = sync_job::Entity::update_many()
            .col_expr(sync_job::Column::Status, Expr::value(STATUS_PROCESSING))
            .col_expr(sync_job::Column::StartedAt, Expr::value(now))
            .col_expr(sync_job::Column::UpdatedAt, Expr::value(now))
            .col_expr(
                sync_job::Column::Attempts,
                Expr::value(Expr::col(sync_job::Column::Attempts).add(1)),
            )
            .filter(sync_job::Column::Id.is_in(eligible))
            .filter(sync_job::Column::Status.eq(STATUS_PENDING))
            .exec(&txn)
            .await?;

        let claimed = if update_result.rows_affected > 0 {
            sync_job::Entity::find()
                .filter(sync_job::Column::Status.eq(STATUS_PROCESSING))
                .filter(sync_job::Column::StartedAt.eq(now))
                .all(&txn)
                .await?
        } else {
            Vec::new()
        };

        txn.commit().await?;
        Ok(claimed)
    }
}
