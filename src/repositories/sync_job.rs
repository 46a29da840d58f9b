//! Repository for the sync job queue.
//!
//! Enqueueing and the direct-run path both enforce the single-flight rule:
//! at most one pending or processing job per account at any time. The
//! executor's batch claim re-checks the same rule at claim time.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, sea_query::Expr, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::models::sync_job::{
    ActiveModel, Column, Entity, Model, STATUS_COMPLETED, STATUS_FAILED, STATUS_PENDING,
    STATUS_PROCESSING, SyncScope,
};

/// Outcome of attempting to add or start a job for an account.
#[derive(Debug)]
pub enum EnqueueOutcome {
    /// A new job row was created.
    Created(Model),
    /// The account already has a pending or processing job.
    AlreadyQueued(Model),
}

/// Repository for sync job database operations.
pub struct SyncJobRepository {
    db: DatabaseConnection,
}

impl SyncJobRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Enqueue a pending sync job, rejecting the request if the account
    /// already has one in flight.
    pub async fn enqueue(
        &self,
        user_id: Uuid,
        gmb_account_id: Uuid,
        scope: SyncScope,
    ) -> Result<EnqueueOutcome, DbErr> {
        let txn = self.db.begin().await?;

        if let Some(existing) = Self::active_job(&txn, gmb_account_id).await? {
            txn.commit().await?;
            return Ok(EnqueueOutcome::AlreadyQueued(existing));
        }

        let now = Utc::now().fixed_offset();
        let job = ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            gmb_account_id: Set(gmb_account_id),
            sync_type: Set(scope.as_str().to_string()),
            status: Set(STATUS_PENDING.to_string()),
            attempts: Set(0),
            scheduled_at: Set(now),
            retry_after: Set(None),
            started_at: Set(None),
            finished_at: Set(None),
            error: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = job.insert(&txn).await?;
        txn.commit().await?;

        tracing::info!(
            job_id = %created.id,
            gmb_account_id = %gmb_account_id,
            sync_type = %created.sync_type,
            "sync job enqueued"
        );
        Ok(EnqueueOutcome::Created(created))
    }

    /// Create a job directly in `processing` state for a synchronous run,
    /// subject to the same single-flight rule as `enqueue`.
    pub async fn try_begin(
        &self,
        user_id: Uuid,
        gmb_account_id: Uuid,
        scope: SyncScope,
    ) -> Result<EnqueueOutcome, DbErr> {
        let txn = self.db.begin().await?;

        if let Some(existing) = Self::active_job(&txn, gmb_account_id).await? {
            txn.commit().await?;
            return Ok(EnqueueOutcome::AlreadyQueued(existing));
        }

        let now = Utc::now().fixed_offset();
        let job = ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            gmb_account_id: Set(gmb_account_id),
            sync_type: Set(scope.as_str().to_string()),
            status: Set(STATUS_PROCESSING.to_string()),
            attempts: Set(1),
            scheduled_at: Set(now),
            retry_after: Set(None),
            started_at: Set(Some(now)),
            finished_at: Set(None),
            error: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = job.insert(&txn).await?;
        txn.commit().await?;
        Ok(EnqueueOutcome::Created(created))
    }

    async fn active_job<C: sea_orm::ConnectionTrait>(
        conn: &C,
        gmb_account_id: Uuid,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::GmbAccountId.eq(gmb_account_id))
            .filter(Column::Status.is_in([STATUS_PENDING, STATUS_PROCESSING]))
            .one(conn)
            .await
    }

    /// Mark a job completed.
    pub async fn mark_completed(&self, job_id: Uuid) -> Result<(), DbErr> {
        let now = Utc::now().fixed_offset();
        Entity::update_many()
            .col_expr(Column::Status, Expr::value(STATUS_COMPLETED))
            .col_expr(Column::FinishedAt, Expr::value(now))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(job_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Mark a job failed with structured error details.
    pub async fn mark_failed(&self, job_id: Uuid, error: JsonValue) -> Result<(), DbErr> {
        let now = Utc::now().fixed_offset();
        Entity::update_many()
            .col_expr(Column::Status, Expr::value(STATUS_FAILED))
            .col_expr(Column::Error, Expr::value(error))
            .col_expr(Column::FinishedAt, Expr::value(now))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(job_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Requeue a job for a later attempt after a retryable failure.
    pub async fn reschedule(
        &self,
        job_id: Uuid,
        retry_after: chrono::DateTime<chrono::FixedOffset>,
        error: JsonValue,
    ) -> Result<(), DbErr> {
        let now = Utc::now().fixed_offset();
        Entity::update_many()
            .col_expr(Column::Status, Expr::value(STATUS_PENDING))
            .col_expr(Column::RetryAfter, Expr::value(retry_after))
            .col_expr(Column::Error, Expr::value(error))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(job_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Find a job by id, scoped to its owning user.
    pub async fn find_for_user(&self, user_id: Uuid, job_id: Uuid) -> Result<Option<Model>, DbErr> {
        Entity::find_by_id(job_id)
            .filter(Column::UserId.eq(user_id))
            .one(&self.db)
            .await
    }

    /// List recent jobs for a user, newest first.
    pub async fn list_for_user(&self, user_id: Uuid, limit: u64) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::UserId.eq(user_id))
            .order_by_desc(Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await
    }

    /// Count jobs currently in a given status, for readiness reporting.
    pub async fn count_by_status(&self, status: &str) -> Result<u64, DbErr> {
        Entity::find()
            .filter(Column::Status.eq(status))
            .count(&self.db)
            .await
    }
}
