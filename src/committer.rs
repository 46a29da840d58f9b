//! Transactional persistence of a mapped sync payload.
//!
//! All rows for a sync land in a single database transaction: either every
//! location, review, and question is applied or none are. Rows are upserted
//! on their tenant-scoped natural keys so re-running a sync is idempotent.
//! Transient database failures are retried with bounded backoff.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, RuntimeErr, Set,
    TransactionTrait,
};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::CommitRetryConfig;
use crate::models::gmb_account::Model as GmbAccount;
use crate::models::{location, question, review};
use crate::normalization::{MappedLocation, MappedQuestion, MappedReview};
use crate::retry::{RetryPolicy, with_backoff};

/// A mapped location stamped with its owning tenant.
#[derive(Debug, Clone)]
pub struct StampedLocation {
    pub user_id: Uuid,
    pub gmb_account_id: Uuid,
    pub record: MappedLocation,
}

/// A mapped review stamped with its owning tenant.
#[derive(Debug, Clone)]
pub struct StampedReview {
    pub user_id: Uuid,
    pub gmb_account_id: Uuid,
    pub record: MappedReview,
}

/// A mapped question stamped with its owning tenant.
#[derive(Debug, Clone)]
pub struct StampedQuestion {
    pub user_id: Uuid,
    pub gmb_account_id: Uuid,
    pub record: MappedQuestion,
}

/// Everything one sync wants to persist, atomically.
#[derive(Debug, Clone)]
pub struct SyncTransactionPayload {
    pub account: GmbAccount,
    pub locations: Vec<StampedLocation>,
    pub reviews: Vec<StampedReview>,
    pub questions: Vec<StampedQuestion>,
}

/// Successful commit summary.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CommitResult {
    pub sync_id: Uuid,
    pub locations_synced: usize,
    pub reviews_synced: usize,
    pub questions_synced: usize,
}

/// Commit failures after the retry budget is spent.
#[derive(Debug, Error)]
pub enum CommitError {
    /// Payload rejected before touching the database.
    #[error("payload validation failed: {details}")]
    Validation { details: String },
    /// Transient database failure, retry budget exhausted.
    #[error("database unavailable after retries: {0}")]
    Transient(#[source] DbErr),
    /// Per-attempt timeout elapsed on the final attempt.
    #[error("commit timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    /// Non-retryable database failure.
    #[error("database error: {0}")]
    Database(#[source] DbErr),
}

impl CommitError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CommitError::Transient(_) | CommitError::Timeout { .. })
    }
}

/// Commits sync payloads in one transaction with retry on transient failures.
pub struct TransactionalCommitter {
    db: DatabaseConnection,
    policy: RetryPolicy,
    timeout: Duration,
}

impl TransactionalCommitter {
    pub fn new(db: DatabaseConnection, retry: &CommitRetryConfig) -> Self {
        Self {
            db,
            policy: RetryPolicy::from(retry),
            timeout: Duration::from_millis(retry.timeout_ms),
        }
    }

    /// Persist the payload. Validation failures are returned without touching
    /// the database; transient failures and per-attempt timeouts are retried
    /// within the configured budget.
    pub async fn commit(&self, payload: &SyncTransactionPayload) -> Result<CommitResult, CommitError> {
        validate_tenant_scoping(payload)?;

        let timeout_ms = self.timeout.as_millis() as u64;
        let result = with_backoff(self.policy, CommitError::is_retryable, || async {
            match tokio::time::timeout(self.timeout, self.commit_once(payload)).await {
                Ok(result) => result,
                Err(_) => Err(CommitError::Timeout { timeout_ms }),
            }
        })
        .await?;

        info!(
            sync_id = %result.sync_id,
            gmb_account_id = %payload.account.id,
            locations = result.locations_synced,
            reviews = result.reviews_synced,
            questions = result.questions_synced,
            "sync payload committed"
        );
        metrics::counter!("gbp_sync_rows_committed_total").increment(
            (result.locations_synced + result.reviews_synced + result.questions_synced) as u64,
        );

        Ok(result)
    }

    async fn commit_once(&self, payload: &SyncTransactionPayload) -> Result<CommitResult, CommitError> {
        let txn = self.db.begin().await.map_err(classify_db_err)?;
        let now = Utc::now().fixed_offset();

        if !payload.locations.is_empty() {
            let rows: Vec<location::ActiveModel> = payload
                .locations
                .iter()
                .map(|stamped| location_row(stamped, now))
                .collect();

            location::Entity::insert_many(rows)
                .on_conflict(
                    OnConflict::columns([
                        location::Column::GmbAccountId,
                        location::Column::LocationId,
                    ])
                    .update_columns([
                        location::Column::ResourceName,
                        location::Column::Name,
                        location::Column::Category,
                        location::Column::Address,
                        location::Column::Phone,
                        location::Column::Website,
                        location::Column::Latitude,
                        location::Column::Longitude,
                        location::Column::Rating,
                        location::Column::ReviewCount,
                        location::Column::CompletenessScore,
                        location::Column::Metadata,
                        location::Column::LastSyncedAt,
                        location::Column::UpdatedAt,
                    ])
                    .to_owned(),
                )
                .exec(&txn)
                .await
                .map_err(classify_db_err)?;
        }

        if !payload.reviews.is_empty() {
            // A review is immutable once a stored reply exists; only the
            // reply fields may still change on those rows.
            let incoming_ids: Vec<String> = payload
                .reviews
                .iter()
                .map(|stamped| stamped.record.review_id.clone())
                .collect();
            let replied_ids: HashSet<String> = review::Entity::find()
                .filter(review::Column::GmbAccountId.eq(payload.account.id))
                .filter(review::Column::HasReply.eq(true))
                .filter(review::Column::ReviewId.is_in(incoming_ids))
                .all(&txn)
                .await
                .map_err(classify_db_err)?
                .into_iter()
                .map(|row| row.review_id)
                .collect();

            let (replied, open): (Vec<&StampedReview>, Vec<&StampedReview>) = payload
                .reviews
                .iter()
                .partition(|stamped| replied_ids.contains(&stamped.record.review_id));

            if !open.is_empty() {
                let rows: Vec<review::ActiveModel> = open
                    .into_iter()
                    .map(|stamped| review_row(stamped, now))
                    .collect();

                review::Entity::insert_many(rows)
                    .on_conflict(
                        OnConflict::columns([
                            review::Column::GmbAccountId,
                            review::Column::ReviewId,
                        ])
                        .update_columns([
                            review::Column::LocationResourceName,
                            review::Column::ReviewerName,
                            review::Column::ReviewerPhotoUrl,
                            review::Column::Rating,
                            review::Column::NeedsRatingReview,
                            review::Column::Comment,
                            review::Column::CreateTime,
                            review::Column::ReplyText,
                            review::Column::ReplyTime,
                            review::Column::HasReply,
                            review::Column::Status,
                            review::Column::UpdatedAt,
                        ])
                        .to_owned(),
                    )
                    .exec(&txn)
                    .await
                    .map_err(classify_db_err)?;
            }

            if !replied.is_empty() {
                let rows: Vec<review::ActiveModel> = replied
                    .into_iter()
                    .map(|stamped| review_row(stamped, now))
                    .collect();

                review::Entity::insert_many(rows)
                    .on_conflict(
                        OnConflict::columns([
                            review::Column::GmbAccountId,
                            review::Column::ReviewId,
                        ])
                        .update_columns([
                            review::Column::ReplyText,
                            review::Column::ReplyTime,
                            review::Column::HasReply,
                            review::Column::Status,
                            review::Column::UpdatedAt,
                        ])
                        .to_owned(),
                    )
                    .exec(&txn)
                    .await
                    .map_err(classify_db_err)?;
            }
        }

        if !payload.questions.is_empty() {
            let rows: Vec<question::ActiveModel> = payload
                .questions
                .iter()
                .map(|stamped| question_row(stamped, now))
                .collect();

            question::Entity::insert_many(rows)
                .on_conflict(
                    OnConflict::columns([
                        question::Column::GmbAccountId,
                        question::Column::QuestionId,
                    ])
                    .update_columns([
                        question::Column::LocationResourceName,
                        question::Column::AuthorName,
                        question::Column::AuthorPhotoUrl,
                        question::Column::AuthorType,
                        question::Column::Text,
                        question::Column::CreateTime,
                        question::Column::AnswerId,
                        question::Column::AnswerText,
                        question::Column::AnswerAuthor,
                        question::Column::AnswerTime,
                        question::Column::UpvoteCount,
                        question::Column::TotalAnswerCount,
                        question::Column::Status,
                        question::Column::UpdatedAt,
                    ])
                    .to_owned(),
                )
                .exec(&txn)
                .await
                .map_err(classify_db_err)?;
        }

        txn.commit().await.map_err(classify_db_err)?;

        Ok(CommitResult {
            sync_id: Uuid::new_v4(),
            locations_synced: payload.locations.len(),
            reviews_synced: payload.reviews.len(),
            questions_synced: payload.questions.len(),
        })
    }
}

/// Reject any row whose tenant stamp does not match the payload's account.
fn validate_tenant_scoping(payload: &SyncTransactionPayload) -> Result<(), CommitError> {
    let account = &payload.account;

    let location_mismatch = payload
        .locations
        .iter()
        .any(|row| row.user_id != account.user_id || row.gmb_account_id != account.id);
    let review_mismatch = payload
        .reviews
        .iter()
        .any(|row| row.user_id != account.user_id || row.gmb_account_id != account.id);
    let question_mismatch = payload
        .questions
        .iter()
        .any(|row| row.user_id != account.user_id || row.gmb_account_id != account.id);

    if location_mismatch || review_mismatch || question_mismatch {
        warn!(
            gmb_account_id = %account.id,
            "rejecting commit payload with cross-tenant rows"
        );
        return Err(CommitError::Validation {
            details: "payload contains rows stamped for a different tenant".to_string(),
        });
    }

    Ok(())
}

/// Connection-level and pool-level failures are worth retrying; everything
/// else (constraint violations, bad SQL) is not.
fn classify_db_err(err: DbErr) -> CommitError {
    match &err {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => CommitError::Transient(err),
        DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) | DbErr::Query(RuntimeErr::SqlxError(sqlx_err)) => {
            if sqlx_err.as_database_error().is_none() {
                // io/protocol errors surface without a database error payload
                CommitError::Transient(err)
            } else {
                CommitError::Database(err)
            }
        }
        _ => CommitError::Database(err),
    }
}

fn location_row(
    stamped: &StampedLocation,
    now: chrono::DateTime<chrono::FixedOffset>,
) -> location::ActiveModel {
    let record = &stamped.record;
    location::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(stamped.user_id),
        gmb_account_id: Set(stamped.gmb_account_id),
        location_id: Set(record.location_id.clone()),
        resource_name: Set(record.resource_name.clone()),
        name: Set(record.name.clone()),
        category: Set(record.category.clone()),
        address: Set(record.address.clone()),
        phone: Set(record.phone.clone()),
        website: Set(record.website.clone()),
        latitude: Set(record.latitude),
        longitude: Set(record.longitude),
        rating: Set(record.rating),
        review_count: Set(record.review_count),
        completeness_score: Set(record.completeness_score),
        is_active: Set(true),
        metadata: Set(record.metadata.clone()),
        last_synced_at: Set(Some(now)),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

fn review_row(
    stamped: &StampedReview,
    now: chrono::DateTime<chrono::FixedOffset>,
) -> review::ActiveModel {
    let record = &stamped.record;
    review::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(stamped.user_id),
        gmb_account_id: Set(stamped.gmb_account_id),
        location_resource_name: Set(record.location_resource_name.clone()),
        review_id: Set(record.review_id.clone()),
        reviewer_name: Set(record.reviewer_name.clone()),
        reviewer_photo_url: Set(record.reviewer_photo_url.clone()),
        rating: Set(record.rating),
        needs_rating_review: Set(record.needs_rating_review),
        comment: Set(record.comment.clone()),
        create_time: Set(record.create_time),
        reply_text: Set(record.reply_text.clone()),
        reply_time: Set(record.reply_time),
        has_reply: Set(record.has_reply),
        status: Set(record.status.clone()),
        sentiment: Set(record.sentiment.clone()),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

fn question_row(
    stamped: &StampedQuestion,
    now: chrono::DateTime<chrono::FixedOffset>,
) -> question::ActiveModel {
    let record = &stamped.record;
    question::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(stamped.user_id),
        gmb_account_id: Set(stamped.gmb_account_id),
        location_resource_name: Set(record.location_resource_name.clone()),
        question_id: Set(record.question_id.clone()),
        author_name: Set(record.author_name.clone()),
        author_photo_url: Set(record.author_photo_url.clone()),
        author_type: Set(record.author_type.clone()),
        text: Set(record.text.clone()),
        create_time: Set(record.create_time),
        answer_id: Set(record.answer_id.clone()),
        answer_text: Set(record.answer_text.clone()),
        answer_author: Set(record.answer_author.clone()),
        answer_time: Set(record.answer_time),
        upvote_count: Set(record.upvote_count),
        total_answer_count: Set(record.total_answer_count),
        status: Set(record.status.clone()),
        created_at: Set(now),
        updated_at: Set(now),
    }
}
