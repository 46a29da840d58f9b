//! SyncJob entity model
//!
//! This module contains the SeaORM entity model for the sync_jobs table, the
//! durable queue of sync attempts consumed by the executor.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// SyncJob entity representing one queued or finished sync attempt
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "sync_jobs")]
pub struct Model {
    /// Unique identifier for the sync job (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Actor who requested the sync; doubles as the tenant's owning user
    pub user_id: Uuid,

    /// Tenant account this job syncs
    pub gmb_account_id: Uuid,

    /// Sync scope (`full` includes questions, `locations_reviews` does not)
    pub sync_type: String,

    /// Current status of the job (pending, processing, completed, failed)
    pub status: String,

    /// Number of attempts made for this job
    pub attempts: i32,

    /// Timestamp when the job is eligible to run
    pub scheduled_at: DateTimeWithTimeZone,

    /// Timestamp when the job becomes eligible again after backoff
    pub retry_after: Option<DateTimeWithTimeZone>,

    /// Timestamp when the job started execution
    pub started_at: Option<DateTimeWithTimeZone>,

    /// Timestamp when the job finished execution
    pub finished_at: Option<DateTimeWithTimeZone>,

    /// Structured error details if the job failed
    #[sea_orm(column_type = "JsonBinary")]
    pub error: Option<JsonValue>,

    /// Timestamp when the sync job was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the sync job was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::gmb_account::Entity",
        from = "Column::GmbAccountId",
        to = "super::gmb_account::Column::Id"
    )]
    GmbAccount,
}

impl Related<super::gmb_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GmbAccount.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Job status values used across the queue lifecycle.
pub const STATUS_PENDING: &str = "pending";
pub const STATUS_PROCESSING: &str = "processing";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_FAILED: &str = "failed";

/// Sync scope requested for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncScope {
    /// Locations, reviews, and questions
    Full,
    /// Locations and reviews only
    LocationsReviews,
}

impl SyncScope {
    pub fn from_include_questions(include_questions: bool) -> Self {
        if include_questions {
            SyncScope::Full
        } else {
            SyncScope::LocationsReviews
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            SyncScope::Full => "full",
            SyncScope::LocationsReviews => "locations_reviews",
        }
    }

    pub fn includes_questions(self) -> bool {
        matches!(self, SyncScope::Full)
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "full" => Some(SyncScope::Full),
            "locations_reviews" => Some(SyncScope::LocationsReviews),
            _ => None,
        }
    }
}
