//! Dashboard aggregate computation.
//!
//! Aggregates are recomputed from the base tables after each successful sync
//! and served from the in-process cache; see `crate::cache`.

use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{location, question, review};
use crate::normalization::{QUESTION_STATUS_UNANSWERED, REVIEW_STATUS_PENDING};

/// Per-account dashboard rollup.
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct DashboardAggregates {
    pub location_count: u64,
    pub review_count: u64,
    pub pending_review_count: u64,
    pub question_count: u64,
    pub unanswered_question_count: u64,
    /// Average of location ratings, ignoring locations with no reviews.
    pub average_rating: Option<f64>,
}

/// Repository computing dashboard aggregates from the base tables.
pub struct DashboardRepository {
    db: DatabaseConnection,
}

impl DashboardRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Recompute the rollup for one account.
    pub async fn compute_aggregates(
        &self,
        gmb_account_id: Uuid,
    ) -> Result<DashboardAggregates, DbErr> {
        let location_count = location::Entity::find()
            .filter(location::Column::GmbAccountId.eq(gmb_account_id))
            .count(&self.db)
            .await?;

        let review_count = review::Entity::find()
            .filter(review::Column::GmbAccountId.eq(gmb_account_id))
            .count(&self.db)
            .await?;

        let pending_review_count = review::Entity::find()
            .filter(review::Column::GmbAccountId.eq(gmb_account_id))
            .filter(review::Column::Status.eq(REVIEW_STATUS_PENDING))
            .count(&self.db)
            .await?;

        let question_count = question::Entity::find()
            .filter(question::Column::GmbAccountId.eq(gmb_account_id))
            .count(&self.db)
            .await?;

        let unanswered_question_count = question::Entity::find()
            .filter(question::Column::GmbAccountId.eq(gmb_account_id))
            .filter(question::Column::Status.eq(QUESTION_STATUS_UNANSWERED))
            .count(&self.db)
            .await?;

        // Averaged in Rust so the result type is uniform across backends.
        let rated: Vec<f64> = location::Entity::find()
            .filter(location::Column::GmbAccountId.eq(gmb_account_id))
            .filter(location::Column::ReviewCount.gt(0))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|loc| loc.rating)
            .collect();
        let average_rating = if rated.is_empty() {
            None
        } else {
            Some(rated.iter().sum::<f64>() / rated.len() as f64)
        };

        Ok(DashboardAggregates {
            location_count,
            review_count,
            pending_review_count,
            question_count,
            unanswered_question_count,
            average_rating,
        })
    }
}
