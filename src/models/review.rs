//! Review entity model
//!
//! One customer review tied to a location, keyed by
//! `(gmb_account_id, review_id)`.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "reviews")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning user for multi-tenancy
    pub user_id: Uuid,

    /// Local tenant account the review belongs to
    pub gmb_account_id: Uuid,

    /// Resource name of the owning location
    pub location_resource_name: String,

    /// Provider review id
    pub review_id: String,

    pub reviewer_name: Option<String>,
    pub reviewer_photo_url: Option<String>,

    /// Star rating mapped to 1-5; 0 means the provider enum was unknown
    pub rating: i32,

    /// Set when the star enum could not be mapped and needs a manual edit
    pub needs_rating_review: bool,

    pub comment: Option<String>,
    pub create_time: DateTimeWithTimeZone,

    pub reply_text: Option<String>,
    pub reply_time: Option<DateTimeWithTimeZone>,
    pub has_reply: bool,

    /// `responded` when a reply exists, `pending` otherwise
    pub status: String,

    /// Sentiment placeholder filled by a downstream analysis flow
    pub sentiment: Option<String>,

    pub created_at: DateTimeWithTimeZone,
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
