//! Question entity model
//!
//! One Q&A thread tied to a location, keyed by
//! `(gmb_account_id, question_id)`.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "questions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning user for multi-tenancy
    pub user_id: Uuid,

    /// Local tenant account the question belongs to
    pub gmb_account_id: Uuid,

    /// Resource name of the owning location
    pub location_resource_name: String,

    /// Provider question id
    pub question_id: String,

    pub author_name: Option<String>,
    pub author_photo_url: Option<String>,
    pub author_type: Option<String>,

    pub text: String,
    pub create_time: DateTimeWithTimeZone,

    /// Best answer fields, taken from the first top answer when present
    pub answer_id: Option<String>,
    pub answer_text: Option<String>,
    pub answer_author: Option<String>,
    pub answer_time: Option<DateTimeWithTimeZone>,

    pub upvote_count: i32,
    pub total_answer_count: i32,

    /// `answered` when at least one top answer exists, `unanswered` otherwise
    pub status: String,

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
