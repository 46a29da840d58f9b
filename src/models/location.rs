//! Location entity model
//!
//! Canonical business location upserted by the sync pipeline. Keyed by the
//! `(gmb_account_id, location_id)` natural key; never deleted by sync.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "locations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning user for multi-tenancy
    pub user_id: Uuid,

    /// Local tenant account the location belongs to
    pub gmb_account_id: Uuid,

    /// Normalized provider location id (last path segment of the resource name)
    pub location_id: String,

    /// Full provider resource name (e.g. `accounts/123/locations/456`)
    pub resource_name: String,

    /// Display name
    pub name: String,

    pub category: Option<String>,

    /// Joined postal address; None when the provider omitted it entirely
    pub address: Option<String>,

    pub phone: Option<String>,
    pub website: Option<String>,

    /// Geo-coordinates; absent coordinates stay NULL, 0.0 is a legal value
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    /// Aggregate rating reported by the provider
    pub rating: f64,
    pub review_count: i32,

    /// Derived profile-completeness score (0-100)
    pub completeness_score: i32,

    /// Deactivation is a separate flow; sync never clears this
    pub is_active: bool,

    /// Arbitrary provider metadata blob
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Option<JsonValue>,

    pub last_synced_at: Option<DateTimeWithTimeZone>,
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
