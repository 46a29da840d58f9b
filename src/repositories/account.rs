//! Repository for GMB account rows.

use sea_orm::{DatabaseConnection, DbErr, EntityTrait};
use uuid::Uuid;

use crate::models::gmb_account::{Entity, Model};

/// Repository for tenant account lookups.
pub struct AccountRepository {
    db: DatabaseConnection,
}

impl AccountRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Find an account by its local row id.
    pub async fn find_by_id(&self, account_id: Uuid) -> Result<Option<Model>, DbErr> {
        Entity::find_by_id(account_id).one(&self.db).await
    }
}
