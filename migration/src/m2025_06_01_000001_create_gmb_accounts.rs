//! Migration to create the gmb_accounts table.
//!
//! A gmb_account row is the local tenant anchor for one Google Business
//! Profile account; every synced entity is scoped to it.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GmbAccounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GmbAccounts::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GmbAccounts::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(GmbAccounts::GoogleAccountId)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(GmbAccounts::DisplayName).text().null())
                    .col(
                        ColumnDef::new(GmbAccounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(GmbAccounts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_gmb_accounts_google_account_id")
                    .table(GmbAccounts::Table)
                    .col(GmbAccounts::GoogleAccountId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_gmb_accounts_user_id")
                    .table(GmbAccounts::Table)
                    .col(GmbAccounts::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_gmb_accounts_google_account_id")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(Index::drop().name("idx_gmb_accounts_user_id").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(GmbAccounts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum GmbAccounts {
    Table,
    Id,
    UserId,
    GoogleAccountId,
    DisplayName,
    CreatedAt,
    UpdatedAt,
}
