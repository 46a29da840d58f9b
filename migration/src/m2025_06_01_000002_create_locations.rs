//! Migration to create the locations table.
//!
//! Canonical business locations, upserted by the sync pipeline and keyed by
//! `(gmb_account_id, location_id)`. Sync never deletes rows; deactivation is a
//! separate flow driven through `is_active`.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Locations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Locations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Locations::UserId).uuid().not_null())
                    .col(ColumnDef::new(Locations::GmbAccountId).uuid().not_null())
                    .col(ColumnDef::new(Locations::LocationId).text().not_null())
                    .col(ColumnDef::new(Locations::ResourceName).text().not_null())
                    .col(ColumnDef::new(Locations::Name).text().not_null())
                    .col(ColumnDef::new(Locations::Category).text().null())
                    .col(ColumnDef::new(Locations::Address).text().null())
                    .col(ColumnDef::new(Locations::Phone).text().null())
                    .col(ColumnDef::new(Locations::Website).text().null())
                    .col(ColumnDef::new(Locations::Latitude).double().null())
                    .col(ColumnDef::new(Locations::Longitude).double().null())
                    .col(
                        ColumnDef::new(Locations::Rating)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Locations::ReviewCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Locations::CompletenessScore)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Locations::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Locations::Metadata).json_binary().null())
                    .col(
                        ColumnDef::new(Locations::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Locations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Locations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_locations_gmb_account_id")
                            .from(Locations::Table, Locations::GmbAccountId)
                            .to(GmbAccounts::Table, GmbAccounts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Natural key the committer's upsert conflicts on
        manager
            .create_index(
                Index::create()
                    .name("idx_locations_account_location")
                    .table(Locations::Table)
                    .col(Locations::GmbAccountId)
                    .col(Locations::LocationId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_locations_user_id")
                    .table(Locations::Table)
                    .col(Locations::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_locations_account_location")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(Index::drop().name("idx_locations_user_id").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Locations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Locations {
    Table,
    Id,
    UserId,
    GmbAccountId,
    LocationId,
    ResourceName,
    Name,
    Category,
    Address,
    Phone,
    Website,
    Latitude,
    Longitude,
    Rating,
    ReviewCount,
    CompletenessScore,
    IsActive,
    Metadata,
    LastSyncedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum GmbAccounts {
    Table,
    Id,
}
