//! Migration to create the reviews table.
//!
//! Customer reviews, upserted by the sync pipeline and keyed by
//! `(gmb_account_id, review_id)`.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Reviews::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Reviews::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Reviews::UserId).uuid().not_null())
                    .col(ColumnDef::new(Reviews::GmbAccountId).uuid().not_null())
                    .col(
                        ColumnDef::new(Reviews::LocationResourceName)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Reviews::ReviewId).text().not_null())
                    .col(ColumnDef::new(Reviews::ReviewerName).text().null())
                    .col(ColumnDef::new(Reviews::ReviewerPhotoUrl).text().null())
                    .col(
                        ColumnDef::new(Reviews::Rating)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Reviews::NeedsRatingReview)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Reviews::Comment).text().null())
                    .col(
                        ColumnDef::new(Reviews::CreateTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Reviews::ReplyText).text().null())
                    .col(
                        ColumnDef::new(Reviews::ReplyTime)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Reviews::HasReply)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Reviews::Status)
                            .text()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Reviews::Sentiment).text().null())
                    .col(
                        ColumnDef::new(Reviews::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Reviews::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reviews_gmb_account_id")
                            .from(Reviews::Table, Reviews::GmbAccountId)
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
                    .name("idx_reviews_account_review")
                    .table(Reviews::Table)
                    .col(Reviews::GmbAccountId)
                    .col(Reviews::ReviewId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reviews_account_status")
                    .table(Reviews::Table)
                    .col(Reviews::GmbAccountId)
                    .col(Reviews::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_reviews_account_review").to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_reviews_account_status").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Reviews::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Reviews {
    Table,
    Id,
    UserId,
    GmbAccountId,
    LocationResourceName,
    ReviewId,
    ReviewerName,
    ReviewerPhotoUrl,
    Rating,
    NeedsRatingReview,
    Comment,
    CreateTime,
    ReplyText,
    ReplyTime,
    HasReply,
    Status,
    Sentiment,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum GmbAccounts {
    Table,
    Id,
}
