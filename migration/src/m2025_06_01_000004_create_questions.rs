//! Migration to create the questions table.
//!
//! Q&A threads, upserted by the sync pipeline and keyed by
//! `(gmb_account_id, question_id)`.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Questions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Questions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Questions::UserId).uuid().not_null())
                    .col(ColumnDef::new(Questions::GmbAccountId).uuid().not_null())
                    .col(
                        ColumnDef::new(Questions::LocationResourceName)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Questions::QuestionId).text().not_null())
                    .col(ColumnDef::new(Questions::AuthorName).text().null())
                    .col(ColumnDef::new(Questions::AuthorPhotoUrl).text().null())
                    .col(ColumnDef::new(Questions::AuthorType).text().null())
                    .col(ColumnDef::new(Questions::Text).text().not_null())
                    .col(
                        ColumnDef::new(Questions::CreateTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Questions::AnswerId).text().null())
                    .col(ColumnDef::new(Questions::AnswerText).text().null())
                    .col(ColumnDef::new(Questions::AnswerAuthor).text().null())
                    .col(
                        ColumnDef::new(Questions::AnswerTime)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Questions::UpvoteCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Questions::TotalAnswerCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Questions::Status)
                            .text()
                            .not_null()
                            .default("unanswered"),
                    )
                    .col(
                        ColumnDef::new(Questions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Questions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_questions_gmb_account_id")
                            .from(Questions::Table, Questions::GmbAccountId)
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
                    .name("idx_questions_account_question")
                    .table(Questions::Table)
                    .col(Questions::GmbAccountId)
                    .col(Questions::QuestionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_questions_account_status")
                    .table(Questions::Table)
                    .col(Questions::GmbAccountId)
                    .col(Questions::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_questions_account_question")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_questions_account_status")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Questions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Questions {
    Table,
    Id,
    UserId,
    GmbAccountId,
    LocationResourceName,
    QuestionId,
    AuthorName,
    AuthorPhotoUrl,
    AuthorType,
    Text,
    CreateTime,
    AnswerId,
    AnswerText,
    AnswerAuthor,
    AnswerTime,
    UpvoteCount,
    TotalAnswerCount,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum GmbAccounts {
    Table,
    Id,
}
