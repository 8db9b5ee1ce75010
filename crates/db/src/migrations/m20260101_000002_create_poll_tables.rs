//! Create poll and poll_option tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Poll::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Poll::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Poll::AuthorId).string_len(32).not_null())
                    .col(ColumnDef::new(Poll::Title).string_len(240).not_null())
                    .col(
                        ColumnDef::new(Poll::Visibility)
                            .string_len(16)
                            .not_null()
                            .default("public"),
                    )
                    .col(
                        ColumnDef::new(Poll::ResultsMode)
                            .string_len(32)
                            .not_null()
                            .default("open"),
                    )
                    .col(
                        ColumnDef::new(Poll::IsHidden)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Poll::IsFrozen)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Poll::ClosesAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Poll::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_author")
                            .from(Poll::Table, Poll::AuthorId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (visibility, created_at) for feed candidate scans
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_visibility_created_at")
                    .table(Poll::Table)
                    .col(Poll::Visibility)
                    .col(Poll::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Index: author_id (author filter)
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_author_id")
                    .table(Poll::Table)
                    .col(Poll::AuthorId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PollOption::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PollOption::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PollOption::PollId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PollOption::Text).string_len(140).not_null())
                    .col(ColumnDef::new(PollOption::Ordinal).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_option_poll")
                            .from(PollOption::Table, PollOption::PollId)
                            .to(Poll::Table, Poll::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (poll_id, ordinal) - stable display order per poll
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_option_poll_ordinal")
                    .table(PollOption::Table)
                    .col(PollOption::PollId)
                    .col(PollOption::Ordinal)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PollOption::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Poll::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Poll {
    Table,
    Id,
    AuthorId,
    Title,
    Visibility,
    ResultsMode,
    IsHidden,
    IsFrozen,
    ClosesAt,
    CreatedAt,
}

#[derive(Iden)]
enum PollOption {
    Table,
    Id,
    PollId,
    Text,
    Ordinal,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
