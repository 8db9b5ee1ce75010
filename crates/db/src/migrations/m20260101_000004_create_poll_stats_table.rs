//! Create poll_stats table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PollStats::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PollStats::PollId)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PollStats::TotalVotes)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PollStats::OptionCounts)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PollStats::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_stats_poll")
                            .from(PollStats::Table, PollStats::PollId)
                            .to(Poll::Table, Poll::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: updated_at (reconciliation staleness scans)
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_stats_updated_at")
                    .table(PollStats::Table)
                    .col(PollStats::UpdatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PollStats::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PollStats {
    Table,
    PollId,
    TotalVotes,
    OptionCounts,
    UpdatedAt,
}

#[derive(Iden)]
enum Poll {
    Table,
    Id,
}
