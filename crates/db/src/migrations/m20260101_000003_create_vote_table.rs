//! Create vote table migration.
//!
//! The vote ledger enforces at-most-one-vote-per-identity with three
//! independent partial unique indexes, one per nullable identity channel,
//! plus one for idempotency-key replay. A concurrent insert colliding on any
//! of them raises a unique violation that the ledger treats as
//! "already voted".

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Vote::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Vote::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Vote::PollId).string_len(32).not_null())
                    .col(ColumnDef::new(Vote::OptionId).string_len(32).not_null())
                    .col(ColumnDef::new(Vote::AccountId).string_len(32).null())
                    .col(ColumnDef::new(Vote::DeviceHash).string_len(64).null())
                    .col(ColumnDef::new(Vote::NetworkHash).string_len(64).null())
                    .col(
                        ColumnDef::new(Vote::IdempotencyKey)
                            .string_len(64)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Vote::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vote_poll")
                            .from(Vote::Table, Vote::PollId)
                            .to(Poll::Table, Poll::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vote_option")
                            .from(Vote::Table, Vote::OptionId)
                            .to(PollOption::Table, PollOption::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vote_account")
                            .from(Vote::Table, Vote::AccountId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Partial unique indexes: sea-query has no conditional-index builder,
        // so these go through raw SQL.
        let conn = manager.get_connection();
        conn.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS uniq_vote_poll_account \
             ON vote (poll_id, account_id) WHERE account_id IS NOT NULL",
        )
        .await?;
        conn.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS uniq_vote_poll_device \
             ON vote (poll_id, device_hash) WHERE device_hash IS NOT NULL",
        )
        .await?;
        conn.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS uniq_vote_poll_network \
             ON vote (poll_id, network_hash) WHERE network_hash IS NOT NULL",
        )
        .await?;
        conn.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS uniq_vote_poll_idempotency \
             ON vote (poll_id, idempotency_key) WHERE idempotency_key IS NOT NULL",
        )
        .await?;

        // Index: (poll_id, created_at) for aggregation scans
        manager
            .create_index(
                Index::create()
                    .name("idx_vote_poll_created_at")
                    .table(Vote::Table)
                    .col(Vote::PollId)
                    .col(Vote::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Index: option_id (per-option counting)
        manager
            .create_index(
                Index::create()
                    .name("idx_vote_option_id")
                    .table(Vote::Table)
                    .col(Vote::OptionId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Vote::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Vote {
    Table,
    Id,
    PollId,
    OptionId,
    AccountId,
    DeviceHash,
    NetworkHash,
    IdempotencyKey,
    CreatedAt,
}

#[derive(Iden)]
enum Poll {
    Table,
    Id,
}

#[derive(Iden)]
enum PollOption {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
