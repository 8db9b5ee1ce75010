//! Create topic and poll_topic tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Topic::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Topic::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Topic::Name)
                            .string_len(80)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Topic::Slug)
                            .string_len(100)
                            .not_null()
                            .unique_key(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PollTopic::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PollTopic::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PollTopic::PollId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(PollTopic::TopicId)
                            .string_len(32)
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_topic_poll")
                            .from(PollTopic::Table, PollTopic::PollId)
                            .to(Poll::Table, Poll::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_topic_topic")
                            .from(PollTopic::Table, PollTopic::TopicId)
                            .to(Topic::Table, Topic::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (poll_id, topic_id) - one link per pair
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_topic_poll_topic")
                    .table(PollTopic::Table)
                    .col(PollTopic::PollId)
                    .col(PollTopic::TopicId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: (topic_id, poll_id) for topic-filtered feed queries
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_topic_topic_poll")
                    .table(PollTopic::Table)
                    .col(PollTopic::TopicId)
                    .col(PollTopic::PollId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PollTopic::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Topic::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Topic {
    Table,
    Id,
    Name,
    Slug,
}

#[derive(Iden)]
enum PollTopic {
    Table,
    Id,
    PollId,
    TopicId,
}

#[derive(Iden)]
enum Poll {
    Table,
    Id,
}
