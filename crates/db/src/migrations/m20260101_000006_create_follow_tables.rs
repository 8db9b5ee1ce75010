//! Create follow_author and follow_topic tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FollowAuthor::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FollowAuthor::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FollowAuthor::UserId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FollowAuthor::AuthorId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FollowAuthor::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_author_user")
                            .from(FollowAuthor::Table, FollowAuthor::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_author_author")
                            .from(FollowAuthor::Table, FollowAuthor::AuthorId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (user_id, author_id) - one edge per pair
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_author_user_author")
                    .table(FollowAuthor::Table)
                    .col(FollowAuthor::UserId)
                    .col(FollowAuthor::AuthorId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FollowTopic::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FollowTopic::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FollowTopic::UserId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FollowTopic::TopicId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FollowTopic::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_topic_user")
                            .from(FollowTopic::Table, FollowTopic::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_topic_topic")
                            .from(FollowTopic::Table, FollowTopic::TopicId)
                            .to(Topic::Table, Topic::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (user_id, topic_id) - one edge per pair
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_topic_user_topic")
                    .table(FollowTopic::Table)
                    .col(FollowTopic::UserId)
                    .col(FollowTopic::TopicId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FollowTopic::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FollowAuthor::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum FollowAuthor {
    Table,
    Id,
    UserId,
    AuthorId,
    CreatedAt,
}

#[derive(Iden)]
enum FollowTopic {
    Table,
    Id,
    UserId,
    TopicId,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}

#[derive(Iden)]
enum Topic {
    Table,
    Id,
}
