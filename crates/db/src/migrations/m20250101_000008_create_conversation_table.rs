//! Create conversation table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Conversation::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Conversation::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Conversation::UserAId).string_len(32).not_null())
                    .col(ColumnDef::new(Conversation::UserBId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Conversation::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Conversation::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_conversation_user_a")
                            .from(Conversation::Table, Conversation::UserAId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_conversation_user_b")
                            .from(Conversation::Table, Conversation::UserBId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (user_a_id, user_b_id) - one conversation per pair
        manager
            .create_index(
                Index::create()
                    .name("idx_conversation_pair")
                    .table(Conversation::Table)
                    .col(Conversation::UserAId)
                    .col(Conversation::UserBId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: user_b_id (the pair index covers user_a_id lookups)
        manager
            .create_index(
                Index::create()
                    .name("idx_conversation_user_b_id")
                    .table(Conversation::Table)
                    .col(Conversation::UserBId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Conversation::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Conversation {
    Table,
    Id,
    UserAId,
    UserBId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
