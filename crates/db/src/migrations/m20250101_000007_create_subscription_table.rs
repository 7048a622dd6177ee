//! Create subscription table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Subscription::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Subscription::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Subscription::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(Subscription::Plan).string_len(16).not_null())
                    .col(ColumnDef::new(Subscription::PriceCents).big_integer().not_null())
                    .col(ColumnDef::new(Subscription::Currency).string_len(8).not_null())
                    .col(ColumnDef::new(Subscription::OrderRef).string_len(128))
                    .col(ColumnDef::new(Subscription::Status).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Subscription::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Subscription::StartDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Subscription::EndDate).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Subscription::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Subscription::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscription_user")
                            .from(Subscription::Table, Subscription::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: order_ref - an order is captured at most once
        manager
            .create_index(
                Index::create()
                    .name("idx_subscription_order_ref")
                    .table(Subscription::Table)
                    .col(Subscription::OrderRef)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Partial unique index: at most one active subscription per user
        manager
            .get_connection()
            .execute_unprepared(
                r"
                CREATE UNIQUE INDEX IF NOT EXISTS idx_subscription_user_active
                ON subscription (user_id)
                WHERE is_active = true;
                ",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Subscription::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Subscription {
    Table,
    Id,
    UserId,
    Plan,
    PriceCents,
    Currency,
    OrderRef,
    Status,
    IsActive,
    StartDate,
    EndDate,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
