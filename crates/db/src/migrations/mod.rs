//! Database migrations.
//!
//! Schema migrations for the database.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250101_000001_create_user_table;
mod m20250101_000002_create_post_table;
mod m20250101_000003_create_post_like_table;
mod m20250101_000004_create_following_table;
mod m20250101_000005_create_comment_table;
mod m20250101_000006_create_report_table;
mod m20250101_000007_create_subscription_table;
mod m20250101_000008_create_conversation_table;
mod m20250101_000009_create_message_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_user_table::Migration),
            Box::new(m20250101_000002_create_post_table::Migration),
            Box::new(m20250101_000003_create_post_like_table::Migration),
            Box::new(m20250101_000004_create_following_table::Migration),
            Box::new(m20250101_000005_create_comment_table::Migration),
            Box::new(m20250101_000006_create_report_table::Migration),
            Box::new(m20250101_000007_create_subscription_table::Migration),
            Box::new(m20250101_000008_create_conversation_table::Migration),
            Box::new(m20250101_000009_create_message_table::Migration),
        ]
    }
}
