use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Roles are stored as plain strings so the schema runs on both
        // Postgres and SQLite: home_owner, home_cleaner, user_admin, platform_manager
        manager
            .create_table(
                Table::create()
                    .table(UserAccounts::Table)
                    .if_not_exists()
                    .col(string_len(UserAccounts::UserId, 32).primary_key())
                    .col(string_len(UserAccounts::Email, 255).not_null().unique_key())
                    .col(string_len(UserAccounts::PasswordHash, 255).not_null())
                    .col(string_len(UserAccounts::FirstName, 100).not_null())
                    .col(string_len(UserAccounts::LastName, 100).not_null())
                    .col(string_len(UserAccounts::Role, 32).not_null())
                    .col(boolean(UserAccounts::IsSuspended).not_null().default(false))
                    .col(string_len_null(UserAccounts::ActiveSessionId, 64))
                    .col(timestamp_with_time_zone_null(UserAccounts::SessionExpiresAt))
                    .col(
                        timestamp_with_time_zone(UserAccounts::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserAccounts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum UserAccounts {
    Table,
    UserId,
    Email,
    PasswordHash,
    FirstName,
    LastName,
    Role,
    IsSuspended,
    ActiveSessionId,
    SessionExpiresAt,
    CreatedAt,
}
