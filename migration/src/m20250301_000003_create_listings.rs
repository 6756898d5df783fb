use sea_orm_migration::{prelude::*, schema::*};

use super::m20250301_000001_create_user_accounts::UserAccounts;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Listings::Table)
                    .if_not_exists()
                    .col(pk_auto(Listings::ListingId))
                    .col(string_len(Listings::Title, 200).not_null().unique_key())
                    .col(text(Listings::Description).not_null())
                    .col(double(Listings::Price).not_null())
                    .col(string_len_null(Listings::ImagePath, 255))
                    .col(string_len_null(Listings::Category, 100))
                    .col(string_len(Listings::UserId, 32).not_null())
                    .col(
                        timestamp_with_time_zone(Listings::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_listings_user")
                            .from(Listings::Table, Listings::UserId)
                            .to(UserAccounts::Table, UserAccounts::UserId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_listings_user")
                    .table(Listings::Table)
                    .col(Listings::UserId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Listings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Listings {
    Table,
    ListingId,
    Title,
    Description,
    Price,
    ImagePath,
    Category,
    UserId,
    CreatedAt,
}
