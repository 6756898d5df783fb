use sea_orm_migration::{prelude::*, schema::*};

use super::m20250301_000001_create_user_accounts::UserAccounts;
use super::m20250301_000003_create_listings::Listings;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ShortlistedListings::Table)
                    .if_not_exists()
                    .col(pk_auto(ShortlistedListings::Id))
                    .col(string_len(ShortlistedListings::UserId, 32).not_null())
                    .col(integer(ShortlistedListings::ListingId).not_null())
                    .col(
                        timestamp_with_time_zone(ShortlistedListings::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_shortlisted_listings_user")
                            .from(ShortlistedListings::Table, ShortlistedListings::UserId)
                            .to(UserAccounts::Table, UserAccounts::UserId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_shortlisted_listings_listing")
                            .from(ShortlistedListings::Table, ShortlistedListings::ListingId)
                            .to(Listings::Table, Listings::ListingId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_shortlisted_listings_pair")
                    .table(ShortlistedListings::Table)
                    .col(ShortlistedListings::UserId)
                    .col(ShortlistedListings::ListingId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ShortlistedListings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ShortlistedListings {
    Table,
    Id,
    UserId,
    ListingId,
    CreatedAt,
}
