use sea_orm_migration::{prelude::*, schema::*};

use super::m20250301_000003_create_listings::Listings;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ListingViews::Table)
                    .if_not_exists()
                    .col(pk_auto(ListingViews::Id))
                    .col(integer(ListingViews::ListingId).not_null())
                    .col(string_len_null(ListingViews::ViewerId, 32))
                    .col(
                        timestamp_with_time_zone(ListingViews::ViewedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_listing_views_listing")
                            .from(ListingViews::Table, ListingViews::ListingId)
                            .to(Listings::Table, Listings::ListingId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_listing_views_listing")
                    .table(ListingViews::Table)
                    .col(ListingViews::ListingId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ListingViews::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ListingViews {
    Table,
    Id,
    ListingId,
    ViewerId,
    ViewedAt,
}
