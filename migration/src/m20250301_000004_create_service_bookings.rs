use sea_orm_migration::{prelude::*, schema::*, sea_orm::ConnectionTrait};

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
                    .table(ServiceBookings::Table)
                    .if_not_exists()
                    .col(pk_auto(ServiceBookings::BookingId))
                    .col(string_len(ServiceBookings::UserId, 32).not_null())
                    .col(string_len(ServiceBookings::ProviderId, 32).not_null())
                    .col(integer(ServiceBookings::ListingId).not_null())
                    .col(date(ServiceBookings::ScheduledDate).not_null())
                    .col(time(ServiceBookings::ScheduledTime).not_null())
                    .col(
                        string_len(ServiceBookings::Status, 32)
                            .not_null()
                            .default("pending_approval"),
                    )
                    .col(
                        timestamp_with_time_zone(ServiceBookings::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(ServiceBookings::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_service_bookings_user")
                            .from(ServiceBookings::Table, ServiceBookings::UserId)
                            .to(UserAccounts::Table, UserAccounts::UserId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_service_bookings_provider")
                            .from(ServiceBookings::Table, ServiceBookings::ProviderId)
                            .to(UserAccounts::Table, UserAccounts::UserId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_service_bookings_listing")
                            .from(ServiceBookings::Table, ServiceBookings::ListingId)
                            .to(Listings::Table, Listings::ListingId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_service_bookings_provider_date")
                    .table(ServiceBookings::Table)
                    .col(ServiceBookings::ProviderId)
                    .col(ServiceBookings::ScheduledDate)
                    .to_owned(),
            )
            .await?;

        // At most one live booking per (provider, date, time). Partial indexes
        // are not expressible through the index builder, so issue the DDL directly;
        // the statement is valid on both Postgres and SQLite.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_service_bookings_active_slot \
                 ON service_bookings (provider_id, scheduled_date, scheduled_time) \
                 WHERE status <> 'cancelled'",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ServiceBookings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ServiceBookings {
    Table,
    BookingId,
    UserId,
    ProviderId,
    ListingId,
    ScheduledDate,
    ScheduledTime,
    Status,
    CreatedAt,
    UpdatedAt,
}
