pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_user_accounts;
mod m20250301_000002_create_categories;
mod m20250301_000003_create_listings;
mod m20250301_000004_create_service_bookings;
mod m20250301_000005_create_shortlisted_listings;
mod m20250301_000006_create_listing_views;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_user_accounts::Migration),
            Box::new(m20250301_000002_create_categories::Migration),
            Box::new(m20250301_000003_create_listings::Migration),
            Box::new(m20250301_000004_create_service_bookings::Migration),
            Box::new(m20250301_000005_create_shortlisted_listings::Migration),
            Box::new(m20250301_000006_create_listing_views::Migration),
        ]
    }
}
