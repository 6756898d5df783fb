use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(string_len(Categories::CategoryCode, 16).primary_key())
                    .col(string_len(Categories::CategoryName, 100).not_null().unique_key())
                    .col(text(Categories::Description).not_null().default(""))
                    .to_owned(),
            )
            .await?;

        // Seed the default service categories
        let insert = Query::insert()
            .into_table(Categories::Table)
            .columns([Categories::CategoryCode, Categories::CategoryName, Categories::Description])
            .values_panic([
                "CAT001".into(),
                "Residential Cleaning".into(),
                "Regular cleaning for houses and apartments".into(),
            ])
            .values_panic([
                "CAT002".into(),
                "Commercial Cleaning".into(),
                "Offices, shops and other business premises".into(),
            ])
            .values_panic([
                "CAT003".into(),
                "Carpet Cleaning".into(),
                "Shampooing and steam cleaning of carpets and rugs".into(),
            ])
            .values_panic([
                "CAT004".into(),
                "Window Cleaning".into(),
                "Interior and exterior window washing".into(),
            ])
            .values_panic([
                "CAT005".into(),
                "Deep Cleaning".into(),
                "Top-to-bottom cleaning including hard-to-reach areas".into(),
            ])
            .to_owned();

        manager.exec_stmt(insert).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Categories {
    Table,
    CategoryCode,
    CategoryName,
    Description,
}
