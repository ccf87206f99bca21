pub use sea_orm_migration::prelude::*;

mod m20261001_000001_create_venues;
mod m20261001_000002_create_promotions;
mod m20261001_000003_create_promotion_claims;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_create_venues::Migration),
            Box::new(m20261001_000002_create_promotions::Migration),
            Box::new(m20261001_000003_create_promotion_claims::Migration),
        ]
    }
}
