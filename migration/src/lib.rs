//! Database migrations for the GBP sync service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_06_01_000001_create_gmb_accounts;
mod m2025_06_01_000002_create_locations;
mod m2025_06_01_000003_create_reviews;
mod m2025_06_01_000004_create_questions;
mod m2025_06_01_000005_create_sync_jobs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_06_01_000001_create_gmb_accounts::Migration),
            Box::new(m2025_06_01_000002_create_locations::Migration),
            Box::new(m2025_06_01_000003_create_reviews::Migration),
            Box::new(m2025_06_01_000004_create_questions::Migration),
            Box::new(m2025_06_01_000005_create_sync_jobs::Migration),
        ]
    }
}
