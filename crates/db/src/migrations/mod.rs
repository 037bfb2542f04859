//! Database migrations.
//!
//! Schema migrations for the database.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250601_000001_create_giveaway_table;
mod m20250601_000002_create_giveaway_entry_table;
mod m20250601_000003_create_giveaway_winner_table;
mod m20250601_000004_create_giveaway_claim_table;
mod m20250601_000005_create_giveaway_log_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_create_giveaway_table::Migration),
            Box::new(m20250601_000002_create_giveaway_entry_table::Migration),
            Box::new(m20250601_000003_create_giveaway_winner_table::Migration),
            Box::new(m20250601_000004_create_giveaway_claim_table::Migration),
            Box::new(m20250601_000005_create_giveaway_log_table::Migration),
        ]
    }
}
