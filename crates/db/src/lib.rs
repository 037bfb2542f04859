//! Persistence layer for prizebot.
//!
//! Holds the sea-orm entities and migrations, the repositories over them, and
//! the [`store::GiveawayStore`] seam the services are written against.

pub mod entities;
pub mod migrations;
pub mod repositories;
pub mod store;
pub mod test_utils;

use prizebot_common::{AppError, Config};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::time::Duration;
use tracing::log::LevelFilter;

/// Postgres SQLSTATE codes and driver messages that mean "wrong credentials or grants".
const AUTH_FAILURE_MARKERS: &[&str] = &[
    "28P01",
    "28000",
    "42501",
    "password authentication failed",
    "permission denied",
];

/// Convert a database error, separating authorization failures from the rest.
#[must_use]
pub fn db_err(err: DbErr) -> AppError {
    let message = err.to_string();
    if AUTH_FAILURE_MARKERS.iter().any(|m| message.contains(m)) {
        AppError::StoreUnauthorized(message)
    } else {
        AppError::Database(message)
    }
}

/// Initialize database connection.
pub async fn init(config: &Config) -> Result<DatabaseConnection, AppError> {
    let mut opt = ConnectOptions::new(&config.database.url);

    opt.max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(LevelFilter::Debug);

    Database::connect(opt).await.map_err(db_err)
}

/// Run pending migrations.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), AppError> {
    use sea_orm_migration::MigratorTrait;
    migrations::Migrator::up(db, None).await.map_err(db_err)
}
