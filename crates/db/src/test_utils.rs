//! Helpers for the `PostgreSQL` integration tests.

use sea_orm::{Database, DatabaseConnection, DbErr, EntityTrait};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::entities::{Giveaway, GiveawayClaim, GiveawayEntry, GiveawayLog, GiveawayWinner};
use crate::migrations::Migrator;

/// Connection settings, read from `TEST_DB_*` environment variables.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub struct TestDbConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
}

fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}

impl Default for TestDbConfig {
    fn default() -> Self {
        Self {
            host: env_or("TEST_DB_HOST", "localhost"),
            port: std::env::var("TEST_DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5433),
            username: env_or("TEST_DB_USER", "prizebot_test"),
            password: env_or("TEST_DB_PASSWORD", "prizebot_test"),
            database: env_or("TEST_DB_NAME", "prizebot_test"),
        }
    }
}

impl TestDbConfig {
    /// Connection URL for the test database.
    #[must_use]
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

/// A migrated test database.
pub struct TestDatabase {
    /// Open connection to the migrated database.
    pub conn: DatabaseConnection,
    /// Settings the connection was opened with.
    pub config: TestDbConfig,
}

impl TestDatabase {
    /// Connect with the environment's settings and run migrations.
    pub async fn new() -> Result<Self, DbErr> {
        Self::with_config(TestDbConfig::default()).await
    }

    /// Connect with explicit settings and run migrations.
    pub async fn with_config(config: TestDbConfig) -> Result<Self, DbErr> {
        let conn = Database::connect(&config.database_url()).await?;
        Migrator::up(&conn, None).await?;
        info!(database = %config.database, "Connected to test database");
        Ok(Self { conn, config })
    }

    /// Delete every giveaway document, children before parents.
    pub async fn cleanup(&self) -> Result<(), DbErr> {
        GiveawayLog::delete_many().exec(&self.conn).await?;
        GiveawayClaim::delete_many().exec(&self.conn).await?;
        GiveawayWinner::delete_many().exec(&self.conn).await?;
        GiveawayEntry::delete_many().exec(&self.conn).await?;
        Giveaway::delete_many().exec(&self.conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url() {
        let config = TestDbConfig {
            host: "db".to_string(),
            port: 5433,
            username: "bot".to_string(),
            password: "secret".to_string(),
            database: "giveaways".to_string(),
        };
        assert_eq!(config.database_url(), "postgres://bot:secret@db:5433/giveaways");
    }
}
