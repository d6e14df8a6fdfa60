//! Persistence (spec §4.7, §4.8, §6 schema). A `Database` wraps the
//! `sqlx::PgPool`; everything that actually writes rows goes through a
//! `#[async_trait]` repository trait so room/bot code depends on an
//! interface, not a concrete pool, and tests can swap in the in-memory
//! `mock` implementations below each trait.

pub mod config;
pub mod repository;
pub mod timeouts;

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use thiserror::Error;

pub use config::DatabaseConfig;
pub use repository::{ApiKeyRepository, HandRepository, StatsRepository, WalletRepository};

/// Errors from the persistence layer (spec §7 "Resource" kind). The room's
/// hand loop logs these and continues — a failed write never aborts an
/// in-memory hand, so players still receive their chips (spec §7).
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("record not found: {0}")]
    NotFound(String),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// # Examples
    ///
    /// ```no_run
    /// use holdem_engine::db::{Database, DatabaseConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), sqlx::Error> {
    ///     let config = DatabaseConfig::from_env();
    ///     let db = Database::new(&config).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires a running Postgres instance.
    async fn test_database_connection() {
        let config = DatabaseConfig::development();
        let db = Database::new(&config).await.expect("failed to connect");
        db.health_check().await.expect("health check failed");
        db.close().await;
    }
}
