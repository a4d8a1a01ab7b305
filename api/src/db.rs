//! Database connection module for `ClickHouse`.
//!
//! Builds the shared client from `RIVALWATCH_DB_*` variables and creates the
//! activity and audit tables when they are missing.

use anyhow::{Context, Result};
use clickhouse::Client;
use std::sync::Arc;

/// Database configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `ClickHouse` database URL (e.g., <http://localhost:8123>)
    pub url: String,
    /// Database name to use
    pub database: String,
    /// Username for authentication
    pub user: String,
    /// Password for authentication
    pub password: String,
}

impl DatabaseConfig {
    /// Load database configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `RIVALWATCH_DB_URL`: Database URL (default: <http://localhost:8123>)
    /// - `RIVALWATCH_DB_NAME`: Database name (default: "rivalwatch")
    /// - `RIVALWATCH_DB_USER`: Database user (default: "rivalwatch")
    /// - `RIVALWATCH_DB_PASSWORD`: Database password (default: "`rivalwatch_dev`")
    #[must_use]
    pub fn from_env() -> Self {
        let var = |key: &str, default: &str| {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };
        Self {
            url: var("RIVALWATCH_DB_URL", "http://localhost:8123"),
            database: var("RIVALWATCH_DB_NAME", "rivalwatch"),
            user: var("RIVALWATCH_DB_USER", "rivalwatch"),
            password: var("RIVALWATCH_DB_PASSWORD", "rivalwatch_dev"),
        }
    }
}

const SCHEMA: [(&str, &str); 3] = [
    (
        "activity_metrics",
        "CREATE TABLE IF NOT EXISTS activity_metrics (
            id String,
            source_id LowCardinality(String),
            timestamp Int64,
            interval_seconds UInt32,
            rate Float64,
            active_user_count UInt64,
            raw_message_count UInt64
        ) ENGINE = MergeTree ORDER BY (source_id, timestamp)",
    ),
    (
        "command_logs",
        "CREATE TABLE IF NOT EXISTS command_logs (
            id String,
            command String,
            actor_id String,
            timestamp Int64,
            success Bool,
            response Nullable(String)
        ) ENGINE = MergeTree ORDER BY timestamp",
    ),
    (
        "system_logs",
        "CREATE TABLE IF NOT EXISTS system_logs (
            id String,
            kind LowCardinality(String),
            message String,
            timestamp Int64,
            metadata Nullable(String)
        ) ENGINE = MergeTree ORDER BY timestamp",
    ),
];

/// Database client wrapper providing connection pooling.
#[derive(Clone)]
pub struct Database {
    client: Arc<Client>,
}

impl Database {
    /// Create a new database client from configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// # use api::db::{Database, DatabaseConfig};
    /// let db = Database::new(&DatabaseConfig::from_env());
    /// let _client = db.client();
    /// ```
    #[must_use]
    pub fn new(config: &DatabaseConfig) -> Self {
        let client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database)
            .with_user(&config.user)
            .with_password(&config.password);

        Self {
            client: Arc::new(client),
        }
    }

    /// Get a reference to the underlying `ClickHouse` client.
    #[must_use]
    pub fn client(&self) -> Arc<Client> {
        Arc::clone(&self.client)
    }

    /// Test database connectivity by executing a simple query.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be reached or the query fails.
    pub async fn ping(&self) -> Result<()> {
        self.client
            .query("SELECT 1")
            .fetch_one::<u8>()
            .await
            .context("Failed to ping database")?;
        Ok(())
    }

    /// Creates the activity and audit tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first table that could not be created.
    pub async fn ensure_schema(&self) -> Result<()> {
        for (table, ddl) in SCHEMA {
            self.client
                .query(ddl)
                .execute()
                .await
                .with_context(|| format!("Failed to create table {table}"))?;
            tracing::debug!(table, "Table ready");
        }
        Ok(())
    }
}
