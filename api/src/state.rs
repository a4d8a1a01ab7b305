//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers.

use crate::config::{Config, StorageBackend};
use crate::db::{Database, DatabaseConfig};
use anyhow::Result;
use shared::clock::{Clock, SystemClock};
use shared::config::ConfigError;
use shared::pipeline::{MonitorContext, MonitorSetup};
use shared::storage::{
    ActivityStore, AuditStore, ClickHouseActivityStore, ClickHouseAuditStore,
    InMemoryActivityStore, InMemoryAuditStore,
};
use std::sync::Arc;

/// Application state shared across all request handlers.
///
/// Wraps the monitor context that the scheduler also drives, so handlers see
/// the same buffers, stores and streak as the scheduled tasks.
#[derive(Clone)]
pub struct AppState {
    context: Arc<MonitorContext>,
}

impl AppState {
    /// Creates a new application state around an existing context.
    #[must_use]
    pub fn new(context: Arc<MonitorContext>) -> Self {
        Self { context }
    }

    /// Creates a state with in-memory stores.
    ///
    /// This is useful for development and testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the setup is invalid.
    pub fn in_memory(setup: MonitorSetup, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        let activity: Arc<dyn ActivityStore> = InMemoryActivityStore::new_shared();
        let audit: Arc<dyn AuditStore> = InMemoryAuditStore::new_shared();
        let context = MonitorContext::new(setup, activity, audit, clock)?;
        Ok(Self::new(Arc::new(context)))
    }

    /// Creates the state for the configured storage backend.
    ///
    /// For `ClickHouse` the connection is checked and missing tables are
    /// created before the context is built.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable or the setup is invalid.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        match config.storage {
            StorageBackend::Memory => {
                tracing::info!("Using in-memory storage");
                Ok(Self::in_memory(config.monitor.clone(), clock)?)
            }
            StorageBackend::ClickHouse => {
                let db_config = DatabaseConfig::from_env();
                tracing::info!(url = %db_config.url, database = %db_config.database, "Using ClickHouse storage");
                let db = Database::new(&db_config);
                db.ping().await?;
                db.ensure_schema().await?;

                let activity: Arc<dyn ActivityStore> = ClickHouseActivityStore::new_shared(db.client());
                let audit: Arc<dyn AuditStore> = ClickHouseAuditStore::new_shared(db.client());
                let context = MonitorContext::new(config.monitor.clone(), activity, audit, clock)?;
                Ok(Self::new(Arc::new(context)))
            }
        }
    }

    /// Returns the monitor context.
    #[must_use]
    pub fn context(&self) -> &Arc<MonitorContext> {
        &self.context
    }
}
