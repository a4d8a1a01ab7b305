//! Audit log storage.
//!
//! Command log and system log entries are write-once. Listing returns the
//! newest entries first. Only system log entries are subject to retention.

use crate::models::{CommandLogEntry, SystemLogEntry, SystemLogKind};
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Errors that can occur during audit store operations.
#[derive(Debug, Error)]
pub enum AuditStoreError {
    /// Failed to acquire lock on the store.
    #[error("Failed to acquire lock on audit store")]
    LockError,

    /// Generic storage error.
    #[error("Storage error: {0}")]
    StorageError(String),
}

/// Trait for audit log storage implementations.
pub trait AuditStore: Send + Sync {
    /// Appends a command log entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn log_command(&self, entry: CommandLogEntry) -> Result<(), AuditStoreError>;

    /// Returns up to `limit` command log entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn recent_commands(&self, limit: usize) -> Result<Vec<CommandLogEntry>, AuditStoreError>;

    /// Appends a system log entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn log_system(&self, entry: SystemLogEntry) -> Result<(), AuditStoreError>;

    /// Returns up to `limit` system log entries, newest first, optionally
    /// restricted to one kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn recent_system(
        &self,
        limit: usize,
        kind: Option<SystemLogKind>,
    ) -> Result<Vec<SystemLogEntry>, AuditStoreError>;

    /// Deletes system log entries older than `cutoff` and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete operation fails.
    fn delete_system_before(&self, cutoff: DateTime<Utc>) -> Result<usize, AuditStoreError>;

    /// Returns the number of stored system log entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the count operation fails.
    fn count_system(&self) -> Result<usize, AuditStoreError>;
}

/// In-memory audit store.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    commands: Arc<RwLock<Vec<CommandLogEntry>>>,
    system: Arc<RwLock<Vec<SystemLogEntry>>>,
}

impl InMemoryAuditStore {
    /// Creates a new empty in-memory audit store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory audit store wrapped in an Arc.
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl AuditStore for InMemoryAuditStore {
    fn log_command(&self, entry: CommandLogEntry) -> Result<(), AuditStoreError> {
        let mut commands = self
            .commands
            .write()
            .map_err(|_| AuditStoreError::LockError)?;
        commands.push(entry);
        Ok(())
    }

    fn recent_commands(&self, limit: usize) -> Result<Vec<CommandLogEntry>, AuditStoreError> {
        let commands = self
            .commands
            .read()
            .map_err(|_| AuditStoreError::LockError)?;
        let mut entries: Vec<_> = commands.clone();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        Ok(entries)
    }

    fn log_system(&self, entry: SystemLogEntry) -> Result<(), AuditStoreError> {
        let mut system = self
            .system
            .write()
            .map_err(|_| AuditStoreError::LockError)?;
        system.push(entry);
        Ok(())
    }

    fn recent_system(
        &self,
        limit: usize,
        kind: Option<SystemLogKind>,
    ) -> Result<Vec<SystemLogEntry>, AuditStoreError> {
        let system = self
            .system
            .read()
            .map_err(|_| AuditStoreError::LockError)?;
        let mut entries: Vec<_> = system
            .iter()
            .filter(|entry| kind.map_or(true, |k| entry.kind == k))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        Ok(entries)
    }

    fn delete_system_before(&self, cutoff: DateTime<Utc>) -> Result<usize, AuditStoreError> {
        let mut system = self
            .system
            .write()
            .map_err(|_| AuditStoreError::LockError)?;
        let before = system.len();
        system.retain(|entry| entry.timestamp >= cutoff);
        Ok(before - system.len())
    }

    fn count_system(&self) -> Result<usize, AuditStoreError> {
        let system = self
            .system
            .read()
            .map_err(|_| AuditStoreError::LockError)?;
        Ok(system.len())
    }
}

#[derive(clickhouse::Row, serde::Serialize, serde::Deserialize)]
struct CommandRow {
    id: String,
    command: String,
    actor_id: String,
    timestamp: i64,
    success: bool,
    response: Option<String>,
}

impl From<CommandLogEntry> for CommandRow {
    fn from(entry: CommandLogEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            command: entry.command,
            actor_id: entry.actor_id,
            timestamp: entry.timestamp.timestamp_nanos_opt().unwrap_or(0),
            success: entry.success,
            response: entry.response,
        }
    }
}

impl From<CommandRow> for CommandLogEntry {
    fn from(row: CommandRow) -> Self {
        Self {
            id: row.id.parse().unwrap_or_default(),
            command: row.command,
            actor_id: row.actor_id,
            timestamp: DateTime::from_timestamp_nanos(row.timestamp),
            success: row.success,
            response: row.response,
        }
    }
}

#[derive(clickhouse::Row, serde::Serialize, serde::Deserialize)]
struct SystemRow {
    id: String,
    kind: String,
    message: String,
    timestamp: i64,
    metadata: Option<String>,
}

impl From<SystemLogEntry> for SystemRow {
    fn from(entry: SystemLogEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            kind: entry.kind.as_str().to_string(),
            message: entry.message,
            timestamp: entry.timestamp.timestamp_nanos_opt().unwrap_or(0),
            metadata: entry.metadata,
        }
    }
}

impl TryFrom<SystemRow> for SystemLogEntry {
    type Error = AuditStoreError;

    fn try_from(row: SystemRow) -> Result<Self, Self::Error> {
        let kind = row
            .kind
            .parse()
            .map_err(|e: crate::models::AuditValidationError| {
                AuditStoreError::StorageError(e.to_string())
            })?;
        Ok(Self {
            id: row.id.parse().unwrap_or_default(),
            kind,
            message: row.message,
            timestamp: DateTime::from_timestamp_nanos(row.timestamp),
            metadata: row.metadata,
        })
    }
}

/// `ClickHouse`-backed audit store.
///
/// Uses the `command_logs` and `system_logs` tables.
#[derive(Clone)]
pub struct ClickHouseAuditStore {
    client: Arc<clickhouse::Client>,
}

impl ClickHouseAuditStore {
    /// Creates a new `ClickHouse` audit store with the given client.
    #[must_use]
    pub fn new(client: Arc<clickhouse::Client>) -> Self {
        Self { client }
    }

    /// Creates a new `ClickHouse` audit store wrapped in an Arc.
    #[must_use]
    pub fn new_shared(client: Arc<clickhouse::Client>) -> Arc<Self> {
        Arc::new(Self::new(client))
    }

    fn block_on<F, T>(future: F) -> Result<T, AuditStoreError>
    where
        F: std::future::Future<Output = Result<T, clickhouse::error::Error>>,
    {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current()
                .block_on(future)
                .map_err(|e| AuditStoreError::StorageError(e.to_string()))
        })
    }
}

impl AuditStore for ClickHouseAuditStore {
    fn log_command(&self, entry: CommandLogEntry) -> Result<(), AuditStoreError> {
        let client = Arc::clone(&self.client);
        let row = CommandRow::from(entry);
        Self::block_on(async move {
            let mut inserter = client.insert::<CommandRow>("command_logs").await?;
            inserter.write(&row).await?;
            inserter.end().await?;
            Ok(())
        })
    }

    fn recent_commands(&self, limit: usize) -> Result<Vec<CommandLogEntry>, AuditStoreError> {
        let client = Arc::clone(&self.client);
        let sql = format!(
            "SELECT id, command, actor_id, timestamp, success, response FROM command_logs ORDER BY timestamp DESC LIMIT {limit}"
        );
        let rows: Vec<CommandRow> =
            Self::block_on(async move { client.query(&sql).fetch_all::<CommandRow>().await })?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    fn log_system(&self, entry: SystemLogEntry) -> Result<(), AuditStoreError> {
        let client = Arc::clone(&self.client);
        let row = SystemRow::from(entry);
        Self::block_on(async move {
            let mut inserter = client.insert::<SystemRow>("system_logs").await?;
            inserter.write(&row).await?;
            inserter.end().await?;
            Ok(())
        })
    }

    fn recent_system(
        &self,
        limit: usize,
        kind: Option<SystemLogKind>,
    ) -> Result<Vec<SystemLogEntry>, AuditStoreError> {
        let client = Arc::clone(&self.client);
        let filter = kind
            .map(|k| format!("WHERE kind = '{}'", k.as_str()))
            .unwrap_or_default();
        let sql = format!(
            "SELECT id, kind, message, timestamp, metadata FROM system_logs {filter} ORDER BY timestamp DESC LIMIT {limit}"
        );
        let rows: Vec<SystemRow> =
            Self::block_on(async move { client.query(&sql).fetch_all::<SystemRow>().await })?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    fn delete_system_before(&self, cutoff: DateTime<Utc>) -> Result<usize, AuditStoreError> {
        let nanos = cutoff.timestamp_nanos_opt().unwrap_or(0);
        let count_sql = format!("SELECT count() FROM system_logs WHERE timestamp < {nanos}");
        let delete_sql = format!("ALTER TABLE system_logs DELETE WHERE timestamp < {nanos}");

        let client = Arc::clone(&self.client);
        let removed: u64 = Self::block_on(async move {
            let removed = client.query(&count_sql).fetch_one::<u64>().await?;
            if removed > 0 {
                client.query(&delete_sql).execute().await?;
            }
            Ok(removed)
        })?;
        Ok(usize::try_from(removed).unwrap_or(usize::MAX))
    }

    fn count_system(&self) -> Result<usize, AuditStoreError> {
        let client = Arc::clone(&self.client);
        let count: u64 = Self::block_on(async move {
            client
                .query("SELECT count() FROM system_logs")
                .fetch_one::<u64>()
                .await
        })?;
        Ok(usize::try_from(count).unwrap_or(usize::MAX))
    }
}
