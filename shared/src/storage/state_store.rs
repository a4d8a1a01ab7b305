//! Mutable monitor state: the source registry, bot status rows and the
//! streak singleton.
//!
//! This state is small and rebuilt at bootstrap, so only an in-memory
//! implementation exists.

use crate::models::{BotStatus, Source, SourceId, StreakState};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StateStoreError {
    /// Failed to acquire lock on the store.
    #[error("Failed to acquire lock on state store")]
    LockError,

    /// The source is not registered.
    #[error("Unknown source: '{0}'")]
    UnknownSource(SourceId),
}

/// Trait for monitor state storage.
pub trait StateStore: Send + Sync {
    /// Returns a registered source.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    fn source(&self, id: &SourceId) -> Result<Option<Source>, StateStoreError>;

    /// Returns every registered source in registration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    fn sources(&self) -> Result<Vec<Source>, StateStoreError>;

    /// Updates the member count of a registered source.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSource` if the source is not registered.
    fn update_member_count(&self, id: &SourceId, member_count: u32)
        -> Result<Source, StateStoreError>;

    /// Inserts or replaces the status row for `status.id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    fn upsert_status(&self, status: BotStatus) -> Result<(), StateStoreError>;

    /// Returns the status row for one process.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    fn status(&self, id: &str) -> Result<Option<BotStatus>, StateStoreError>;

    /// Returns every status row keyed by process id.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    fn statuses(&self) -> Result<BTreeMap<String, BotStatus>, StateStoreError>;

    /// Returns the current streak state.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    fn streak(&self) -> Result<StreakState, StateStoreError>;

    /// Replaces the streak state.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    fn put_streak(&self, state: StreakState) -> Result<(), StateStoreError>;
}

/// In-memory state store.
#[derive(Debug)]
pub struct InMemoryStateStore {
    sources: Arc<RwLock<Vec<Source>>>,
    statuses: Arc<RwLock<HashMap<String, BotStatus>>>,
    streak: Arc<RwLock<StreakState>>,
}

impl InMemoryStateStore {
    /// Creates a store with the given sources and a bootstrap streak started at `now`.
    #[must_use]
    pub fn new(sources: Vec<Source>, now: DateTime<Utc>) -> Self {
        Self {
            sources: Arc::new(RwLock::new(sources)),
            statuses: Arc::new(RwLock::new(HashMap::new())),
            streak: Arc::new(RwLock::new(StreakState::bootstrap(now))),
        }
    }
}

impl StateStore for InMemoryStateStore {
    fn source(&self, id: &SourceId) -> Result<Option<Source>, StateStoreError> {
        let sources = self
            .sources
            .read()
            .map_err(|_| StateStoreError::LockError)?;
        Ok(sources.iter().find(|s| &s.id == id).cloned())
    }

    fn sources(&self) -> Result<Vec<Source>, StateStoreError> {
        let sources = self
            .sources
            .read()
            .map_err(|_| StateStoreError::LockError)?;
        Ok(sources.clone())
    }

    fn update_member_count(
        &self,
        id: &SourceId,
        member_count: u32,
    ) -> Result<Source, StateStoreError> {
        let mut sources = self
            .sources
            .write()
            .map_err(|_| StateStoreError::LockError)?;
        let source = sources
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| StateStoreError::UnknownSource(id.clone()))?;
        source.member_count = member_count;
        Ok(source.clone())
    }

    fn upsert_status(&self, status: BotStatus) -> Result<(), StateStoreError> {
        let mut statuses = self
            .statuses
            .write()
            .map_err(|_| StateStoreError::LockError)?;
        statuses.insert(status.id.clone(), status);
        Ok(())
    }

    fn status(&self, id: &str) -> Result<Option<BotStatus>, StateStoreError> {
        let statuses = self
            .statuses
            .read()
            .map_err(|_| StateStoreError::LockError)?;
        Ok(statuses.get(id).cloned())
    }

    fn statuses(&self) -> Result<BTreeMap<String, BotStatus>, StateStoreError> {
        let statuses = self
            .statuses
            .read()
            .map_err(|_| StateStoreError::LockError)?;
        Ok(statuses
            .iter()
            .map(|(id, status)| (id.clone(), status.clone()))
            .collect())
    }

    fn streak(&self) -> Result<StreakState, StateStoreError> {
        let streak = self
            .streak
            .read()
            .map_err(|_| StateStoreError::LockError)?;
        Ok(streak.clone())
    }

    fn put_streak(&self, state: StreakState) -> Result<(), StateStoreError> {
        let mut streak = self
            .streak
            .write()
            .map_err(|_| StateStoreError::LockError)?;
        *streak = state;
        Ok(())
    }
}
