//! Heartbeats and lifecycle reporting for this process.

use crate::models::{BotStatus, ProcessStatus, SystemLogEntry, SystemLogKind};
use crate::storage::{AuditStore, StateStore, StateStoreError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// Process lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The process started.
    Started,
    /// The process is stopping.
    Stopped,
    /// The monitor connected to its source.
    Connected,
    /// The monitor lost its connection.
    Disconnected,
}

impl LifecycleEvent {
    fn log_kind(self) -> SystemLogKind {
        match self {
            Self::Started => SystemLogKind::BotStarted,
            Self::Stopped => SystemLogKind::BotStopped,
            Self::Connected => SystemLogKind::MonitorConnected,
            Self::Disconnected => SystemLogKind::MonitorDisconnected,
        }
    }

    fn is_up(self) -> bool {
        matches!(self, Self::Started | Self::Connected)
    }
}

/// Writes this process's status row.
///
/// The reporter only writes; staleness is judged by readers.
pub struct LivenessReporter {
    process_id: String,
    process_name: String,
    active_status: ProcessStatus,
    state: Arc<dyn StateStore>,
    audit: Arc<dyn AuditStore>,
}

impl LivenessReporter {
    /// Creates a reporter that reports `active_status` while up.
    #[must_use]
    pub fn new(
        process_id: impl Into<String>,
        process_name: impl Into<String>,
        active_status: ProcessStatus,
        state: Arc<dyn StateStore>,
        audit: Arc<dyn AuditStore>,
    ) -> Self {
        Self {
            process_id: process_id.into(),
            process_name: process_name.into(),
            active_status,
            state,
            audit,
        }
    }

    fn write(&self, status: ProcessStatus, now: DateTime<Utc>) -> Result<(), StateStoreError> {
        self.state.upsert_status(BotStatus::new(
            self.process_id.clone(),
            self.process_name.clone(),
            status,
            now,
        ))
    }

    /// Refreshes `last_seen` without changing the reported status.
    ///
    /// A process that has not reported yet is written with its active status.
    ///
    /// # Errors
    ///
    /// Returns an error if the state store fails.
    pub fn heartbeat(&self, now: DateTime<Utc>) -> Result<(), StateStoreError> {
        let status = self
            .state
            .status(&self.process_id)?
            .map_or(self.active_status, |row| row.status);
        self.write(status, now)
    }

    /// Records a lifecycle transition and its system log entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the state store fails.
    pub fn lifecycle(&self, event: LifecycleEvent, now: DateTime<Utc>) -> Result<(), StateStoreError> {
        let status = if event.is_up() {
            self.active_status
        } else {
            ProcessStatus::Offline
        };
        self.write(status, now)?;
        info!(process_id = %self.process_id, %status, ?event, "Lifecycle event");

        let kind = event.log_kind();
        let entry = SystemLogEntry::new(kind, format!("{} {}", self.process_name, describe(event)))
            .with_timestamp(now);
        if let Err(e) = self.audit.log_system(entry) {
            warn!(error = %e, kind = %kind, "Failed to record lifecycle event");
        }
        Ok(())
    }
}

fn describe(event: LifecycleEvent) -> &'static str {
    match event {
        LifecycleEvent::Started => "started",
        LifecycleEvent::Stopped => "stopped",
        LifecycleEvent::Connected => "connected",
        LifecycleEvent::Disconnected => "disconnected",
    }
}
