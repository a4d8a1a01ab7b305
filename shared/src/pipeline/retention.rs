//! Periodic deletion of expired aggregates and system logs.

use crate::config::{DataType, RetentionConfig};
use crate::models::{SystemLogEntry, SystemLogKind};
use crate::storage::{ActivityStore, ActivityStoreError, AuditStore, AuditStoreError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// A sweep failed part-way.
#[derive(Debug, Error)]
pub enum SweepError {
    /// Deleting activity metrics failed.
    #[error("Failed to sweep activity metrics: {0}")]
    Activity(#[from] ActivityStoreError),

    /// Deleting system logs failed.
    #[error("Failed to sweep system logs: {0}")]
    SystemLogs(#[from] AuditStoreError),
}

/// Rows removed by one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Activity metrics older than this were deleted.
    pub activity_cutoff: DateTime<Utc>,
    /// Activity metrics deleted.
    pub activity_metrics: usize,
    /// System logs older than this were deleted.
    pub system_logs_cutoff: DateTime<Utc>,
    /// System log entries deleted.
    pub system_logs: usize,
}

/// Deletes rows past their retention horizon.
pub struct RetentionSweeper {
    activity: Arc<dyn ActivityStore>,
    audit: Arc<dyn AuditStore>,
}

impl RetentionSweeper {
    /// Creates a sweeper over the given stores.
    #[must_use]
    pub fn new(activity: Arc<dyn ActivityStore>, audit: Arc<dyn AuditStore>) -> Self {
        Self { activity, audit }
    }

    /// Deletes expired rows as of `now` and records a `retention_sweep` entry.
    ///
    /// Running twice with the same inputs deletes nothing the second time.
    ///
    /// # Errors
    ///
    /// Returns an error if either delete fails. Nothing is retried.
    pub fn sweep(
        &self,
        config: &RetentionConfig,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, SweepError> {
        let activity_cutoff = config.get_policy(DataType::ActivityMetrics).cutoff(now);
        let system_logs_cutoff = config.get_policy(DataType::SystemLogs).cutoff(now);

        let activity_metrics = self.activity.delete_before(activity_cutoff)?;
        let system_logs = self.audit.delete_system_before(system_logs_cutoff)?;

        let report = SweepReport {
            activity_cutoff,
            activity_metrics,
            system_logs_cutoff,
            system_logs,
        };
        info!(activity_metrics, system_logs, "Retention sweep finished");

        let entry = SystemLogEntry::new(
            SystemLogKind::RetentionSweep,
            format!("Deleted {activity_metrics} activity metrics and {system_logs} system logs"),
        )
        .with_metadata(serde_json::to_string(&report).unwrap_or_default())
        .with_timestamp(now);
        if let Err(e) = self.audit.log_system(entry) {
            warn!(error = %e, "Failed to record retention sweep");
        }

        Ok(report)
    }
}
