//! Audit log models.
//!
//! Command and system log entries are write-once rows. They are never mutated
//! after insertion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

/// Kind of a system log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemLogKind {
    /// A bot process started.
    BotStarted,
    /// A bot process stopped.
    BotStopped,
    /// A bot process reported an error.
    BotError,
    /// A monitor connected to its source.
    MonitorConnected,
    /// A monitor lost its connection.
    MonitorDisconnected,
    /// A source exceeded the activity spike threshold.
    ActivitySpike,
    /// A bot command was executed.
    CommandExecuted,
    /// An aggregation tick could not be persisted.
    CalculationError,
    /// An aggregation tick overlapped a running tick and was skipped.
    AggregationSkipped,
    /// The streak leader changed.
    LeaderChanged,
    /// The retention sweeper ran.
    RetentionSweep,
}

impl SystemLogKind {
    /// Returns the wire name of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BotStarted => "bot_started",
            Self::BotStopped => "bot_stopped",
            Self::BotError => "bot_error",
            Self::MonitorConnected => "monitor_connected",
            Self::MonitorDisconnected => "monitor_disconnected",
            Self::ActivitySpike => "activity_spike",
            Self::CommandExecuted => "command_executed",
            Self::CalculationError => "calculation_error",
            Self::AggregationSkipped => "aggregation_skipped",
            Self::LeaderChanged => "leader_changed",
            Self::RetentionSweep => "retention_sweep",
        }
    }

    /// All kinds, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::BotStarted,
        Self::BotStopped,
        Self::BotError,
        Self::MonitorConnected,
        Self::MonitorDisconnected,
        Self::ActivitySpike,
        Self::CommandExecuted,
        Self::CalculationError,
        Self::AggregationSkipped,
        Self::LeaderChanged,
        Self::RetentionSweep,
    ];
}

impl std::fmt::Display for SystemLogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SystemLogKind {
    type Err = AuditValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| AuditValidationError::UnknownKind(s.to_string()))
    }
}

/// Errors that can occur during audit entry validation.
#[derive(Debug, Error)]
pub enum AuditValidationError {
    /// The system log kind is not known.
    #[error("Unknown system log kind: '{0}'")]
    UnknownKind(String),

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// A record of a bot command invocation.
///
/// # Example
///
/// ```
/// use shared::models::CommandLogEntry;
///
/// let entry = CommandLogEntry::new("activity", "user-1", true).with_response("ok");
/// assert!(entry.validate_entry().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CommandLogEntry {
    /// Unique row identifier.
    pub id: Uuid,

    /// The command that was invoked.
    #[validate(length(min = 1, message = "Command cannot be empty"))]
    pub command: String,

    /// The user that invoked the command.
    #[validate(length(min = 1, message = "Actor cannot be empty"))]
    pub actor_id: String,

    /// When the command was invoked.
    pub timestamp: DateTime<Utc>,

    /// Whether the command succeeded.
    pub success: bool,

    /// Response or error text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

impl CommandLogEntry {
    /// Creates a new command log entry with the current timestamp.
    #[must_use]
    pub fn new(command: impl Into<String>, actor_id: impl Into<String>, success: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            command: command.into(),
            actor_id: actor_id.into(),
            timestamp: Utc::now(),
            success,
            response: None,
        }
    }

    /// Sets the response text.
    #[must_use]
    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Validates the entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the command or actor is empty.
    pub fn validate_entry(&self) -> Result<(), AuditValidationError> {
        self.validate()?;
        Ok(())
    }
}

/// A record of a notable system event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SystemLogEntry {
    /// Unique row identifier.
    pub id: Uuid,

    /// What happened.
    pub kind: SystemLogKind,

    /// Human-readable description.
    #[validate(length(min = 1, message = "Message cannot be empty"))]
    pub message: String,

    /// When it happened.
    pub timestamp: DateTime<Utc>,

    /// Free-form detail (error text, rates, counts).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

impl SystemLogEntry {
    /// Creates a new system log entry with the current timestamp.
    #[must_use]
    pub fn new(kind: SystemLogKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            message: message.into(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    /// Sets the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Validates the entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is empty.
    pub fn validate_entry(&self) -> Result<(), AuditValidationError> {
        self.validate()?;
        Ok(())
    }
}
