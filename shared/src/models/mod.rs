//! Data models for the Rivalwatch activity monitor.
//!
//! This module contains sources, activity aggregates, audit entries, process
//! liveness, and streak state.

pub mod activity;
pub mod audit;
pub mod bot_status;
pub mod source;
pub mod streak;

pub use activity::{ActivityMetric, MessageEvent};
pub use audit::{AuditValidationError, CommandLogEntry, SystemLogEntry, SystemLogKind};
pub use bot_status::{BotStatus, BotStatusView, ProcessStatus};
pub use source::{Source, SourceId};
pub use streak::{Leadership, StreakState};
