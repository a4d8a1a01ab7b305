//! Activity data models.
//!
//! `MessageEvent` lives only inside the event buffer. `ActivityMetric` is the
//! persisted per-tick aggregate.

use super::SourceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single observed chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    /// When the message was observed.
    pub timestamp: DateTime<Utc>,
    /// Author of the message.
    pub user_id: String,
    /// Channel the message was posted in.
    pub channel_id: String,
}

impl MessageEvent {
    /// Creates a new message event.
    #[must_use]
    pub fn new(
        timestamp: DateTime<Utc>,
        user_id: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            user_id: user_id.into(),
            channel_id: channel_id.into(),
        }
    }
}

/// A persisted activity aggregate for one source and one tick.
///
/// `rate` is the number of messages observed during the
/// `interval_seconds`-long window ending at `timestamp`.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use shared::models::ActivityMetric;
///
/// let metric = ActivityMetric::new("snoot_palace", Utc::now(), 60, 10, 5);
/// assert_eq!(metric.raw_message_count, 10);
/// assert!(metric.active_user_count <= metric.raw_message_count);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityMetric {
    /// Unique row identifier.
    pub id: Uuid,
    /// Source this metric belongs to.
    pub source_id: SourceId,
    /// End of the aggregation window.
    pub timestamp: DateTime<Utc>,
    /// Length of the aggregation window in seconds.
    pub interval_seconds: u32,
    /// Messages per interval.
    pub rate: f64,
    /// Distinct authors in the window.
    pub active_user_count: u64,
    /// Messages in the window.
    pub raw_message_count: u64,
}

impl ActivityMetric {
    /// Creates a metric whose rate equals its raw message count.
    #[must_use]
    pub fn new(
        source_id: impl Into<SourceId>,
        timestamp: DateTime<Utc>,
        interval_seconds: u32,
        message_count: u64,
        active_user_count: u64,
    ) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let rate = message_count as f64;
        Self {
            id: Uuid::new_v4(),
            source_id: source_id.into(),
            timestamp,
            interval_seconds,
            rate,
            active_user_count,
            raw_message_count: message_count,
        }
    }

    /// Creates an all-zero metric for a window without activity.
    #[must_use]
    pub fn empty(
        source_id: impl Into<SourceId>,
        timestamp: DateTime<Utc>,
        interval_seconds: u32,
    ) -> Self {
        Self::new(source_id, timestamp, interval_seconds, 0, 0)
    }

    /// Returns true if the window saw no messages.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.raw_message_count == 0
    }
}
