//! Streak (leadership) state model.

use super::SourceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which source currently leads, if any.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "state", content = "source_id", rename_all = "snake_case")]
pub enum Leadership {
    /// No source has led yet.
    #[default]
    NoLeader,
    /// The given source leads.
    Leader(SourceId),
}

impl Leadership {
    /// Returns the leading source, if any.
    #[must_use]
    pub fn leader(&self) -> Option<&SourceId> {
        match self {
            Self::NoLeader => None,
            Self::Leader(id) => Some(id),
        }
    }
}

/// Singleton streak state.
///
/// Only the streak tracker mutates this value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    /// Current leadership.
    pub leadership: Leadership,
    /// When the current streak began.
    pub streak_started_at: DateTime<Utc>,
    /// When consumers last announced this streak.
    pub last_notification_at: Option<DateTime<Utc>>,
}

impl StreakState {
    /// Creates the bootstrap state: no leader, started at `now`.
    #[must_use]
    pub fn bootstrap(now: DateTime<Utc>) -> Self {
        Self {
            leadership: Leadership::NoLeader,
            streak_started_at: now,
            last_notification_at: None,
        }
    }

    /// Returns the current leader, if any.
    #[must_use]
    pub fn current_leader(&self) -> Option<&SourceId> {
        self.leadership.leader()
    }

    /// Returns how long the current streak has lasted at `now`.
    #[must_use]
    pub fn duration_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.streak_started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_has_no_leader() {
        let now = Utc::now();
        let state = StreakState::bootstrap(now);
        assert_eq!(state.leadership, Leadership::NoLeader);
        assert!(state.current_leader().is_none());
        assert_eq!(state.streak_started_at, now);
        assert!(state.last_notification_at.is_none());
    }

    #[test]
    fn test_leadership_serialization() {
        let json = serde_json::to_value(Leadership::Leader(SourceId::new("a"))).unwrap();
        assert_eq!(json["state"], "leader");
        assert_eq!(json["source_id"], "a");

        let json = serde_json::to_value(Leadership::NoLeader).unwrap();
        assert_eq!(json["state"], "no_leader");
    }

    #[test]
    fn test_duration_at() {
        let start = Utc::now();
        let state = StreakState::bootstrap(start);
        assert_eq!(
            state.duration_at(start + chrono::Duration::minutes(5)),
            chrono::Duration::minutes(5)
        );
    }
}
