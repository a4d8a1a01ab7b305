//! Process liveness model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Reported state of a monitored process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    /// Connected and serving commands.
    Online,
    /// Stopped or disconnected.
    Offline,
    /// Connected and observing a source.
    Monitoring,
    /// Never reported.
    #[default]
    Unknown,
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
            Self::Monitoring => write!(f, "monitoring"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for ProcessStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            "monitoring" => Ok(Self::Monitoring),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("Unknown process status: '{other}'")),
        }
    }
}

impl ProcessStatus {
    /// Returns true for statuses that claim the process is up.
    #[must_use]
    pub fn claims_alive(self) -> bool {
        matches!(self, Self::Online | Self::Monitoring)
    }
}

/// Latest-wins status row for one process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct BotStatus {
    /// Process identifier.
    #[validate(length(min = 1, message = "Process id cannot be empty"))]
    pub id: String,

    /// Human-readable process name.
    #[validate(length(min = 1, message = "Process name cannot be empty"))]
    pub name: String,

    /// Reported status.
    pub status: ProcessStatus,

    /// When the status was last written.
    pub last_seen: DateTime<Utc>,
}

impl BotStatus {
    /// Creates a new status row.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        status: ProcessStatus,
        last_seen: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status,
            last_seen,
        }
    }

    /// Returns true if the row is older than `stale_after` at `now`.
    ///
    /// A stale row that still claims the process is alive should not be
    /// trusted by consumers.
    #[must_use]
    pub fn is_suspect(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        self.status.claims_alive() && now - self.last_seen > stale_after
    }
}

/// Consumer-side view of a status row with a staleness verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotStatusView {
    /// The stored row.
    #[serde(flatten)]
    pub status: BotStatus,
    /// True if the row claims liveness but has not been refreshed in time.
    pub suspect: bool,
}

impl BotStatusView {
    /// Judges a stored row against the heartbeat interval.
    ///
    /// Rows older than twice the heartbeat interval are suspect.
    #[must_use]
    pub fn judge(status: BotStatus, now: DateTime<Utc>, heartbeat_interval: Duration) -> Self {
        let stale_after = heartbeat_interval.checked_mul(2).unwrap_or(Duration::MAX);
        let suspect = status.is_suspect(now, stale_after);
        Self { status, suspect }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(minutes: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap() + Duration::minutes(minutes)
    }

    #[test]
    fn test_fresh_online_status_is_not_suspect() {
        let status = BotStatus::new("official_bot", "Official Bot", ProcessStatus::Online, at(0));
        assert!(!status.is_suspect(at(9), Duration::minutes(10)));
    }

    #[test]
    fn test_stale_online_status_is_suspect() {
        let status = BotStatus::new("official_bot", "Official Bot", ProcessStatus::Online, at(0));
        assert!(status.is_suspect(at(11), Duration::minutes(10)));
    }

    #[test]
    fn test_stale_offline_status_is_not_suspect() {
        let status = BotStatus::new("monitor_bot", "Monitor Bot", ProcessStatus::Offline, at(0));
        assert!(!status.is_suspect(at(60), Duration::minutes(10)));
    }

    #[test]
    fn test_view_uses_twice_the_heartbeat_interval() {
        let status = BotStatus::new("monitor_bot", "Monitor Bot", ProcessStatus::Monitoring, at(0));

        let fresh = BotStatusView::judge(status.clone(), at(9), Duration::minutes(5));
        assert!(!fresh.suspect);

        let stale = BotStatusView::judge(status, at(11), Duration::minutes(5));
        assert!(stale.suspect);
    }

    #[test]
    fn test_unbounded_heartbeat_never_marks_suspect() {
        let status = BotStatus::new("official_bot", "Official Bot", ProcessStatus::Online, at(0));
        let view = BotStatusView::judge(status, at(60 * 24 * 365), Duration::MAX);
        assert!(!view.suspect);
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            ProcessStatus::Online,
            ProcessStatus::Offline,
            ProcessStatus::Monitoring,
            ProcessStatus::Unknown,
        ] {
            assert_eq!(status.to_string().parse::<ProcessStatus>().unwrap(), status);
        }
        assert!("sleeping".parse::<ProcessStatus>().is_err());
    }

    #[test]
    fn test_view_serialization_is_flat() {
        let status = BotStatus::new("official_bot", "Official Bot", ProcessStatus::Online, at(0));
        let view = BotStatusView::judge(status, at(1), Duration::minutes(5));
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["id"], "official_bot");
        assert_eq!(json["status"], "online");
        assert_eq!(json["suspect"], false);
    }
}
