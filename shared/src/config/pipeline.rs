//! Aggregation pipeline configuration.
//!
//! Defines the window length used for rate metrics and the schedule of the
//! background tasks (aggregation, heartbeat, retention sweep).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest accepted interval for any scheduled task or buffer horizon (one year).
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Window length used to compute activity rates.
///
/// One mode is chosen per deployment. Every persisted metric records the
/// window length it was computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WindowMode {
    /// Messages per minute.
    #[default]
    PerMinute,
    /// Messages per hour.
    PerHour,
}

impl WindowMode {
    /// Returns the duration of this window.
    #[must_use]
    pub const fn as_duration(&self) -> Duration {
        match self {
            Self::PerMinute => Duration::from_secs(60),
            Self::PerHour => Duration::from_secs(3600),
        }
    }

    /// Returns the window length in seconds.
    #[must_use]
    pub const fn as_secs(&self) -> u32 {
        match self {
            Self::PerMinute => 60,
            Self::PerHour => 3600,
        }
    }

    /// Returns the unit label used in rendered rates.
    #[must_use]
    pub const fn unit_label(&self) -> &'static str {
        match self {
            Self::PerMinute => "msg/min",
            Self::PerHour => "msg/hour",
        }
    }
}

impl std::fmt::Display for WindowMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PerMinute => write!(f, "per_minute"),
            Self::PerHour => write!(f, "per_hour"),
        }
    }
}

impl std::str::FromStr for WindowMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "per_minute" | "minute" | "60" => Ok(Self::PerMinute),
            "per_hour" | "hour" | "3600" => Ok(Self::PerHour),
            other => Err(format!("Unknown window mode: '{other}'")),
        }
    }
}

/// Schedule and thresholds for the aggregation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Window length for rate metrics.
    pub window: WindowMode,
    /// How often aggregation ticks run.
    pub tick_interval: Duration,
    /// How long buffered events are kept. Must cover at least one window.
    pub buffer_retention: Duration,
    /// How often the liveness reporter writes a heartbeat.
    pub heartbeat_interval: Duration,
    /// How often the retention sweeper runs.
    pub sweep_interval: Duration,
    /// Rate above which an activity spike is logged.
    pub spike_threshold: u64,
}

impl PipelineConfig {
    /// Validates the pipeline configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Any interval is zero or longer than [`MAX_INTERVAL`]
    /// - The buffer retention is shorter than the window
    pub fn validate(&self) -> Result<(), String> {
        check_interval("Tick interval", self.tick_interval)?;
        check_interval("Heartbeat interval", self.heartbeat_interval)?;
        check_interval("Sweep interval", self.sweep_interval)?;
        check_interval("Buffer retention", self.buffer_retention)?;
        if self.buffer_retention < self.window.as_duration() {
            return Err(format!(
                "Buffer retention ({}s) must be at least the window length ({}s)",
                self.buffer_retention.as_secs(),
                self.window.as_secs()
            ));
        }
        Ok(())
    }

    /// Heartbeat interval as a chrono duration, for staleness checks.
    #[must_use]
    pub fn heartbeat_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.heartbeat_interval).unwrap_or(chrono::Duration::MAX)
    }
}

fn check_interval(name: &str, interval: Duration) -> Result<(), String> {
    if interval.is_zero() {
        return Err(format!("{name} must be greater than zero"));
    }
    if interval > MAX_INTERVAL {
        return Err(format!(
            "{name} ({}s) cannot exceed {}s",
            interval.as_secs(),
            MAX_INTERVAL.as_secs()
        ));
    }
    Ok(())
}

impl Default for PipelineConfig {
    /// Per-minute windows ticked every minute, five minutes of buffer,
    /// five-minute heartbeats, and a daily sweep.
    fn default() -> Self {
        Self {
            window: WindowMode::PerMinute,
            tick_interval: Duration::from_secs(60),
            buffer_retention: Duration::from_secs(300),
            heartbeat_interval: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(86_400),
            spike_threshold: 15,
        }
    }
}
