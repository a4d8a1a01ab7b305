//! Bot command types.

use crate::query::Timeframe;
use serde::{Deserialize, Serialize};

/// Metric selected by the `compare` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareMetric {
    /// Raw message rate.
    Messages,
    /// Distinct active users.
    Users,
    /// Rate per member.
    PerCapita,
}

impl CompareMetric {
    /// Canonical argument spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Messages => "messages",
            Self::Users => "users",
            Self::PerCapita => "percapita",
        }
    }
}

impl std::fmt::Display for CompareMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed bot command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum BotCommand {
    /// Current per-capita comparison.
    Activity,
    /// Average and peak rates over a timeframe.
    History {
        /// Lookback, `24h` when omitted.
        timeframe: Timeframe,
    },
    /// Side-by-side comparison of one metric.
    Compare {
        /// Compared metric.
        metric: CompareMetric,
    },
    /// Health of the reporting processes.
    Status,
}

impl BotCommand {
    /// Command name without arguments.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::History { .. } => "history",
            Self::Compare { .. } => "compare",
            Self::Status => "status",
        }
    }
}

impl std::fmt::Display for BotCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Activity | Self::Status => f.write_str(self.name()),
            Self::History { timeframe } => write!(f, "history {timeframe}"),
            Self::Compare { metric } => write!(f, "compare {metric}"),
        }
    }
}
