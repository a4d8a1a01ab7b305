//! Time ranges and named lookback timeframes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A range query was rejected at the query boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidTimeRange {
    /// The start lies after the end.
    #[error("Invalid time range: start {start} is after end {end}")]
    Inverted {
        /// Requested start.
        start: DateTime<Utc>,
        /// Requested end.
        end: DateTime<Utc>,
    },

    /// A bound could not be parsed.
    #[error("Invalid time range: cannot parse '{0}' as an RFC 3339 timestamp")]
    Malformed(String),

    /// A bound was not supplied.
    #[error("Invalid time range: missing '{0}' bound")]
    Missing(&'static str),
}

/// Closed time range; both bounds are inclusive.
///
/// Deserialization goes through [`TimeRange::new`], so `start <= end` holds
/// for every value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RangeBounds")]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

/// Unchecked wire form of [`TimeRange`].
#[derive(Deserialize)]
struct RangeBounds {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<RangeBounds> for TimeRange {
    type Error = InvalidTimeRange;

    fn try_from(bounds: RangeBounds) -> Result<Self, Self::Error> {
        Self::new(bounds.start, bounds.end)
    }
}

impl TimeRange {
    /// Creates a range.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTimeRange::Inverted` if `start > end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, InvalidTimeRange> {
        if start > end {
            return Err(InvalidTimeRange::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parses RFC 3339 bounds, as supplied by query strings.
    ///
    /// # Errors
    ///
    /// Returns an error if either bound is missing, unparsable, or the range is
    /// inverted.
    ///
    /// # Examples
    ///
    /// ```
    /// use shared::query::TimeRange;
    ///
    /// let range = TimeRange::parse(Some("2024-01-01T00:00:00Z"), Some("2024-01-02T00:00:00Z"));
    /// assert!(range.is_ok());
    ///
    /// let inverted = TimeRange::parse(Some("2024-01-02T00:00:00Z"), Some("2024-01-01T00:00:00Z"));
    /// assert!(inverted.is_err());
    /// ```
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, InvalidTimeRange> {
        let start = parse_bound(start.ok_or(InvalidTimeRange::Missing("start"))?)?;
        let end = parse_bound(end.ok_or(InvalidTimeRange::Missing("end"))?)?;
        Self::new(start, end)
    }

    /// The range covering `lookback` up to and including `end`.
    #[must_use]
    pub fn lookback(end: DateTime<Utc>, lookback: Duration) -> Self {
        Self {
            start: end - lookback,
            end,
        }
    }

    /// Inclusive start.
    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Inclusive end.
    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

fn parse_bound(raw: &str) -> Result<DateTime<Utc>, InvalidTimeRange> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| InvalidTimeRange::Malformed(raw.to_string()))
}

/// Named lookback used by the history command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Timeframe {
    /// Last hour.
    #[serde(rename = "1h")]
    OneHour,
    /// Last six hours.
    #[serde(rename = "6h")]
    SixHours,
    /// Last day.
    #[default]
    #[serde(rename = "24h")]
    OneDay,
    /// Last week.
    #[serde(rename = "7d")]
    SevenDays,
}

impl Timeframe {
    /// Fixed lookback duration.
    #[must_use]
    pub fn lookback(&self) -> Duration {
        match self {
            Self::OneHour => Duration::hours(1),
            Self::SixHours => Duration::hours(6),
            Self::OneDay => Duration::hours(24),
            Self::SevenDays => Duration::days(7),
        }
    }

    /// Short label (`1h`, `6h`, `24h`, `7d`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OneHour => "1h",
            Self::SixHours => "6h",
            Self::OneDay => "24h",
            Self::SevenDays => "7d",
        }
    }

    /// The range this timeframe covers, ending at `now`.
    #[must_use]
    pub fn range_ending(&self, now: DateTime<Utc>) -> TimeRange {
        TimeRange::lookback(now, self.lookback())
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1h" => Ok(Self::OneHour),
            "6h" => Ok(Self::SixHours),
            "24h" => Ok(Self::OneDay),
            "7d" => Ok(Self::SevenDays),
            other => Err(format!(
                "Unknown timeframe: '{other}'. Expected '1h', '6h', '24h', or '7d'"
            )),
        }
    }
}
