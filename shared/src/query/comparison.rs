//! Per-capita comparison between the two monitored sources.
//!
//! This is the only place per-capita math lives. The comparison query and the
//! streak tracker both score sources through [`per_capita`] and [`Standing`].

use crate::models::{ActivityMetric, Source, SourceId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Floor applied to the denominator of the activity ratio.
pub const EPSILON: f64 = 1e-6;

/// Rate divided by member count, with the member count floored at one.
///
/// # Examples
///
/// ```
/// use shared::query::per_capita;
///
/// assert!((per_capita(10.0, 5000) - 0.002).abs() < 1e-12);
/// assert_eq!(per_capita(3.0, 0), 3.0);
/// ```
#[must_use]
pub fn per_capita(rate: f64, member_count: u32) -> f64 {
    rate / f64::from(member_count.max(1))
}

/// Which side of a comparison is ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Standing {
    /// The first source has the higher per-capita rate.
    FirstLeads,
    /// The second source has the higher per-capita rate.
    SecondLeads,
    /// Both per-capita rates are equal.
    Tied,
}

impl Standing {
    /// Compares two per-capita scores.
    #[must_use]
    pub fn of(first: f64, second: f64) -> Self {
        match first.total_cmp(&second) {
            Ordering::Greater => Self::FirstLeads,
            Ordering::Less => Self::SecondLeads,
            Ordering::Equal => Self::Tied,
        }
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceActivity {
    /// Source metadata, including the member count used for normalization.
    pub source: Source,
    /// Latest persisted metric.
    pub metric: ActivityMetric,
    /// `metric.rate / max(member_count, 1)`.
    pub per_capita: f64,
}

impl SourceActivity {
    /// Scores a source's latest metric.
    #[must_use]
    pub fn new(source: Source, metric: ActivityMetric) -> Self {
        let per_capita = per_capita(metric.rate, source.member_count);
        Self {
            source,
            metric,
            per_capita,
        }
    }
}

/// Result of comparing the latest metrics of two sources.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use shared::models::{ActivityMetric, Source};
/// use shared::query::Comparison;
///
/// let now = Utc::now();
/// let comparison = Comparison::compute(
///     Source::new("palace", "Snoot Palace", 150),
///     ActivityMetric::new("palace", now, 60, 10, 5),
///     Source::new("club", "Snoot Club", 5000),
///     ActivityMetric::new("club", now, 60, 10, 5),
/// );
/// assert!(comparison.source_a_leads);
/// assert!((comparison.ratio - 33.333).abs() < 0.01);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// First source.
    pub source_a: SourceActivity,
    /// Second source.
    pub source_b: SourceActivity,
    /// `per_capita_a / max(per_capita_b, EPSILON)`; exactly 1.0 when both are equal.
    pub ratio: f64,
    /// Relative standing of the two sources.
    pub standing: Standing,
    /// The leading source, absent on a tie.
    pub leader: Option<SourceId>,
    /// True when the first source leads.
    pub source_a_leads: bool,
    /// `round(100 * |ratio - 1|)`, read as "more active" when `source_a_leads`
    /// and "less active" otherwise.
    pub advantage_percent: u64,
}

impl Comparison {
    /// Compares two sources by their latest metrics.
    #[must_use]
    pub fn compute(
        source_a: Source,
        metric_a: ActivityMetric,
        source_b: Source,
        metric_b: ActivityMetric,
    ) -> Self {
        let a = SourceActivity::new(source_a, metric_a);
        let b = SourceActivity::new(source_b, metric_b);

        let standing = Standing::of(a.per_capita, b.per_capita);
        let ratio = if standing == Standing::Tied {
            1.0
        } else {
            a.per_capita / b.per_capita.max(EPSILON)
        };

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let advantage_percent = (100.0 * (ratio - 1.0).abs()).round() as u64;

        let leader = match standing {
            Standing::FirstLeads => Some(a.source.id.clone()),
            Standing::SecondLeads => Some(b.source.id.clone()),
            Standing::Tied => None,
        };

        Self {
            source_a_leads: standing == Standing::FirstLeads,
            source_a: a,
            source_b: b,
            ratio,
            standing,
            leader,
            advantage_percent,
        }
    }
}
