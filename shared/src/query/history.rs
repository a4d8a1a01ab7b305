//! Historical summaries over a named timeframe.

use super::Timeframe;
use crate::models::{ActivityMetric, Source, SourceId};
use serde::{Deserialize, Serialize};

/// Average and peak rate of one source over a timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceHistory {
    /// Summarized source.
    pub source_id: SourceId,
    /// Source display name.
    pub display_name: String,
    /// Mean rate over the data points, zero when there are none.
    pub average_rate: f64,
    /// Highest rate seen, zero when there are none.
    pub peak_rate: f64,
    /// Number of persisted metrics in the timeframe.
    pub data_points: usize,
}

impl SourceHistory {
    /// Summarizes `metrics` for `source`.
    #[must_use]
    pub fn summarize(source: &Source, metrics: &[ActivityMetric]) -> Self {
        let peak_rate = metrics.iter().map(|m| m.rate).fold(0.0, f64::max);
        let average_rate = if metrics.is_empty() {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let n = metrics.len() as f64;
            metrics.iter().map(|m| m.rate).sum::<f64>() / n
        };

        Self {
            source_id: source.id.clone(),
            display_name: source.display_name.clone(),
            average_rate,
            peak_rate,
            data_points: metrics.len(),
        }
    }
}

/// History of both sources over one timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    /// Summarized timeframe.
    pub timeframe: Timeframe,
    /// First source.
    pub source_a: SourceHistory,
    /// Second source.
    pub source_b: SourceHistory,
}

impl HistorySummary {
    /// Returns true if neither source has data in the timeframe.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source_a.data_points == 0 && self.source_b.data_points == 0
    }
}
