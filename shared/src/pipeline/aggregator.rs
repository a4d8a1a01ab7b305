//! Per-source sliding-window aggregation.

use super::buffer::EventBuffer;
use super::scheduler::SingleFlight;
use crate::config::WindowMode;
use crate::models::{ActivityMetric, MessageEvent, SourceId};
use crate::storage::{ActivityStore, ActivityStoreError};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// An event could not be buffered.
#[derive(Debug, Error)]
pub enum IngestError {
    /// No aggregator exists for the source.
    #[error("Unknown source: '{0}'")]
    UnknownSource(SourceId),

    /// The buffer lock was poisoned by a panicking holder.
    #[error("Event buffer for source '{0}' is unavailable")]
    BufferUnavailable(SourceId),
}

/// An aggregation tick did not produce a persisted metric.
#[derive(Debug, Error)]
pub enum AggregationError {
    /// A tick for this source was already running.
    #[error("Aggregation for source '{0}' skipped: previous tick still running")]
    Skipped(SourceId),

    /// The sink rejected the metric. The tick's data is dropped.
    #[error("Failed to persist activity for source '{source_id}': {source}")]
    Persistence {
        /// Source whose metric was dropped.
        source_id: SourceId,
        /// Underlying store error.
        #[source]
        source: ActivityStoreError,
    },

    /// The buffer lock was poisoned by a panicking holder.
    #[error("Event buffer for source '{0}' is unavailable")]
    BufferUnavailable(SourceId),
}

/// Outcome of a successful tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// The persisted metric.
    pub metric: ActivityMetric,
    /// Events evicted from the buffer during the tick.
    pub evicted: usize,
}

/// Computes and persists one source's activity metric per tick.
///
/// Owns the source's event buffer. Ticks are single-flight: a tick that
/// overlaps a running one is rejected with [`AggregationError::Skipped`].
#[derive(Debug)]
pub struct WindowAggregator {
    source_id: SourceId,
    window: WindowMode,
    buffer_retention: chrono::Duration,
    buffer: Mutex<EventBuffer>,
    flight: SingleFlight,
}

impl WindowAggregator {
    /// Creates an aggregator with an empty buffer.
    ///
    /// `buffer_retention` shorter than the window is raised to the window length.
    #[must_use]
    pub fn new(source_id: SourceId, window: WindowMode, buffer_retention: Duration) -> Self {
        let retention = buffer_retention.max(window.as_duration());
        Self {
            source_id,
            window,
            buffer_retention: chrono::Duration::from_std(retention)
                .unwrap_or(chrono::Duration::MAX),
            buffer: Mutex::new(EventBuffer::new()),
            flight: SingleFlight::new(),
        }
    }

    /// The aggregated source.
    #[must_use]
    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    /// Buffers an observed message.
    ///
    /// # Errors
    ///
    /// Returns `BufferUnavailable` if the buffer lock is poisoned.
    pub fn record(&self, event: MessageEvent) -> Result<(), IngestError> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| IngestError::BufferUnavailable(self.source_id.clone()))?;
        buffer.record(event);
        Ok(())
    }

    /// Number of currently buffered events.
    ///
    /// # Errors
    ///
    /// Returns `BufferUnavailable` if the buffer lock is poisoned.
    pub fn buffered(&self) -> Result<usize, IngestError> {
        let buffer = self
            .buffer
            .lock()
            .map_err(|_| IngestError::BufferUnavailable(self.source_id.clone()))?;
        Ok(buffer.len())
    }

    /// Timestamp of the oldest buffered event.
    ///
    /// # Errors
    ///
    /// Returns `BufferUnavailable` if the buffer lock is poisoned.
    pub fn oldest_buffered(&self) -> Result<Option<DateTime<Utc>>, IngestError> {
        let buffer = self
            .buffer
            .lock()
            .map_err(|_| IngestError::BufferUnavailable(self.source_id.clone()))?;
        Ok(buffer.oldest())
    }

    /// Aggregates the window ending at `now` and appends the metric to `store`.
    ///
    /// The buffer is trimmed to `now - buffer_retention` whether or not the
    /// store accepts the metric.
    ///
    /// # Errors
    ///
    /// Returns `Skipped` if a tick is already running, `Persistence` if the
    /// store rejects the metric, or `BufferUnavailable` if the buffer lock is
    /// poisoned.
    pub fn tick(
        &self,
        now: DateTime<Utc>,
        store: &dyn ActivityStore,
    ) -> Result<TickReport, AggregationError> {
        let Some(_permit) = self.flight.try_acquire() else {
            warn!(source_id = %self.source_id, "Aggregation tick overlapped a running tick");
            return Err(AggregationError::Skipped(self.source_id.clone()));
        };

        let window_start = now - chrono::Duration::seconds(i64::from(self.window.as_secs()));
        let (metric, evicted) = {
            let mut buffer = self
                .buffer
                .lock()
                .map_err(|_| AggregationError::BufferUnavailable(self.source_id.clone()))?;

            let window = buffer.snapshot(window_start, now);
            let messages = window.clone().count() as u64;
            let users = window
                .map(|e| e.user_id.as_str())
                .collect::<HashSet<_>>()
                .len() as u64;

            let metric = ActivityMetric::new(
                self.source_id.clone(),
                now,
                self.window.as_secs(),
                messages,
                users,
            );
            let cutoff = now
                .checked_sub_signed(self.buffer_retention)
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            let evicted = buffer.evict_before(cutoff);
            (metric, evicted)
        };

        store
            .append(metric.clone())
            .map_err(|source| AggregationError::Persistence {
                source_id: self.source_id.clone(),
                source,
            })?;

        debug!(
            source_id = %self.source_id,
            messages = metric.raw_message_count,
            active_users = metric.active_user_count,
            evicted,
            "Aggregation tick persisted"
        );

        Ok(TickReport { metric, evicted })
    }
}
