//! Read-side queries over the persisted activity series.

use super::{Comparison, HistorySummary, InvalidTimeRange, SourceHistory, TimeRange, Timeframe};
use crate::models::{ActivityMetric, BotStatus, BotStatusView, Source, SourceId};
use crate::storage::{ActivityStore, ActivityStoreError, StateStore, StateStoreError};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by activity queries.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The source is not registered.
    #[error("Unknown source: '{0}'")]
    UnknownSource(SourceId),

    /// The source has no persisted metrics yet.
    #[error("No activity recorded for source '{0}'")]
    NoData(SourceId),

    /// A comparison needs data from both sources.
    #[error("Comparison not ready: no data for {}", join_ids(.missing))]
    NotReady {
        /// Sources without any persisted metric.
        missing: Vec<SourceId>,
    },

    /// The requested range was rejected.
    #[error(transparent)]
    InvalidTimeRange(#[from] InvalidTimeRange),

    /// The activity store failed.
    #[error(transparent)]
    Activity(#[from] ActivityStoreError),

    /// The state store failed.
    #[error(transparent)]
    State(#[from] StateStoreError),
}

fn join_ids(ids: &[SourceId]) -> String {
    ids.iter()
        .map(SourceId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Query service shared by the HTTP layer and the command executor.
#[derive(Clone)]
pub struct ActivityQueries {
    activity: Arc<dyn ActivityStore>,
    state: Arc<dyn StateStore>,
    pair: (SourceId, SourceId),
    heartbeat_interval: Duration,
}

impl ActivityQueries {
    /// Creates a query service comparing `pair.0` against `pair.1`.
    #[must_use]
    pub fn new(
        activity: Arc<dyn ActivityStore>,
        state: Arc<dyn StateStore>,
        pair: (SourceId, SourceId),
        heartbeat_interval: Duration,
    ) -> Self {
        Self {
            activity,
            state,
            pair,
            heartbeat_interval,
        }
    }

    /// The compared pair of sources.
    #[must_use]
    pub fn pair(&self) -> &(SourceId, SourceId) {
        &self.pair
    }

    fn registered(&self, id: &SourceId) -> Result<Source, QueryError> {
        self.state
            .source(id)?
            .ok_or_else(|| QueryError::UnknownSource(id.clone()))
    }

    /// Latest metric of a source.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSource` or `NoData` when there is nothing to return.
    pub fn latest(&self, id: &SourceId) -> Result<ActivityMetric, QueryError> {
        self.registered(id)?;
        self.activity
            .latest(id)?
            .ok_or_else(|| QueryError::NoData(id.clone()))
    }

    /// Metrics of a source inside `range`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is unknown or the store fails.
    pub fn range(
        &self,
        id: &SourceId,
        range: TimeRange,
    ) -> Result<Vec<ActivityMetric>, QueryError> {
        self.registered(id)?;
        Ok(self.activity.range(id, range)?)
    }

    /// Up to `limit` metrics of a source, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is unknown or the store fails.
    pub fn recent(&self, id: &SourceId, limit: usize) -> Result<Vec<ActivityMetric>, QueryError> {
        self.registered(id)?;
        Ok(self.activity.recent(id, limit)?)
    }

    /// Compares the latest metrics of the configured pair.
    ///
    /// # Errors
    ///
    /// Returns `NotReady` listing every source without data.
    pub fn comparison(&self) -> Result<Comparison, QueryError> {
        let (id_a, id_b) = &self.pair;
        let source_a = self.registered(id_a)?;
        let source_b = self.registered(id_b)?;

        match (self.activity.latest(id_a)?, self.activity.latest(id_b)?) {
            (Some(a), Some(b)) => Ok(Comparison::compute(source_a, a, source_b, b)),
            (a, b) => {
                let missing = [(a.is_none(), id_a), (b.is_none(), id_b)]
                    .into_iter()
                    .filter_map(|(absent, id)| absent.then(|| id.clone()))
                    .collect();
                Err(QueryError::NotReady { missing })
            }
        }
    }

    /// Average and peak rates of the pair over `timeframe` ending at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if a source is unknown or the store fails.
    pub fn history(
        &self,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> Result<HistorySummary, QueryError> {
        let range = timeframe.range_ending(now);
        let summarize = |id: &SourceId| -> Result<SourceHistory, QueryError> {
            let source = self.registered(id)?;
            let metrics = self.activity.range(id, range)?;
            Ok(SourceHistory::summarize(&source, &metrics))
        };

        Ok(HistorySummary {
            timeframe,
            source_a: summarize(&self.pair.0)?,
            source_b: summarize(&self.pair.1)?,
        })
    }

    /// Every status row with its staleness verdict at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the state store fails.
    pub fn bot_statuses(
        &self,
        now: DateTime<Utc>,
    ) -> Result<BTreeMap<String, BotStatusView>, QueryError> {
        Ok(self
            .state
            .statuses()?
            .into_iter()
            .map(|(id, status)| (id, BotStatusView::judge(status, now, self.heartbeat_interval)))
            .collect())
    }

    /// Inserts or replaces a status row.
    ///
    /// # Errors
    ///
    /// Returns an error if the state store fails.
    pub fn upsert_bot_status(&self, status: BotStatus) -> Result<(), QueryError> {
        Ok(self.state.upsert_status(status)?)
    }
}
