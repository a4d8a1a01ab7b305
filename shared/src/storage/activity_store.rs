//! Activity metric storage trait and implementations.
//!
//! Provides the `ActivityStore` trait, the persistence sink for aggregator
//! output, with an in-memory implementation for development and testing and a
//! `ClickHouse` implementation for durable storage.
//!
//! Rows are append-only and keyed by `(source_id, timestamp)`. Each source's
//! series must stay ordered by timestamp and must not mix window lengths.

use crate::models::{ActivityMetric, SourceId};
use crate::query::TimeRange;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Errors that can occur during activity store operations.
#[derive(Debug, Error)]
pub enum ActivityStoreError {
    /// Failed to acquire lock on the store.
    #[error("Failed to acquire lock on activity store")]
    LockError,

    /// The metric is older than the newest stored metric for its source.
    #[error("Out-of-order metric for source '{source_id}': {timestamp} is before {latest}")]
    OutOfOrder {
        /// Source of the rejected metric.
        source_id: SourceId,
        /// Timestamp of the rejected metric.
        timestamp: DateTime<Utc>,
        /// Timestamp of the newest stored metric.
        latest: DateTime<Utc>,
    },

    /// The metric uses a different window length than the source's history.
    #[error(
        "Interval mismatch for source '{source_id}': got {got}s, history uses {expected}s"
    )]
    IntervalMismatch {
        /// Source of the rejected metric.
        source_id: SourceId,
        /// Window length of the stored history.
        expected: u32,
        /// Window length of the rejected metric.
        got: u32,
    },

    /// Generic storage error.
    #[error("Storage error: {0}")]
    StorageError(String),
}

/// Checks that `metric` may follow `latest` in its source's series.
fn check_append(
    latest: Option<&ActivityMetric>,
    metric: &ActivityMetric,
) -> Result<(), ActivityStoreError> {
    let Some(latest) = latest else {
        return Ok(());
    };
    if metric.timestamp < latest.timestamp {
        return Err(ActivityStoreError::OutOfOrder {
            source_id: metric.source_id.clone(),
            timestamp: metric.timestamp,
            latest: latest.timestamp,
        });
    }
    if metric.interval_seconds != latest.interval_seconds {
        return Err(ActivityStoreError::IntervalMismatch {
            source_id: metric.source_id.clone(),
            expected: latest.interval_seconds,
            got: metric.interval_seconds,
        });
    }
    Ok(())
}

/// Trait for activity metric storage implementations.
///
/// Implementations must be thread-safe (Send + Sync) since independent
/// sources append concurrently.
pub trait ActivityStore: Send + Sync {
    /// Appends a metric to its source's series.
    ///
    /// # Errors
    ///
    /// Returns an error if the metric breaks the series ordering, mixes
    /// window lengths, or the storage operation fails.
    fn append(&self, metric: ActivityMetric) -> Result<(), ActivityStoreError>;

    /// Returns the most recent metric for a source.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn latest(&self, source_id: &SourceId) -> Result<Option<ActivityMetric>, ActivityStoreError>;

    /// Returns a source's metrics inside `range`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn range(
        &self,
        source_id: &SourceId,
        range: TimeRange,
    ) -> Result<Vec<ActivityMetric>, ActivityStoreError>;

    /// Returns up to `limit` of a source's metrics, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn recent(
        &self,
        source_id: &SourceId,
        limit: usize,
    ) -> Result<Vec<ActivityMetric>, ActivityStoreError>;

    /// Deletes every metric older than `cutoff` and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete operation fails.
    fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<usize, ActivityStoreError>;

    /// Returns the total number of metrics in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the count operation fails.
    fn count(&self) -> Result<usize, ActivityStoreError>;

    /// Clears all metrics from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the clear operation fails.
    fn clear(&self) -> Result<(), ActivityStoreError>;
}

/// In-memory activity store implementation.
///
/// Each source's series is a vector kept in timestamp order, so `latest` is
/// O(1) and `range` is a binary search.
#[derive(Debug, Default)]
pub struct InMemoryActivityStore {
    series: Arc<RwLock<HashMap<SourceId, Vec<ActivityMetric>>>>,
}

impl InMemoryActivityStore {
    /// Creates a new empty in-memory activity store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            series: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Creates a new in-memory activity store wrapped in an Arc.
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl ActivityStore for InMemoryActivityStore {
    fn append(&self, metric: ActivityMetric) -> Result<(), ActivityStoreError> {
        let mut series = self
            .series
            .write()
            .map_err(|_| ActivityStoreError::LockError)?;
        let entries = series.entry(metric.source_id.clone()).or_default();
        check_append(entries.last(), &metric)?;
        entries.push(metric);
        Ok(())
    }

    fn latest(&self, source_id: &SourceId) -> Result<Option<ActivityMetric>, ActivityStoreError> {
        let series = self
            .series
            .read()
            .map_err(|_| ActivityStoreError::LockError)?;
        Ok(series.get(source_id).and_then(|s| s.last()).cloned())
    }

    fn range(
        &self,
        source_id: &SourceId,
        range: TimeRange,
    ) -> Result<Vec<ActivityMetric>, ActivityStoreError> {
        let series = self
            .series
            .read()
            .map_err(|_| ActivityStoreError::LockError)?;
        let Some(entries) = series.get(source_id) else {
            return Ok(Vec::new());
        };

        let lo = entries.partition_point(|m| m.timestamp < range.start());
        let hi = entries.partition_point(|m| m.timestamp <= range.end());
        Ok(entries[lo..hi.max(lo)].to_vec())
    }

    fn recent(
        &self,
        source_id: &SourceId,
        limit: usize,
    ) -> Result<Vec<ActivityMetric>, ActivityStoreError> {
        let series = self
            .series
            .read()
            .map_err(|_| ActivityStoreError::LockError)?;
        Ok(series
            .get(source_id)
            .map(|entries| entries.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<usize, ActivityStoreError> {
        let mut series = self
            .series
            .write()
            .map_err(|_| ActivityStoreError::LockError)?;

        let mut removed = 0;
        for entries in series.values_mut() {
            let expired = entries.partition_point(|m| m.timestamp < cutoff);
            entries.drain(..expired);
            removed += expired;
        }
        Ok(removed)
    }

    fn count(&self) -> Result<usize, ActivityStoreError> {
        let series = self
            .series
            .read()
            .map_err(|_| ActivityStoreError::LockError)?;
        Ok(series.values().map(Vec::len).sum())
    }

    fn clear(&self) -> Result<(), ActivityStoreError> {
        let mut series = self
            .series
            .write()
            .map_err(|_| ActivityStoreError::LockError)?;
        series.clear();
        Ok(())
    }
}

/// Row layout of the `activity_metrics` table.
#[derive(clickhouse::Row, serde::Serialize, serde::Deserialize)]
struct ActivityRow {
    id: String,
    source_id: String,
    timestamp: i64,
    interval_seconds: u32,
    rate: f64,
    active_user_count: u64,
    raw_message_count: u64,
}

impl From<ActivityMetric> for ActivityRow {
    fn from(metric: ActivityMetric) -> Self {
        Self {
            id: metric.id.to_string(),
            source_id: metric.source_id.to_string(),
            timestamp: metric.timestamp.timestamp_nanos_opt().unwrap_or(0),
            interval_seconds: metric.interval_seconds,
            rate: metric.rate,
            active_user_count: metric.active_user_count,
            raw_message_count: metric.raw_message_count,
        }
    }
}

impl From<ActivityRow> for ActivityMetric {
    fn from(row: ActivityRow) -> Self {
        Self {
            id: row.id.parse().unwrap_or_default(),
            source_id: SourceId::new(row.source_id),
            timestamp: DateTime::from_timestamp_nanos(row.timestamp),
            interval_seconds: row.interval_seconds,
            rate: row.rate,
            active_user_count: row.active_user_count,
            raw_message_count: row.raw_message_count,
        }
    }
}

const ACTIVITY_COLUMNS: &str =
    "id, source_id, timestamp, interval_seconds, rate, active_user_count, raw_message_count";

/// `ClickHouse`-backed activity store implementation.
///
/// Stores metrics in the `activity_metrics` table, ordered by
/// `(source_id, timestamp)`.
#[derive(Clone)]
pub struct ClickHouseActivityStore {
    client: Arc<clickhouse::Client>,
}

impl ClickHouseActivityStore {
    /// Creates a new `ClickHouse` activity store with the given client.
    #[must_use]
    pub fn new(client: Arc<clickhouse::Client>) -> Self {
        Self { client }
    }

    /// Creates a new `ClickHouse` activity store wrapped in an Arc.
    #[must_use]
    pub fn new_shared(client: Arc<clickhouse::Client>) -> Arc<Self> {
        Arc::new(Self::new(client))
    }

    /// Helper to execute async operations synchronously.
    fn block_on<F, T>(future: F) -> Result<T, ActivityStoreError>
    where
        F: std::future::Future<Output = Result<T, clickhouse::error::Error>>,
    {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current()
                .block_on(future)
                .map_err(|e| ActivityStoreError::StorageError(e.to_string()))
        })
    }

    fn escape(value: &str) -> String {
        value.replace('\'', "''")
    }

    fn fetch(&self, sql: String) -> Result<Vec<ActivityMetric>, ActivityStoreError> {
        let client = Arc::clone(&self.client);
        let rows: Vec<ActivityRow> =
            Self::block_on(async move { client.query(&sql).fetch_all::<ActivityRow>().await })?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

impl ActivityStore for ClickHouseActivityStore {
    fn append(&self, metric: ActivityMetric) -> Result<(), ActivityStoreError> {
        let latest = self.latest(&metric.source_id)?;
        check_append(latest.as_ref(), &metric)?;

        let client = Arc::clone(&self.client);
        let row = ActivityRow::from(metric);
        Self::block_on(async move {
            let mut inserter = client.insert::<ActivityRow>("activity_metrics").await?;
            inserter.write(&row).await?;
            inserter.end().await?;
            Ok(())
        })
    }

    fn latest(&self, source_id: &SourceId) -> Result<Option<ActivityMetric>, ActivityStoreError> {
        let sql = format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activity_metrics WHERE source_id = '{}' ORDER BY timestamp DESC LIMIT 1",
            Self::escape(source_id.as_str())
        );
        Ok(self.fetch(sql)?.into_iter().next())
    }

    fn range(
        &self,
        source_id: &SourceId,
        range: TimeRange,
    ) -> Result<Vec<ActivityMetric>, ActivityStoreError> {
        let sql = format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activity_metrics WHERE source_id = '{}' AND timestamp >= {} AND timestamp <= {} ORDER BY timestamp ASC",
            Self::escape(source_id.as_str()),
            range.start().timestamp_nanos_opt().unwrap_or(0),
            range.end().timestamp_nanos_opt().unwrap_or(i64::MAX),
        );
        self.fetch(sql)
    }

    fn recent(
        &self,
        source_id: &SourceId,
        limit: usize,
    ) -> Result<Vec<ActivityMetric>, ActivityStoreError> {
        let sql = format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activity_metrics WHERE source_id = '{}' ORDER BY timestamp DESC LIMIT {limit}",
            Self::escape(source_id.as_str())
        );
        self.fetch(sql)
    }

    fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<usize, ActivityStoreError> {
        let nanos = cutoff.timestamp_nanos_opt().unwrap_or(0);
        let count_sql = format!("SELECT count() FROM activity_metrics WHERE timestamp < {nanos}");
        let delete_sql = format!("ALTER TABLE activity_metrics DELETE WHERE timestamp < {nanos}");

        let client = Arc::clone(&self.client);
        let removed: u64 = Self::block_on(async move {
            let removed = client.query(&count_sql).fetch_one::<u64>().await?;
            if removed > 0 {
                client.query(&delete_sql).execute().await?;
            }
            Ok(removed)
        })?;
        Ok(usize::try_from(removed).unwrap_or(usize::MAX))
    }

    fn count(&self) -> Result<usize, ActivityStoreError> {
        let client = Arc::clone(&self.client);
        let count: u64 = Self::block_on(async move {
            client
                .query("SELECT count() FROM activity_metrics")
                .fetch_one::<u64>()
                .await
        })?;
        Ok(usize::try_from(count).unwrap_or(usize::MAX))
    }

    fn clear(&self) -> Result<(), ActivityStoreError> {
        let client = Arc::clone(&self.client);
        Self::block_on(async move {
            client
                .query("TRUNCATE TABLE activity_metrics")
                .execute()
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(minutes: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap() + Duration::minutes(minutes)
    }

    fn metric(source: &str, minutes: i64, messages: u64) -> ActivityMetric {
        ActivityMetric::new(source, at(minutes), 60, messages, messages.min(3))
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = InMemoryActivityStore::new();
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.latest(&SourceId::new("a")).unwrap().is_none());
    }

    #[test]
    fn test_latest_returns_newest_per_source() {
        let store = InMemoryActivityStore::new();
        store.append(metric("a", 0, 1)).unwrap();
        store.append(metric("a", 1, 2)).unwrap();
        store.append(metric("b", 5, 9)).unwrap();

        let latest_a = store.latest(&SourceId::new("a")).unwrap().unwrap();
        assert_eq!(latest_a.raw_message_count, 2);
        let latest_b = store.latest(&SourceId::new("b")).unwrap().unwrap();
        assert_eq!(latest_b.raw_message_count, 9);
    }

    #[test]
    fn test_equal_timestamps_are_accepted() {
        let store = InMemoryActivityStore::new();
        store.append(metric("a", 1, 1)).unwrap();
        store.append(metric("a", 1, 2)).unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_out_of_order_append_is_rejected() {
        let store = InMemoryActivityStore::new();
        store.append(metric("a", 5, 1)).unwrap();

        let result = store.append(metric("a", 4, 1));
        assert!(matches!(result, Err(ActivityStoreError::OutOfOrder { .. })));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_other_source_is_not_affected_by_ordering() {
        let store = InMemoryActivityStore::new();
        store.append(metric("a", 5, 1)).unwrap();
        store.append(metric("b", 1, 1)).unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_mixed_intervals_are_rejected() {
        let store = InMemoryActivityStore::new();
        store.append(metric("a", 0, 1)).unwrap();

        let hourly = ActivityMetric::new("a", at(60), 3600, 10, 2);
        let result = store.append(hourly);
        assert!(matches!(
            result,
            Err(ActivityStoreError::IntervalMismatch {
                expected: 60,
                got: 3600,
                ..
            })
        ));
    }

    #[test]
    fn test_range_is_inclusive_and_ascending() {
        let store = InMemoryActivityStore::new();
        for minute in 0..10 {
            store.append(metric("a", minute, 1)).unwrap();
        }

        let range = TimeRange::new(at(2), at(5)).unwrap();
        let result = store.range(&SourceId::new("a"), range).unwrap();

        let stamps: Vec<_> = result.iter().map(|m| m.timestamp).collect();
        assert_eq!(stamps, vec![at(2), at(3), at(4), at(5)]);
    }

    #[test]
    fn test_range_is_idempotent() {
        let store = InMemoryActivityStore::new();
        for minute in 0..5 {
            store.append(metric("a", minute, 1)).unwrap();
        }
        let range = TimeRange::new(at(0), at(10)).unwrap();

        let first = store.range(&SourceId::new("a"), range).unwrap();
        let second = store.range(&SourceId::new("a"), range).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_range_of_unknown_source_is_empty() {
        let store = InMemoryActivityStore::new();
        let range = TimeRange::new(at(0), at(10)).unwrap();
        assert!(store.range(&SourceId::new("x"), range).unwrap().is_empty());
    }

    #[test]
    fn test_recent_is_newest_first_and_limited() {
        let store = InMemoryActivityStore::new();
        for minute in 0..5 {
            store.append(metric("a", minute, 1)).unwrap();
        }

        let recent = store.recent(&SourceId::new("a"), 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].timestamp, at(4));
        assert_eq!(recent[1].timestamp, at(3));
    }

    #[test]
    fn test_delete_before_keeps_newer_rows() {
        let store = InMemoryActivityStore::new();
        for minute in 0..6 {
            store.append(metric("a", minute, 1)).unwrap();
            store.append(metric("b", minute, 1)).unwrap();
        }

        let removed = store.delete_before(at(3)).unwrap();

        assert_eq!(removed, 6);
        assert_eq!(store.count().unwrap(), 6);
        let oldest = store
            .range(&SourceId::new("a"), TimeRange::new(at(0), at(10)).unwrap())
            .unwrap();
        assert_eq!(oldest[0].timestamp, at(3));
    }

    #[test]
    fn test_delete_before_is_idempotent() {
        let store = InMemoryActivityStore::new();
        store.append(metric("a", 0, 1)).unwrap();
        store.append(metric("a", 10, 1)).unwrap();

        assert_eq!(store.delete_before(at(5)).unwrap(), 1);
        assert_eq!(store.delete_before(at(5)).unwrap(), 0);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_clear_store() {
        let store = InMemoryActivityStore::new();
        store.append(metric("a", 0, 1)).unwrap();
        store.clear().unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_store_is_thread_safe() {
        use std::thread;

        let store = Arc::new(InMemoryActivityStore::new());
        let handles: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|source| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for minute in 0..50 {
                        store.append(metric(source, minute, 1)).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.count().unwrap(), 150);
    }
}
