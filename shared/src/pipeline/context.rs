//! The monitor's runtime context and its scheduled tasks.
//!
//! `MonitorContext` owns every store, the per-source aggregators and the
//! single streak tracker. It is created once at process start and shared by
//! reference with the scheduler and the query layer.

use super::aggregator::{AggregationError, IngestError, TickReport, WindowAggregator};
use super::liveness::{LifecycleEvent, LivenessReporter};
use super::retention::{RetentionSweeper, SweepReport};
use super::scheduler::Scheduler;
use super::streak::{Evaluation, StreakTracker};
use crate::clock::Clock;
use crate::config::{ConfigError, PipelineConfig, RetentionConfig};
use crate::models::{
    MessageEvent, ProcessStatus, Source, SourceId, StreakState, SystemLogEntry, SystemLogKind,
};
use crate::query::ActivityQueries;
use crate::storage::{ActivityStore, AuditStore, InMemoryStateStore, StateStore};
use anyhow::Context as _;
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use tracing::{error, info, warn};

/// Identity this process reports through the liveness reporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    /// Status row id.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Status reported while up.
    pub active_status: ProcessStatus,
}

impl Default for ProcessIdentity {
    fn default() -> Self {
        Self {
            id: "monitor_bot".to_string(),
            name: "Monitor Bot".to_string(),
            active_status: ProcessStatus::Monitoring,
        }
    }
}

/// Everything needed to bootstrap a [`MonitorContext`].
#[derive(Debug, Clone)]
pub struct MonitorSetup {
    /// The compared pair; the first is reported as side A.
    pub sources: (Source, Source),
    /// Window and schedule.
    pub pipeline: PipelineConfig,
    /// Retention horizons.
    pub retention: RetentionConfig,
    /// Identity of this process.
    pub process: ProcessIdentity,
}

impl MonitorSetup {
    /// Validates every part of the setup.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate().map_err(ConfigError::Pipeline)?;
        self.retention.validate().map_err(ConfigError::Retention)?;
        for source in [&self.sources.0, &self.sources.1] {
            source
                .validate_source()
                .map_err(|e| ConfigError::Source(format!("{}: {e}", source.id)))?;
        }
        if self.sources.0.id == self.sources.1.id {
            return Err(ConfigError::Source(format!(
                "compared sources must differ, both are '{}'",
                self.sources.0.id
            )));
        }
        Ok(())
    }
}

/// Process-wide runtime context.
pub struct MonitorContext {
    clock: Arc<dyn Clock>,
    pipeline: PipelineConfig,
    retention: RwLock<RetentionConfig>,
    activity: Arc<dyn ActivityStore>,
    audit: Arc<dyn AuditStore>,
    state: Arc<dyn StateStore>,
    aggregators: Vec<WindowAggregator>,
    streak: StreakTracker,
    sweeper: RetentionSweeper,
    liveness: LivenessReporter,
    queries: ActivityQueries,
}

impl MonitorContext {
    /// Bootstraps the context: registers both sources, starts the streak
    /// with no leader at the clock's current time, and builds one aggregator
    /// per source.
    ///
    /// # Errors
    ///
    /// Returns an error if the setup is invalid.
    pub fn new(
        setup: MonitorSetup,
        activity: Arc<dyn ActivityStore>,
        audit: Arc<dyn AuditStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        setup.validate()?;
        let MonitorSetup {
            sources,
            pipeline,
            retention,
            process,
        } = setup;

        let pair = (sources.0.id.clone(), sources.1.id.clone());
        let state: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new(
            vec![sources.0, sources.1],
            clock.now(),
        ));

        let aggregators = [&pair.0, &pair.1]
            .into_iter()
            .map(|id| WindowAggregator::new(id.clone(), pipeline.window, pipeline.buffer_retention))
            .collect();

        let streak = StreakTracker::new(
            pair.clone(),
            Arc::clone(&activity),
            Arc::clone(&state),
            Arc::clone(&audit),
        );
        let sweeper = RetentionSweeper::new(Arc::clone(&activity), Arc::clone(&audit));
        let liveness = LivenessReporter::new(
            process.id,
            process.name,
            process.active_status,
            Arc::clone(&state),
            Arc::clone(&audit),
        );
        let queries = ActivityQueries::new(
            Arc::clone(&activity),
            Arc::clone(&state),
            pair,
            pipeline.heartbeat_chrono(),
        );

        Ok(Self {
            clock,
            pipeline,
            retention: RwLock::new(retention),
            activity,
            audit,
            state,
            aggregators,
            streak,
            sweeper,
            liveness,
            queries,
        })
    }

    /// Builds the scheduler for aggregation, heartbeats and retention sweeps.
    #[must_use]
    pub fn scheduler(self: &Arc<Self>) -> Scheduler<Self> {
        Scheduler::new(Arc::clone(self), Arc::clone(&self.clock))
            .every("aggregate", self.pipeline.tick_interval, aggregate_task)
            .every("heartbeat", self.pipeline.heartbeat_interval, heartbeat_task)
            .every("retention_sweep", self.pipeline.sweep_interval, sweep_task)
    }

    /// Current time according to the context's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Pipeline settings.
    #[must_use]
    pub fn pipeline(&self) -> &PipelineConfig {
        &self.pipeline
    }

    /// Activity metric store.
    #[must_use]
    pub fn activity(&self) -> &Arc<dyn ActivityStore> {
        &self.activity
    }

    /// Audit log store.
    #[must_use]
    pub fn audit(&self) -> &Arc<dyn AuditStore> {
        &self.audit
    }

    /// Source registry, status rows and streak state.
    #[must_use]
    pub fn state(&self) -> &Arc<dyn StateStore> {
        &self.state
    }

    /// Read-side queries.
    #[must_use]
    pub fn queries(&self) -> &ActivityQueries {
        &self.queries
    }

    /// The streak tracker.
    #[must_use]
    pub fn streak(&self) -> &StreakTracker {
        &self.streak
    }

    fn aggregator(&self, source_id: &SourceId) -> Option<&WindowAggregator> {
        self.aggregators.iter().find(|a| a.source_id() == source_id)
    }

    /// Buffers a message observed on `source_id`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSource` for an unmonitored source and
    /// `BufferUnavailable` if the source's buffer is poisoned.
    pub fn record_message(
        &self,
        source_id: &SourceId,
        event: MessageEvent,
    ) -> Result<(), IngestError> {
        let aggregator = self
            .aggregator(source_id)
            .ok_or_else(|| IngestError::UnknownSource(source_id.clone()))?;
        aggregator.record(event).inspect_err(|e| {
            error!(source_id = %source_id, error = %e, "Failed to buffer message");
        })
    }

    /// Runs one aggregation tick for every source, then re-evaluates the streak.
    ///
    /// Per-source failures are contained: they are logged and recorded as
    /// system log entries, and the other source still ticks.
    ///
    /// # Errors
    ///
    /// Returns an error only if the streak evaluation fails.
    pub fn aggregate(
        &self,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Result<TickReport, AggregationError>>> {
        let results: Vec<_> = self
            .aggregators
            .iter()
            .map(|aggregator| {
                let result = aggregator.tick(now, self.activity.as_ref());
                self.record_tick_outcome(aggregator.source_id(), &result, now);
                result
            })
            .collect();

        if results.iter().any(Result::is_ok) {
            match self.streak.evaluate(now).context("Streak evaluation failed")? {
                Evaluation::Skipped { missing } => {
                    info!(?missing, "Streak evaluation skipped: missing data");
                }
                Evaluation::Unchanged { .. } | Evaluation::Changed { .. } => {}
            }
        }

        Ok(results)
    }

    fn record_tick_outcome(
        &self,
        source_id: &SourceId,
        result: &Result<TickReport, AggregationError>,
        now: DateTime<Utc>,
    ) {
        let entry = match result {
            Ok(report) => {
                #[allow(clippy::cast_precision_loss)]
                let threshold = self.pipeline.spike_threshold as f64;
                if report.metric.rate <= threshold {
                    return;
                }
                info!(source_id = %source_id, rate = report.metric.rate, "Activity spike");
                SystemLogEntry::new(
                    SystemLogKind::ActivitySpike,
                    format!(
                        "Activity spike on {source_id}: {} {}",
                        report.metric.rate,
                        self.pipeline.window.unit_label()
                    ),
                )
                .with_metadata(
                    serde_json::json!({
                        "source_id": source_id,
                        "rate": report.metric.rate,
                        "active_users": report.metric.active_user_count,
                    })
                    .to_string(),
                )
            }
            Err(AggregationError::Skipped(_)) => SystemLogEntry::new(
                SystemLogKind::AggregationSkipped,
                format!("Aggregation for {source_id} skipped: previous tick still running"),
            ),
            Err(e) => {
                error!(source_id = %source_id, error = %e, "Aggregation tick failed");
                SystemLogEntry::new(SystemLogKind::CalculationError, e.to_string())
                    .with_metadata(serde_json::json!({ "source_id": source_id }).to_string())
            }
        };

        if let Err(e) = self.audit.log_system(entry.with_timestamp(now)) {
            warn!(error = %e, "Failed to record aggregation outcome");
        }
    }

    /// Refreshes this process's status row.
    ///
    /// # Errors
    ///
    /// Returns an error if the state store fails.
    pub fn heartbeat(&self, now: DateTime<Utc>) -> anyhow::Result<()> {
        self.liveness.heartbeat(now).context("Heartbeat failed")
    }

    /// Records a lifecycle transition of this process at the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the state store fails.
    pub fn lifecycle(&self, event: LifecycleEvent) -> anyhow::Result<()> {
        self.liveness
            .lifecycle(event, self.now())
            .with_context(|| format!("Failed to record lifecycle event {event:?}"))
    }

    /// Deletes expired rows as of `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the retention config lock is poisoned or a delete fails.
    pub fn sweep(&self, now: DateTime<Utc>) -> anyhow::Result<SweepReport> {
        let config = self.retention_config()?;
        Ok(self.sweeper.sweep(&config, now)?)
    }

    /// Current retention configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn retention_config(&self) -> anyhow::Result<RetentionConfig> {
        self.retention
            .read()
            .map(|config| config.clone())
            .map_err(|_| anyhow::anyhow!("Retention config lock poisoned"))
    }

    /// Replaces the retention configuration after validating it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Retention` for an invalid configuration.
    pub fn update_retention(&self, config: RetentionConfig) -> Result<(), ConfigError> {
        config.validate().map_err(ConfigError::Retention)?;
        let mut current = self
            .retention
            .write()
            .map_err(|_| ConfigError::Retention("configuration lock poisoned".to_string()))?;
        info!(
            activity_days = config.activity_metrics.ttl_days,
            system_log_days = config.system_logs.ttl_days,
            "Retention configuration updated"
        );
        *current = config;
        Ok(())
    }

    /// Marks the current streak as announced.
    ///
    /// # Errors
    ///
    /// Returns an error if the state store fails.
    pub fn mark_notified(&self) -> anyhow::Result<StreakState> {
        Ok(self.streak.mark_notified(self.now())?)
    }
}

/// Scheduled aggregation.
///
/// # Errors
///
/// Returns an error if the streak evaluation fails.
pub fn aggregate_task(ctx: &MonitorContext, now: DateTime<Utc>) -> anyhow::Result<()> {
    ctx.aggregate(now).map(|_| ())
}

/// Scheduled heartbeat.
///
/// # Errors
///
/// Returns an error if the status row cannot be written.
pub fn heartbeat_task(ctx: &MonitorContext, now: DateTime<Utc>) -> anyhow::Result<()> {
    ctx.heartbeat(now)
}

/// Scheduled retention sweep.
///
/// # Errors
///
/// Returns an error if the sweep fails.
pub fn sweep_task(ctx: &MonitorContext, now: DateTime<Utc>) -> anyhow::Result<()> {
    ctx.sweep(now).map(|_| ())
}
