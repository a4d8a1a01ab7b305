//! The activity aggregation pipeline.
//!
//! Message events flow into a per-source [`EventBuffer`]. On every scheduled
//! tick each [`WindowAggregator`] turns its window into an
//! [`ActivityMetric`](crate::models::ActivityMetric), appends it to the
//! activity store, and trims its buffer. The [`StreakTracker`] then compares
//! the latest metrics of both sources. Independently, the
//! [`RetentionSweeper`] purges expired rows and the [`LivenessReporter`]
//! writes heartbeats.

pub mod aggregator;
pub mod buffer;
pub mod context;
pub mod liveness;
pub mod retention;
pub mod scheduler;
pub mod streak;

pub use aggregator::{AggregationError, IngestError, TickReport, WindowAggregator};
pub use buffer::EventBuffer;
pub use context::{
    aggregate_task, heartbeat_task, sweep_task, MonitorContext, MonitorSetup, ProcessIdentity,
};
pub use liveness::{LifecycleEvent, LivenessReporter};
pub use retention::{RetentionSweeper, SweepError, SweepReport};
pub use scheduler::{Dispatch, FlightPermit, Scheduler, SingleFlight, TaskFn};
pub use streak::{Evaluation, StreakError, StreakTracker};
