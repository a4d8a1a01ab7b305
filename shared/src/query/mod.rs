//! Read-side queries: time ranges, comparisons and history summaries.
//!
//! # Example
//!
//! ```
//! use shared::query::{Timeframe, TimeRange};
//!
//! let range = TimeRange::parse(Some("2024-01-01T00:00:00Z"), Some("2024-01-01T01:00:00Z")).unwrap();
//! assert!(range.start() < range.end());
//! assert_eq!("6h".parse::<Timeframe>().unwrap(), Timeframe::SixHours);
//! ```

mod comparison;
mod history;
mod service;
mod time_range;

pub use comparison::{per_capita, Comparison, SourceActivity, Standing, EPSILON};
pub use history::{HistorySummary, SourceHistory};
pub use service::{ActivityQueries, QueryError};
pub use time_range::{InvalidTimeRange, TimeRange, Timeframe};
