//! Rivalwatch Shared Library
//!
//! This crate contains the activity monitor's models, stores, the aggregation
//! pipeline, read-side queries and the bot command surface.
//!
//! # Modules
//!
//! - [`models`] - Sources, activity metrics, audit entries, liveness and streak state
//! - [`storage`] - Storage traits with in-memory and `ClickHouse` implementations
//! - [`pipeline`] - Event buffers, window aggregation, streak tracking and scheduling
//! - [`query`] - Time ranges, per-capita comparison and history summaries
//! - [`commands`] - Bot command parsing and execution
//! - [`config`] - Pipeline and retention configuration
//! - [`clock`] - Injectable time sources
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use shared::models::{ActivityMetric, SourceId};
//! use shared::storage::{ActivityStore, InMemoryActivityStore};
//!
//! let store = InMemoryActivityStore::new();
//! let now = Utc::now();
//! store.append(ActivityMetric::new("snoot_palace", now, 60, 12, 5)).unwrap();
//!
//! let latest = store.latest(&SourceId::new("snoot_palace")).unwrap().unwrap();
//! assert_eq!(latest.raw_message_count, 12);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod clock;
pub mod commands;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod query;
pub mod storage;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;
pub use validator;
