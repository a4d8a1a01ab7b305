//! Configuration module for Rivalwatch.
//!
//! This module contains configuration structures for the aggregation pipeline
//! and retention policies.

pub mod pipeline;
pub mod retention;

pub use pipeline::{PipelineConfig, WindowMode, MAX_INTERVAL};
pub use retention::{DataType, RetentionConfig, RetentionPolicy, DEFAULT_RETENTION_DAYS};

use thiserror::Error;

/// Configuration was rejected at load or update time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
        /// Parse failure.
        reason: String,
    },

    /// Pipeline settings are inconsistent.
    #[error("Invalid pipeline configuration: {0}")]
    Pipeline(String),

    /// A retention policy is out of range.
    #[error("Invalid retention configuration: {0}")]
    Retention(String),

    /// A monitored source is misconfigured.
    #[error("Invalid source configuration: {0}")]
    Source(String),
}
