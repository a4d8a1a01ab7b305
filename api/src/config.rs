//! Server configuration module.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use anyhow::Result;
use shared::config::{ConfigError, PipelineConfig, RetentionConfig};
use shared::models::Source;
use shared::pipeline::{MonitorSetup, ProcessIdentity};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Where activity metrics and audit logs are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    /// Process-local stores, lost on restart.
    #[default]
    Memory,
    /// `ClickHouse` tables configured through `RIVALWATCH_DB_*`.
    ClickHouse,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "clickhouse" => Ok(Self::ClickHouse),
            other => Err(format!("expected 'memory' or 'clickhouse', got '{other}'")),
        }
    }
}

/// Server configuration.
///
/// Configuration values can be set via environment variables:
/// - `RIVALWATCH_HOST`: The host address to bind to (default: "0.0.0.0")
/// - `RIVALWATCH_PORT`: The port to listen on (default: 8080)
/// - `RIVALWATCH_STORAGE`: `memory` or `clickhouse` (default: memory)
/// - `RIVALWATCH_SOURCE_A_ID`, `_NAME`, `_MEMBERS` and the same for `SOURCE_B`
/// - `RIVALWATCH_WINDOW`: `per_minute` or `per_hour` (default: `per_minute`)
/// - `RIVALWATCH_TICK_SECS`, `RIVALWATCH_BUFFER_RETENTION_SECS`,
///   `RIVALWATCH_HEARTBEAT_SECS`, `RIVALWATCH_SWEEP_SECS`
/// - `RIVALWATCH_SPIKE_THRESHOLD`: rate above which a spike is logged (default: 15)
/// - `RIVALWATCH_ACTIVITY_RETENTION_DAYS`, `RIVALWATCH_SYSTEM_LOG_RETENTION_DAYS`
/// - `RIVALWATCH_PROCESS_ID`, `RIVALWATCH_PROCESS_NAME`, `RIVALWATCH_PROCESS_STATUS`
#[derive(Debug, Clone)]
pub struct Config {
    /// The host address to bind to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// Persistence backend.
    pub storage: StorageBackend,
    /// Sources, schedule and retention for the monitor.
    pub monitor: MonitorSetup,
}

impl Config {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A variable is set but cannot be parsed
    /// - The resulting monitor setup is invalid
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok())?)
    }

    /// Builds a configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be parsed or the setup is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let defaults = Self::default();

        let source = |prefix: &str, fallback: &Source| -> Result<Source, ConfigError> {
            Ok(Source::new(
                env.string(&format!("RIVALWATCH_{prefix}_ID"), fallback.id.as_str()),
                env.string(&format!("RIVALWATCH_{prefix}_NAME"), &fallback.display_name),
                env.parse(&format!("RIVALWATCH_{prefix}_MEMBERS"), fallback.member_count)?,
            ))
        };

        let base = &defaults.monitor;
        let pipeline = PipelineConfig {
            window: env.parse("RIVALWATCH_WINDOW", base.pipeline.window)?,
            tick_interval: env.secs("RIVALWATCH_TICK_SECS", base.pipeline.tick_interval)?,
            buffer_retention: env.secs(
                "RIVALWATCH_BUFFER_RETENTION_SECS",
                base.pipeline.buffer_retention,
            )?,
            heartbeat_interval: env
                .secs("RIVALWATCH_HEARTBEAT_SECS", base.pipeline.heartbeat_interval)?,
            sweep_interval: env.secs("RIVALWATCH_SWEEP_SECS", base.pipeline.sweep_interval)?,
            spike_threshold: env
                .parse("RIVALWATCH_SPIKE_THRESHOLD", base.pipeline.spike_threshold)?,
        };

        let retention = RetentionConfig::new(
            env.parse(
                "RIVALWATCH_ACTIVITY_RETENTION_DAYS",
                base.retention.activity_metrics.ttl_days,
            )?,
            env.parse(
                "RIVALWATCH_SYSTEM_LOG_RETENTION_DAYS",
                base.retention.system_logs.ttl_days,
            )?,
        );

        let process = ProcessIdentity {
            id: env.string("RIVALWATCH_PROCESS_ID", &base.process.id),
            name: env.string("RIVALWATCH_PROCESS_NAME", &base.process.name),
            active_status: env
                .parse("RIVALWATCH_PROCESS_STATUS", base.process.active_status)?,
        };

        let monitor = MonitorSetup {
            sources: (
                source("SOURCE_A", &base.sources.0)?,
                source("SOURCE_B", &base.sources.1)?,
            ),
            pipeline,
            retention,
            process,
        };
        monitor.validate()?;

        Ok(Self {
            host: env.string("RIVALWATCH_HOST", &defaults.host),
            port: env.parse("RIVALWATCH_PORT", defaults.port)?,
            storage: env.parse("RIVALWATCH_STORAGE", defaults.storage)?,
            monitor,
        })
    }

    /// Returns the socket address for binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the host and port do not form a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            storage: StorageBackend::Memory,
            monitor: MonitorSetup {
                sources: (
                    Source::new("snoot_palace", "Snoot Palace", 150),
                    Source::new("snoot_club", "Snoot Club", 5000),
                ),
                pipeline: PipelineConfig::default(),
                retention: RetentionConfig::default(),
                process: ProcessIdentity::default(),
            },
        }
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str, default: &str) -> String {
        (self.0)(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match (self.0)(key) {
            None => Ok(default),
            Some(value) => value
                .trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.clone(),
                    reason: e.to_string(),
                }),
        }
    }

    fn secs(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        self.parse(key, default.as_secs()).map(Duration::from_secs)
    }
}
