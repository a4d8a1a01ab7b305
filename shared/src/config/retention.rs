//! Retention configuration for data expiration policies.
//!
//! Activity aggregates and system log entries are swept once their age exceeds
//! the configured horizon. Command logs and status rows are kept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default retention horizon in days.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Longest horizon accepted by validation.
pub const MAX_RETENTION_DAYS: u32 = 3650;

/// Kinds of data subject to retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Persisted activity aggregates.
    ActivityMetrics,
    /// System log entries.
    SystemLogs,
}

/// Retention policy for a specific data type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// The data type this policy applies to.
    pub data_type: DataType,
    /// Time-to-live (TTL) duration in days.
    pub ttl_days: u32,
}

impl RetentionPolicy {
    /// Creates a new retention policy.
    ///
    /// # Examples
    ///
    /// ```
    /// use shared::config::{DataType, RetentionPolicy};
    ///
    /// let policy = RetentionPolicy::new(DataType::ActivityMetrics, 30);
    /// assert_eq!(policy.ttl_days, 30);
    /// ```
    #[must_use]
    pub fn new(data_type: DataType, ttl_days: u32) -> Self {
        Self {
            data_type,
            ttl_days,
        }
    }

    /// Returns the deletion cutoff at `now`: rows strictly older are expired.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{Duration, Utc};
    /// use shared::config::{DataType, RetentionPolicy};
    ///
    /// let now = Utc::now();
    /// let policy = RetentionPolicy::new(DataType::SystemLogs, 30);
    /// assert_eq!(policy.cutoff(now), now - Duration::days(30));
    /// ```
    #[must_use]
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - chrono::Duration::days(i64::from(self.ttl_days))
    }

    /// Validates the retention policy.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - TTL is zero
    /// - TTL exceeds maximum allowed (3650 days / 10 years)
    pub fn validate(&self) -> Result<(), String> {
        if self.ttl_days == 0 {
            return Err("TTL must be greater than zero".to_string());
        }
        if self.ttl_days > MAX_RETENTION_DAYS {
            return Err("TTL cannot exceed 3650 days (10 years)".to_string());
        }
        Ok(())
    }
}

/// Retention configuration for every swept data type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Retention policy for activity aggregates.
    pub activity_metrics: RetentionPolicy,
    /// Retention policy for system logs.
    pub system_logs: RetentionPolicy,
}

impl RetentionConfig {
    /// Creates a new retention configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use shared::config::RetentionConfig;
    ///
    /// let config = RetentionConfig::new(30, 14);
    /// assert_eq!(config.activity_metrics.ttl_days, 30);
    /// assert_eq!(config.system_logs.ttl_days, 14);
    /// ```
    #[must_use]
    pub fn new(activity_ttl_days: u32, system_logs_ttl_days: u32) -> Self {
        Self {
            activity_metrics: RetentionPolicy::new(DataType::ActivityMetrics, activity_ttl_days),
            system_logs: RetentionPolicy::new(DataType::SystemLogs, system_logs_ttl_days),
        }
    }

    /// Validates all retention policies.
    ///
    /// # Errors
    ///
    /// Returns an error if any policy is invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.activity_metrics.validate()?;
        self.system_logs.validate()?;
        Ok(())
    }

    /// Gets the retention policy for a specific data type.
    #[must_use]
    pub fn get_policy(&self, data_type: DataType) -> &RetentionPolicy {
        match data_type {
            DataType::ActivityMetrics => &self.activity_metrics,
            DataType::SystemLogs => &self.system_logs,
        }
    }

    /// Updates the retention policy for a specific data type.
    pub fn update_policy(&mut self, data_type: DataType, ttl_days: u32) {
        match data_type {
            DataType::ActivityMetrics => self.activity_metrics.ttl_days = ttl_days,
            DataType::SystemLogs => self.system_logs.ttl_days = ttl_days,
        }
    }
}

impl Default for RetentionConfig {
    /// Thirty days for both activity metrics and system logs.
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_DAYS, DEFAULT_RETENTION_DAYS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retention_policy_cutoff() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let policy = RetentionPolicy::new(DataType::ActivityMetrics, 1);
        assert_eq!(policy.cutoff(now).timestamp(), 1_700_000_000 - 86_400);
    }

    #[test]
    fn test_retention_policy_validate_zero_ttl() {
        let policy = RetentionPolicy::new(DataType::SystemLogs, 0);
        assert_eq!(policy.validate().unwrap_err(), "TTL must be greater than zero");
    }

    #[test]
    fn test_retention_policy_validate_exceeds_max() {
        let policy = RetentionPolicy::new(DataType::SystemLogs, 3651);
        assert_eq!(
            policy.validate().unwrap_err(),
            "TTL cannot exceed 3650 days (10 years)"
        );
    }

    #[test]
    fn test_retention_config_default() {
        let config = RetentionConfig::default();
        assert_eq!(config.activity_metrics.ttl_days, 30);
        assert_eq!(config.system_logs.ttl_days, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retention_config_validate_invalid_activity() {
        let config = RetentionConfig::new(0, 30);
        assert!(config
            .validate()
            .unwrap_err()
            .contains("TTL must be greater than zero"));
    }

    #[test]
    fn test_retention_config_update_policy() {
        let mut config = RetentionConfig::default();
        config.update_policy(DataType::SystemLogs, 7);
        assert_eq!(config.get_policy(DataType::SystemLogs).ttl_days, 7);
        assert_eq!(config.get_policy(DataType::ActivityMetrics).ttl_days, 30);
    }

    #[test]
    fn test_data_type_serialization() {
        let json = serde_json::to_string(&DataType::ActivityMetrics).unwrap();
        assert_eq!(json, "\"activity_metrics\"");

        let deserialized: DataType = serde_json::from_str("\"system_logs\"").unwrap();
        assert_eq!(deserialized, DataType::SystemLogs);
    }

    #[test]
    fn test_retention_config_serialization() {
        let config = RetentionConfig::new(45, 10);
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: RetentionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }
}
