//! Monitored source (community server) model.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use validator::Validate;

/// Identifier of a monitored source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    /// Creates a new source identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SourceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for SourceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A monitored community whose messages are aggregated.
///
/// Only `member_count` changes after bootstrap. It is used to normalize
/// activity rates to a per-capita basis.
///
/// # Example
///
/// ```
/// use shared::models::Source;
///
/// let source = Source::new("snoot_palace", "Snoot Palace", 150);
/// assert_eq!(source.id.as_str(), "snoot_palace");
/// assert!(source.validate_source().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Source {
    /// Unique identifier.
    pub id: SourceId,

    /// Human-readable name.
    #[validate(length(min = 1, message = "Display name cannot be empty"))]
    pub display_name: String,

    /// Number of members in the community.
    pub member_count: u32,
}

impl Source {
    /// Creates a new source.
    #[must_use]
    pub fn new(id: impl Into<SourceId>, display_name: impl Into<String>, member_count: u32) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            member_count,
        }
    }

    /// Validates the source.
    ///
    /// # Errors
    ///
    /// Returns an error if the display name or the id is empty.
    pub fn validate_source(&self) -> Result<(), validator::ValidationErrors> {
        let mut result = self.validate();
        if self.id.as_str().is_empty() {
            let mut errors = result
                .err()
                .unwrap_or_else(validator::ValidationErrors::new);
            errors.add("id", validator::ValidationError::new("empty_id"));
            result = Err(errors);
        }
        result
    }

    /// Member count used as a divisor; never zero.
    #[must_use]
    pub fn normalizing_members(&self) -> u32 {
        self.member_count.max(1)
    }
}
