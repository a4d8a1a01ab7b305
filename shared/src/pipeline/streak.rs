//! Leader detection between the two compared sources.

use crate::models::{Leadership, SourceId, StreakState, SystemLogEntry, SystemLogKind};
use crate::query::{per_capita, Standing};
use crate::storage::{
    ActivityStore, ActivityStoreError, AuditStore, StateStore, StateStoreError,
};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised while evaluating or updating the streak.
#[derive(Debug, Error)]
pub enum StreakError {
    /// Reading the latest metrics failed.
    #[error(transparent)]
    Activity(#[from] ActivityStoreError),

    /// Reading or writing the streak state failed.
    #[error(transparent)]
    State(#[from] StateStoreError),

    /// A previous writer panicked while holding the streak lock.
    #[error("Streak writer lock is poisoned")]
    WriterPoisoned,
}

/// Result of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// At least one source has no data yet.
    Skipped {
        /// Sources without a persisted metric.
        missing: Vec<SourceId>,
    },
    /// Leadership did not change.
    Unchanged {
        /// Current leader, if any.
        leader: Option<SourceId>,
    },
    /// A new leader took over.
    Changed {
        /// Previous leader, absent on the first change.
        previous: Option<SourceId>,
        /// New leader.
        current: SourceId,
    },
}

/// Sole writer of [`StreakState`].
///
/// `evaluate` and `mark_notified` are serialized, so ticks from both sources
/// never race on the state.
pub struct StreakTracker {
    pair: (SourceId, SourceId),
    activity: Arc<dyn ActivityStore>,
    state: Arc<dyn StateStore>,
    audit: Arc<dyn AuditStore>,
    writer: Mutex<()>,
}

impl StreakTracker {
    /// Creates a tracker for `pair`.
    #[must_use]
    pub fn new(
        pair: (SourceId, SourceId),
        activity: Arc<dyn ActivityStore>,
        state: Arc<dyn StateStore>,
        audit: Arc<dyn AuditStore>,
    ) -> Self {
        Self {
            pair,
            activity,
            state,
            audit,
            writer: Mutex::new(()),
        }
    }

    fn score(&self, id: &SourceId) -> Result<Option<f64>, StreakError> {
        let Some(metric) = self.activity.latest(id)? else {
            return Ok(None);
        };
        let members = self
            .state
            .source(id)?
            .ok_or_else(|| StateStoreError::UnknownSource(id.clone()))?
            .member_count;
        Ok(Some(per_capita(metric.rate, members)))
    }

    /// Compares the latest per-capita rates and updates leadership.
    ///
    /// Ties keep the current leader. A change restarts the streak at `now`,
    /// clears the notification marker and writes a `leader_changed` log entry.
    ///
    /// # Errors
    ///
    /// Returns an error if a store fails.
    pub fn evaluate(&self, now: DateTime<Utc>) -> Result<Evaluation, StreakError> {
        let _writer = self.writer.lock().map_err(|_| StreakError::WriterPoisoned)?;
        let (id_a, id_b) = &self.pair;

        let (score_a, score_b) = match (self.score(id_a)?, self.score(id_b)?) {
            (Some(a), Some(b)) => (a, b),
            (a, b) => {
                let missing = [(a, id_a), (b, id_b)]
                    .into_iter()
                    .filter(|(score, _)| score.is_none())
                    .map(|(_, id)| id.clone())
                    .collect();
                return Ok(Evaluation::Skipped { missing });
            }
        };

        let current = self.state.streak()?;
        let candidate = match Standing::of(score_a, score_b) {
            Standing::FirstLeads => id_a,
            Standing::SecondLeads => id_b,
            Standing::Tied => {
                return Ok(Evaluation::Unchanged {
                    leader: current.current_leader().cloned(),
                })
            }
        };

        if current.current_leader() == Some(candidate) {
            return Ok(Evaluation::Unchanged {
                leader: Some(candidate.clone()),
            });
        }

        let previous = current.current_leader().cloned();
        self.state.put_streak(StreakState {
            leadership: Leadership::Leader(candidate.clone()),
            streak_started_at: now,
            last_notification_at: None,
        })?;

        info!(
            previous = previous.as_ref().map_or("none", SourceId::as_str),
            current = %candidate,
            "Streak leader changed"
        );
        let message = match &previous {
            Some(previous) => format!("{candidate} took the lead from {previous}"),
            None => format!("{candidate} took the lead"),
        };
        let metadata = serde_json::json!({
            "previous": previous,
            "current": candidate,
            "per_capita": { id_a.as_str(): score_a, id_b.as_str(): score_b },
        });
        let entry = SystemLogEntry::new(SystemLogKind::LeaderChanged, message)
            .with_metadata(metadata.to_string())
            .with_timestamp(now);
        if let Err(e) = self.audit.log_system(entry) {
            warn!(error = %e, "Failed to record leader change");
        }

        Ok(Evaluation::Changed {
            previous,
            current: candidate.clone(),
        })
    }

    /// Records that the current streak was announced at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the state store fails.
    pub fn mark_notified(&self, now: DateTime<Utc>) -> Result<StreakState, StreakError> {
        let _writer = self.writer.lock().map_err(|_| StreakError::WriterPoisoned)?;
        let mut state = self.state.streak()?;
        state.last_notification_at = Some(now);
        self.state.put_streak(state.clone())?;
        Ok(state)
    }

    /// True while a leader exists that has not been announced.
    ///
    /// # Errors
    ///
    /// Returns an error if the state store fails.
    pub fn needs_notification(&self) -> Result<bool, StreakError> {
        let state = self.state.streak()?;
        Ok(state.current_leader().is_some() && state.last_notification_at.is_none())
    }

    /// Current streak state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state store fails.
    pub fn current(&self) -> Result<StreakState, StreakError> {
        Ok(self.state.streak()?)
    }
}
