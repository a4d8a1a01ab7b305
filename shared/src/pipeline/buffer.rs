//! Time-bounded buffer of observed message events for one source.

use crate::models::MessageEvent;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Ordered in-memory log of message events.
///
/// Events are kept sorted by timestamp so a window snapshot is a contiguous
/// slice and eviction is a prefix pop.
#[derive(Debug, Default)]
pub struct EventBuffer {
    events: VecDeque<MessageEvent>,
}

impl EventBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an event.
    ///
    /// In-order events are appended. A late event is inserted at its sorted
    /// position after any events sharing its timestamp.
    pub fn record(&mut self, event: MessageEvent) {
        match self.events.back() {
            Some(newest) if event.timestamp < newest.timestamp => {
                let at = self
                    .events
                    .partition_point(|e| e.timestamp <= event.timestamp);
                self.events.insert(at, event);
            }
            _ => self.events.push_back(event),
        }
    }

    /// Events with `start <= timestamp < end`, oldest first.
    ///
    /// The returned iterator is lazy and can be cloned to walk the window
    /// more than once.
    pub fn snapshot(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Iterator<Item = &MessageEvent> + Clone {
        let lo = self.events.partition_point(|e| e.timestamp < start);
        let hi = self.events.partition_point(|e| e.timestamp < end).max(lo);
        self.events.range(lo..hi)
    }

    /// Discards every event older than `cutoff` and returns how many were dropped.
    pub fn evict_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut evicted = 0;
        while self.events.front().is_some_and(|e| e.timestamp < cutoff) {
            self.events.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Number of buffered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Timestamp of the oldest buffered event.
    #[must_use]
    pub fn oldest(&self) -> Option<DateTime<Utc>> {
        self.events.front().map(|e| e.timestamp)
    }
}
