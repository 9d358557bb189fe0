use std::time::Duration;
use tokio::time::Instant;

use crate::utils::time::round_to_seconds;

pub const DEFAULT_MIN_TRANSITION: Duration = Duration::from_millis(100);

/// Per-question active time.
///
/// A single start marker exists per session. Time is only ever credited when
/// the active question changes or on [`TimeTracker::finalize`], never from
/// render timing, so nothing is counted twice.
#[derive(Debug, Clone)]
pub struct TimeTracker {
    entries: Vec<Duration>,
    marker: Instant,
    active: usize,
    min_transition: Duration,
    sealed: bool,
}

impl TimeTracker {
    pub fn new(question_count: usize, started_at: Instant, min_transition: Duration) -> Self {
        Self {
            entries: vec![Duration::ZERO; question_count],
            marker: started_at,
            active: 0,
            min_transition,
            sealed: false,
        }
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Credits `now - marker` to `from` and moves the marker to `to`.
    ///
    /// Deltas below the debounce threshold are dropped. Returns the credited
    /// duration.
    pub fn record_transition(&mut self, from: usize, to: usize, now: Instant) -> Duration {
        if self.sealed {
            return Duration::ZERO;
        }

        // A clock reading behind the marker counts as zero and keeps the marker.
        let Some(delta) = now.checked_duration_since(self.marker) else {
            tracing::debug!("time marker ahead of transition timestamp, ignoring delta");
            self.active = to.min(self.entries.len().saturating_sub(1));
            return Duration::ZERO;
        };

        let credited = match self.entries.get_mut(from) {
            Some(entry) if delta >= self.min_transition => {
                *entry += delta;
                delta
            }
            _ => Duration::ZERO,
        };

        self.marker = now;
        if to < self.entries.len() {
            self.active = to;
        }
        credited
    }

    /// Flushes the active question and seals the tracker.
    pub fn finalize(&mut self, now: Instant) -> Duration {
        if self.sealed {
            return Duration::ZERO;
        }
        let active = self.active;
        let credited = self.record_transition(active, active, now);
        self.sealed = true;
        credited
    }

    pub fn accumulated(&self, index: usize) -> Duration {
        self.entries.get(index).copied().unwrap_or_default()
    }

    pub fn seconds(&self, index: usize) -> u64 {
        round_to_seconds(self.accumulated(index))
    }

    pub fn total(&self) -> Duration {
        self.entries.iter().sum()
    }

    pub fn total_seconds(&self) -> u64 {
        round_to_seconds(self.total())
    }
}
