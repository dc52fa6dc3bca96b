//! Progress snapshots for animation/render loops.
//!
//! The cursor only moves when a scheduled event fires, which can be seconds
//! apart. Between events the displayed position is extrapolated from the
//! wall-clock time since the cursor last moved.

use std::time::{Duration, Instant};

use crate::registry::ActiveNotes;
use crate::timing::TimeMapper;

/// Elapsed and total playback time for a progress snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackTime {
    pub now: Duration,
    pub end: Duration,
}

/// Handed to the animation callback once per frame.
pub struct Progress<'a> {
    /// `cursor / end_tick`, in 0.0..=1.0
    pub percentage: f64,
    /// Extrapolated playback tick
    pub tick: u64,
    pub end_tick: u64,
    pub mapper: TimeMapper,
    pub active_notes: &'a ActiveNotes,
}

impl Progress<'_> {
    /// Convert the displayed tick and the end tick to wall-clock time.
    pub fn time(&self) -> PlaybackTime {
        PlaybackTime {
            now: self.mapper.tick_to_time(self.tick),
            end: self.mapper.tick_to_time(self.end_tick),
        }
    }
}

/// Remembers where the cursor was last seen and when, to extrapolate from it.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    last_noted_tick: Option<u64>,
    marker: Instant,
}

impl ProgressTracker {
    pub fn new(now: Instant) -> Self {
        Self {
            last_noted_tick: None,
            marker: now,
        }
    }

    /// Forget the last noted tick; the next update snaps to the cursor.
    pub fn restart(&mut self, now: Instant) {
        self.last_noted_tick = None;
        self.marker = now;
    }

    /// Compute the displayed tick for this frame.
    pub fn update(&mut self, cursor: u64, end_tick: u64, now: Instant, mapper: &TimeMapper) -> u64 {
        if self.last_noted_tick == Some(cursor) {
            let since = now.saturating_duration_since(self.marker);
            cursor.saturating_add(mapper.time_to_tick(since)).min(end_tick)
        } else {
            self.last_noted_tick = Some(cursor);
            self.marker = now;
            cursor
        }
    }
}
