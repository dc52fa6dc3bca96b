//! Cancelable one-shot timers on a monotonic clock.
//!
//! This is the playback engine's only notion of "later": every scheduled
//! event is a timer in a [`TimerQueue`], and cancelling playback means
//! removing timers from the queue. A removed timer is gone; it cannot fire.
//!
//! # Ordering
//! Timers fire in deadline order. Timers sharing a deadline fire in the order
//! they were scheduled.

use std::collections::BTreeMap;
use std::time::Instant;

/// A queue of pending timers, each carrying a payload delivered when it fires.
pub struct TimerQueue<T> {
    /// Schedule order, breaks ties between equal deadlines
    next_seq: u64,
    pending: BTreeMap<(Instant, u64), T>,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            next_seq: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Register a timer firing at `deadline`.
    pub fn schedule(&mut self, deadline: Instant, payload: T) {
        self.pending.insert((deadline, self.next_seq), payload);
        self.next_seq += 1;
    }

    /// Remove every pending timer, returning payloads in firing order.
    pub fn cancel_all(&mut self) -> Vec<T> {
        std::mem::take(&mut self.pending).into_values().collect()
    }

    /// Pop the earliest timer if it is due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<(Instant, T)> {
        let entry = self.pending.first_entry()?;
        if entry.key().0 > now {
            return None;
        }
        let deadline = entry.key().0;
        Some((deadline, entry.remove()))
    }

    /// Deadline of the earliest pending timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.keys().next().map(|(deadline, _)| *deadline)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
