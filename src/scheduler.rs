//! Lookahead batch planning.
//!
//! Playback never schedules the whole score at once. A batch covers at most
//! [`LOOKAHEAD_EVENTS`] note events from a start position; the last note of a
//! truncated batch carries the position the next batch starts from. Batches
//! continue by entry index rather than by tick, so events sharing the
//! boundary tick are split between batches without repeats or gaps.

use std::time::Duration;

use crate::registry::NoteStatus;
use crate::score::{Message, Score};
use crate::timing::TimeMapper;

/// Maximum number of note events scheduled per batch.
pub const LOOKAHEAD_EVENTS: usize = 100;

/// Where a batch starts walking the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// First entry index to consider
    pub index: usize,
    /// Tick that maps to the batch anchor instant; earlier entries are skipped
    pub tick: u64,
}

impl Position {
    /// Start of playback at an arbitrary tick.
    pub fn at_tick(score: &Score, tick: u64) -> Self {
        Self {
            index: score.position_at(tick),
            tick,
        }
    }
}

/// A note event due at `delay` after the batch anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedNote {
    /// Index of the entry in the score
    pub index: usize,
    pub tick: u64,
    pub delay: Duration,
    pub status: NoteStatus,
    pub channel: u8,
    pub note: u8,
    pub velocity: u8,
}

/// One lookahead window of note events.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub notes: Vec<PlannedNote>,
    /// Set when the batch was cut short by the budget; carried by the last note.
    pub next: Option<Position>,
}

/// Plan the note events following `from`.
///
/// Entries before `from.tick`, non-note events, and notes on channels for
/// which `is_muted` returns true are walked past without using the budget.
pub fn plan_batch(
    score: &Score,
    mapper: &TimeMapper,
    from: Position,
    budget: usize,
    is_muted: impl Fn(u8) -> bool,
) -> Batch {
    let budget = budget.max(1);
    let mut notes: Vec<PlannedNote> = Vec::with_capacity(budget.min(score.len()));
    let mut resume_index = None;

    for (index, entry) in score.entries().iter().enumerate().skip(from.index) {
        if notes.len() >= budget {
            resume_index = Some(index);
            break;
        }
        if entry.tick < from.tick {
            continue;
        }

        let (status, channel, note, velocity) = match entry.event.message {
            Message::NoteOn {
                channel,
                note,
                velocity,
            } => (NoteStatus::On, channel, note, velocity),
            Message::NoteOff { channel, note } => (NoteStatus::Off, channel, note, 0),
            _ => continue,
        };
        if is_muted(channel) {
            continue;
        }

        notes.push(PlannedNote {
            index,
            tick: entry.tick,
            delay: mapper.tick_to_time(entry.tick - from.tick),
            status,
            channel,
            note,
            velocity,
        });
    }

    let next = match (resume_index, notes.last()) {
        (Some(index), Some(last)) => Some(Position {
            index,
            tick: last.tick,
        }),
        _ => None,
    };

    Batch { notes, next }
}
