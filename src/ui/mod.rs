//! iced views for the player window.

pub mod channel_table;

use std::fmt;
use std::time::Duration;

use crate::progress::{PlaybackTime, Progress};

/// Owned copy of a [`Progress`] snapshot, kept between frames for rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressView {
    pub percentage: f64,
    pub tick: u64,
    pub end_tick: u64,
    pub now: Duration,
    pub end: Duration,
    /// (channel, note, velocity) of every sounding note
    pub sounding: Vec<(u8, u8, u8)>,
}

impl ProgressView {
    pub fn from_progress(progress: &Progress<'_>) -> Self {
        let PlaybackTime { now, end } = progress.time();
        Self {
            percentage: progress.percentage,
            tick: progress.tick,
            end_tick: progress.end_tick,
            now,
            end,
            sounding: progress
                .active_notes
                .iter()
                .map(|event| (event.channel, event.note, event.velocity))
                .collect(),
        }
    }

    /// Sounding notes on one channel.
    pub fn notes_on(&self, channel: u8) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.sounding
            .iter()
            .filter(move |(ch, _, _)| *ch == channel)
            .map(|(_, note, velocity)| (*note, *velocity))
    }
}

/// Wrapper for playback-speed options in pick_list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedOption(pub f64);

impl fmt::Display for SpeedOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

impl SpeedOption {
    pub fn all_options() -> Vec<SpeedOption> {
        crate::config::SPEED_PRESETS.iter().map(|s| SpeedOption(*s)).collect()
    }
}

/// `m:ss` clock display.
pub fn format_time(time: Duration) -> String {
    let secs = time.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ActiveNotes, NoteEvent, NoteStatus};
    use crate::timing::TimeMapper;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(Duration::ZERO), "0:00");
        assert_eq!(format_time(Duration::from_millis(59_999)), "0:59");
        assert_eq!(format_time(Duration::from_secs(61)), "1:01");
        assert_eq!(format_time(Duration::from_secs(600)), "10:00");
    }

    #[test]
    fn test_speed_option_display() {
        assert_eq!(SpeedOption(1.0).to_string(), "1x");
        assert_eq!(SpeedOption(0.25).to_string(), "0.25x");
        assert_eq!(SpeedOption::all_options().len(), crate::config::SPEED_PRESETS.len());
    }

    #[test]
    fn test_progress_view_copies_sounding_notes() {
        let mut notes = ActiveNotes::new();
        for (channel, note) in [(0, 60), (9, 36)] {
            notes.note_on(NoteEvent {
                channel,
                note,
                tick: 0,
                end_tick: 960,
                now: Duration::ZERO,
                end: Duration::from_secs(2),
                status: NoteStatus::On,
                velocity: 100,
            });
        }
        let progress = Progress {
            percentage: 0.25,
            tick: 240,
            end_tick: 960,
            mapper: TimeMapper::new(480.0),
            active_notes: &notes,
        };

        let view = ProgressView::from_progress(&progress);
        assert_eq!(view.now, Duration::from_millis(500));
        assert_eq!(view.end, Duration::from_secs(2));
        assert_eq!(view.sounding, vec![(9, 36, 100), (0, 60, 100)]);
        assert_eq!(view.notes_on(9).collect::<Vec<_>>(), vec![(36, 100)]);
        assert_eq!(view.notes_on(3).count(), 0);
    }
}
