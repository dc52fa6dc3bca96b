//! Score data model and Standard MIDI File loading.
//!
//! All tracks of a file are merged into one event stream ordered by absolute
//! tick. The tick rate is resolved once from the first tempo marker; later
//! tempo changes are carried through as events but never alter the rate.

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::error::ScoreError;

/// What a single score event does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    /// Any other channel voice message (controllers, program changes, ...).
    Channel { channel: u8 },
    /// Set-tempo meta event, in microseconds per quarter note.
    Tempo { micros_per_beat: u32 },
    /// Meta or system message with no playback effect.
    Meta,
}

impl Message {
    /// Channel and note for note-on/note-off messages.
    pub fn note(&self) -> Option<(u8, u8)> {
        match *self {
            Message::NoteOn { channel, note, .. } | Message::NoteOff { channel, note } => {
                Some((channel, note))
            }
            _ => None,
        }
    }
}

/// One musical occurrence and its distance in ticks from the previous event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub delta_ticks: u64,
    pub message: Message,
}

impl Event {
    pub fn new(delta_ticks: u64, message: Message) -> Self {
        Self {
            delta_ticks,
            message,
        }
    }
}

/// An event together with its absolute tick position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreEntry {
    pub tick: u64,
    pub event: Event,
}

/// A loaded, playable sequence of events.
#[derive(Debug, Clone)]
pub struct Score {
    /// Name of the score (from filename)
    pub name: String,
    ticks_per_beat: u16,
    ticks_per_second: f64,
    entries: Vec<ScoreEntry>,
    end_tick: u64,
}

impl Score {
    /// Build a score from an ordered event list.
    ///
    /// Fails if the events contain no tempo marker or the timing is degenerate.
    pub fn new(
        name: impl Into<String>,
        ticks_per_beat: u16,
        events: Vec<Event>,
    ) -> Result<Self, ScoreError> {
        let ticks_per_second = resolve_tempo(ticks_per_beat, &events)?;

        let mut tick = 0u64;
        let entries: Vec<ScoreEntry> = events
            .into_iter()
            .map(|event| {
                tick += event.delta_ticks;
                ScoreEntry { tick, event }
            })
            .collect();

        Ok(Self {
            name: name.into(),
            ticks_per_beat,
            ticks_per_second,
            entries,
            end_tick: tick,
        })
    }

    /// Load a Standard MIDI File from disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScoreError> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        let data = fs::read(path)?;
        Self::from_bytes(name, &data)
    }

    /// Parse raw SMF bytes, merging every track into one stream.
    pub fn from_bytes(name: impl Into<String>, data: &[u8]) -> Result<Self, ScoreError> {
        let smf = Smf::parse(data).map_err(|e| ScoreError::Parse(e.to_string()))?;

        let ticks_per_beat = match smf.header.timing {
            Timing::Metrical(ppq) => ppq.as_int(),
            Timing::Timecode(_, _) => return Err(ScoreError::TimecodeUnsupported),
        };

        // (absolute tick, track index, message); stable sort keeps file order
        // within a track and lower track indices first on equal ticks.
        let mut merged: Vec<(u64, usize, Message)> = Vec::new();
        for (track_idx, track) in smf.tracks.iter().enumerate() {
            let mut tick: u64 = 0;
            for event in track.iter() {
                tick += event.delta.as_int() as u64;
                merged.push((tick, track_idx, convert_kind(&event.kind)));
            }
        }
        merged.sort_by_key(|(tick, track_idx, _)| (*tick, *track_idx));

        let mut previous = 0u64;
        let events = merged
            .into_iter()
            .map(|(tick, _, message)| {
                let delta = tick - previous;
                previous = tick;
                Event::new(delta, message)
            })
            .collect();

        Self::new(name, ticks_per_beat, events)
    }

    pub fn ticks_per_beat(&self) -> u16 {
        self.ticks_per_beat
    }

    pub fn ticks_per_second(&self) -> f64 {
        self.ticks_per_second
    }

    /// Total length of the score in ticks.
    pub fn end_tick(&self) -> u64 {
        self.end_tick
    }

    pub fn entries(&self) -> &[ScoreEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the first entry at or after `tick`.
    pub fn position_at(&self, tick: u64) -> usize {
        self.entries.partition_point(|entry| entry.tick < tick)
    }

    /// Number of note-on events in the score.
    pub fn note_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.event.message, Message::NoteOn { .. }))
            .count()
    }

    /// Channels carrying at least one note, ascending.
    pub fn channels(&self) -> Vec<u8> {
        let used: BTreeSet<u8> = self
            .entries
            .iter()
            .filter_map(|e| e.event.message.note().map(|(channel, _)| channel))
            .collect();
        used.into_iter().collect()
    }
}

/// Derive ticks-per-second from the first tempo marker.
pub fn resolve_tempo(ticks_per_beat: u16, events: &[Event]) -> Result<f64, ScoreError> {
    if ticks_per_beat == 0 {
        return Err(ScoreError::InvalidTiming("zero ticks per beat".to_string()));
    }

    let micros_per_beat = events
        .iter()
        .find_map(|event| match event.message {
            Message::Tempo { micros_per_beat } => Some(micros_per_beat),
            _ => None,
        })
        .ok_or(ScoreError::MissingTempo)?;

    if micros_per_beat == 0 {
        return Err(ScoreError::InvalidTiming("zero tempo".to_string()));
    }

    Ok(ticks_per_beat as f64 / (micros_per_beat as f64 / 1_000_000.0))
}

fn convert_kind(kind: &TrackEventKind<'_>) -> Message {
    match kind {
        TrackEventKind::Midi { channel, message } => {
            let channel = channel.as_int();
            match message {
                // Note-on with zero velocity is a note-off
                MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => Message::NoteOff {
                    channel,
                    note: key.as_int(),
                },
                MidiMessage::NoteOn { key, vel } => Message::NoteOn {
                    channel,
                    note: key.as_int(),
                    velocity: vel.as_int(),
                },
                MidiMessage::NoteOff { key, .. } => Message::NoteOff {
                    channel,
                    note: key.as_int(),
                },
                _ => Message::Channel { channel },
            }
        }
        TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => Message::Tempo {
            micros_per_beat: tempo.as_int(),
        },
        _ => Message::Meta,
    }
}
