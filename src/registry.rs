//! Notes currently sounding, and the notifications that open and close them.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::midi::{NOTE_OFF, NOTE_ON};

/// Whether a notification opens or closes a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteStatus {
    On,
    Off,
}

impl NoteStatus {
    /// MIDI status byte without channel (144 / 128).
    pub fn message(&self) -> u8 {
        match self {
            NoteStatus::On => NOTE_ON,
            NoteStatus::Off => NOTE_OFF,
        }
    }
}

/// Delivered to the event listener once per fired note event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    pub channel: u8,
    pub note: u8,
    /// Score tick of the event
    pub tick: u64,
    pub end_tick: u64,
    /// Time of the event from the start of the score, at the speed in effect
    pub now: Duration,
    /// Length of the whole score, at the speed in effect
    pub end: Duration,
    pub status: NoteStatus,
    pub velocity: u8,
}

impl NoteEvent {
    pub fn message(&self) -> u8 {
        self.status.message()
    }
}

/// Tracks sounding notes keyed by note number.
///
/// One entry per note number: a second note-on for the same key replaces
/// the first, and a single note-off clears it.
#[derive(Debug, Default)]
pub struct ActiveNotes {
    notes: BTreeMap<u8, NoteEvent>,
}

impl ActiveNotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note_on(&mut self, event: NoteEvent) {
        self.notes.insert(event.note, event);
    }

    pub fn note_off(&mut self, note: u8) -> Option<NoteEvent> {
        self.notes.remove(&note)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Sounding notes in ascending note order.
    pub fn iter(&self) -> impl Iterator<Item = &NoteEvent> {
        self.notes.values()
    }

    /// Empty the registry, returning a synthesized note-off for every note
    /// that was still sounding.
    pub fn drain_and_close(&mut self) -> Vec<NoteEvent> {
        std::mem::take(&mut self.notes)
            .into_values()
            .filter(|event| event.status == NoteStatus::On)
            .map(|event| NoteEvent {
                status: NoteStatus::Off,
                ..event
            })
            .collect()
    }
}
