//! MIDI protocol constants and the MIDI output backend.
//!
//! [`MidiOut`] sends note messages to a hardware or virtual MIDI port. Ports
//! send immediately, so note calls scheduled for later are held in a pending
//! queue and flushed by [`Backend::poll`] once their instant has passed.

use midir::{MidiOutput, MidiOutputConnection};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tracing::{info, warn};

use crate::backend::Backend;
use crate::error::BackendError;

/// Note Off status (channel in low nibble)
pub const NOTE_OFF: u8 = 0x80;

/// Note On status (channel in low nibble)
pub const NOTE_ON: u8 = 0x90;

/// Control Change status (channel in low nibble)
pub const CONTROL_CHANGE: u8 = 0xB0;

/// Controller number for "All Notes Off"
pub const ALL_NOTES_OFF: u8 = 123;

/// Number of MIDI channels
pub const CHANNELS: usize = 16;

/// Handle for a message waiting in the pending queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PendingMessage(Instant, u64);

/// MIDI output port used as the sound backend.
///
/// A `MidiOut` without a connection keeps all scheduling state but discards
/// messages, so playback and progress still work with no port available.
pub struct MidiOut {
    connection: Option<MidiOutputConnection>,
    pub port_name: String,
    muted: [bool; CHANNELS],
    pending: BTreeMap<PendingMessage, [u8; 3]>,
    next_seq: u64,
    /// (channel, note) pairs whose note-on has been sent
    sounding: BTreeSet<(u8, u8)>,
}

impl MidiOut {
    /// Connect to a MIDI output.
    ///
    /// Picks the first port whose name contains `preferred`, then an IAC
    /// Driver port, then the first port found.
    pub fn new(preferred: Option<&str>) -> Result<Self, BackendError> {
        let midi_out = MidiOutput::new("midi-player-out")
            .map_err(|e| BackendError::Connect(e.to_string()))?;

        let ports = midi_out.ports();
        if ports.is_empty() {
            return Err(BackendError::Connect("no MIDI output ports found".to_string()));
        }

        let names: Vec<String> = ports
            .iter()
            .map(|p| midi_out.port_name(p).unwrap_or_else(|_| "Unknown".to_string()))
            .collect();

        let port_idx = preferred
            .and_then(|wanted| names.iter().position(|n| n.contains(wanted)))
            .or_else(|| names.iter().position(|n| n.contains("IAC")))
            .unwrap_or(0);

        let port_name = names[port_idx].clone();
        let connection = midi_out
            .connect(&ports[port_idx], "midi-player-out")
            .map_err(|e| BackendError::Connect(e.to_string()))?;

        info!(port = %port_name, "MIDI output connected");
        let mut out = Self::disconnected();
        out.connection = Some(connection);
        out.port_name = port_name;
        Ok(out)
    }

    /// A backend with no port attached.
    pub fn disconnected() -> Self {
        Self {
            connection: None,
            port_name: "(no output)".to_string(),
            muted: [false; CHANNELS],
            pending: BTreeMap::new(),
            next_seq: 0,
            sounding: BTreeSet::new(),
        }
    }

    /// Mute or unmute a channel (0-15).
    pub fn set_muted(&mut self, channel: u8, muted: bool) {
        if let Some(flag) = self.muted.get_mut(channel as usize) {
            *flag = muted;
        }
    }

    /// Messages waiting for their send instant.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Notes whose note-on has gone out without a matching note-off.
    pub fn sounding(&self) -> impl Iterator<Item = &(u8, u8)> {
        self.sounding.iter()
    }

    fn enqueue(&mut self, at: Instant, message: [u8; 3]) -> PendingMessage {
        let handle = PendingMessage(at, self.next_seq);
        self.next_seq += 1;
        self.pending.insert(handle, message);
        handle
    }

    fn send(&mut self, message: &[u8]) -> Result<(), BackendError> {
        match self.connection.as_mut() {
            Some(connection) => connection
                .send(message)
                .map_err(|e| BackendError::Send(e.to_string())),
            None => Ok(()),
        }
    }
}

impl Backend for MidiOut {
    type Handle = PendingMessage;

    fn note_on(
        &mut self,
        channel: u8,
        note: u8,
        velocity: u8,
        at: Instant,
    ) -> Result<PendingMessage, BackendError> {
        if channel as usize >= CHANNELS {
            return Err(BackendError::InvalidChannel(channel));
        }
        Ok(self.enqueue(at, [NOTE_ON | channel, note & 0x7F, velocity & 0x7F]))
    }

    fn note_off(&mut self, channel: u8, note: u8, at: Instant) -> Result<PendingMessage, BackendError> {
        if channel as usize >= CHANNELS {
            return Err(BackendError::InvalidChannel(channel));
        }
        Ok(self.enqueue(at, [NOTE_OFF | channel, note & 0x7F, 0]))
    }

    fn cancel(&mut self, handle: PendingMessage) {
        self.pending.remove(&handle);
    }

    fn is_muted(&self, channel: u8) -> bool {
        self.muted.get(channel as usize).copied().unwrap_or(false)
    }

    fn poll(&mut self, now: Instant) {
        while let Some(entry) = self.pending.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let message = entry.remove();
            let key = (message[0] & 0x0F, message[1]);
            if message[0] & 0xF0 == NOTE_ON {
                self.sounding.insert(key);
            } else {
                self.sounding.remove(&key);
            }
            if let Err(e) = self.send(&message) {
                warn!(error = %e, "dropped MIDI message");
            }
        }
    }

    fn all_notes_off(&mut self) {
        let sounding = std::mem::take(&mut self.sounding);
        for (channel, note) in sounding {
            if let Err(e) = self.send(&[NOTE_OFF | channel, note, 0]) {
                warn!(error = %e, channel, note, "failed to release note");
            }
        }
    }
}

impl Drop for MidiOut {
    fn drop(&mut self) {
        self.pending.clear();
        self.all_notes_off();
        for channel in 0..CHANNELS as u8 {
            let _ = self.send(&[CONTROL_CHANGE | channel, ALL_NOTES_OFF, 0]);
        }
    }
}

/// Names of the available MIDI output ports.
pub fn output_port_names() -> Vec<String> {
    let midi_out = match MidiOutput::new("midi-player-probe") {
        Ok(m) => m,
        Err(_) => return Vec::new(),
    };
    midi_out
        .ports()
        .iter()
        .map(|p| midi_out.port_name(p).unwrap_or_else(|_| "Unknown".to_string()))
        .collect()
}

/// Scientific pitch name for a MIDI note number (60 = C4).
pub fn note_name(note: u8) -> String {
    let names = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    let octave = (note / 12) as i8 - 1;
    let name = names[(note % 12) as usize];
    format!("{}{}", name, octave)
}
