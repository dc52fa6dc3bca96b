//! MIDI file player.
//!
//! Loads a Standard MIDI File into a [`Score`], schedules its note events in
//! small lookahead batches against a sound [`Backend`], tracks which notes are
//! sounding, and reports progress for a render loop. [`Transport`] is the entry
//! point; [`MidiOut`] is the stock backend driving a MIDI output port.

pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod midi;
pub mod progress;
pub mod registry;
pub mod scheduler;
pub mod score;
pub mod timing;
pub mod transport;
pub mod ui;

pub use backend::Backend;
pub use config::PlayerConfig;
pub use error::{BackendError, ScoreError, TransportError};
pub use midi::MidiOut;
pub use progress::{PlaybackTime, Progress};
pub use registry::{ActiveNotes, NoteEvent, NoteStatus};
pub use score::Score;
pub use timing::TimeMapper;
pub use transport::{Transport, TransportState};
