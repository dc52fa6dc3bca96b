//! Error types for score loading, backend dispatch and transport control.

use thiserror::Error;

/// Failure while turning MIDI data into a playable [`Score`](crate::score::Score).
///
/// A score that fails to load never reaches the transport, so playback cannot
/// start with an undefined tick rate.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("failed to read file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse MIDI: {0}")]
    Parse(String),

    #[error("timecode-based MIDI files not supported")]
    TimecodeUnsupported,

    #[error("score has no tempo marker")]
    MissingTempo,

    #[error("invalid timing: {0}")]
    InvalidTiming(String),
}

/// A sound backend refused a note call.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("channel {0} out of range (0-15)")]
    InvalidChannel(u8),

    #[error("failed to connect MIDI output: {0}")]
    Connect(String),

    #[error("failed to send MIDI: {0}")]
    Send(String),
}

/// Rejected transport operation.
#[derive(Debug, Error, PartialEq)]
pub enum TransportError {
    #[error("playback rate must be between 0.01 and 100, got {0}")]
    InvalidRate(f64),
}
