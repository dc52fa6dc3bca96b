//! The seam between the scheduler and whatever actually makes sound.

use std::time::Instant;

use crate::error::BackendError;

/// A sound-producing backend.
///
/// Note calls are made ahead of time, when a lookahead batch is planned,
/// with the instant the sound should start or stop. Each call returns a
/// handle so the transport can take the sound back if playback is
/// interrupted before that instant.
pub trait Backend {
    /// Opaque token identifying one scheduled sound.
    type Handle;

    fn note_on(
        &mut self,
        channel: u8,
        note: u8,
        velocity: u8,
        at: Instant,
    ) -> Result<Self::Handle, BackendError>;

    fn note_off(&mut self, channel: u8, note: u8, at: Instant) -> Result<Self::Handle, BackendError>;

    /// Withdraw a scheduled sound. Cancelling a sound that already played is a no-op.
    fn cancel(&mut self, handle: Self::Handle);

    fn is_muted(&self, _channel: u8) -> bool {
        false
    }

    /// Called on every dispatch step; backends that defer sends flush here.
    fn poll(&mut self, _now: Instant) {}

    /// Silence anything left sounding after playback is interrupted.
    fn all_notes_off(&mut self) {}
}
