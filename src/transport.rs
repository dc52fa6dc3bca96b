//! Transport control and event dispatch.
//!
//! [`Transport`] owns a loaded score, the playback cursor, the pending timers
//! of the current lookahead batch and the registry of sounding notes. It is
//! driven cooperatively: [`Transport::advance`] fires every timer that is due
//! and must be called from a single thread, typically on each iteration of a
//! UI or console loop.
//!
//! # State machine
//! ```text
//! Stopped --start--> Playing --pause--> Paused
//!    ^                  |                 |
//!    +------stop--------+------stop-------+
//! Paused --resume--> Playing
//! ```
//! Every operation has an `_at(now)` variant taking an explicit instant so
//! playback can be driven deterministically in tests.

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::clock::TimerQueue;
use crate::error::TransportError;
use crate::progress::{Progress, ProgressTracker};
use crate::registry::{ActiveNotes, NoteEvent, NoteStatus};
use crate::scheduler::{plan_batch, PlannedNote, Position, LOOKAHEAD_EVENTS};
use crate::score::Score;
use crate::timing::{is_valid_speed, TimeMapper};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Playing,
    Paused,
}

type EventListener = Box<dyn FnMut(&NoteEvent)>;
type AnimationCallback = Box<dyn FnMut(&Progress<'_>)>;

/// A note event waiting for its timer.
struct ScheduledEntry<H> {
    note: PlannedNote,
    /// Backend sound to withdraw if playback is interrupted
    handle: Option<H>,
    /// Next batch to plan once this entry fires
    continuation: Option<Position>,
}

/// Plays one score through one backend.
pub struct Transport<B: Backend> {
    score: Score,
    backend: B,
    mapper: TimeMapper,
    state: TransportState,
    cursor: u64,
    lookahead: usize,
    /// Subtracted from note numbers reported to listeners and the registry
    note_offset: u8,
    timers: TimerQueue<ScheduledEntry<B::Handle>>,
    active: ActiveNotes,
    listener: Option<EventListener>,
    animation: Option<AnimationCallback>,
    animating: bool,
    tracker: ProgressTracker,
    /// Instant playback last (re)started; None unless playing
    started_at: Option<Instant>,
    /// Play time accumulated before the current run
    elapsed: Duration,
}

impl<B: Backend> Transport<B> {
    pub fn new(score: Score, backend: B) -> Self {
        let mapper = TimeMapper::new(score.ticks_per_second());
        Self {
            score,
            backend,
            mapper,
            state: TransportState::Stopped,
            cursor: 0,
            lookahead: LOOKAHEAD_EVENTS,
            note_offset: 0,
            timers: TimerQueue::new(),
            active: ActiveNotes::new(),
            listener: None,
            animation: None,
            animating: false,
            tracker: ProgressTracker::new(Instant::now()),
            started_at: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Override the number of note events scheduled per batch.
    pub fn with_lookahead(mut self, events: usize) -> Self {
        self.lookahead = events.max(1);
        self
    }

    /// Report note numbers relative to `offset` (e.g. 21 to number piano
    /// keys from A0). The backend still receives the notes as written.
    pub fn with_note_offset(mut self, offset: u8) -> Self {
        self.note_offset = offset;
        self
    }

    // ---- transport ----

    /// Start or resume playback from the cursor.
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    pub fn start_at(&mut self, now: Instant) {
        if self.state == TransportState::Playing {
            self.cancel_pending(now);
        }

        info!(score = %self.score.name, tick = self.cursor, "playback started");
        self.state = TransportState::Playing;
        self.started_at = Some(now);
        self.tracker.restart(now);
        self.schedule_batch(Position::at_tick(&self.score, self.cursor), now);

        if self.animation.is_some() {
            self.animating = true;
        }
    }

    pub fn resume(&mut self) {
        self.start();
    }

    pub fn resume_at(&mut self, now: Instant) {
        self.start_at(now);
    }

    /// Halt playback, keeping the cursor.
    pub fn pause(&mut self) {
        self.pause_at(Instant::now());
    }

    pub fn pause_at(&mut self, now: Instant) {
        if self.state != TransportState::Playing {
            return;
        }
        self.cancel_pending(now);
        self.state = TransportState::Paused;
        self.animating = false;
        info!(tick = self.cursor, "playback paused");
    }

    /// Halt playback and rewind to the beginning.
    pub fn stop(&mut self) {
        self.stop_at(Instant::now());
    }

    pub fn stop_at(&mut self, now: Instant) {
        let was = self.state;
        self.cancel_pending(now);
        self.state = TransportState::Stopped;
        self.animating = false;
        self.cursor = 0;
        self.elapsed = Duration::ZERO;
        self.tracker.restart(now);
        if was != TransportState::Stopped {
            info!("playback stopped");
        }
    }

    /// Move the cursor, restarting scheduling there if playing.
    pub fn seek(&mut self, tick: u64) {
        self.seek_at(tick, Instant::now());
    }

    pub fn seek_at(&mut self, tick: u64, now: Instant) {
        self.cursor = tick.min(self.score.end_tick());
        debug!(tick = self.cursor, "seek");
        if self.state == TransportState::Playing {
            self.start_at(now);
        } else {
            self.tracker.restart(now);
        }
    }

    /// Change the playback-speed coefficient.
    ///
    /// While playing, pending events are discarded and rescheduled from the
    /// cursor under the new rate. Rates outside
    /// [`MIN_SPEED`](crate::timing::MIN_SPEED)..=[`MAX_SPEED`](crate::timing::MAX_SPEED)
    /// are rejected.
    pub fn set_playback_tempo(&mut self, rate: f64) -> Result<(), TransportError> {
        self.set_playback_tempo_at(rate, Instant::now())
    }

    pub fn set_playback_tempo_at(&mut self, rate: f64, now: Instant) -> Result<(), TransportError> {
        if !is_valid_speed(rate) {
            return Err(TransportError::InvalidRate(rate));
        }

        let restart = self.state == TransportState::Playing;
        if restart {
            self.pause_at(now);
        }
        self.mapper.set_speed(rate);
        info!(rate, "playback tempo changed");
        if restart {
            self.start_at(now);
        }
        Ok(())
    }

    // ---- listeners ----

    /// Receive every fired note event, plus synthesized note-offs on interruption.
    pub fn add_listener<F>(&mut self, listener: F)
    where
        F: FnMut(&NoteEvent) + 'static,
    {
        self.listener = Some(Box::new(listener));
    }

    pub fn remove_listener(&mut self) {
        self.listener = None;
    }

    /// Receive a progress snapshot on every [`Transport::animation_frame`].
    pub fn register_animation_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&Progress<'_>) + 'static,
    {
        self.animation = Some(Box::new(callback));
    }

    // ---- dispatch ----

    /// Fire every timer due at `now`, in order, then let the backend flush.
    pub fn advance(&mut self, now: Instant) {
        while let Some((deadline, entry)) = self.timers.pop_due(now) {
            self.fire(deadline, entry);
        }
        self.backend.poll(now);
    }

    /// Run one frame of the progress loop.
    ///
    /// Returns whether the caller should request another frame.
    pub fn animation_frame(&mut self) -> bool {
        self.animation_frame_at(Instant::now())
    }

    pub fn animation_frame_at(&mut self, now: Instant) -> bool {
        let end_tick = self.score.end_tick();
        if end_tick == 0 || !self.animating {
            return false;
        }

        let tick = self.tracker.update(self.cursor, end_tick, now, &self.mapper);
        if tick > 0 {
            if let Some(callback) = self.animation.as_mut() {
                callback(&Progress {
                    percentage: self.cursor as f64 / end_tick as f64,
                    tick,
                    end_tick,
                    mapper: self.mapper,
                    active_notes: &self.active,
                });
            }
        }

        self.animating
    }

    fn schedule_batch(&mut self, from: Position, anchor: Instant) {
        let backend = &self.backend;
        let batch = plan_batch(&self.score, &self.mapper, from, self.lookahead, |channel| {
            backend.is_muted(channel)
        });
        debug!(
            from_tick = from.tick,
            from_index = from.index,
            notes = batch.notes.len(),
            chained = batch.next.is_some(),
            "scheduled batch"
        );

        let last = batch.notes.len().saturating_sub(1);
        for (i, note) in batch.notes.into_iter().enumerate() {
            let Some(at) = anchor.checked_add(note.delay) else {
                warn!(tick = note.tick, "note beyond the representable clock, batch cut short");
                break;
            };
            let result = match note.status {
                NoteStatus::On => self.backend.note_on(note.channel, note.note, note.velocity, at),
                NoteStatus::Off => self.backend.note_off(note.channel, note.note, at),
            };
            let handle = match result {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!(error = %e, channel = note.channel, note = note.note, tick = note.tick, "backend rejected note");
                    None
                }
            };
            let continuation = if i == last { batch.next } else { None };
            self.timers.schedule(
                at,
                ScheduledEntry {
                    note,
                    handle,
                    continuation,
                },
            );
        }
    }

    fn fire(&mut self, deadline: Instant, entry: ScheduledEntry<B::Handle>) {
        let note = entry.note;
        let number = note.note.saturating_sub(self.note_offset);
        let end_tick = self.score.end_tick();
        let event = NoteEvent {
            channel: note.channel,
            note: number,
            tick: note.tick,
            end_tick,
            now: self.mapper.tick_to_time(note.tick),
            end: self.mapper.tick_to_time(end_tick),
            status: note.status,
            velocity: note.velocity,
        };

        match note.status {
            NoteStatus::On => self.active.note_on(event),
            NoteStatus::Off => {
                self.active.note_off(number);
            }
        }
        if let Some(listener) = self.listener.as_mut() {
            listener(&event);
        }
        self.cursor = note.tick;

        if let Some(next) = entry.continuation {
            self.schedule_batch(next, deadline);
        }
    }

    /// Withdraw every pending timer and backend sound, and close out
    /// sounding notes. Safe to call in any state.
    fn cancel_pending(&mut self, now: Instant) {
        if let Some(started) = self.started_at.take() {
            self.elapsed += now.saturating_duration_since(started);
        }

        let cancelled = self.timers.cancel_all();
        if !cancelled.is_empty() {
            debug!(count = cancelled.len(), "cancelled pending events");
        }
        for entry in cancelled {
            if let Some(handle) = entry.handle {
                self.backend.cancel(handle);
            }
        }
        self.backend.all_notes_off();

        for event in self.active.drain_and_close() {
            if let Some(listener) = self.listener.as_mut() {
                listener(&event);
            }
        }
    }

    // ---- queries ----

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    /// Playing with nothing left to fire.
    pub fn is_finished(&self) -> bool {
        self.state == TransportState::Playing && self.timers.is_empty()
    }

    /// Tick of the last fired event (or the seek target).
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn end_tick(&self) -> u64 {
        self.score.end_tick()
    }

    pub fn speed(&self) -> f64 {
        self.mapper.speed()
    }

    pub fn mapper(&self) -> &TimeMapper {
        &self.mapper
    }

    pub fn score(&self) -> &Score {
        &self.score
    }

    pub fn active_notes(&self) -> &ActiveNotes {
        &self.active
    }

    pub fn is_animating(&self) -> bool {
        self.animating
    }

    /// Number of scheduled events not yet fired.
    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    /// When the next scheduled event is due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Total time spent playing since the last stop.
    pub fn elapsed_at(&self, now: Instant) -> Duration {
        let current = self
            .started_at
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or(Duration::ZERO);
        self.elapsed + current
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: Backend> Drop for Transport<B> {
    fn drop(&mut self) {
        for entry in self.timers.cancel_all() {
            if let Some(handle) = entry.handle {
                self.backend.cancel(handle);
            }
        }
    }
}
