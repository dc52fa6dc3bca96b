//! MIDI Player - A GUI application for playing MIDI files through a MIDI output.
//!
//! Usage: midi-player [file.mid]
//!
//! Without a file argument the last opened file from the config is used.
//! Output goes to the configured device, an IAC Driver port, or the first
//! port found, in that order.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;

use iced::time::{self, milliseconds};
use iced::widget::{button, column, container, pick_list, progress_bar, row, slider, text, Column};
use iced::{Center, Element, Fill, Subscription, Theme};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use midi_player::midi::{note_name, MidiOut};
use midi_player::ui::channel_table::view_channel_table;
use midi_player::ui::{format_time, ProgressView, SpeedOption};
use midi_player::{NoteEvent, NoteStatus, PlayerConfig, Score, Transport, TransportState};

/// Number of fired note events listed under the table.
const RECENT_EVENTS: usize = 8;

fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    iced::application(Player::new, Player::update, Player::view)
        .title("MIDI Player")
        .subscription(Player::subscription)
        .theme(Player::theme)
        .run()
}

struct Player {
    config: PlayerConfig,
    transport: Option<Transport<MidiOut>>,
    /// Latest snapshot written by the animation callback
    progress: Rc<RefCell<ProgressView>>,
    /// Most recent note events, newest first
    recent: Rc<RefCell<VecDeque<NoteEvent>>>,
    channels: Vec<u8>,
    port_name: String,
    status: String,
}

#[derive(Debug, Clone, Copy)]
enum Message {
    Tick,
    Play,
    Pause,
    Stop,
    Seek(f32),
    SpeedSelected(SpeedOption),
    ToggleMute(u8),
}

impl Player {
    fn new() -> Self {
        let config = PlayerConfig::load(PlayerConfig::default_path()).unwrap_or_else(|e| {
            warn!(error = %e, "using default config");
            PlayerConfig::default()
        });

        let mut out = MidiOut::new(config.output_device.as_deref()).unwrap_or_else(|e| {
            warn!(error = %e, "no MIDI output, playing silently");
            MidiOut::disconnected()
        });
        config.apply_mutes(&mut out);
        let port_name = out.port_name.clone();

        let progress = Rc::new(RefCell::new(ProgressView::default()));
        let recent = Rc::new(RefCell::new(VecDeque::with_capacity(RECENT_EVENTS)));

        let path: Option<PathBuf> = std::env::args()
            .nth(1)
            .map(PathBuf::from)
            .or_else(|| config.last_file.clone());

        let mut player = Self {
            config,
            transport: None,
            progress,
            recent,
            channels: Vec::new(),
            port_name,
            status: "No file loaded".to_string(),
        };

        if let Some(path) = path {
            match Score::from_file(&path) {
                Ok(score) => player.load(score, out, path),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load score");
                    player.status = format!("Failed to load {}: {}", path.display(), e);
                }
            }
        }

        player
    }

    fn load(&mut self, score: Score, out: MidiOut, path: PathBuf) {
        info!(
            score = %score.name,
            notes = score.note_count(),
            end_tick = score.end_tick(),
            "score loaded"
        );
        self.channels = score.channels();
        self.status = format!("{} ({} notes)", score.name, score.note_count());

        let mut transport = Transport::new(score, out)
            .with_lookahead(self.config.lookahead_events)
            .with_note_offset(self.config.note_offset);
        if let Err(e) = transport.set_playback_tempo(self.config.playback_speed) {
            warn!(error = %e, "ignoring configured playback speed");
        }

        let progress = self.progress.clone();
        transport.register_animation_callback(move |p| {
            *progress.borrow_mut() = ProgressView::from_progress(p);
        });

        let recent = self.recent.clone();
        transport.add_listener(move |event| {
            let mut recent = recent.borrow_mut();
            if recent.len() == RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(*event);
        });

        self.transport = Some(transport);
        self.config.last_file = Some(path);
        self.save_config();
    }

    fn save_config(&self) {
        if let Err(e) = self.config.save(PlayerConfig::default_path()) {
            warn!(error = %e, "failed to save config");
        }
    }

    fn update(&mut self, message: Message) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };

        match message {
            Message::Tick => {
                let now = Instant::now();
                transport.advance(now);
                transport.animation_frame_at(now);
                if transport.is_finished() {
                    transport.stop_at(now);
                    *self.progress.borrow_mut() = ProgressView::default();
                }
            }
            Message::Play => transport.start(),
            Message::Pause => transport.pause(),
            Message::Stop => {
                transport.stop();
                *self.progress.borrow_mut() = ProgressView::default();
            }
            Message::Seek(fraction) => {
                let tick = (fraction as f64 * transport.end_tick() as f64) as u64;
                transport.seek(tick);
            }
            Message::SpeedSelected(SpeedOption(speed)) => match transport.set_playback_tempo(speed) {
                Ok(()) => {
                    self.config.playback_speed = speed;
                    self.save_config();
                }
                Err(e) => warn!(error = %e, "speed change rejected"),
            },
            Message::ToggleMute(channel) => {
                let muted = !self.config.is_muted(channel);
                self.config.set_muted(channel, muted);
                transport.backend_mut().set_muted(channel, muted);
                // Pending batch was planned with the old mutes
                if transport.is_playing() {
                    transport.seek(transport.cursor());
                }
                self.save_config();
            }
        }
    }

    fn view(&self) -> Element<'_, Message> {
        let Some(transport) = self.transport.as_ref() else {
            return container(text(&self.status).size(20))
                .width(Fill)
                .height(Fill)
                .center_x(Fill)
                .center_y(Fill)
                .into();
        };

        let progress = self.progress.borrow();
        let state = transport.state();

        let (status, status_color) = match state {
            TransportState::Playing => ("▶ PLAYING", iced::Color::from_rgb(0.2, 0.8, 0.2)),
            TransportState::Paused => ("⏸ PAUSED", iced::Color::from_rgb(0.9, 0.6, 0.1)),
            TransportState::Stopped => ("⏹ STOPPED", iced::Color::from_rgb(0.6, 0.6, 0.6)),
        };

        let end_tick = transport.end_tick().max(1);
        let shown_tick = if state == TransportState::Playing {
            progress.tick
        } else {
            transport.cursor()
        };
        let fraction = shown_tick as f32 / end_tick as f32;
        let now = transport.mapper().tick_to_time(shown_tick);
        let end = transport.mapper().tick_to_time(transport.end_tick());

        let controls = row![
            button(text("Play").size(16))
                .on_press_maybe((state != TransportState::Playing).then_some(Message::Play)),
            button(text("Pause").size(16))
                .on_press_maybe((state == TransportState::Playing).then_some(Message::Pause)),
            button(text("Stop").size(16))
                .on_press_maybe((state != TransportState::Stopped).then_some(Message::Stop)),
            pick_list(
                SpeedOption::all_options(),
                Some(SpeedOption(transport.speed())),
                Message::SpeedSelected
            )
            .text_size(14),
        ]
        .spacing(8)
        .align_y(Center);

        let recent: Vec<Element<'_, Message>> = self
            .recent
            .borrow()
            .iter()
            .map(|event| {
                let kind = if event.status == NoteStatus::On { "ON " } else { "OFF" };
                text(format!(
                    "{} Ch:{} {} Vel:{}",
                    kind,
                    event.channel + 1,
                    note_name(event.note),
                    event.velocity
                ))
                .size(12)
                .into()
            })
            .collect();

        let content = column![
            text("MIDI Player").size(40),
            text(format!("🎵 {}", self.port_name)).size(16),
            text(&self.status).size(16),
            text(status).size(30).color(status_color),
            text(format!("{} / {}", format_time(now), format_time(end))).size(24),
            progress_bar(0.0..=1.0, fraction),
            slider(0.0..=1.0, fraction, Message::Seek).step(0.001_f32),
            controls,
            view_channel_table(
                &self.channels,
                &progress,
                |channel| self.config.is_muted(channel),
                Message::ToggleMute
            ),
            Column::with_children(recent).spacing(2),
        ]
        .spacing(10)
        .padding(20)
        .align_x(Center);

        container(content)
            .width(Fill)
            .height(Fill)
            .center_x(Fill)
            .into()
    }

    fn subscription(&self) -> Subscription<Message> {
        time::every(milliseconds(10)).map(|_| Message::Tick)
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}
