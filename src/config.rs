//! Configuration persistence for the MIDI player.
//!
//! Saves and loads player configuration to/from YAML files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::midi::{MidiOut, CHANNELS};
use crate::scheduler::LOOKAHEAD_EVENTS;
use crate::timing::{is_valid_speed, MAX_SPEED, MIN_SPEED};

/// Playback speeds offered in the UI.
pub const SPEED_PRESETS: [f64; 7] = [0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 2.0];

/// Complete player configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// MIDI output device name (substring match)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_device: Option<String>,
    /// Muted channels (1-16, stored as 1-indexed for human readability)
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub muted_channels: BTreeSet<u8>,
    /// Playback-speed coefficient (1.0 = as written, 2.0 = twice as slow)
    #[serde(default = "default_speed")]
    pub playback_speed: f64,
    /// Note events scheduled per lookahead batch
    #[serde(default = "default_lookahead")]
    pub lookahead_events: usize,
    /// Subtracted from note numbers shown in listeners (21 numbers piano keys from A0)
    #[serde(default, skip_serializing_if = "is_zero")]
    pub note_offset: u8,
    /// Last opened MIDI file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_file: Option<PathBuf>,
}

fn default_speed() -> f64 {
    1.0
}

fn default_lookahead() -> usize {
    LOOKAHEAD_EVENTS
}

fn is_zero(value: &u8) -> bool {
    *value == 0
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            output_device: None,
            muted_channels: BTreeSet::new(),
            playback_speed: default_speed(),
            lookahead_events: default_lookahead(),
            note_offset: 0,
            last_file: None,
        }
    }
}

impl PlayerConfig {
    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        let project_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        project_dir.join("player_config.yaml")
    }

    /// Load configuration from a YAML file. A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        Self::from_yaml(&content)
    }

    /// Parse and validate configuration YAML.
    pub fn from_yaml(content: &str) -> Result<Self, String> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| format!("Failed to parse config YAML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(path, content)
            .map_err(|e| format!("Failed to write config file: {}", e))
    }

    fn validate(&self) -> Result<(), String> {
        if !is_valid_speed(self.playback_speed) {
            return Err(format!(
                "playback_speed must be between {} and {}, got {}",
                MIN_SPEED, MAX_SPEED, self.playback_speed
            ));
        }
        if self.note_offset > 127 {
            return Err(format!("note_offset must be at most 127, got {}", self.note_offset));
        }
        if self.lookahead_events == 0 {
            return Err("lookahead_events must be at least 1".to_string());
        }
        if let Some(ch) = self.muted_channels.iter().find(|ch| !(1..=16).contains(*ch)) {
            return Err(format!("muted channel {} out of range 1-16", ch));
        }
        Ok(())
    }

    /// Whether a 0-indexed channel is muted. Channels past 15 never are.
    pub fn is_muted(&self, channel: u8) -> bool {
        (channel as usize) < CHANNELS && self.muted_channels.contains(&(channel + 1))
    }

    /// Mute or unmute a 0-indexed channel (0-15); other channels are ignored.
    pub fn set_muted(&mut self, channel: u8, muted: bool) {
        if channel as usize >= CHANNELS {
            return;
        }
        if muted {
            self.muted_channels.insert(channel + 1);
        } else {
            self.muted_channels.remove(&(channel + 1));
        }
    }

    /// Copy the mute flags onto an output backend.
    pub fn apply_mutes(&self, out: &mut MidiOut) {
        for channel in 0..16u8 {
            out.set_muted(channel, self.is_muted(channel));
        }
    }
}
