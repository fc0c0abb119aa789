// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, File};
use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;

const DEFAULT_DEVICE: &str = "default";
const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_CHANNELS: u16 = 2;
const DEFAULT_ENVELOPE_STEP: Duration = Duration::from_millis(16);
const DEFAULT_ENVELOPE_START_DELAY: Duration = Duration::from_millis(100);
const DEFAULT_EXPORT_LENGTH: Duration = Duration::from_secs(600);
const DEFAULT_BIT_DEPTH: u16 = 16;
const DEFAULT_EXPORT_FORMAT: &str = "wav";

/// Parses a duration string such as `16ms` or `10m`.
pub(super) fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    Ok(DurationString::from_string(value.to_string())
        .map_err(|e| ConfigError::Duration {
            value: value.to_string(),
            reason: e.to_string(),
        })?
        .into())
}

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Audio {
    /// The audio device. Names starting with `mock` select the mock output.
    device: Option<String>,

    /// Output sample rate in Hz (default: 44100)
    sample_rate: Option<u32>,

    /// Output channel count (default: 2)
    channels: Option<u16>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: Some(device.to_string()),
            sample_rate: None,
            channels: None,
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    /// Returns the output sample rate (default: 44100)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the output channel count (default: 2)
    pub fn channels(&self) -> u16 {
        self.channels.unwrap_or(DEFAULT_CHANNELS).max(1)
    }
}

/// Top level settings of the render manifest.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct ExportSettings {
    /// Length of the render (default: 10m).
    length: Option<String>,
    bit_depth: Option<u16>,
    sample_rate: Option<u32>,
    format: Option<String>,
}

impl ExportSettings {
    pub fn new(length: Duration, bit_depth: u16, sample_rate: u32, format: &str) -> ExportSettings {
        ExportSettings {
            length: Some(format!("{}ms", length.as_millis())),
            bit_depth: Some(bit_depth),
            sample_rate: Some(sample_rate),
            format: Some(format.to_string()),
        }
    }

    pub fn length(&self) -> Result<Duration, ConfigError> {
        match &self.length {
            Some(length) => parse_duration(length),
            None => Ok(DEFAULT_EXPORT_LENGTH),
        }
    }

    pub fn bit_depth(&self) -> u16 {
        self.bit_depth.unwrap_or(DEFAULT_BIT_DEPTH)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    pub fn format(&self) -> &str {
        self.format.as_deref().unwrap_or(DEFAULT_EXPORT_FORMAT)
    }
}

/// The configuration for the soundscape player.
#[derive(Deserialize, Clone, Debug)]
pub struct Player {
    /// The path to the scene catalog, relative to this file.
    catalog: PathBuf,
    #[serde(default)]
    audio: Audio,
    /// Whether volumes wander on their own once playback starts.
    #[serde(default)]
    animate: bool,
    /// Interval between envelope steps (default: 16ms).
    envelope_step: Option<String>,
    /// Delay between start and the first envelope step (default: 100ms).
    envelope_start_delay: Option<String>,
    #[serde(default)]
    export: ExportSettings,
    /// Seed for the variation and envelope randomness.
    seed: Option<u64>,
    #[serde(skip)]
    base_dir: PathBuf,
}

impl Player {
    /// Parse a player configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Player, ConfigError> {
        let mut player = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Player>()?;
        player.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(player)
    }

    /// The catalog path, resolved against the directory of the player config.
    pub fn catalog(&self) -> PathBuf {
        self.base_dir.join(&self.catalog)
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn animate(&self) -> bool {
        self.animate
    }

    pub fn envelope_step(&self) -> Result<Duration, ConfigError> {
        match &self.envelope_step {
            Some(step) => parse_duration(step),
            None => Ok(DEFAULT_ENVELOPE_STEP),
        }
    }

    pub fn envelope_start_delay(&self) -> Result<Duration, ConfigError> {
        match &self.envelope_start_delay {
            Some(delay) => parse_duration(delay),
            None => Ok(DEFAULT_ENVELOPE_START_DELAY),
        }
    }

    pub fn export(&self) -> &ExportSettings {
        &self.export
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}
