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
use std::{error::Error, fmt, sync::Arc, time::Duration};

use crate::config;

pub mod cpal;
pub mod decode;
pub mod mixer;
pub mod mock;

/// Identifies a gain stage created on an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GainId(pub u64);

/// Identifies a playing source on an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source-{}", self.0)
    }
}

/// Fully decoded audio held in memory, interleaved.
#[derive(Clone, PartialEq)]
pub struct DecodedBuffer {
    data: Vec<f32>,
    channel_count: u16,
    sample_rate: u32,
}

impl DecodedBuffer {
    pub fn new(data: Vec<f32>, channel_count: u16, sample_rate: u32) -> Self {
        Self {
            data,
            channel_count: channel_count.max(1),
            sample_rate,
        }
    }

    /// A silent buffer of the given length. Handy for mocks and tests.
    pub fn silence(duration: Duration, channel_count: u16, sample_rate: u32) -> Self {
        let frames = (duration.as_secs_f64() * sample_rate as f64).round() as usize;
        Self::new(
            vec![0.0; frames * channel_count.max(1) as usize],
            channel_count,
            sample_rate,
        )
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.data.len() / self.channel_count as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

impl fmt::Debug for DecodedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedBuffer")
            .field("channels", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .field("duration", &self.duration())
            .finish()
    }
}

/// The audio output stage: one shared mixing context that samples play into.
///
/// Every gain and every source is an independent node, so no sample can starve
/// another. Gains take values in 0.0-1.0.
pub trait Output: Send + Sync {
    /// Creates a gain stage feeding the final output.
    fn create_gain(&self, value: f32) -> GainId;

    /// Sets the value of a gain stage. Unknown gains are ignored.
    fn set_gain(&self, gain: GainId, value: f32);

    /// Releases gain stages that are no longer referenced.
    fn release_gains(&self, gains: &[GainId]);

    /// Starts playing the buffer through the gain immediately.
    fn start(&self, buffer: Arc<DecodedBuffer>, gain: GainId) -> SourceId;

    /// Halts a source. Stopping a source that already finished is a no-op.
    fn stop(&self, source: SourceId);
}

/// Lists the output devices known to cpal.
pub fn list_devices() -> Result<Vec<String>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Opens the output described by the audio configuration.
pub fn get_output(config: &config::Audio) -> Result<Arc<dyn Output>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Output::new()));
    }

    Ok(Arc::new(cpal::Device::open(
        device,
        config.sample_rate(),
        config.channels(),
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoded_buffer_duration() {
        let buffer = DecodedBuffer::new(vec![0.0; 44100 * 2], 2, 44100);
        assert_eq!(buffer.frames(), 44100);
        assert_eq!(buffer.duration(), Duration::from_secs(1));
        assert_eq!(buffer.memory_size(), 44100 * 2 * 4);
    }

    #[test]
    fn test_silence() {
        let buffer = DecodedBuffer::silence(Duration::from_millis(500), 1, 48000);
        assert_eq!(buffer.frames(), 24000);
        assert_eq!(buffer.duration(), Duration::from_millis(500));
        assert!(buffer.data().iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_zero_channels_is_treated_as_mono() {
        let buffer = DecodedBuffer::new(vec![0.0; 10], 0, 10);
        assert_eq!(buffer.channel_count(), 1);
        assert_eq!(buffer.frames(), 10);
    }

    #[test]
    fn test_mock_device_name_selects_mock() {
        let output = get_output(&config::Audio::new("mock-device"));
        assert!(output.is_ok());
    }
}
