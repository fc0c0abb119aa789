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

//! Decoding of variation files into memory.
//!
//! Variations are decoded whole so that playback never touches the disk.

use std::fs::File;
use std::io;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, info};

use super::DecodedBuffer;
use crate::util::filename_display;

/// Error types for decode operations.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Audio file error: {0}")]
    Format(#[from] SymphoniaError),

    #[error("No audio track found in {0}")]
    NoTrack(String),

    #[error("Unsupported audio in {0}: {1}")]
    Unsupported(String, String),
}

/// The audio decoding service. Given a file, returns the decoded audio or fails.
pub trait Decoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<DecodedBuffer, DecodeError>;
}

/// Decodes WAV, FLAC, MP3, OGG and friends with symphonia, transcoding to the
/// output sample rate.
pub struct SymphoniaDecoder {
    target_sample_rate: u32,
}

impl SymphoniaDecoder {
    pub fn new(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }
}

impl Decoder for SymphoniaDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedBuffer, DecodeError> {
        let file_path = path.display().to_string();
        let file = File::open(path)
            .map_err(|e| io::Error::new(e.kind(), format!("{}: {}", file_path, e)))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let probed = get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| DecodeError::NoTrack(file_path.clone()))?;
        let track_id = track.id;
        let source_rate = track.codec_params.sample_rate.ok_or_else(|| {
            DecodeError::Unsupported(file_path.clone(), "sample rate not specified".into())
        })?;
        let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

        let mut samples: Vec<f32> = Vec::new();
        let mut channel_count: u16 = 0;
        loop {
            let packet = match format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    break
                }
                Err(e) => return Err(e.into()),
            };
            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    channel_count = spec.channels.count() as u16;
                    let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buffer.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buffer.samples());
                }
                // A corrupt packet is skipped, the rest of the file is still usable.
                Err(SymphoniaError::DecodeError(e)) => {
                    debug!(file = filename_display(path), error = e, "Skipping bad packet");
                }
                Err(e) => return Err(e.into()),
            }
        }

        if channel_count == 0 {
            return Err(DecodeError::Unsupported(
                file_path,
                "no decodable audio".into(),
            ));
        }

        let (samples, sample_rate) = if source_rate != self.target_sample_rate {
            info!(
                file = filename_display(path),
                source_rate,
                target_rate = self.target_sample_rate,
                "Transcoding variation"
            );
            (
                transcode_samples(&samples, channel_count, source_rate, self.target_sample_rate),
                self.target_sample_rate,
            )
        } else {
            (samples, source_rate)
        };

        let buffer = DecodedBuffer::new(samples, channel_count, sample_rate);
        debug!(
            file = filename_display(path),
            channels = channel_count,
            sample_rate,
            duration_ms = buffer.duration().as_millis() as u64,
            memory_kb = buffer.memory_size() / 1024,
            "Variation decoded"
        );
        Ok(buffer)
    }
}

/// Transcodes interleaved samples from one sample rate to another using linear
/// interpolation. Ambient beds are forgiving enough that this is sufficient.
pub fn transcode_samples(
    samples: &[f32],
    channel_count: u16,
    source_rate: u32,
    target_rate: u32,
) -> Vec<f32> {
    if source_rate == 0 || target_rate == 0 || channel_count == 0 {
        return Vec::new();
    }
    let ratio = target_rate as f64 / source_rate as f64;
    let channels = channel_count as usize;
    let source_frames = samples.len() / channels;
    let target_frames = (source_frames as f64 * ratio).ceil() as usize;

    let mut output = Vec::with_capacity(target_frames * channels);
    for target_frame in 0..target_frames {
        let source_pos = target_frame as f64 / ratio;
        let source_frame = source_pos.floor() as usize;
        let frac = source_pos.fract() as f32;

        for channel in 0..channels {
            let s0 = samples
                .get(source_frame * channels + channel)
                .copied()
                .unwrap_or(0.0);
            let s1 = samples
                .get((source_frame + 1) * channels + channel)
                .copied()
                .unwrap_or(s0);
            output.push(s0 + (s1 - s0) * frac);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hound::{SampleFormat, WavSpec, WavWriter};

    use super::*;

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, frames: usize) {
        let mut writer = WavWriter::create(
            path,
            WavSpec {
                channels,
                sample_rate,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            },
        )
        .unwrap();
        for frame in 0..frames {
            for _ in 0..channels {
                writer.write_sample((frame % 100) as i16 * 100).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_decode_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wind.wav");
        write_wav(&path, 2, 44100, 44100);

        let buffer = SymphoniaDecoder::new(44100).decode(&path).unwrap();
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.sample_rate(), 44100);
        assert_eq!(buffer.frames(), 44100);
        assert_eq!(buffer.duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_decode_transcodes_to_target_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rain.wav");
        write_wav(&path, 1, 22050, 22050);

        let buffer = SymphoniaDecoder::new(44100).decode(&path).unwrap();
        assert_eq!(buffer.sample_rate(), 44100);
        assert_eq!(buffer.frames(), 44100);
    }

    #[test]
    fn test_decode_missing_file() {
        let result = SymphoniaDecoder::new(44100).decode(Path::new("/nonexistent/birds.wav"));
        assert!(matches!(result, Err(DecodeError::Io(_))));
    }

    #[test]
    fn test_decode_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"this is not audio").unwrap();

        assert!(SymphoniaDecoder::new(44100).decode(&path).is_err());
    }

    #[test]
    fn test_transcode_samples() {
        let source_rate = 44100;
        let target_rate = 48000;
        let source_samples: Vec<f32> = (0..4410)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / source_rate as f32).sin())
            .collect();

        let result = transcode_samples(&source_samples, 1, source_rate, target_rate);

        let expected_len = (4410.0_f64 * 48000.0 / 44100.0).ceil() as usize;
        assert_eq!(result.len(), expected_len);
    }

    #[test]
    fn test_transcode_stereo() {
        let source_samples = vec![1.0f32, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0];

        let result = transcode_samples(&source_samples, 2, 44100, 48000);

        assert!(result.len() >= 8);
        assert!((result[0] - 1.0).abs() < 0.1);
        assert!((result[1] - (-1.0)).abs() < 0.1);
    }
}
