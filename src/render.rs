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

//! Offline rendering of a selection to a WAV file.
//!
//! The engine and the mixer run exactly as they do live, except that the clock
//! is driven by the number of frames written and decoding happens inline.

use std::path::Path;
use std::time::Duration;

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::{debug, info};

use crate::audio::decode::Decoder;
use crate::audio::mixer::Mixer;
use crate::engine::Engine;
use crate::util::duration_minutes_seconds;

/// Number of frames mixed per block. Blocks are shortened so that every timer
/// fires on the exact frame it is due.
const BLOCK_FRAMES: usize = 512;

const NANOS_PER_SEC: u128 = 1_000_000_000;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Unsupported bit depth {0}, expected 16, 24 or 32")]
    UnsupportedBitDepth(u16),

    #[error("Unable to write WAV: {0}")]
    Wav(#[from] hound::Error),
}

fn frame_at(time: Duration, sample_rate: u32) -> u64 {
    let nanos = time.as_nanos() * sample_rate as u128;
    nanos.div_ceil(NANOS_PER_SEC) as u64
}

fn time_at(frame: u64, sample_rate: u32) -> Duration {
    let nanos = frame as u128 * NANOS_PER_SEC / sample_rate as u128;
    Duration::from_nanos(nanos as u64)
}

fn decode_pending(engine: &mut Engine, decoder: &dyn Decoder) {
    for job in engine.take_decode_jobs() {
        let result = decoder.decode(&job.path);
        engine.complete_decode(job, result);
    }
}

/// Writes mixed samples at the given bit depth. 32 bits is written as float.
struct SampleWriter {
    writer: WavWriter<std::io::BufWriter<std::fs::File>>,
    bit_depth: u16,
}

impl SampleWriter {
    fn create(path: &Path, channels: u16, sample_rate: u32, bit_depth: u16) -> Result<Self, RenderError> {
        let sample_format = match bit_depth {
            16 | 24 => SampleFormat::Int,
            32 => SampleFormat::Float,
            other => return Err(RenderError::UnsupportedBitDepth(other)),
        };
        let writer = WavWriter::create(
            path,
            WavSpec {
                channels,
                sample_rate,
                bits_per_sample: bit_depth,
                sample_format,
            },
        )?;
        Ok(SampleWriter { writer, bit_depth })
    }

    fn write(&mut self, samples: &[f32]) -> Result<(), RenderError> {
        for &sample in samples {
            let sample = sample.clamp(-1.0, 1.0);
            match self.bit_depth {
                16 => self.writer.write_sample((sample * i16::MAX as f32) as i16)?,
                24 => self.writer.write_sample((sample * 8_388_607.0) as i32)?,
                _ => self.writer.write_sample(sample)?,
            }
        }
        Ok(())
    }

    fn finalize(self) -> Result<(), RenderError> {
        Ok(self.writer.finalize()?)
    }
}

/// Plays the engine's current selection from the start for `length` and writes
/// the mix to `path`. The engine must play into `mixer`.
///
/// Returns the number of frames written.
pub fn render(
    engine: &mut Engine,
    mixer: &Mixer,
    decoder: &dyn Decoder,
    length: Duration,
    bit_depth: u16,
    path: &Path,
) -> Result<u64, RenderError> {
    let sample_rate = mixer.sample_rate();
    let channels = mixer.num_channels();
    let mut writer = SampleWriter::create(path, channels, sample_rate, bit_depth)?;

    info!(
        scene = engine.scene().name(),
        length = duration_minutes_seconds(length),
        sample_rate,
        channels,
        path = path.display().to_string(),
        "Rendering"
    );

    let origin = engine.now();
    decode_pending(engine, decoder);
    engine.start();

    let total_frames = frame_at(length, sample_rate);
    let mut block = vec![0.0f32; BLOCK_FRAMES * channels as usize];
    let mut frame: u64 = 0;
    while frame < total_frames {
        engine.advance_to(origin + time_at(frame, sample_rate));
        decode_pending(engine, decoder);

        let mut frames = (BLOCK_FRAMES as u64).min(total_frames - frame);
        if let Some(deadline) = engine.next_deadline() {
            let deadline_frame = frame_at(deadline.saturating_sub(origin), sample_rate);
            if deadline_frame > frame {
                frames = frames.min(deadline_frame - frame);
            }
        }

        let samples = &mut block[..frames as usize * channels as usize];
        mixer.process_into_output(samples, frames as usize);
        writer.write(samples)?;
        frame += frames;
    }

    engine.stop();
    writer.finalize()?;
    debug!(frames = frame, sources = mixer.active_source_count(), "Render finished");
    info!(path = path.display().to_string(), "Render written");
    Ok(frame)
}
