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
// Core mixing logic shared by the cpal device and the offline renderer.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::{DecodedBuffer, GainId, Output, SourceId};

/// A gain value shared between the control side and the mixing side.
#[derive(Clone)]
struct SharedGain(Arc<AtomicU32>);

impl SharedGain {
    fn new(value: f32) -> Self {
        Self(Arc::new(AtomicU32::new(value.to_bits())))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Messages from the control side to the mixing side.
enum MixerCommand {
    Add(MixingSource),
    Stop(SourceId),
}

/// A source currently being mixed.
struct MixingSource {
    id: SourceId,
    buffer: Arc<DecodedBuffer>,
    gain: SharedGain,
    /// Position in frames.
    position: usize,
}

/// The single shared mixing context. Every started source is mixed into the output
/// through its own gain stage.
pub struct Mixer {
    num_channels: u16,
    sample_rate: u32,
    gains: RwLock<HashMap<GainId, SharedGain>>,
    /// Sources are handed to the mixing side over a channel so that starting or
    /// stopping a source never waits on the render lock.
    command_tx: crossbeam_channel::Sender<MixerCommand>,
    command_rx: crossbeam_channel::Receiver<MixerCommand>,
    sources: Mutex<Vec<MixingSource>>,
    next_gain_id: AtomicU64,
    next_source_id: AtomicU64,
    frames_rendered: AtomicU64,
}

impl Mixer {
    /// Creates a new mixer.
    pub fn new(num_channels: u16, sample_rate: u32) -> Self {
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        Self {
            num_channels: num_channels.max(1),
            sample_rate,
            gains: RwLock::new(HashMap::new()),
            command_tx,
            command_rx,
            sources: Mutex::new(Vec::new()),
            next_gain_id: AtomicU64::new(1),
            next_source_id: AtomicU64::new(1),
            frames_rendered: AtomicU64::new(0),
        }
    }

    /// Gets the number of output channels
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Gets the sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Total frames rendered since creation.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    /// Number of sources mixed during the last render.
    pub fn active_source_count(&self) -> usize {
        self.sources.lock().len()
    }

    /// Renders `num_frames` interleaved frames into `output`, replacing its contents.
    /// Sources that run out of frames are dropped.
    pub fn process_into_output(&self, output: &mut [f32], num_frames: usize) {
        let channels = self.num_channels as usize;
        let num_frames = num_frames.min(output.len() / channels);
        output[..num_frames * channels].fill(0.0);

        let mut sources = self.sources.lock();
        while let Ok(command) = self.command_rx.try_recv() {
            match command {
                MixerCommand::Add(source) => sources.push(source),
                MixerCommand::Stop(id) => sources.retain(|source| source.id != id),
            }
        }

        sources.retain_mut(|source| {
            let gain = source.gain.load();
            let source_channels = source.buffer.channel_count() as usize;
            let data = source.buffer.data();
            let total_frames = source.buffer.frames();
            let to_mix = total_frames.saturating_sub(source.position).min(num_frames);

            for frame in 0..to_mix {
                let in_base = (source.position + frame) * source_channels;
                let out_base = frame * channels;
                for channel in 0..channels {
                    // Mono is spread to every output; extra source channels are dropped.
                    let source_channel = if source_channels == 1 { 0 } else { channel };
                    if source_channel < source_channels {
                        output[out_base + channel] += data[in_base + source_channel] * gain;
                    }
                }
            }

            source.position += to_mix;
            if source.position >= total_frames {
                debug!(source = %source.id, "Source finished");
                return false;
            }
            true
        });

        self.frames_rendered
            .fetch_add(num_frames as u64, Ordering::Relaxed);
    }

    /// Processes multiple frames of audio mixing into a new buffer.
    pub fn process_frames(&self, num_frames: usize) -> Vec<f32> {
        let mut frames = vec![0.0; num_frames * self.num_channels as usize];
        self.process_into_output(&mut frames, num_frames);
        frames
    }
}

impl Output for Mixer {
    fn create_gain(&self, value: f32) -> GainId {
        let id = GainId(self.next_gain_id.fetch_add(1, Ordering::Relaxed));
        self.gains.write().insert(id, SharedGain::new(value));
        id
    }

    fn set_gain(&self, gain: GainId, value: f32) {
        if let Some(shared) = self.gains.read().get(&gain) {
            shared.store(value);
        }
    }

    fn release_gains(&self, gains: &[GainId]) {
        let mut all = self.gains.write();
        for gain in gains {
            all.remove(gain);
        }
    }

    fn start(&self, buffer: Arc<DecodedBuffer>, gain: GainId) -> SourceId {
        let id = SourceId(self.next_source_id.fetch_add(1, Ordering::Relaxed));
        let gain = match self.gains.read().get(&gain) {
            Some(shared) => shared.clone(),
            None => SharedGain::new(0.0),
        };
        // The receiver lives as long as the mixer, so sending cannot fail.
        let _ = self.command_tx.send(MixerCommand::Add(MixingSource {
            id,
            buffer,
            gain,
            position: 0,
        }));
        id
    }

    fn stop(&self, source: SourceId) {
        let _ = self.command_tx.send(MixerCommand::Stop(source));
    }
}

impl std::fmt::Debug for Mixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mixer")
            .field("num_channels", &self.num_channels)
            .field("sample_rate", &self.sample_rate)
            .field("gains", &self.gains.read().len())
            .finish()
    }
}
