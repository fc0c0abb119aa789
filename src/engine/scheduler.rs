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
//! The per-sample playback loop.
//!
//! A sounding sample always has exactly one current source. CROSSFADE samples
//! start the next variation when the current one ends. OVERLAY samples schedule
//! the next variation `concat_overlay` before the current one ends and let the
//! two overlap.

use rand::Rng;
use tracing::{debug, warn};

use super::{Engine, Task, MIN_TIMER_DELAY};
use crate::audio::SourceId;
use crate::config::StitchingMethod;
use crate::samples::SampleState;

impl Engine {
    /// Starts the loop of a sample if it should be sounding and is not. A sample
    /// sounds while playback is started, it is toggled on, its volume is above
    /// zero and none of its variations are still decoding.
    pub(super) fn maybe_start_sample(&mut self, sample: usize) {
        if !self.started {
            return;
        }
        let Some(volume) = self.params(sample).map(|params| params.current_vol) else {
            return;
        };
        let Some(runtime) = self.samples.get(sample) else {
            return;
        };
        if !runtime.enabled
            || volume <= 0.0
            || runtime.state.is_sounding()
            || runtime.any_loading()
        {
            return;
        }
        if runtime.loaded_variations().is_empty() {
            warn!(sample = runtime.label(), "No playable variations");
            return;
        }

        self.play_next_variation(sample);
        self.ensure_envelope(sample);
    }

    /// Plays a random decoded variation of the sample and schedules the hand-off
    /// to the next one. The previous source is replaced, not stopped.
    pub(super) fn play_next_variation(&mut self, sample: usize) {
        if !self.started {
            return;
        }
        let Some(runtime) = self.samples.get_mut(sample) else {
            return;
        };
        if let Some(timer) = runtime.state.pending_timer() {
            self.timers.cancel(timer);
        }

        let loaded = runtime.loaded_variations();
        if loaded.is_empty() {
            warn!(sample = runtime.label(), "No decoded variations, sample goes idle");
            runtime.state = SampleState::Idle;
            return;
        }
        let index = loaded[self.rng.gen_range(0..loaded.len())];
        let variation = &runtime.variations()[index];
        let Some(buffer) = variation.buffer().cloned() else {
            return;
        };
        let gain = variation.gain();
        let duration = buffer.duration();

        let delay = match runtime.stitching() {
            StitchingMethod::Crossfade => duration,
            StitchingMethod::Overlay => {
                let overlay = runtime.concat_overlay();
                if overlay >= duration {
                    warn!(
                        sample = runtime.label(),
                        overlay_ms = overlay.as_millis() as u64,
                        duration_ms = duration.as_millis() as u64,
                        "Overlay is not shorter than the variation, handing off at its end"
                    );
                    duration
                } else {
                    duration - overlay
                }
            }
        }
        .max(MIN_TIMER_DELAY);
        let due = self.now + delay;

        let source = self.output.start(buffer, gain);
        runtime.state = match runtime.stitching() {
            StitchingMethod::Crossfade => SampleState::Playing {
                source,
                end_timer: self.timers.schedule(due, Task::SourceEnded { sample, source }),
            },
            StitchingMethod::Overlay => SampleState::PendingHandoff {
                source,
                timer: self.timers.schedule(due, Task::Handoff { sample }),
            },
        };

        debug!(
            sample = runtime.label(),
            variation = index,
            source = %source,
            delay_ms = delay.as_millis() as u64,
            "Playing variation"
        );
    }

    /// Cancels the pending hand-off and halts the current source. Does nothing
    /// if the sample is not sounding.
    pub(super) fn stop_sample(&mut self, sample: usize) {
        let Some(runtime) = self.samples.get_mut(sample) else {
            return;
        };
        if !runtime.state.is_sounding() {
            return;
        }
        if let Some(timer) = runtime.state.pending_timer() {
            self.timers.cancel(timer);
        }
        if let Some(source) = runtime.state.current_source() {
            self.output.stop(source);
        }
        runtime.state = SampleState::Stopped;
        debug!(sample = runtime.label(), "Stopped sample");
    }

    pub(super) fn on_source_ended(&mut self, sample: usize, source: SourceId) {
        match self.samples.get(sample).map(|runtime| runtime.state) {
            Some(SampleState::Playing { source: current, .. }) if current == source => {
                self.play_next_variation(sample)
            }
            _ => debug!(sample, source = %source, "Ignoring end of a replaced source"),
        }
    }

    pub(super) fn on_handoff(&mut self, sample: usize) {
        if let Some(SampleState::PendingHandoff { .. }) =
            self.samples.get(sample).map(|runtime| runtime.state)
        {
            self.play_next_variation(sample);
        }
    }
}
