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
//! Envelope animation: each sounding sample's volume wanders between its bounds,
//! one random target and duration at a time.

use std::time::Duration;

use rand::Rng;
use tracing::debug;

use super::{Engine, Task};
use crate::samples::Envelope;

impl Engine {
    pub(super) fn schedule_envelope_start(&mut self) {
        if let Some(timer) = self.envelope_start.take() {
            self.timers.cancel(timer);
        }
        let due = self.now + self.settings.envelope_start_delay;
        self.envelope_start = Some(self.timers.schedule(due, Task::StartEnvelopes));
    }

    pub(super) fn start_envelopes(&mut self) {
        self.envelope_start = None;
        if !self.started || !self.animate {
            return;
        }
        debug!("Starting envelopes");
        self.envelopes_armed = true;
        for sample in 0..self.samples.len() {
            self.ensure_envelope(sample);
        }
    }

    /// Gives a sounding sample an envelope if envelopes are running and it has none.
    pub(super) fn ensure_envelope(&mut self, sample: usize) {
        if !self.envelopes_armed {
            return;
        }
        match self.samples.get(sample) {
            Some(runtime) if runtime.state.is_sounding() && runtime.envelope.is_none() => {
                self.animate_toward_new_target(sample)
            }
            _ => {}
        }
    }

    /// Picks a target volume in [min, max] and a duration in the timeframe
    /// bounds, both inclusive, and starts moving toward it from the live volume.
    pub(super) fn animate_toward_new_target(&mut self, sample: usize) {
        if !self.started {
            return;
        }
        let Some(params) = self.params(sample).copied() else {
            return;
        };
        let target = if params.min_vol < params.max_vol {
            self.rng.gen_range(params.min_vol..=params.max_vol)
        } else {
            params.min_vol
        };
        let shortest = params
            .min_timeframe_length_ms
            .min(params.max_timeframe_length_ms);
        let longest = params
            .min_timeframe_length_ms
            .max(params.max_timeframe_length_ms);
        let duration = Duration::from_millis(self.rng.gen_range(shortest..=longest));

        let Some(runtime) = self.samples.get_mut(sample) else {
            return;
        };
        if let Some(timer) = runtime.envelope_timer.take() {
            self.timers.cancel(timer);
        }
        runtime.envelope = Some(Envelope::new(
            runtime.current_volume,
            target,
            self.now,
            duration,
        ));
        runtime.envelope_timer = Some(self.timers.schedule(
            self.now + self.settings.envelope_step,
            Task::EnvelopeStep { sample },
        ));

        debug!(
            sample = runtime.label(),
            from = runtime.current_volume,
            target,
            duration_ms = duration.as_millis() as u64,
            "New envelope target"
        );
    }

    /// Writes the interpolated volume to the sample's gains and moves on to a
    /// new target once the current one is reached.
    pub(super) fn envelope_step(&mut self, sample: usize) {
        let Some(runtime) = self.samples.get_mut(sample) else {
            return;
        };
        runtime.envelope_timer = None;
        if !self.started {
            runtime.envelope = None;
            return;
        }
        let Some(envelope) = runtime.envelope else {
            return;
        };

        runtime.apply_volume(self.output.as_ref(), envelope.value_at(self.now));
        if envelope.is_complete(self.now) {
            self.animate_toward_new_target(sample);
        } else {
            runtime.envelope_timer = Some(self.timers.schedule(
                self.now + self.settings.envelope_step,
                Task::EnvelopeStep { sample },
            ));
        }
    }

    pub(super) fn cancel_envelope(&mut self, sample: usize) {
        let Some(runtime) = self.samples.get_mut(sample) else {
            return;
        };
        if let Some(timer) = runtime.envelope_timer.take() {
            self.timers.cancel(timer);
        }
        runtime.envelope = None;
    }
}
