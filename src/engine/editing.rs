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
//! Operator edits. Every edit goes through the binder rules and is written back
//! into the params of the selected window, which is what gets exported.

use tracing::info;

use super::{Engine, EngineError};
use crate::binder;
use crate::config::SubsceneSampleParams;

impl Engine {
    /// Sets the current volume of a sample, clamped into its bounds. Moving the
    /// volume off zero decodes the sample and starts it. Moving it to zero stops
    /// the sample and releases its buffers.
    pub fn set_volume(
        &mut self,
        sample: usize,
        value: f32,
    ) -> Result<SubsceneSampleParams, EngineError> {
        self.edit_params(sample, |params| {
            binder::set_current_volume(params, value);
        })
    }

    pub fn set_min_volume(
        &mut self,
        sample: usize,
        value: f32,
    ) -> Result<SubsceneSampleParams, EngineError> {
        self.stop_for_bounds_edit(sample)?;
        self.edit_params(sample, |params| {
            binder::set_min_volume(params, value);
        })
    }

    pub fn set_max_volume(
        &mut self,
        sample: usize,
        value: f32,
    ) -> Result<SubsceneSampleParams, EngineError> {
        self.stop_for_bounds_edit(sample)?;
        self.edit_params(sample, |params| {
            binder::set_max_volume(params, value);
        })
    }

    pub fn set_min_timeframe(
        &mut self,
        sample: usize,
        value_ms: u64,
    ) -> Result<SubsceneSampleParams, EngineError> {
        self.stop_for_bounds_edit(sample)?;
        self.edit_params(sample, |params| {
            binder::set_min_timeframe(params, value_ms);
        })
    }

    pub fn set_max_timeframe(
        &mut self,
        sample: usize,
        value_ms: u64,
    ) -> Result<SubsceneSampleParams, EngineError> {
        self.stop_for_bounds_edit(sample)?;
        self.edit_params(sample, |params| {
            binder::set_max_timeframe(params, value_ms);
        })
    }

    /// Toggles a sample on or off. Off stops it, on starts it if it can sound.
    pub fn set_enabled(&mut self, sample: usize, enabled: bool) -> Result<(), EngineError> {
        let runtime = self
            .samples
            .get_mut(sample)
            .ok_or(EngineError::NoSuchSample(sample))?;
        if runtime.enabled == enabled {
            return Ok(());
        }
        runtime.enabled = enabled;
        info!(sample = runtime.label(), enabled, "Toggled sample");

        if enabled {
            self.maybe_start_sample(sample);
        } else {
            self.stop_sample(sample);
            self.cancel_envelope(sample);
        }
        Ok(())
    }

    /// Turns envelope animation on or off. Turning it off puts every sample back
    /// at its configured volume.
    pub fn set_animate(&mut self, animate: bool) {
        if self.animate == animate {
            return;
        }
        self.animate = animate;
        info!(animate, "Animate mode changed");

        if animate {
            if self.started {
                self.schedule_envelope_start();
            }
            return;
        }

        self.envelopes_armed = false;
        if let Some(timer) = self.envelope_start.take() {
            self.timers.cancel(timer);
        }
        for sample in 0..self.samples.len() {
            self.cancel_envelope(sample);
            let Some(volume) = self.params(sample).map(|params| params.current_vol) else {
                continue;
            };
            if let Some(runtime) = self.samples.get_mut(sample) {
                runtime.apply_volume(self.output.as_ref(), volume);
            }
        }
    }

    /// In animate mode a bounds edit stops playback so the new bounds apply from
    /// a clean start.
    fn stop_for_bounds_edit(&mut self, sample: usize) -> Result<(), EngineError> {
        if self.params(sample).is_none() {
            return Err(EngineError::NoSuchSample(sample));
        }
        if self.animate && self.started {
            info!("Bounds edited while animating, stopping playback");
            self.stop();
        }
        Ok(())
    }

    /// Applies an edit to the params of a sample and reacts to the resulting
    /// change of its current volume.
    fn edit_params<F>(&mut self, sample: usize, edit: F) -> Result<SubsceneSampleParams, EngineError>
    where
        F: FnOnce(&mut SubsceneSampleParams),
    {
        let params = self.params_mut(sample)?;
        let previous = params.current_vol;
        edit(params);
        let params = *params;

        if let Some(runtime) = self.samples.get_mut(sample) {
            runtime.apply_volume(self.output.as_ref(), params.current_vol);
        }
        if previous <= 0.0 && params.current_vol > 0.0 {
            self.activate_sample(sample);
        } else if previous > 0.0 && params.current_vol <= 0.0 {
            self.deactivate_sample(sample);
        }
        Ok(params)
    }

    fn activate_sample(&mut self, sample: usize) {
        if let Some(runtime) = self.samples.get(sample) {
            info!(sample = runtime.label(), "Sample activated, decoding variations");
        }
        self.request_decode(sample);
        self.maybe_start_sample(sample);
    }

    fn deactivate_sample(&mut self, sample: usize) {
        self.stop_sample(sample);
        self.cancel_envelope(sample);
        if let Some(runtime) = self.samples.get_mut(sample) {
            runtime.release_buffers();
            info!(sample = runtime.label(), "Sample silenced, buffers released");
        }
    }
}
