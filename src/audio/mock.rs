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
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use super::{DecodedBuffer, GainId, SourceId};

/// A source started on the mock output.
#[derive(Debug, Clone, PartialEq)]
pub struct StartedSource {
    pub id: SourceId,
    pub gain: GainId,
    pub duration: Duration,
}

#[derive(Default)]
struct State {
    next_id: u64,
    gains: HashMap<GainId, f32>,
    started: Vec<StartedSource>,
    stopped: Vec<SourceId>,
}

/// A mock output. Doesn't actually play anything, it records what it was asked to do.
#[derive(Default)]
pub struct Output {
    state: Mutex<State>,
}

impl Output {
    pub fn new() -> Output {
        Output::default()
    }

    /// Every source started so far, in order.
    pub fn started(&self) -> Vec<StartedSource> {
        self.state.lock().started.clone()
    }

    /// Every source stopped so far, in order.
    pub fn stopped(&self) -> Vec<SourceId> {
        self.state.lock().stopped.clone()
    }

    /// The current value of a gain, if it exists.
    pub fn gain(&self, gain: GainId) -> Option<f32> {
        self.state.lock().gains.get(&gain).copied()
    }

    /// Number of gains that have been created and not released.
    pub fn gain_count(&self) -> usize {
        self.state.lock().gains.len()
    }
}

impl super::Output for Output {
    fn create_gain(&self, value: f32) -> GainId {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = GainId(state.next_id);
        state.gains.insert(id, value);
        id
    }

    fn set_gain(&self, gain: GainId, value: f32) {
        if let Some(current) = self.state.lock().gains.get_mut(&gain) {
            *current = value;
        }
    }

    fn release_gains(&self, gains: &[GainId]) {
        let mut state = self.state.lock();
        for gain in gains {
            state.gains.remove(gain);
        }
    }

    fn start(&self, buffer: Arc<DecodedBuffer>, gain: GainId) -> SourceId {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = SourceId(state.next_id);
        debug!(source = %id, duration = ?buffer.duration(), "Starting source (mock)");
        state.started.push(StartedSource {
            id,
            gain,
            duration: buffer.duration(),
        });
        id
    }

    fn stop(&self, source: SourceId) {
        debug!(source = %source, "Stopping source (mock)");
        self.state.lock().stopped.push(source);
    }
}
