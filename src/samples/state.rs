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
use std::fmt;

use crate::audio::SourceId;
use crate::timer::TimerId;

/// Where a sample is in its playback loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleState {
    /// Nothing has been played since the sample was built.
    #[default]
    Idle,
    /// A variation is sounding and the next one starts when it ends.
    Playing { source: SourceId, end_timer: TimerId },
    /// A variation is sounding and the next one is already scheduled to start
    /// before it ends.
    PendingHandoff { source: SourceId, timer: TimerId },
    /// Playback was stopped.
    Stopped,
}

impl SampleState {
    /// The variation instance currently sounding, if any.
    pub fn current_source(&self) -> Option<SourceId> {
        match self {
            SampleState::Playing { source, .. } | SampleState::PendingHandoff { source, .. } => {
                Some(*source)
            }
            SampleState::Idle | SampleState::Stopped => None,
        }
    }

    /// The timer that will hand off to the next variation, if any.
    pub fn pending_timer(&self) -> Option<TimerId> {
        match self {
            SampleState::Playing { end_timer, .. } => Some(*end_timer),
            SampleState::PendingHandoff { timer, .. } => Some(*timer),
            SampleState::Idle | SampleState::Stopped => None,
        }
    }

    pub fn is_sounding(&self) -> bool {
        self.current_source().is_some()
    }
}

impl fmt::Display for SampleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleState::Idle => write!(f, "idle"),
            SampleState::Playing { source, .. } => write!(f, "playing {}", source),
            SampleState::PendingHandoff { source, .. } => {
                write!(f, "playing {} (hand-off pending)", source)
            }
            SampleState::Stopped => write!(f, "stopped"),
        }
    }
}
