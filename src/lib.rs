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
//! Playback engine for layered ambient soundscapes.
//!
//! A scene is a set of samples, each with one or more audio variations. While a
//! scene plays, every sample loops through randomly chosen variations, and its
//! volume can wander inside a configured range. Parameters are grouped into
//! subscenes and timing windows, edited live and exported as a render manifest.

pub mod audio;
pub mod binder;
pub mod config;
pub mod controller;
pub mod engine;
pub mod export;
pub mod player;
pub mod playsync;
pub mod render;
pub mod samples;
pub mod timer;
pub mod util;
#[cfg(test)]
pub mod testutil;
