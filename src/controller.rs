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
use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc::{self, Sender};
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, span, Level};

use crate::engine::Engine;
use crate::player::Player;

pub mod keyboard;

/// Operator events that drive the player. Samples are named by label or by
/// index in the selected scene.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Starts every playable sample of the selection.
    Start,

    /// Stops all playback. Buffers stay loaded.
    Stop,

    /// Selects a scene by index, with its first subscene and window.
    SelectScene(usize),

    /// Selects a subscene of the current scene, with its first window.
    SelectSubscene(usize),

    /// Selects a timing window of the current subscene.
    SelectWindow(usize),

    /// Turns a sample on or off.
    Toggle(String, bool),

    SetVolume(String, f32),
    SetMinVolume(String, f32),
    SetMaxVolume(String, f32),
    SetMinTimeframe(String, u64),
    SetMaxTimeframe(String, u64),

    /// Turns envelope animation on or off.
    Animate(bool),

    /// Writes the render manifest of the selected subscene to a file.
    Export(PathBuf),

    /// Logs the state of every sample.
    Status,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Connects a driver to a player.
pub struct Controller {
    handle: JoinHandle<Engine>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(player: Player, driver: Arc<dyn Driver>) -> Result<Controller, Box<dyn Error>> {
        Ok(Controller {
            handle: tokio::spawn(async move { Controller::trigger_events(player, driver).await }),
        })
    }

    /// Join will block until the driver closes, returning the engine as it was
    /// left.
    pub async fn join(&mut self) -> Result<Engine, JoinError> {
        (&mut self.handle).await
    }

    async fn trigger_events(player: Player, driver: Arc<dyn Driver>) -> Engine {
        let span = span!(Level::INFO, "controller");
        let _enter = span.enter();

        let (events_tx, events_rx) = mpsc::channel(16);
        let join_handle = driver.monitor_events(events_tx);
        info!("Controller started.");

        let engine = player.run(events_rx).await;

        info!("Controller closing.");
        match join_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Event monitor failed: {}", e),
            Err(e) => error!("Error waiting for event monitor to stop: {}", e),
        }
        engine
    }
}
