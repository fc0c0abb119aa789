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
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, span, Level, Span};

use crate::audio::decode::{DecodeError, Decoder};
use crate::audio::DecodedBuffer;
use crate::controller::Event;
use crate::engine::{DecodeJob, Engine};
use crate::export;
use crate::util::memory_display;

type Decoded = (DecodeJob, Result<DecodedBuffer, DecodeError>);

/// Runs an engine against the wall clock. Operator events, finished decodes and
/// timer deadlines are all handled on one task, so the engine is never shared.
pub struct Player {
    engine: Engine,
    decoder: Arc<dyn Decoder>,
    /// The wall clock instant that corresponds to `base` on the engine clock.
    origin: Instant,
    base: Duration,
    span: Span,
}

impl Player {
    /// Creates a new player.
    pub fn new(engine: Engine, decoder: Arc<dyn Decoder>) -> Player {
        let base = engine.now();
        Player {
            engine,
            decoder,
            origin: Instant::now(),
            base,
            span: span!(Level::INFO, "player"),
        }
    }

    fn clock(&self) -> Duration {
        self.base + self.origin.elapsed()
    }

    fn instant_of(&self, at: Duration) -> Instant {
        self.origin + at.saturating_sub(self.base)
    }

    fn advance(&mut self) {
        let now = self.clock();
        self.engine.advance_to(now);
    }

    /// Hands every pending decode job to the blocking pool.
    fn dispatch_decodes(&mut self, decoded_tx: &mpsc::UnboundedSender<Decoded>) {
        for job in self.engine.take_decode_jobs() {
            let decoder = self.decoder.clone();
            let decoded_tx = decoded_tx.clone();
            tokio::task::spawn_blocking(move || {
                let result = decoder.decode(&job.path);
                // The player may already be gone, in which case nobody wants the result.
                let _ = decoded_tx.send((job, result));
            });
        }
    }

    /// Processes events until the sender closes, then stops playback and hands
    /// the engine back.
    pub async fn run(mut self, mut events_rx: mpsc::Receiver<Event>) -> Engine {
        let (decoded_tx, mut decoded_rx) = mpsc::unbounded_channel::<Decoded>();
        self.origin = Instant::now();
        self.base = self.engine.now();
        {
            let _enter = self.span.enter();
            info!(
                scene = self.engine.scene().name(),
                samples = self.engine.samples().len(),
                animate = self.engine.is_animating(),
                "Player started."
            );
        }

        loop {
            self.dispatch_decodes(&decoded_tx);
            let deadline = self
                .engine
                .next_deadline()
                .map(|deadline| self.instant_of(deadline));

            tokio::select! {
                event = events_rx.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    self.advance();
                    if let Err(e) = self.handle_event(event) {
                        let _enter = self.span.enter();
                        error!(err = e.to_string(), "Error handling event");
                    }
                }
                Some((job, result)) = decoded_rx.recv() => {
                    self.advance();
                    self.engine.complete_decode(job, result);
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.advance();
                }
            }
        }

        self.engine.stop();
        {
            let _enter = self.span.enter();
            info!("Player finished.");
        }
        self.engine
    }

    fn sample(&self, name: &str) -> Result<usize, Box<dyn Error>> {
        self.engine
            .find_sample(name)
            .ok_or_else(|| format!("no sample named {} in the selected scene", name).into())
    }

    fn handle_event(&mut self, event: Event) -> Result<(), Box<dyn Error>> {
        let _enter = self.span.enter();
        info!(event = format!("{:?}", event), "Received event.");

        match event {
            Event::Start => self.engine.start(),
            Event::Stop => self.engine.stop(),
            Event::SelectScene(scene) => self.engine.select_scene(scene)?,
            Event::SelectSubscene(subscene) => self.engine.select_subscene(subscene)?,
            Event::SelectWindow(window) => self.engine.select_window(window)?,
            Event::Toggle(name, enabled) => {
                let sample = self.sample(&name)?;
                self.engine.set_enabled(sample, enabled)?;
            }
            Event::SetVolume(name, value) => {
                let sample = self.sample(&name)?;
                let params = self.engine.set_volume(sample, value)?;
                debug!(sample = name, volume = params.current_vol, "Volume set");
            }
            Event::SetMinVolume(name, value) => {
                let sample = self.sample(&name)?;
                let params = self.engine.set_min_volume(sample, value)?;
                debug!(sample = name, min = params.min_vol, volume = params.current_vol, "Minimum volume set");
            }
            Event::SetMaxVolume(name, value) => {
                let sample = self.sample(&name)?;
                let params = self.engine.set_max_volume(sample, value)?;
                debug!(sample = name, max = params.max_vol, volume = params.current_vol, "Maximum volume set");
            }
            Event::SetMinTimeframe(name, value) => {
                let sample = self.sample(&name)?;
                let params = self.engine.set_min_timeframe(sample, value)?;
                debug!(
                    sample = name,
                    min_ms = params.min_timeframe_length_ms,
                    max_ms = params.max_timeframe_length_ms,
                    "Minimum timeframe set"
                );
            }
            Event::SetMaxTimeframe(name, value) => {
                let sample = self.sample(&name)?;
                let params = self.engine.set_max_timeframe(sample, value)?;
                debug!(
                    sample = name,
                    min_ms = params.min_timeframe_length_ms,
                    max_ms = params.max_timeframe_length_ms,
                    "Maximum timeframe set"
                );
            }
            Event::Animate(animate) => self.engine.set_animate(animate),
            Event::Export(path) => {
                let manifest = self.engine.export()?;
                export::write_manifest(&manifest, &path)?;
            }
            Event::Status => self.report_status(),
        }
        Ok(())
    }

    fn report_status(&self) {
        let selection = self.engine.selection();
        info!(
            scene = self.engine.scene().name(),
            subscene = selection.subscene,
            window = selection.window,
            started = self.engine.is_started(),
            animate = self.engine.is_animating(),
            memory = memory_display(self.engine.samples().memory_usage()),
            "Status"
        );
        for status in self.engine.status() {
            info!("{}", status);
        }
    }
}
