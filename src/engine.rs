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
//! The playback session.
//!
//! [`Engine`] owns everything that changes while a scene plays: the selection,
//! the runtime of every sample, pending timers and the randomness behind
//! variation choice and envelopes. It does no IO of its own. Time only moves
//! when [`Engine::advance_to`] is called, and decoding happens outside the engine
//! through the jobs returned by [`Engine::take_decode_jobs`].

use std::fmt;
use std::mem;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::audio::decode::DecodeError;
use crate::audio::{DecodedBuffer, Output, SourceId};
use crate::config::{self, Catalog, ConfigError, ExportSettings, SceneConfig, SubsceneSampleParams};
use crate::export::{self, ExportError, RenderManifest};
use crate::samples::{LoadState, SampleLibrary, SampleRuntime, SampleState};
use crate::timer::{TimerId, TimerQueue};

mod animation;
mod editing;
mod scheduler;

/// Envelope steps and hand-offs are never scheduled closer than this, so a
/// degenerate buffer or config cannot stall the clock.
const MIN_TIMER_DELAY: Duration = Duration::from_millis(1);

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("No scene at index {0}")]
    NoSuchScene(usize),

    #[error("No subscene at index {0}")]
    NoSuchSubscene(usize),

    #[error("No timing window at index {0}")]
    NoSuchWindow(usize),

    #[error("No sample at index {0}")]
    NoSuchSample(usize),

    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Tunables of the engine, usually taken from the player config.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Whether volumes wander on their own once playback starts.
    pub animate: bool,
    /// Interval between envelope steps.
    pub envelope_step: Duration,
    /// Delay between start and the first envelope step.
    pub envelope_start_delay: Duration,
    pub export: ExportSettings,
}

impl EngineSettings {
    pub fn from_player(player: &config::Player) -> Result<EngineSettings, ConfigError> {
        Ok(EngineSettings {
            animate: player.animate(),
            envelope_step: player.envelope_step()?,
            envelope_start_delay: player.envelope_start_delay()?,
            export: player.export().clone(),
        })
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            animate: false,
            envelope_step: Duration::from_millis(16),
            envelope_start_delay: Duration::from_millis(100),
            export: ExportSettings::default(),
        }
    }
}

/// The scene, subscene and timing window whose params drive playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub scene: usize,
    pub subscene: usize,
    pub window: usize,
}

/// A request to decode one variation. Hand the result back through
/// [`Engine::complete_decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeJob {
    pub generation: u64,
    pub sample: usize,
    pub variation: usize,
    pub path: PathBuf,
}

/// Deferred work on the engine's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    /// A CROSSFADE variation reached its end.
    SourceEnded { sample: usize, source: SourceId },
    /// An OVERLAY hand-off is due.
    Handoff { sample: usize },
    EnvelopeStep { sample: usize },
    StartEnvelopes,
}

/// A snapshot of one sample for display.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleStatus {
    pub label: String,
    pub enabled: bool,
    pub volume: f32,
    pub params: SubsceneSampleParams,
    pub state: SampleState,
    pub loaded: usize,
    pub variations: usize,
}

impl fmt::Display for SampleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] vol {:.1} ({:.0}-{:.0}), timeframe {}-{}ms, {}/{} loaded, {}",
            self.label,
            if self.enabled { "on" } else { "off" },
            self.volume,
            self.params.min_vol,
            self.params.max_vol,
            self.params.min_timeframe_length_ms,
            self.params.max_timeframe_length_ms,
            self.loaded,
            self.variations,
            self.state
        )
    }
}

pub struct Engine {
    catalog: Catalog,
    selection: Selection,
    output: Arc<dyn Output>,
    settings: EngineSettings,
    samples: SampleLibrary,
    timers: TimerQueue<Task>,
    rng: StdRng,
    now: Duration,
    started: bool,
    animate: bool,
    envelopes_armed: bool,
    envelope_start: Option<TimerId>,
    generation: u64,
    decode_jobs: Vec<DecodeJob>,
}

impl Engine {
    /// Creates an engine with the first scene, subscene and window selected.
    /// Randomness is seeded from entropy unless a seed is given.
    pub fn new(
        catalog: Catalog,
        output: Arc<dyn Output>,
        settings: EngineSettings,
        seed: Option<u64>,
    ) -> Result<Engine, EngineError> {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut settings = settings;
        settings.envelope_step = settings.envelope_step.max(MIN_TIMER_DELAY);

        let mut engine = Engine {
            catalog,
            selection: Selection::default(),
            output,
            animate: settings.animate,
            settings,
            samples: SampleLibrary::default(),
            timers: TimerQueue::new(),
            rng,
            now: Duration::ZERO,
            started: false,
            envelopes_armed: false,
            envelope_start: None,
            generation: 0,
            decode_jobs: Vec::new(),
        };
        engine.load_selection(Selection::default())?;
        Ok(engine)
    }

    /// Selects a scene and its first subscene and window. Playback stops.
    pub fn select_scene(&mut self, scene: usize) -> Result<(), EngineError> {
        self.load_selection(Selection {
            scene,
            subscene: 0,
            window: 0,
        })
    }

    /// Selects a subscene of the current scene and its first window. Playback stops.
    pub fn select_subscene(&mut self, subscene: usize) -> Result<(), EngineError> {
        self.load_selection(Selection {
            scene: self.selection.scene,
            subscene,
            window: 0,
        })
    }

    /// Selects a timing window of the current subscene. Playback stops.
    pub fn select_window(&mut self, window: usize) -> Result<(), EngineError> {
        self.load_selection(Selection {
            window,
            ..self.selection
        })
    }

    /// Tears down the samples and rebuilds them for the selection.
    fn load_selection(&mut self, selection: Selection) -> Result<(), EngineError> {
        let scene = self
            .catalog
            .scene(selection.scene)
            .ok_or(EngineError::NoSuchScene(selection.scene))?;
        let subscene = scene
            .subscene(selection.subscene)
            .ok_or(EngineError::NoSuchSubscene(selection.subscene))?;
        subscene
            .window(selection.window)
            .ok_or(EngineError::NoSuchWindow(selection.window))?;

        self.stop();
        self.output.release_gains(&self.samples.gains());
        self.timers.clear();
        self.decode_jobs.clear();
        self.generation += 1;
        self.selection = selection;

        let scene = self
            .catalog
            .scene(selection.scene)
            .ok_or(EngineError::NoSuchScene(selection.scene))?;
        let params = scene
            .subscene(selection.subscene)
            .and_then(|subscene| subscene.window(selection.window))
            .map(|window| window.params())
            .ok_or(EngineError::NoSuchWindow(selection.window))?;
        self.samples = SampleLibrary::build(&self.catalog, scene, params, self.output.as_ref());

        info!(
            scene = scene.name(),
            subscene = selection.subscene,
            window = selection.window,
            samples = self.samples.len(),
            "Loaded selection"
        );

        for sample in 0..self.samples.len() {
            if self.params(sample).is_some_and(|params| params.current_vol > 0.0) {
                self.request_decode(sample);
            }
        }
        Ok(())
    }

    /// Starts every playable sample. Starting twice does nothing.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        info!(samples = self.samples.len(), "Starting playback");

        for sample in 0..self.samples.len() {
            self.maybe_start_sample(sample);
        }
        if self.animate {
            self.schedule_envelope_start();
        }
    }

    /// Stops every sample and cancels all pending hand-offs and envelopes.
    pub fn stop(&mut self) {
        if !self.started {
            return;
        }
        self.started = false;
        for sample in 0..self.samples.len() {
            self.stop_sample(sample);
            self.cancel_envelope(sample);
        }
        self.envelopes_armed = false;
        if let Some(timer) = self.envelope_start.take() {
            self.timers.cancel(timer);
        }
        info!("Stopped playback");
    }

    /// Runs every task due at or before `now`, in due order. Time never moves backwards.
    pub fn advance_to(&mut self, now: Duration) {
        let now = now.max(self.now);
        while let Some((due, task)) = self.timers.pop_due(now) {
            // Tasks observe their own due time so rescheduling stays drift free.
            self.now = due;
            self.run_task(task);
        }
        self.now = now;
    }

    /// The earliest pending timer, if any.
    pub fn next_deadline(&mut self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    fn run_task(&mut self, task: Task) {
        match task {
            Task::SourceEnded { sample, source } => self.on_source_ended(sample, source),
            Task::Handoff { sample } => self.on_handoff(sample),
            Task::EnvelopeStep { sample } => self.envelope_step(sample),
            Task::StartEnvelopes => self.start_envelopes(),
        }
    }

    /// Takes the decode jobs requested since the last call.
    pub fn take_decode_jobs(&mut self) -> Vec<DecodeJob> {
        mem::take(&mut self.decode_jobs)
    }

    /// Queues a decode for every variation of the sample that has no buffer yet.
    fn request_decode(&mut self, sample: usize) {
        let generation = self.generation;
        let Some(runtime) = self.samples.get_mut(sample) else {
            return;
        };
        for (index, variation) in runtime.variations_mut().enumerate() {
            if matches!(variation.load_state(), LoadState::Unloaded) {
                variation.mark_loading();
                self.decode_jobs.push(DecodeJob {
                    generation,
                    sample,
                    variation: index,
                    path: variation.path().to_path_buf(),
                });
            }
        }
    }

    /// Accepts the outcome of a decode job. Results for a previous selection or
    /// for a variation released while decoding are dropped.
    pub fn complete_decode(&mut self, job: DecodeJob, result: Result<DecodedBuffer, DecodeError>) {
        if job.generation != self.generation {
            debug!(path = job.path.display().to_string(), "Dropping stale decode");
            return;
        }
        let Some(runtime) = self.samples.get_mut(job.sample) else {
            return;
        };
        let label = runtime.label().to_string();
        let Some(variation) = runtime.variation_mut(job.variation) else {
            return;
        };
        if !variation.is_loading() {
            debug!(sample = label, variation = job.variation, "Dropping released decode");
            return;
        }

        match result {
            Ok(buffer) => {
                debug!(
                    sample = label,
                    variation = job.variation,
                    duration_ms = buffer.duration().as_millis() as u64,
                    "Variation ready"
                );
                variation.set_loaded(Arc::new(buffer));
            }
            Err(e) => {
                warn!(
                    sample = label,
                    variation = job.variation,
                    path = job.path.display().to_string(),
                    err = %e,
                    "Unable to decode variation, it will be skipped"
                );
                variation.set_failed();
            }
        }
        self.maybe_start_sample(job.sample);
    }

    /// Builds the render manifest for the selected subscene.
    pub fn export(&self) -> Result<RenderManifest, EngineError> {
        let scene = self.scene();
        let subscene = scene
            .subscene(self.selection.subscene)
            .ok_or(EngineError::NoSuchSubscene(self.selection.subscene))?;
        Ok(export::export_manifest(
            scene,
            subscene,
            &self.settings.export,
        )?)
    }

    /// The params of a sample in the selected window.
    pub fn params(&self, sample: usize) -> Option<&SubsceneSampleParams> {
        self.catalog
            .scene(self.selection.scene)?
            .subscene(self.selection.subscene)?
            .window(self.selection.window)?
            .params()
            .get(sample)
    }

    fn params_mut(&mut self, sample: usize) -> Result<&mut SubsceneSampleParams, EngineError> {
        let selection = self.selection;
        self.catalog
            .scene_mut(selection.scene)
            .and_then(|scene| scene.subscene_mut(selection.subscene))
            .and_then(|subscene| subscene.window_mut(selection.window))
            .and_then(|window| window.params_mut().get_mut(sample))
            .ok_or(EngineError::NoSuchSample(sample))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The selected scene.
    pub fn scene(&self) -> &SceneConfig {
        // The selection is validated whenever it changes.
        &self.catalog.scenes()[self.selection.scene]
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn samples(&self) -> &SampleLibrary {
        &self.samples
    }

    pub fn sample(&self, sample: usize) -> Option<&SampleRuntime> {
        self.samples.get(sample)
    }

    /// Finds a sample of the selected scene by label or by index.
    pub fn find_sample(&self, name: &str) -> Option<usize> {
        self.samples
            .index_of(name)
            .or_else(|| name.parse::<usize>().ok().filter(|index| *index < self.samples.len()))
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_animating(&self) -> bool {
        self.animate
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    /// Number of pending timers.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn status(&self) -> Vec<SampleStatus> {
        self.samples
            .iter()
            .enumerate()
            .filter_map(|(index, sample)| {
                Some(SampleStatus {
                    label: sample.label().to_string(),
                    enabled: sample.enabled,
                    volume: sample.current_volume,
                    params: *self.params(index)?,
                    state: sample.state,
                    loaded: sample.loaded_variations().len(),
                    variations: sample.variations().len(),
                })
            })
            .collect()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("selection", &self.selection)
            .field("now", &self.now)
            .field("started", &self.started)
            .field("animate", &self.animate)
            .field("samples", &self.samples.len())
            .field("timers", &self.timers)
            .finish()
    }
}
