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
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::{Envelope, SampleState};
use crate::audio::{DecodedBuffer, GainId, Output};
use crate::config::{Catalog, SceneConfig, StitchingMethod, SubsceneSampleParams};
use crate::timer::TimerId;

/// Decode state of a single variation.
#[derive(Debug, Clone, Default)]
pub enum LoadState {
    #[default]
    Unloaded,
    /// A decode job is in flight.
    Loading,
    Loaded(Arc<DecodedBuffer>),
    /// Decoding failed. The variation stays unavailable until the samples are rebuilt.
    Failed,
}

/// One recording of a sample, with its own gain stage.
#[derive(Debug)]
pub struct VariationRuntime {
    file: String,
    path: PathBuf,
    load: LoadState,
    gain: GainId,
}

impl VariationRuntime {
    /// The file as referenced from the catalog.
    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn gain(&self) -> GainId {
        self.gain
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load
    }

    pub fn buffer(&self) -> Option<&Arc<DecodedBuffer>> {
        match &self.load {
            LoadState::Loaded(buffer) => Some(buffer),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.load, LoadState::Loading)
    }

    pub fn mark_loading(&mut self) {
        self.load = LoadState::Loading;
    }

    pub fn set_loaded(&mut self, buffer: Arc<DecodedBuffer>) {
        self.load = LoadState::Loaded(buffer);
    }

    pub fn set_failed(&mut self) {
        self.load = LoadState::Failed;
    }

    /// Drops the decoded buffer so it can be decoded again later. Failed
    /// variations stay failed.
    pub fn release(&mut self) {
        if !matches!(self.load, LoadState::Failed) {
            self.load = LoadState::Unloaded;
        }
    }
}

/// Runtime state of one logical sample.
#[derive(Debug)]
pub struct SampleRuntime {
    label: String,
    stitching: StitchingMethod,
    concat_overlay: Duration,
    variations: Vec<VariationRuntime>,
    /// Whether the sample is toggled on.
    pub enabled: bool,
    /// The live volume, 0-100. Follows the params unless an envelope is driving it.
    pub current_volume: f32,
    pub state: SampleState,
    pub envelope: Option<Envelope>,
    pub envelope_timer: Option<TimerId>,
}

impl SampleRuntime {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn stitching(&self) -> StitchingMethod {
        self.stitching
    }

    pub fn concat_overlay(&self) -> Duration {
        self.concat_overlay
    }

    pub fn variations(&self) -> &[VariationRuntime] {
        &self.variations
    }

    pub fn variation_mut(&mut self, index: usize) -> Option<&mut VariationRuntime> {
        self.variations.get_mut(index)
    }

    pub fn variations_mut(&mut self) -> impl Iterator<Item = &mut VariationRuntime> {
        self.variations.iter_mut()
    }

    /// Indices of the variations with a decoded buffer.
    pub fn loaded_variations(&self) -> Vec<usize> {
        self.variations
            .iter()
            .enumerate()
            .filter(|(_, variation)| variation.buffer().is_some())
            .map(|(index, _)| index)
            .collect()
    }

    pub fn any_loading(&self) -> bool {
        self.variations.iter().any(VariationRuntime::is_loading)
    }

    /// Writes the volume to every variation gain. Which variation is audible
    /// is not tracked, so all of them follow.
    pub fn apply_volume(&mut self, output: &dyn Output, volume: f32) {
        self.current_volume = volume;
        for variation in &self.variations {
            output.set_gain(variation.gain, volume / 100.0);
        }
    }

    pub fn release_buffers(&mut self) {
        self.variations.iter_mut().for_each(VariationRuntime::release);
    }

    pub fn memory_usage(&self) -> usize {
        self.variations
            .iter()
            .filter_map(VariationRuntime::buffer)
            .map(|buffer| buffer.memory_size())
            .sum()
    }
}

/// The samples of the selected scene. Rebuilt wholesale on every selection change.
#[derive(Debug, Default)]
pub struct SampleLibrary {
    samples: Vec<SampleRuntime>,
}

impl SampleLibrary {
    /// Builds the runtime for every sample of the scene, creating one gain stage
    /// per variation at the sample's current volume.
    pub fn build(
        catalog: &Catalog,
        scene: &SceneConfig,
        params: &[SubsceneSampleParams],
        output: &dyn Output,
    ) -> SampleLibrary {
        let samples = scene
            .samples()
            .iter()
            .zip(params)
            .map(|(sample, params)| {
                let variations = sample
                    .variation_names()
                    .iter()
                    .map(|name| {
                        let file = scene.variation_file(name);
                        VariationRuntime {
                            path: catalog.resolve(&file),
                            file,
                            load: LoadState::Unloaded,
                            gain: output.create_gain(params.current_vol / 100.0),
                        }
                    })
                    .collect();
                debug!(
                    sample = sample.label(),
                    variations = sample.variation_names().len(),
                    "Built sample"
                );
                SampleRuntime {
                    label: sample.label().to_string(),
                    stitching: sample.stitching_method(),
                    concat_overlay: Duration::from_millis(sample.concat_overlay_ms()),
                    variations,
                    enabled: true,
                    current_volume: params.current_vol,
                    state: SampleState::Idle,
                    envelope: None,
                    envelope_timer: None,
                }
            })
            .collect();
        SampleLibrary { samples }
    }

    pub fn get(&self, index: usize) -> Option<&SampleRuntime> {
        self.samples.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut SampleRuntime> {
        self.samples.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SampleRuntime> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Finds a sample by label.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.samples.iter().position(|sample| sample.label == label)
    }

    /// Every gain stage owned by the library.
    pub fn gains(&self) -> Vec<GainId> {
        self.samples
            .iter()
            .flat_map(|sample| sample.variations.iter().map(|variation| variation.gain))
            .collect()
    }

    pub fn memory_usage(&self) -> usize {
        self.samples.iter().map(SampleRuntime::memory_usage).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock;
    use crate::testutil;

    #[test]
    fn test_build() {
        let catalog = testutil::catalog();
        let output = mock::Output::new();
        let scene = catalog.scene(0).unwrap();
        let params = scene.subscene(0).unwrap().window(0).unwrap().params();

        let library = SampleLibrary::build(&catalog, scene, params, &output);
        assert_eq!(library.len(), 2);
        assert_eq!(library.index_of("birds"), Some(1));
        assert_eq!(library.gains().len(), 3);
        assert_eq!(output.gain_count(), 3);

        let wind = library.get(0).unwrap();
        assert_eq!(wind.variations().len(), 2);
        assert_eq!(wind.variations()[0].file(), "forest/wind1.wav");
        assert!(wind.variations()[0].path().ends_with("forest/wind1.wav"));
        assert_eq!(output.gain(wind.variations()[0].gain()), Some(0.5));
        assert!(wind.enabled);
        assert_eq!(wind.state, SampleState::Idle);
    }

    #[test]
    fn test_release_keeps_failures() {
        let catalog = testutil::catalog();
        let output = mock::Output::new();
        let scene = catalog.scene(0).unwrap();
        let params = scene.subscene(0).unwrap().window(0).unwrap().params();
        let mut library = SampleLibrary::build(&catalog, scene, params, &output);

        let wind = library.get_mut(0).unwrap();
        let buffer = Arc::new(DecodedBuffer::silence(Duration::from_secs(1), 1, 1000));
        wind.variation_mut(0).unwrap().set_loaded(buffer);
        wind.variation_mut(1).unwrap().set_failed();
        assert_eq!(wind.loaded_variations(), vec![0]);
        assert_eq!(wind.memory_usage(), 4000);

        wind.release_buffers();
        assert!(matches!(wind.variations()[0].load_state(), LoadState::Unloaded));
        assert!(matches!(wind.variations()[1].load_state(), LoadState::Failed));
        assert!(wind.loaded_variations().is_empty());
    }

    #[test]
    fn test_apply_volume_updates_every_gain() {
        let catalog = testutil::catalog();
        let output = mock::Output::new();
        let scene = catalog.scene(0).unwrap();
        let params = scene.subscene(0).unwrap().window(0).unwrap().params();
        let mut library = SampleLibrary::build(&catalog, scene, params, &output);

        let wind = library.get_mut(0).unwrap();
        wind.apply_volume(&output, 25.0);
        assert_eq!(wind.current_volume, 25.0);
        for variation in wind.variations() {
            assert_eq!(output.gain(variation.gain()), Some(0.25));
        }
    }
}
