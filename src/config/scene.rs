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

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::binder;

/// Current volume assumed when a params entry leaves it out, before clamping.
const DEFAULT_CURRENT_VOLUME: f32 = 50.0;

/// How consecutive variations of a sample are joined.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StitchingMethod {
    /// Play the next variation as soon as the current one ends. No gain ramp is
    /// applied across the boundary.
    #[default]
    Crossfade,
    /// Start the next variation `concatOverlayMs` before the current one ends.
    Overlay,
}

/// A logical sound backed by one or more variations.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SampleDef {
    label: String,
    variation_names: Vec<String>,
    #[serde(default)]
    stitching_method: StitchingMethod,
    #[serde(default)]
    concat_overlay_ms: u64,
}

impl SampleDef {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn variation_names(&self) -> &[String] {
        &self.variation_names
    }

    pub fn stitching_method(&self) -> StitchingMethod {
        self.stitching_method
    }

    pub fn concat_overlay_ms(&self) -> u64 {
        self.concat_overlay_ms
    }
}

#[cfg(test)]
impl SampleDef {
    pub fn new(
        label: &str,
        variation_names: &[&str],
        stitching_method: StitchingMethod,
        concat_overlay_ms: u64,
    ) -> SampleDef {
        SampleDef {
            label: label.to_string(),
            variation_names: variation_names.iter().map(|name| name.to_string()).collect(),
            stitching_method,
            concat_overlay_ms,
        }
    }
}

/// Volume and timing bounds for one sample within a timing window. Volumes are 0-100.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(from = "RawSampleParams", rename_all = "camelCase")]
pub struct SubsceneSampleParams {
    pub current_vol: f32,
    pub min_vol: f32,
    pub max_vol: f32,
    pub min_timeframe_length_ms: u64,
    pub max_timeframe_length_ms: u64,
}

impl SubsceneSampleParams {
    pub fn new(
        current_vol: f32,
        min_vol: f32,
        max_vol: f32,
        min_timeframe_length_ms: u64,
        max_timeframe_length_ms: u64,
    ) -> SubsceneSampleParams {
        SubsceneSampleParams {
            current_vol,
            min_vol,
            max_vol,
            min_timeframe_length_ms,
            max_timeframe_length_ms,
        }
    }
}

/// The wire form of the params. Older catalogs leave out the current volume and
/// spell the timeframes without the unit suffix.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSampleParams {
    current_vol: Option<f32>,
    min_vol: f32,
    max_vol: f32,
    #[serde(alias = "minTimeframeLength")]
    min_timeframe_length_ms: u64,
    #[serde(alias = "maxTimeframeLength")]
    max_timeframe_length_ms: u64,
}

impl From<RawSampleParams> for SubsceneSampleParams {
    fn from(raw: RawSampleParams) -> Self {
        SubsceneSampleParams {
            current_vol: raw.current_vol.unwrap_or(DEFAULT_CURRENT_VOLUME),
            min_vol: raw.min_vol,
            max_vol: raw.max_vol,
            min_timeframe_length_ms: raw.min_timeframe_length_ms,
            max_timeframe_length_ms: raw.max_timeframe_length_ms,
        }
    }
}

/// A time-indexed set of params, one entry per sample of the scene.
#[derive(Clone, Debug, PartialEq)]
pub struct TimingWindow {
    start_at: u64,
    params: Vec<SubsceneSampleParams>,
}

impl TimingWindow {
    pub fn new(start_at: u64, params: Vec<SubsceneSampleParams>) -> TimingWindow {
        TimingWindow { start_at, params }
    }

    /// Start of the window in milliseconds from the beginning of the render.
    pub fn start_at(&self) -> u64 {
        self.start_at
    }

    pub fn params(&self) -> &[SubsceneSampleParams] {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut [SubsceneSampleParams] {
        &mut self.params
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWindow {
    start_at: u64,
    scene_samples_config: Vec<SubsceneSampleParams>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSubscene {
    label: String,
    #[serde(default)]
    start_at: u64,
    scene_samples_config: Vec<SubsceneSampleParams>,
    #[serde(default)]
    windows: Vec<RawWindow>,
}

/// A named parameter set for the samples of a scene. The top level params of
/// the subscene are its first timing window.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(from = "RawSubscene")]
pub struct SubsceneConfig {
    label: String,
    windows: Vec<TimingWindow>,
}

impl From<RawSubscene> for SubsceneConfig {
    fn from(raw: RawSubscene) -> Self {
        let mut windows = Vec::with_capacity(raw.windows.len() + 1);
        windows.push(TimingWindow::new(raw.start_at, raw.scene_samples_config));
        windows.extend(
            raw.windows
                .into_iter()
                .map(|window| TimingWindow::new(window.start_at, window.scene_samples_config)),
        );
        SubsceneConfig {
            label: raw.label,
            windows,
        }
    }
}

impl SubsceneConfig {
    pub fn new(label: &str, windows: Vec<TimingWindow>) -> SubsceneConfig {
        SubsceneConfig {
            label: label.to_string(),
            windows,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn windows(&self) -> &[TimingWindow] {
        &self.windows
    }

    pub fn window(&self, index: usize) -> Option<&TimingWindow> {
        self.windows.get(index)
    }

    pub fn window_mut(&mut self, index: usize) -> Option<&mut TimingWindow> {
        self.windows.get_mut(index)
    }
}

/// A named collection of samples and subscenes sharing an audio directory.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SceneConfig {
    scene_name: Option<String>,
    directory: String,
    samples: Vec<SampleDef>,
    #[serde(default)]
    subscenes: Vec<SubsceneConfig>,
}

impl SceneConfig {
    pub fn new(
        scene_name: Option<&str>,
        directory: &str,
        samples: Vec<SampleDef>,
        subscenes: Vec<SubsceneConfig>,
    ) -> SceneConfig {
        SceneConfig {
            scene_name: scene_name.map(|name| name.to_string()),
            directory: directory.to_string(),
            samples,
            subscenes,
        }
    }

    /// The display name of the scene. Falls back to the directory.
    pub fn name(&self) -> &str {
        self.scene_name.as_deref().unwrap_or(&self.directory)
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn samples(&self) -> &[SampleDef] {
        &self.samples
    }

    pub fn subscenes(&self) -> &[SubsceneConfig] {
        &self.subscenes
    }

    pub fn subscene(&self, index: usize) -> Option<&SubsceneConfig> {
        self.subscenes.get(index)
    }

    pub fn subscene_mut(&mut self, index: usize) -> Option<&mut SubsceneConfig> {
        self.subscenes.get_mut(index)
    }

    /// The variation file as referenced from the catalog, `directory/name`.
    pub fn variation_file(&self, variation_name: &str) -> String {
        format!("{}/{}", self.directory, variation_name)
    }

    fn validate(&mut self) -> Result<(), ConfigError> {
        for sample in &self.samples {
            if sample.variation_names.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "sample {} in scene {} has no variations",
                    sample.label,
                    self.name()
                )));
            }
        }
        if self.subscenes.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "scene {} has no subscenes",
                self.name()
            )));
        }

        let sample_count = self.samples.len();
        let scene_name = self.name().to_string();
        for subscene in self.subscenes.iter_mut() {
            for window in subscene.windows.iter_mut() {
                if window.params.len() != sample_count {
                    return Err(ConfigError::Invalid(format!(
                        "subscene {} in scene {} has {} params at {}ms, expected one per sample ({})",
                        subscene.label,
                        scene_name,
                        window.params.len(),
                        window.start_at,
                        sample_count
                    )));
                }
                window.params.iter_mut().for_each(binder::normalize);
            }
        }
        Ok(())
    }
}

/// Every scene available to the player, with the directory variation paths
/// are resolved against.
#[derive(Clone, Debug)]
pub struct Catalog {
    scenes: Vec<SceneConfig>,
    base_dir: PathBuf,
}

impl Catalog {
    /// Validates the scenes and normalizes their params.
    pub fn new(mut scenes: Vec<SceneConfig>, base_dir: &Path) -> Result<Catalog, ConfigError> {
        for scene in scenes.iter_mut() {
            scene.validate()?;
        }
        Ok(Catalog {
            scenes,
            base_dir: base_dir.to_path_buf(),
        })
    }

    pub fn scenes(&self) -> &[SceneConfig] {
        &self.scenes
    }

    pub fn scene(&self, index: usize) -> Option<&SceneConfig> {
        self.scenes.get(index)
    }

    pub fn scene_mut(&mut self, index: usize) -> Option<&mut SceneConfig> {
        self.scenes.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Resolves a catalog relative file to a path on disk.
    pub fn resolve(&self, file: &str) -> PathBuf {
        self.base_dir.join(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOREST: &str = r#"
    [{
        "sceneName": "Forest",
        "directory": "audio/forest",
        "samples": [
            { "label": "wind", "variationNames": ["w1.wav", "w2.wav"] },
            { "label": "birds", "variationNames": ["b1.wav"],
              "stitchingMethod": "OVERLAY", "concatOverlayMs": 1500 }
        ],
        "subscenes": [{
            "label": "Calm",
            "sceneSamplesConfig": [
                { "currentVol": 50, "minVol": 20, "maxVol": 80,
                  "minTimeframeLengthMs": 2000, "maxTimeframeLengthMs": 8000 },
                { "minVol": 0, "maxVol": 30,
                  "minTimeframeLength": 1000, "maxTimeframeLength": 5000 }
            ],
            "windows": [{
                "startAt": 60000,
                "sceneSamplesConfig": [
                    { "currentVol": 10, "minVol": 0, "maxVol": 10,
                      "minTimeframeLengthMs": 2000, "maxTimeframeLengthMs": 4000 },
                    { "currentVol": 0, "minVol": 0, "maxVol": 0,
                      "minTimeframeLengthMs": 2000, "maxTimeframeLengthMs": 4000 }
                ]
            }]
        }]
    }]
    "#;

    fn parse(json: &str) -> Result<Catalog, ConfigError> {
        let scenes: Vec<SceneConfig> = serde_json::from_str(json).expect("valid json");
        Catalog::new(scenes, Path::new("/srv/soundscape"))
    }

    #[test]
    fn test_parse_catalog() {
        let catalog = parse(FOREST).unwrap();
        assert_eq!(catalog.len(), 1);

        let scene = catalog.scene(0).unwrap();
        assert_eq!(scene.name(), "Forest");
        assert_eq!(scene.samples().len(), 2);

        let wind = &scene.samples()[0];
        assert_eq!(wind.label(), "wind");
        assert_eq!(wind.stitching_method(), StitchingMethod::Crossfade);
        assert_eq!(wind.concat_overlay_ms(), 0);

        let birds = &scene.samples()[1];
        assert_eq!(birds.stitching_method(), StitchingMethod::Overlay);
        assert_eq!(birds.concat_overlay_ms(), 1500);

        let subscene = scene.subscene(0).unwrap();
        assert_eq!(subscene.label(), "Calm");
        assert_eq!(subscene.windows().len(), 2);
        assert_eq!(subscene.windows()[0].start_at(), 0);
        assert_eq!(subscene.windows()[1].start_at(), 60000);
        assert_eq!(
            subscene.windows()[0].params()[0],
            SubsceneSampleParams::new(50.0, 20.0, 80.0, 2000, 8000)
        );
    }

    #[test]
    fn test_missing_current_volume_is_clamped_default() {
        let catalog = parse(FOREST).unwrap();
        let params = catalog.scenes()[0].subscenes()[0].windows()[0].params()[1];
        // Defaulted to 50 and clamped into [0, 30].
        assert_eq!(params.current_vol, 30.0);
        assert_eq!(params.min_timeframe_length_ms, 1000);
        assert_eq!(params.max_timeframe_length_ms, 5000);
    }

    #[test]
    fn test_scene_name_defaults_to_directory() {
        let scene = SceneConfig::new(None, "audio/rain", vec![], vec![]);
        assert_eq!(scene.name(), "audio/rain");
        assert_eq!(scene.variation_file("r1.wav"), "audio/rain/r1.wav");
    }

    #[test]
    fn test_params_count_must_match_samples() {
        let json = r#"
        [{
            "directory": "audio/forest",
            "samples": [
                { "label": "wind", "variationNames": ["w1.wav"] },
                { "label": "birds", "variationNames": ["b1.wav"] }
            ],
            "subscenes": [{
                "label": "Calm",
                "sceneSamplesConfig": [
                    { "currentVol": 50, "minVol": 20, "maxVol": 80,
                      "minTimeframeLengthMs": 2000, "maxTimeframeLengthMs": 8000 }
                ]
            }]
        }]
        "#;
        assert!(matches!(parse(json), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_sample_without_variations_is_invalid() {
        let json = r#"
        [{
            "directory": "audio/forest",
            "samples": [{ "label": "wind", "variationNames": [] }],
            "subscenes": [{
                "label": "Calm",
                "sceneSamplesConfig": [
                    { "currentVol": 50, "minVol": 20, "maxVol": 80,
                      "minTimeframeLengthMs": 2000, "maxTimeframeLengthMs": 8000 }
                ]
            }]
        }]
        "#;
        assert!(matches!(parse(json), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_crossed_bounds_are_normalized() {
        let json = r#"
        [{
            "directory": "audio/forest",
            "samples": [{ "label": "wind", "variationNames": ["w1.wav"] }],
            "subscenes": [{
                "label": "Calm",
                "sceneSamplesConfig": [
                    { "currentVol": 95, "minVol": 70, "maxVol": 40,
                      "minTimeframeLengthMs": 2000, "maxTimeframeLengthMs": 3000 }
                ]
            }]
        }]
        "#;
        let catalog = parse(json).unwrap();
        let params = catalog.scenes()[0].subscenes()[0].windows()[0].params()[0];
        assert_eq!(params.min_vol, 40.0);
        assert_eq!(params.max_vol, 40.0);
        assert_eq!(params.current_vol, 40.0);
        // Timeframe margins are only enforced on edit.
        assert_eq!(params.max_timeframe_length_ms, 3000);
    }

    #[test]
    fn test_unknown_stitching_method_fails() {
        let json = r#"{ "label": "wind", "variationNames": ["w1.wav"], "stitchingMethod": "SPLICE" }"#;
        assert!(serde_json::from_str::<SampleDef>(json).is_err());
    }

    #[test]
    fn test_resolve() {
        let catalog = parse(FOREST).unwrap();
        let file = catalog.scenes()[0].variation_file("w1.wav");
        assert_eq!(
            catalog.resolve(&file),
            PathBuf::from("/srv/soundscape/audio/forest/w1.wav")
        );
    }
}
