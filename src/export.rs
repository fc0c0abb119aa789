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
//! The render manifest handed to the offline renderer.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{
    ConfigError, ExportSettings, SceneConfig, StitchingMethod, SubsceneConfig,
    SubsceneSampleParams,
};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("First timing window of subscene {subscene} starts at {start_at}ms, it must start at 0")]
    FirstWindowNotAtZero { subscene: String, start_at: u64 },

    #[error("Subscene {0} has no timing windows")]
    NoWindows(String),

    #[error("Invalid export settings: {0}")]
    Settings(#[from] ConfigError),

    #[error("Unable to write manifest: {0}")]
    Io(#[from] io::Error),

    #[error("Unable to serialize manifest: {0}")]
    Json(#[from] serde_json::Error),
}

/// Volume bounds as ratios (0.0-1.0) and timeframes of one window.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParamsExport {
    pub min_vol_ratio: f32,
    pub max_vol_ratio: f32,
    pub min_timeframe_length_ms: u64,
    pub max_timeframe_length_ms: u64,
}

impl From<&SubsceneSampleParams> for ParamsExport {
    fn from(params: &SubsceneSampleParams) -> Self {
        ParamsExport {
            min_vol_ratio: params.min_vol / 100.0,
            max_vol_ratio: params.max_vol / 100.0,
            min_timeframe_length_ms: params.min_timeframe_length_ms,
            max_timeframe_length_ms: params.max_timeframe_length_ms,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WindowExport {
    pub start_at: u64,
    pub params: ParamsExport,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SampleExport {
    /// Every variation of the sample, as `directory/variationName`.
    pub variation_file_path: Vec<String>,
    pub stitching_method: StitchingMethod,
    pub concat_overlay_ms: u64,
    pub timing_windows: Vec<WindowExport>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RenderManifest {
    pub length_ms: u64,
    pub bit_depth: u16,
    pub sample_rate: u32,
    pub format: String,
    pub samples: Vec<SampleExport>,
}

/// Builds the manifest for a subscene. Samples whose max volume is 0 in every
/// window are left out.
pub fn export_manifest(
    scene: &SceneConfig,
    subscene: &SubsceneConfig,
    settings: &ExportSettings,
) -> Result<RenderManifest, ExportError> {
    let windows = subscene.windows();
    let first = windows
        .first()
        .ok_or_else(|| ExportError::NoWindows(subscene.label().to_string()))?;
    if first.start_at() != 0 {
        return Err(ExportError::FirstWindowNotAtZero {
            subscene: subscene.label().to_string(),
            start_at: first.start_at(),
        });
    }

    let mut samples = Vec::new();
    for (index, sample) in scene.samples().iter().enumerate() {
        let params: Vec<&SubsceneSampleParams> = windows
            .iter()
            .filter_map(|window| window.params().get(index))
            .collect();
        if params.iter().all(|params| params.max_vol <= 0.0) {
            debug!(sample = sample.label(), "Sample is silent in every window, skipping");
            continue;
        }

        samples.push(SampleExport {
            variation_file_path: sample
                .variation_names()
                .iter()
                .map(|name| scene.variation_file(name))
                .collect(),
            stitching_method: sample.stitching_method(),
            concat_overlay_ms: sample.concat_overlay_ms(),
            timing_windows: windows
                .iter()
                .zip(params)
                .map(|(window, params)| WindowExport {
                    start_at: window.start_at(),
                    params: params.into(),
                })
                .collect(),
        });
    }

    Ok(RenderManifest {
        length_ms: settings.length()?.as_millis() as u64,
        bit_depth: settings.bit_depth(),
        sample_rate: settings.sample_rate(),
        format: settings.format().to_string(),
        samples,
    })
}

/// Writes the manifest as pretty printed JSON.
pub fn write_manifest(manifest: &RenderManifest, path: &Path) -> Result<(), ExportError> {
    fs::write(path, serde_json::to_string_pretty(manifest)?)?;
    info!(
        path = path.display().to_string(),
        samples = manifest.samples.len(),
        "Exported render manifest"
    );
    Ok(())
}
