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
//! Shared fixtures for tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::audio::decode::{DecodeError, Decoder};
use crate::audio::{mock, DecodedBuffer};
use crate::config::{
    Catalog, SampleDef, SceneConfig, StitchingMethod, SubsceneConfig, SubsceneSampleParams,
    TimingWindow,
};
use crate::engine::{Engine, EngineSettings};

mod polling;

pub use polling::eventually_async;

/// Sample rate of the buffers produced by the mock decoder. Kept low so tests
/// stay light.
pub const MOCK_SAMPLE_RATE: u32 = 1000;

/// Two scenes:
///
/// - `Forest` (`forest/`): `wind` (CROSSFADE, wind1.wav + wind2.wav) and `birds`
///   (OVERLAY 500ms, birds1.wav). Subscenes `Calm` (one window) and `Storm`
///   (windows at 0 and 60s, birds silent in both).
/// - `Harbor` (`harbor/`): `gulls` (CROSSFADE, gulls1.wav + gulls2.wav).
pub fn catalog() -> Catalog {
    let forest = SceneConfig::new(
        Some("Forest"),
        "forest",
        vec![
            SampleDef::new(
                "wind",
                &["wind1.wav", "wind2.wav"],
                StitchingMethod::Crossfade,
                0,
            ),
            SampleDef::new("birds", &["birds1.wav"], StitchingMethod::Overlay, 500),
        ],
        vec![
            SubsceneConfig::new(
                "Calm",
                vec![TimingWindow::new(
                    0,
                    vec![
                        SubsceneSampleParams::new(50.0, 20.0, 80.0, 2000, 8000),
                        SubsceneSampleParams::new(40.0, 10.0, 60.0, 2000, 6000),
                    ],
                )],
            ),
            SubsceneConfig::new(
                "Storm",
                vec![
                    TimingWindow::new(
                        0,
                        vec![
                            SubsceneSampleParams::new(90.0, 60.0, 100.0, 3000, 9000),
                            SubsceneSampleParams::new(0.0, 0.0, 0.0, 2000, 4000),
                        ],
                    ),
                    TimingWindow::new(
                        60_000,
                        vec![
                            SubsceneSampleParams::new(70.0, 50.0, 90.0, 3000, 9000),
                            SubsceneSampleParams::new(0.0, 0.0, 0.0, 2000, 4000),
                        ],
                    ),
                ],
            ),
        ],
    );
    let harbor = SceneConfig::new(
        Some("Harbor"),
        "harbor",
        vec![SampleDef::new(
            "gulls",
            &["gulls1.wav", "gulls2.wav"],
            StitchingMethod::Crossfade,
            0,
        )],
        vec![SubsceneConfig::new(
            "Dawn",
            vec![TimingWindow::new(
                0,
                vec![SubsceneSampleParams::new(30.0, 0.0, 60.0, 2000, 5000)],
            )],
        )],
    );

    match Catalog::new(vec![forest, harbor], Path::new("assets")) {
        Ok(catalog) => catalog,
        Err(e) => panic!("fixture catalog is invalid: {}", e),
    }
}

/// A decoder that returns silence of a configured length per file name and
/// fails for the files it is told to fail.
pub struct MockDecoder {
    durations: HashMap<String, Duration>,
    failures: HashSet<String>,
    default_duration: Duration,
    decoded: Mutex<Vec<PathBuf>>,
}

impl MockDecoder {
    /// wind1 3s, wind2 4s, birds1 2s, everything else 1s.
    pub fn new() -> MockDecoder {
        MockDecoder {
            durations: HashMap::from([
                ("wind1.wav".to_string(), Duration::from_secs(3)),
                ("wind2.wav".to_string(), Duration::from_secs(4)),
                ("birds1.wav".to_string(), Duration::from_secs(2)),
            ]),
            failures: HashSet::new(),
            default_duration: Duration::from_secs(1),
            decoded: Mutex::new(Vec::new()),
        }
    }

    pub fn with_duration(mut self, file: &str, duration: Duration) -> MockDecoder {
        self.durations.insert(file.to_string(), duration);
        self
    }

    pub fn failing(mut self, file: &str) -> MockDecoder {
        self.failures.insert(file.to_string());
        self
    }

    /// Every path decoded so far.
    pub fn decoded(&self) -> Vec<PathBuf> {
        self.decoded.lock().clone()
    }
}

impl Decoder for MockDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedBuffer, DecodeError> {
        self.decoded.lock().push(path.to_path_buf());
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        if self.failures.contains(&name) {
            return Err(DecodeError::Unsupported(name, "mock failure".into()));
        }
        let duration = self
            .durations
            .get(&name)
            .copied()
            .unwrap_or(self.default_duration);
        Ok(DecodedBuffer::silence(duration, 1, MOCK_SAMPLE_RATE))
    }
}

/// Runs every pending decode job through the decoder until none are left.
pub fn run_decode_jobs(engine: &mut Engine, decoder: &dyn Decoder) {
    loop {
        let jobs = engine.take_decode_jobs();
        if jobs.is_empty() {
            return;
        }
        for job in jobs {
            let result = decoder.decode(&job.path);
            engine.complete_decode(job, result);
        }
    }
}

/// An engine over the fixture catalog, playing into a mock output.
pub fn engine(settings: EngineSettings) -> (Engine, Arc<mock::Output>) {
    let output = Arc::new(mock::Output::new());
    match Engine::new(catalog(), output.clone(), settings, Some(42)) {
        Ok(engine) => (engine, output),
        Err(e) => panic!("unable to build engine: {}", e),
    }
}

/// Like [`engine`], with every initial decode already completed.
pub fn loaded_engine(settings: EngineSettings) -> (Engine, Arc<mock::Output>) {
    let (mut engine, output) = engine(settings);
    run_decode_jobs(&mut engine, &MockDecoder::new());
    (engine, output)
}
