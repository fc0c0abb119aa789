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
use std::fs;
use std::path::Path;

use tracing::info;

mod error;
mod player;
mod scene;

pub use self::error::ConfigError;
pub use self::player::{Audio, ExportSettings, Player};
pub use self::scene::{
    Catalog, SampleDef, SceneConfig, StitchingMethod, SubsceneConfig, SubsceneSampleParams,
    TimingWindow,
};

/// Parses a duration string such as `16ms` or `10m`.
pub fn parse_duration(value: &str) -> Result<std::time::Duration, ConfigError> {
    player::parse_duration(value)
}

/// Loads the scene catalog from a JSON file. Variation paths are resolved
/// against the directory containing the catalog.
pub fn load_catalog(path: &Path) -> Result<Catalog, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let scenes: Vec<SceneConfig> =
        serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let catalog = Catalog::new(scenes, base_dir)?;

    info!(
        catalog = path.display().to_string(),
        scenes = catalog.len(),
        "Loaded scene catalog"
    );
    Ok(catalog)
}

/// Loads the player configuration from a YAML file.
pub fn load_player(path: &Path) -> Result<Player, ConfigError> {
    Player::deserialize(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(
            &path,
            r#"[{
                "sceneName": "Harbor",
                "directory": "harbor",
                "samples": [{ "label": "gulls", "variationNames": ["g1.wav"] }],
                "subscenes": [{ "label": "Dawn", "sceneSamplesConfig": [
                    { "currentVol": 40, "minVol": 10, "maxVol": 60,
                      "minTimeframeLengthMs": 1000, "maxTimeframeLengthMs": 4000 }
                ]}]
            }]"#,
        )
        .unwrap();

        let catalog = load_catalog(&path).unwrap();
        assert_eq!(catalog.scenes()[0].name(), "Harbor");
        assert_eq!(catalog.resolve("harbor/g1.wav"), dir.path().join("harbor/g1.wav"));
    }

    #[test]
    fn test_load_catalog_missing_file() {
        let result = load_catalog(Path::new("/nonexistent/catalog.json"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_catalog_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(load_catalog(&path), Err(ConfigError::Json { .. })));
    }
}
