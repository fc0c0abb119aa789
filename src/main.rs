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
use std::path::PathBuf;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use soundscape::audio::{self, decode::SymphoniaDecoder, mixer::Mixer};
use soundscape::config;
use soundscape::controller::{keyboard, Controller};
use soundscape::engine::{Engine, EngineSettings};
use soundscape::export;
use soundscape::player::Player;
use soundscape::render;
use soundscape::util::duration_minutes_seconds;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "An ambient soundscape player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists and verifies the scenes of a catalog.
    Scenes {
        /// The path to the scene catalog.
        catalog_path: String,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Starts the interactive player.
    Start {
        /// The path to the player config.
        player_path: String,
    },
    /// Exports the render manifest of a subscene without playing it.
    Export {
        /// The path to the player config.
        player_path: String,
        /// The scene to export.
        #[arg(short, long, default_value_t = 0)]
        scene: usize,
        /// The subscene to export.
        #[arg(short = 'u', long, default_value_t = 0)]
        subscene: usize,
        /// Where to write the manifest.
        output_path: String,
    },
    /// Renders a subscene to a WAV file.
    Render {
        /// The path to the player config.
        player_path: String,
        /// The scene to render.
        #[arg(short, long, default_value_t = 0)]
        scene: usize,
        /// The subscene to render.
        #[arg(short = 'u', long, default_value_t = 0)]
        subscene: usize,
        /// The length of the render, e.g. 90s or 10m. Defaults to the export length.
        #[arg(short, long)]
        length: Option<String>,
        /// Where to write the WAV file.
        output_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scenes { catalog_path } => {
            let catalog = config::load_catalog(&PathBuf::from(&catalog_path))?;

            if catalog.is_empty() {
                println!("No scenes found in {}.", catalog_path);
                return Ok(());
            }

            println!("Scenes (count: {}):", catalog.len());
            for (index, scene) in catalog.scenes().iter().enumerate() {
                println!("{}: {} ({})", index, scene.name(), scene.directory());
                for sample in scene.samples() {
                    println!(
                        "  - sample {} ({:?}, {} variations)",
                        sample.label(),
                        sample.stitching_method(),
                        sample.variation_names().len()
                    );
                }
                for (subscene_index, subscene) in scene.subscenes().iter().enumerate() {
                    println!("  {}: subscene {}", subscene_index, subscene.label());
                    for window in subscene.windows() {
                        println!(
                            "    - window at {}",
                            duration_minutes_seconds(std::time::Duration::from_millis(
                                window.start_at()
                            ))
                        );
                    }
                }
            }
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Start { player_path } => {
            let player_config = config::load_player(&PathBuf::from(&player_path))?;
            let catalog = config::load_catalog(&player_config.catalog())?;
            let output = audio::get_output(player_config.audio())?;
            let engine = Engine::new(
                catalog,
                output,
                EngineSettings::from_player(&player_config)?,
                player_config.seed(),
            )?;
            let decoder = Arc::new(SymphoniaDecoder::new(player_config.audio().sample_rate()));

            let player = Player::new(engine, decoder);
            let mut controller = Controller::new(player, Arc::new(keyboard::Driver::new()))?;
            controller.join().await?;
        }
        Commands::Export {
            player_path,
            scene,
            subscene,
            output_path,
        } => {
            let player_config = config::load_player(&PathBuf::from(&player_path))?;
            let catalog = config::load_catalog(&player_config.catalog())?;
            let scene_config = catalog
                .scene(scene)
                .ok_or_else(|| format!("no scene at index {}", scene))?;
            let subscene_config = scene_config
                .subscene(subscene)
                .ok_or_else(|| format!("no subscene at index {}", subscene))?;

            let manifest =
                export::export_manifest(scene_config, subscene_config, player_config.export())?;
            export::write_manifest(&manifest, &PathBuf::from(&output_path))?;
            println!(
                "Exported {} samples of {}/{} to {}.",
                manifest.samples.len(),
                scene_config.name(),
                subscene_config.label(),
                output_path
            );
        }
        Commands::Render {
            player_path,
            scene,
            subscene,
            length,
            output_path,
        } => {
            let player_config = config::load_player(&PathBuf::from(&player_path))?;
            let catalog = config::load_catalog(&player_config.catalog())?;
            let export_settings = player_config.export();
            let length = match length {
                Some(length) => config::parse_duration(&length)?,
                None => export_settings.length()?,
            };

            let mixer = Arc::new(Mixer::new(
                player_config.audio().channels(),
                export_settings.sample_rate(),
            ));
            let mut engine = Engine::new(
                catalog,
                mixer.clone(),
                EngineSettings::from_player(&player_config)?,
                player_config.seed(),
            )?;
            engine.select_scene(scene)?;
            engine.select_subscene(subscene)?;

            let decoder = SymphoniaDecoder::new(export_settings.sample_rate());
            let frames = render::render(
                &mut engine,
                &mixer,
                &decoder,
                length,
                export_settings.bit_depth(),
                &PathBuf::from(&output_path),
            )?;
            println!(
                "Rendered {} ({} frames) to {}.",
                duration_minutes_seconds(length),
                frames,
                output_path
            );
        }
    }

    Ok(())
}
