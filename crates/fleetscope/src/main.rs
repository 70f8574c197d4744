//! fleetscope: compose fleet map overlays from recorded state.
//!
//! Loads a building map, a resource manifest and live-state snapshots from
//! disk and prints the scene the map view would draw.
//!
//! # Usage
//!
//! ```text
//! fleetscope init --manifest resources.json
//! fleetscope levels --building building.json
//! fleetscope render --building building.json --states live.json --image-size L1=2000x1200
//! fleetscope watch --building building.json --states live.json --trajectories schedule.json
//! fleetscope settings --trajectory-time 30s
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod setup;

#[derive(Parser)]
#[command(
    name = "fleetscope",
    about = "Fleet map overlay composer",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path of fleetscope.toml.
    #[arg(short, long, global = true, default_value = "fleetscope.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a fleetscope.toml scaffold.
    Init {
        /// Directory to write into.
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
        /// Resource manifest the scaffold points at.
        #[arg(short, long, default_value = "resources.json")]
        manifest: String,
    },
    /// List the building's levels in display order.
    Levels {
        #[arg(short, long)]
        building: PathBuf,
    },
    /// Compose one scene and print it.
    Render {
        #[command(flatten)]
        scene: setup::SceneArgs,
        /// Output format: text or json.
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Re-read the states file every poll interval and print a summary
    /// until interrupted.
    Watch {
        #[command(flatten)]
        scene: setup::SceneArgs,
    },
    /// Show or update the persisted visualizer settings.
    Settings {
        /// New trajectory lookback window, e.g. "30s" or "2m".
        #[arg(long)]
        trajectory_time: Option<String>,
        /// Settings file; defaults to [visualizer].settings_file.
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,fleetscope=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { path, manifest } => commands::init::init(&path, &manifest),
        Commands::Levels { building } => commands::levels::list(&building),
        Commands::Render { scene, format } => {
            commands::render::render(&cli.config, &scene, &format).await
        }
        Commands::Watch { scene } => commands::render::watch(&cli.config, &scene).await,
        Commands::Settings {
            trajectory_time,
            file,
        } => commands::settings::settings(&cli.config, trajectory_time.as_deref(), file),
    }
}
