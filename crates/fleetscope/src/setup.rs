//! Assembles a composer from files on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Args;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use fleetscope_core::{BuildingMap, DisplayMode, ScopeConfig, VisualizerSettings};
use fleetscope_resources::ResourceManifest;
use fleetscope_scene::{
    ComposerOptions, FileImageSource, ImageDimensions, ImageSource, Layer, LiveSnapshot,
    OverlayComposer, StaticImageSource,
};
use fleetscope_trajectory::{NegotiationStore, ReplayTrajectoryService};

#[derive(Args, Debug, Clone)]
pub struct SceneArgs {
    /// Building map JSON.
    #[arg(short, long)]
    pub building: PathBuf,
    /// Live-state snapshot JSON.
    #[arg(short, long)]
    pub states: PathBuf,
    /// Per-level schedule responses to replay.
    #[arg(short, long)]
    pub trajectories: Option<PathBuf>,
    /// Negotiation preview per level; switches to negotiation mode.
    #[arg(long)]
    pub negotiation: Option<PathBuf>,
    /// Level to show instead of the first one.
    #[arg(short, long)]
    pub level: Option<String>,
    /// Declared image size, e.g. L1=2000x1200. Skips reading image files.
    #[arg(long = "image-size")]
    pub image_sizes: Vec<String>,
    /// Layers to hide, e.g. --hide waypoints --hide doors.
    #[arg(long)]
    pub hide: Vec<String>,
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

/// Load `path`, or an empty config if it does not exist.
pub fn load_config(path: &Path) -> anyhow::Result<ScopeConfig> {
    if path.exists() {
        return ScopeConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()));
    }
    warn!(path = %path.display(), "config not found, using defaults");
    Ok(ScopeConfig {
        visualizer: None,
        resources: None,
        auth: None,
    })
}

/// Path of the persisted visualizer settings, if configured.
pub fn settings_path(config: &ScopeConfig) -> Option<PathBuf> {
    config.visualizer.as_ref().and_then(|v| v.settings_file.clone())
}

/// Parse `LEVEL=WIDTHxHEIGHT`.
pub fn parse_image_size(arg: &str) -> anyhow::Result<(String, ImageDimensions)> {
    let Some((level, size)) = arg.split_once('=') else {
        bail!("image size must look like LEVEL=WIDTHxHEIGHT, got {arg:?}");
    };
    let Some((w, h)) = size.split_once('x') else {
        bail!("image size must look like LEVEL=WIDTHxHEIGHT, got {arg:?}");
    };
    let width = w.trim().parse().with_context(|| format!("bad width in {arg:?}"))?;
    let height = h.trim().parse().with_context(|| format!("bad height in {arg:?}"))?;
    Ok((level.trim().to_string(), ImageDimensions { width, height }))
}

fn image_source(args: &SceneArgs) -> anyhow::Result<Arc<dyn ImageSource>> {
    if args.image_sizes.is_empty() {
        let root = args.building.parent().map(Path::to_path_buf);
        return Ok(Arc::new(FileImageSource::new(root)));
    }
    let sizes = args
        .image_sizes
        .iter()
        .map(|s| parse_image_size(s))
        .collect::<anyhow::Result<HashMap<_, _>>>()?;
    Ok(Arc::new(StaticImageSource::new(sizes)))
}

fn manifest(config: &ScopeConfig) -> anyhow::Result<ResourceManifest> {
    let Some(resources) = &config.resources else {
        return Ok(ResourceManifest::default());
    };
    let mut manifest = match &resources.manifest {
        Some(path) => ResourceManifest::from_file(path)?,
        None => ResourceManifest::default(),
    };
    if let Some(root) = &resources.asset_root {
        manifest = manifest.with_asset_root(root);
    }
    Ok(manifest)
}

/// Build a composer with images loaded and `args` applied.
pub async fn composer(config_path: &Path, args: &SceneArgs) -> anyhow::Result<OverlayComposer> {
    let config = load_config(config_path)?;
    let settings = settings_path(&config)
        .map(|p| VisualizerSettings::load(&p))
        .transpose()?;
    let mut options = ComposerOptions::from_config(&config, settings.as_ref());

    let negotiation: Option<NegotiationStore> = args.negotiation.as_deref().map(read_json).transpose()?;
    if negotiation.is_some() {
        options.mode = DisplayMode::Negotiation;
    }

    let trajectories = match &args.trajectories {
        Some(path) => ReplayTrajectoryService::from_file(path)?,
        None => ReplayTrajectoryService::default(),
    };

    let building: BuildingMap = read_json(&args.building)?;
    let mut composer = OverlayComposer::new(
        building,
        Arc::new(manifest(&config)?),
        image_source(args)?,
        Arc::new(trajectories),
        options,
    )?;

    let ready = composer.load_images().await;
    info!(ready, levels = composer.level_names().len(), "levels ready");

    if let Some(level) = &args.level {
        composer.select_level(level)?;
    }
    for name in &args.hide {
        let Some(layer) = Layer::from_name(name) else {
            bail!("unknown layer {name:?}");
        };
        composer.set_layer_visible(layer, false);
    }
    if let Some(store) = negotiation {
        composer.set_negotiation_trajectories(store);
    }
    Ok(composer)
}

pub fn load_states(path: &Path) -> anyhow::Result<LiveSnapshot> {
    read_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_size_parsing() {
        let (level, dims) = parse_image_size("L1=2000x1200").unwrap();
        assert_eq!(level, "L1");
        assert_eq!(dims, ImageDimensions { width: 2000, height: 1200 });
        assert!(parse_image_size("L1").is_err());
        assert!(parse_image_size("L1=20").is_err());
        assert!(parse_image_size("L1=axb").is_err());
    }

    #[test]
    fn missing_config_is_empty() {
        let config = load_config(Path::new("/nonexistent/fleetscope.toml")).unwrap();
        assert!(config.visualizer.is_none());
        assert!(settings_path(&config).is_none());
    }

    #[tokio::test]
    async fn composer_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let building = dir.path().join("building.json");
        std::fs::write(
            &building,
            r#"{"name": "office", "levels": [
                {"name": "L2", "elevation": 0, "images": [{"name": "b", "x_offset": 0, "y_offset": 0, "scale": 1, "data": "b.png"}], "doors": [], "nav_graphs": []},
                {"name": "L1", "elevation": 0, "images": [{"name": "a", "x_offset": 0, "y_offset": 0, "scale": 1, "data": "a.png"}], "doors": [], "nav_graphs": []}
            ], "lifts": []}"#,
        )
        .unwrap();
        let args = SceneArgs {
            building,
            states: dir.path().join("states.json"),
            trajectories: None,
            negotiation: None,
            level: Some("L2".to_string()),
            image_sizes: vec!["L1=10x10".to_string(), "L2=10x10".to_string()],
            hide: vec!["doors".to_string()],
        };
        let composer = composer(&dir.path().join("fleetscope.toml"), &args).await.unwrap();
        assert_eq!(composer.current_level(), "L2");
        assert!(!composer.visibility().is_visible(Layer::Doors));

        let bad = SceneArgs {
            hide: vec!["tiles".to_string()],
            ..args
        };
        assert!(super::composer(&dir.path().join("fleetscope.toml"), &bad).await.is_err());
    }
}
