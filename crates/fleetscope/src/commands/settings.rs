use std::path::{Path, PathBuf};

use anyhow::Context;
use fleetscope_core::config::parse_duration;
use fleetscope_core::VisualizerSettings;

use crate::setup::{load_config, settings_path};

pub fn settings(
    config_path: &Path,
    trajectory_time: Option<&str>,
    file: Option<PathBuf>,
) -> anyhow::Result<()> {
    let path = match file {
        Some(path) => path,
        None => settings_path(&load_config(config_path)?)
            .context("no settings file given and [visualizer].settings_file is not set")?,
    };

    let mut settings = VisualizerSettings::load(&path)?;
    if let Some(raw) = trajectory_time {
        let time = parse_duration(raw)
            .filter(|d| !d.is_zero())
            .with_context(|| format!("invalid trajectory time {raw:?}"))?;
        settings.trajectory_time = time.as_millis() as u64;
        settings.save(&path)?;
    }
    println!("trajectory_time = {} ms", settings.trajectory_time);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_persists_trajectory_time() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("settings.json");
        let config = dir.path().join("fleetscope.toml");

        settings(&config, Some("30s"), Some(file.clone())).unwrap();
        assert_eq!(VisualizerSettings::load(&file).unwrap().trajectory_time, 30_000);

        assert!(settings(&config, Some("soon"), Some(file.clone())).is_err());
        assert!(settings(&config, None, None).is_err());
    }
}
