//! fleetscope.toml configuration parser and persisted visualizer settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, CoreResult};

/// Default lookback window for trajectory requests.
pub const DEFAULT_TRAJECTORY_TIME: Duration = Duration::from_millis(60_000);

/// Default trajectory poll period.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(2_000);

/// Default robot footprint radius in metres.
pub const DEFAULT_FOOTPRINT: f64 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeConfig {
    pub visualizer: Option<VisualizerConfig>,
    pub resources: Option<ResourcesConfig>,
    pub auth: Option<AuthConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualizerConfig {
    /// e.g. "60s", "1m".
    pub trajectory_time: Option<String>,
    /// e.g. "2s", "500ms".
    pub trajectory_update_interval: Option<String>,
    pub mode: Option<DisplayMode>,
    pub footprint: Option<f64>,
    /// Where the persisted [`VisualizerSettings`] live.
    pub settings_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesConfig {
    /// Path of the resource manifest (icons, workcell locations).
    pub manifest: Option<PathBuf>,
    /// Directory icon paths in the manifest are relative to.
    pub asset_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub token: Option<String>,
}

/// Which trajectory source the map displays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Trajectories are polled from the schedule.
    #[default]
    Normal,
    /// Trajectories come from a negotiation preview; no polling.
    Negotiation,
}

impl ScopeConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ScopeConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a config with the stock visualizer timings.
    pub fn scaffold(manifest: &str) -> Self {
        ScopeConfig {
            visualizer: Some(VisualizerConfig {
                trajectory_time: Some("60s".to_string()),
                trajectory_update_interval: Some("2s".to_string()),
                mode: Some(DisplayMode::Normal),
                footprint: Some(DEFAULT_FOOTPRINT),
                settings_file: None,
            }),
            resources: Some(ResourcesConfig {
                manifest: Some(PathBuf::from(manifest)),
                asset_root: None,
            }),
            auth: None,
        }
    }

    /// Trajectory lookback window, falling back to the default.
    pub fn trajectory_time(&self) -> Duration {
        self.visualizer
            .as_ref()
            .and_then(|v| v.trajectory_time.as_deref())
            .and_then(parse_duration)
            .unwrap_or(DEFAULT_TRAJECTORY_TIME)
    }

    /// Trajectory poll period, falling back to the default.
    pub fn update_interval(&self) -> Duration {
        self.visualizer
            .as_ref()
            .and_then(|v| v.trajectory_update_interval.as_deref())
            .and_then(parse_duration)
            .filter(|d| !d.is_zero())
            .unwrap_or(DEFAULT_UPDATE_INTERVAL)
    }

    pub fn mode(&self) -> DisplayMode {
        self.visualizer
            .as_ref()
            .and_then(|v| v.mode)
            .unwrap_or_default()
    }

    pub fn footprint(&self) -> f64 {
        self.visualizer
            .as_ref()
            .and_then(|v| v.footprint)
            .unwrap_or(DEFAULT_FOOTPRINT)
    }

    pub fn token(&self) -> Option<String> {
        self.auth.as_ref().and_then(|a| a.token.clone())
    }
}

/// User-adjustable visualizer settings, persisted between sessions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisualizerSettings {
    /// Trajectory lookback window in milliseconds.
    pub trajectory_time: u64,
}

impl Default for VisualizerSettings {
    fn default() -> Self {
        Self {
            trajectory_time: DEFAULT_TRAJECTORY_TIME.as_millis() as u64,
        }
    }
}

impl VisualizerSettings {
    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(?path, "no visualizer settings, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(CoreError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        serde_json::from_str(&content).map_err(|e| CoreError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> CoreResult<()> {
        let json = serde_json::to_string(self).map_err(|e| CoreError::Serialize(e.to_string()))?;
        std::fs::write(path, json).map_err(|source| CoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        debug!(?path, trajectory_time = self.trajectory_time, "visualizer settings saved");
        Ok(())
    }

    pub fn trajectory_time(&self) -> Duration {
        Duration::from_millis(self.trajectory_time)
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
