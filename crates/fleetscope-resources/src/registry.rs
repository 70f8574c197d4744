//! Resource registry: where icons and workcell locations come from.
//!
//! The [`ResourceRegistry`] trait is the seam the cache resolves through.
//! [`ResourceManifest`] is the stock implementation, backed by the
//! dashboard's `resources.json`:
//!
//! ```text
//! {
//!   "robots":     { "<fleet>": { "icons": { "<model>": "/robots/x.png" } } },
//!   "dispensers": { "<guid>":  { "icons": { "<guid>": "/d.png" },
//!                                "location": { "x": 1.0, "y": 2.0, "level_name": "L1" } } }
//! }
//! ```
//!
//! Ingestors share the `dispensers` section, as in the dashboard.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ResourceError, ResourceResult};

/// Boxed future returned by icon lookups.
pub type IconFuture<'a> =
    Pin<Box<dyn Future<Output = ResourceResult<Option<String>>> + Send + 'a>>;

/// Static placement of a workcell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkcellLocation {
    pub level_name: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub yaw: f64,
}

/// Lookup of derived visual resources. Injected for testability.
pub trait ResourceRegistry: Send + Sync {
    /// Icon for a robot of `model` in `fleet`. `Ok(None)` means no icon.
    fn robot_icon<'a>(&'a self, fleet: &'a str, model: &'a str) -> IconFuture<'a>;

    /// Icon for the dispenser or ingestor `guid`.
    fn workcell_icon<'a>(&'a self, guid: &'a str) -> IconFuture<'a>;

    /// Where the workcell `guid` sits, if the registry knows it.
    fn workcell_location(&self, guid: &str) -> Option<WorkcellLocation>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RobotResource {
    #[serde(default)]
    pub icons: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkcellResource {
    #[serde(default)]
    pub icons: HashMap<String, String>,
    pub location: WorkcellLocation,
}

/// `resources.json` backed registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceManifest {
    #[serde(default)]
    pub robots: HashMap<String, RobotResource>,
    #[serde(default)]
    pub dispensers: HashMap<String, WorkcellResource>,
    /// When set, icon paths are joined onto this directory and only
    /// returned if the file exists.
    #[serde(skip)]
    pub asset_root: Option<PathBuf>,
}

impl ResourceManifest {
    pub fn from_file(path: &Path) -> ResourceResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ResourceError::Manifest {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let manifest: ResourceManifest =
            serde_json::from_str(&content).map_err(|e| ResourceError::Manifest {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        debug!(
            ?path,
            fleets = manifest.robots.len(),
            workcells = manifest.dispensers.len(),
            "resource manifest loaded"
        );
        Ok(manifest)
    }

    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = Some(root.into());
        self
    }

    /// Resolve a manifest icon path against the asset root.
    async fn resolve_asset(&self, key: &str, icon: Option<&String>) -> ResourceResult<Option<String>> {
        let Some(icon) = icon else {
            return Ok(None);
        };
        let Some(root) = &self.asset_root else {
            return Ok(Some(icon.clone()));
        };
        let full = root.join(icon.trim_start_matches('/'));
        match tokio::fs::try_exists(&full).await {
            Ok(true) => Ok(Some(full.display().to_string())),
            Ok(false) => {
                debug!(%key, path = %full.display(), "icon file missing");
                Ok(None)
            }
            Err(e) => Err(ResourceError::Lookup {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

impl ResourceRegistry for ResourceManifest {
    fn robot_icon<'a>(&'a self, fleet: &'a str, model: &'a str) -> IconFuture<'a> {
        Box::pin(async move {
            // Fleets without a model key their icon by fleet name.
            let model = if model.is_empty() { fleet } else { model };
            let icon = self.robots.get(fleet).and_then(|r| r.icons.get(model));
            self.resolve_asset(&format!("{fleet}/{model}"), icon).await
        })
    }

    fn workcell_icon<'a>(&'a self, guid: &'a str) -> IconFuture<'a> {
        Box::pin(async move {
            let icon = self.dispensers.get(guid).and_then(|w| w.icons.get(guid));
            self.resolve_asset(guid, icon).await
        })
    }

    fn workcell_location(&self, guid: &str) -> Option<WorkcellLocation> {
        self.dispensers.get(guid).map(|w| w.location.clone())
    }
}
