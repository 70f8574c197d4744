//! Dispenser and ingestor projection.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use tracing::debug;

use fleetscope_core::WorkcellState;
use fleetscope_resources::ResourceCache;

/// Which roster a projector serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkcellKind {
    Dispenser,
    Ingestor,
}

impl WorkcellKind {
    pub fn name(self) -> &'static str {
        match self {
            WorkcellKind::Dispenser => "dispenser",
            WorkcellKind::Ingestor => "ingestor",
        }
    }
}

/// A workcell as drawn on the current level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkcellRecord {
    pub guid: String,
    pub kind: WorkcellKind,
    /// `[x, y]` in world coordinates.
    pub location: [f64; 2],
    pub icon_path: Option<String>,
    /// Length of the request queue; `None` while the workcell is not reporting.
    pub queue_len: Option<usize>,
    pub seconds_remaining: Option<f64>,
}

/// Filters a workcell roster to the current level and joins live state.
pub struct WorkcellStateProjector {
    kind: WorkcellKind,
    cache: Arc<ResourceCache>,
}

impl WorkcellStateProjector {
    pub fn new(kind: WorkcellKind, cache: Arc<ResourceCache>) -> Self {
        Self { kind, cache }
    }

    pub fn kind(&self) -> WorkcellKind {
        self.kind
    }

    /// Workcells of `guids` placed on `level`, in roster order.
    ///
    /// Guids the registry has no location for are dropped.
    pub async fn project<'a, I>(
        &self,
        guids: I,
        live: &HashMap<String, WorkcellState>,
        level: &str,
    ) -> Vec<WorkcellRecord>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let placed: Vec<_> = guids
            .into_iter()
            .filter_map(|guid| {
                let location = self.cache.workcell_location(guid);
                if location.is_none() {
                    debug!(kind = self.kind.name(), guid, "workcell not in registry");
                }
                location.map(|loc| (guid, loc))
            })
            .filter(|(_, loc)| loc.level_name == level)
            .collect();

        let icons = join_all(
            placed
                .iter()
                .map(|(guid, _)| self.cache.resolve_workcell_icon(guid)),
        )
        .await;

        placed
            .into_iter()
            .zip(icons)
            .map(|((guid, loc), icon_path)| {
                let state = live.get(guid);
                WorkcellRecord {
                    guid: guid.to_string(),
                    kind: self.kind,
                    location: [loc.x, loc.y],
                    icon_path,
                    queue_len: state.map(|s| s.request_guid_queue.len()),
                    seconds_remaining: state.map(|s| s.seconds_remaining),
                }
            })
            .collect()
    }
}
