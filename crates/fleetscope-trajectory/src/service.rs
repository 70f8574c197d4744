//! The trajectory service seam.
//!
//! The wire protocol to the schedule server belongs to the real-time
//! client; the poller only needs "give me the latest trajectories for this
//! request". [`ReplayTrajectoryService`] serves canned responses per level
//! and backs the CLI and tests.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use tracing::debug;

use fleetscope_core::{TrajectoryRequest, TrajectoryResponse};

use crate::error::{TrajectoryError, TrajectoryResult};

/// Boxed future alias for trajectory fetches.
pub type TrajectoryFuture<'a> =
    Pin<Box<dyn Future<Output = TrajectoryResult<TrajectoryResponse>> + Send + 'a>>;

/// Source of predicted trajectories. Injected for testability.
pub trait TrajectoryService: Send + Sync {
    /// Fetch the latest trajectories matching `request`.
    fn latest_trajectory<'a>(&'a self, request: &'a TrajectoryRequest) -> TrajectoryFuture<'a>;
}

/// Serves fixed responses keyed by level name.
///
/// Levels without an entry get an empty response.
#[derive(Debug, Clone, Default)]
pub struct ReplayTrajectoryService {
    responses: HashMap<String, TrajectoryResponse>,
}

impl ReplayTrajectoryService {
    pub fn new(responses: HashMap<String, TrajectoryResponse>) -> Self {
        Self { responses }
    }

    /// Load `{ "<level>": { "values": [...], "conflicts": [...] } }` from disk.
    pub fn from_file(path: &Path) -> TrajectoryResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TrajectoryError::Replay {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let responses: HashMap<String, TrajectoryResponse> =
            serde_json::from_str(&content).map_err(|e| TrajectoryError::Replay {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        debug!(?path, levels = responses.len(), "trajectory replay loaded");
        Ok(Self { responses })
    }
}

impl TrajectoryService for ReplayTrajectoryService {
    fn latest_trajectory<'a>(&'a self, request: &'a TrajectoryRequest) -> TrajectoryFuture<'a> {
        Box::pin(async move {
            Ok(self
                .responses
                .get(&request.map_name)
                .cloned()
                .unwrap_or_default())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(level: &str) -> TrajectoryRequest {
        TrajectoryRequest {
            map_name: level.to_string(),
            duration: 60_000,
            trim: true,
            token: None,
        }
    }

    #[tokio::test]
    async fn replay_serves_per_level() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trajectories.json");
        std::fs::write(
            &path,
            r#"{"L1": {"values": [{"id": 1}, {"id": 2}], "conflicts": [[1, 2]]}}"#,
        )
        .unwrap();

        let service = ReplayTrajectoryService::from_file(&path).unwrap();
        let resp = service.latest_trajectory(&request("L1")).await.unwrap();
        assert_eq!(resp.values.len(), 2);
        assert_eq!(resp.conflicts, vec![vec!["1".to_string(), "2".to_string()]]);

        let empty = service.latest_trajectory(&request("L9")).await.unwrap();
        assert!(empty.values.is_empty());
    }

    #[test]
    fn replay_missing_file_is_an_error() {
        let err = ReplayTrajectoryService::from_file(Path::new("/nonexistent/t.json")).unwrap_err();
        assert!(matches!(err, TrajectoryError::Replay { .. }));
    }
}
