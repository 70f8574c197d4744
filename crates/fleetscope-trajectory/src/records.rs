//! Render-ready trajectory records.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use fleetscope_core::{Trajectory, TrajectoryId, TrajectoryResponse};

/// Colour of schedule trajectories.
pub const SCHEDULE_COLOR: &str = "green";

/// Colour of negotiation preview trajectories.
pub const NEGOTIATION_COLOR: &str = "orange";

/// One trajectory as the map draws it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryRecord {
    pub trajectory: Trajectory,
    pub color: String,
    pub conflict: bool,
    pub animation_scale: f64,
    pub loop_animation: bool,
}

/// Visible trajectories of one level, replaced wholesale on each commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrajectorySet {
    /// Level the records were fetched for.
    pub level: String,
    /// Tick sequence number of the commit within its poll session (0 = none yet).
    pub seq: u64,
    pub records: Vec<TrajectoryRecord>,
}

impl TrajectorySet {
    pub fn empty(level: &str) -> Self {
        Self {
            level: level.to_string(),
            seq: 0,
            records: Vec::new(),
        }
    }
}

/// Negotiation preview trajectories keyed by level name.
pub type NegotiationStore = HashMap<String, TrajectoryResponse>;

/// Speed-up applied to trajectory animations so that one animation ends
/// just before the next poll replaces it.
pub fn animation_scale(trajectory_time: Duration, interval: Duration) -> f64 {
    trajectory_time.as_millis() as f64 / (0.9 * interval.as_millis() as f64)
}

/// Build records from a schedule response, flagging every trajectory whose
/// id appears in any conflict group.
pub fn tag_conflicts(response: TrajectoryResponse, animation_scale: f64) -> Vec<TrajectoryRecord> {
    let conflicting: std::collections::HashSet<&TrajectoryId> =
        response.conflicts.iter().flatten().collect();
    response
        .values
        .iter()
        .map(|t| TrajectoryRecord {
            conflict: conflicting.contains(&t.id),
            trajectory: t.clone(),
            color: SCHEDULE_COLOR.to_string(),
            animation_scale,
            loop_animation: false,
        })
        .collect()
}

/// Records for the negotiation preview of `level`. Never flagged as conflicts.
pub fn negotiation_trajectories(
    store: &NegotiationStore,
    level: &str,
    animation_scale: f64,
) -> Vec<TrajectoryRecord> {
    store
        .get(level)
        .map(|resp| {
            resp.values
                .iter()
                .map(|t| TrajectoryRecord {
                    trajectory: t.clone(),
                    color: NEGOTIATION_COLOR.to_string(),
                    conflict: false,
                    animation_scale,
                    loop_animation: false,
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn traj(id: &str) -> Trajectory {
        Trajectory {
            id: id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn conflicts_are_flattened() {
        let resp = TrajectoryResponse {
            values: vec![traj("t1"), traj("t2")],
            conflicts: vec![vec!["t1".to_string()]],
        };
        let records = tag_conflicts(resp, 1.0);
        assert_eq!(records.len(), 2);
        assert!(records[0].conflict);
        assert!(!records[1].conflict);
        assert_eq!(records[0].color, SCHEDULE_COLOR);
        assert!(!records[0].loop_animation);
    }

    #[test]
    fn conflict_in_any_group_counts() {
        let resp = TrajectoryResponse {
            values: vec![traj("a"), traj("b"), traj("c")],
            conflicts: vec![vec![], vec!["c".to_string(), "x".to_string()]],
        };
        let flags: Vec<bool> = tag_conflicts(resp, 1.0).iter().map(|r| r.conflict).collect();
        assert_eq!(flags, vec![false, false, true]);
    }

    #[test]
    fn default_animation_scale() {
        let scale = animation_scale(Duration::from_millis(60_000), Duration::from_millis(2_000));
        assert!((scale - 33.333_333).abs() < 1e-4);
    }

    #[test]
    fn negotiation_records_for_level_only() {
        let mut store = NegotiationStore::new();
        store.insert(
            "L1".to_string(),
            TrajectoryResponse {
                values: vec![traj("n1")],
                conflicts: vec![vec!["n1".to_string()]],
            },
        );
        let records = negotiation_trajectories(&store, "L1", 2.0);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].color, NEGOTIATION_COLOR);
        assert!(!records[0].conflict);
        assert_eq!(records[0].animation_scale, 2.0);
        assert!(negotiation_trajectories(&store, "L2", 2.0).is_empty());
    }
}
