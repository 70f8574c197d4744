//! Door and lift joins.
//!
//! Geometry comes from the building map, state from the live snapshot. A
//! fixture without state is still drawn; its state fields are `None`.

use std::collections::HashMap;

use serde::Serialize;

use fleetscope_core::{Door, DoorMode, DoorState, Level, Lift, LiftState};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoorView {
    pub door: Door,
    pub mode: Option<DoorMode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiftView {
    pub lift: Lift,
    pub current_floor: Option<String>,
    pub destination_floor: Option<String>,
    pub door_state: Option<String>,
    pub motion_state: Option<String>,
}

/// Doors of `level` joined with their state.
pub fn door_views(level: &Level, states: &HashMap<String, DoorState>) -> Vec<DoorView> {
    level
        .doors
        .iter()
        .map(|door| DoorView {
            door: door.clone(),
            mode: states.get(&door.name).map(|s| s.current_mode),
        })
        .collect()
}

/// Lifts that stop at `level` joined with their state.
pub fn lift_views(lifts: &[Lift], level: &str, states: &HashMap<String, LiftState>) -> Vec<LiftView> {
    lifts
        .iter()
        .filter(|lift| lift.levels.iter().any(|l| l == level))
        .map(|lift| {
            let state = states.get(&lift.name);
            LiftView {
                lift: lift.clone(),
                current_floor: state.map(|s| s.current_floor.clone()),
                destination_floor: state.map(|s| s.destination_floor.clone()),
                door_state: state.map(|s| s.door_state.clone()),
                motion_state: state.map(|s| s.motion_state.clone()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn door(name: &str) -> Door {
        Door {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn lift(name: &str, levels: &[&str]) -> Lift {
        Lift {
            name: name.to_string(),
            levels: levels.iter().map(|l| l.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn doors_join_state_by_name() {
        let level = Level {
            name: "L1".to_string(),
            doors: vec![door("main_door"), door("coe_door")],
            ..Default::default()
        };
        let mut states = HashMap::new();
        states.insert(
            "main_door".to_string(),
            DoorState {
                door_name: "main_door".to_string(),
                current_mode: DoorMode::Open,
            },
        );
        let views = door_views(&level, &states);
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].mode, Some(DoorMode::Open));
        assert_eq!(views[1].mode, None);
    }

    #[test]
    fn only_lifts_serving_level() {
        let lifts = vec![lift("Lift1", &["L1", "L2"]), lift("Lift2", &["L2", "L3"])];
        let mut states = HashMap::new();
        states.insert(
            "Lift1".to_string(),
            LiftState {
                lift_name: "Lift1".to_string(),
                current_floor: "L2".to_string(),
                destination_floor: "L1".to_string(),
                door_state: "closed".to_string(),
                motion_state: "down".to_string(),
            },
        );

        let l1 = lift_views(&lifts, "L1", &states);
        assert_eq!(l1.len(), 1);
        assert_eq!(l1[0].lift.name, "Lift1");
        assert_eq!(l1[0].current_floor.as_deref(), Some("L2"));
        assert_eq!(l1[0].motion_state.as_deref(), Some("down"));

        let l3 = lift_views(&lifts, "L3", &states);
        assert_eq!(l3.len(), 1);
        assert_eq!(l3[0].current_floor, None);

        assert_eq!(lift_views(&lifts, "L2", &states).len(), 2);
    }
}
