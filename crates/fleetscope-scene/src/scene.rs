//! The composed scene and click routing.

use serde::Serialize;

use fleetscope_trajectory::TrajectoryRecord;

use crate::fixtures::{DoorView, LiftView};
use crate::layers::Layer;
use crate::levels::LevelBounds;
use crate::places::Place;
use crate::robots::RobotView;
use crate::workcells::WorkcellRecord;

/// One overlay: its data plus whether it is drawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneLayer<T> {
    pub layer: Layer,
    pub visible: bool,
    pub items: Vec<T>,
}

impl<T> SceneLayer<T> {
    pub fn new(layer: Layer, visible: bool, items: Vec<T>) -> Self {
        Self {
            layer,
            visible,
            items,
        }
    }

    /// Items to draw: all of them if visible, none otherwise.
    pub fn drawn(&self) -> &[T] {
        if self.visible { &self.items[..] } else { &[] }
    }
}

/// Everything the map draws for one level at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    pub level: String,
    /// Every level name, sorted; the level picker's options.
    pub levels: Vec<String>,
    pub bounds: LevelBounds,
    pub waypoints: SceneLayer<Place>,
    pub dispensers: SceneLayer<WorkcellRecord>,
    pub ingestors: SceneLayer<WorkcellRecord>,
    pub lifts: SceneLayer<LiftView>,
    pub doors: SceneLayer<DoorView>,
    pub trajectories: SceneLayer<TrajectoryRecord>,
    pub robots: SceneLayer<RobotView>,
}

impl Scene {
    /// `(layer, visible, item count)` for every overlay, in draw order.
    pub fn summary(&self) -> Vec<(Layer, bool, usize)> {
        fn row<T>(l: &SceneLayer<T>) -> (Layer, bool, usize) {
            (l.layer, l.visible, l.items.len())
        }
        vec![
            row(&self.waypoints),
            row(&self.dispensers),
            row(&self.ingestors),
            row(&self.lifts),
            row(&self.doors),
            row(&self.trajectories),
            row(&self.robots),
        ]
    }
}

/// Something on the map a user can click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneTarget {
    Door(String),
    Lift(String),
    Robot { fleet: String, robot: String },
    Dispenser(String),
    Ingestor(String),
}

/// Click handlers. Every handler defaults to doing nothing.
pub trait SceneEvents: Send + Sync {
    fn on_door_click(&self, _door: &str) {}
    fn on_lift_click(&self, _lift: &str) {}
    fn on_robot_click(&self, _fleet: &str, _robot: &str) {}
    fn on_dispenser_click(&self, _guid: &str) {}
    fn on_ingestor_click(&self, _guid: &str) {}
}

/// Handlers that ignore every click.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreEvents;

impl SceneEvents for IgnoreEvents {}

/// Route `target` to its handler.
pub fn dispatch(events: &dyn SceneEvents, target: &SceneTarget) {
    match target {
        SceneTarget::Door(name) => events.on_door_click(name),
        SceneTarget::Lift(name) => events.on_lift_click(name),
        SceneTarget::Robot { fleet, robot } => events.on_robot_click(fleet, robot),
        SceneTarget::Dispenser(guid) => events.on_dispenser_click(guid),
        SceneTarget::Ingestor(guid) => events.on_ingestor_click(guid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        clicks: Mutex<Vec<String>>,
    }

    impl SceneEvents for Recorder {
        fn on_robot_click(&self, fleet: &str, robot: &str) {
            self.clicks.lock().unwrap().push(format!("robot {fleet}/{robot}"));
        }

        fn on_door_click(&self, door: &str) {
            self.clicks.lock().unwrap().push(format!("door {door}"));
        }
    }

    #[test]
    fn dispatch_routes_to_handler() {
        let recorder = Recorder::default();
        dispatch(
            &recorder,
            &SceneTarget::Robot {
                fleet: "tiny".to_string(),
                robot: "r1".to_string(),
            },
        );
        dispatch(&recorder, &SceneTarget::Door("main".to_string()));
        // Unhandled kinds fall through to the no-op defaults.
        dispatch(&recorder, &SceneTarget::Lift("Lift1".to_string()));
        assert_eq!(*recorder.clicks.lock().unwrap(), vec!["robot tiny/r1", "door main"]);
    }

    #[test]
    fn hidden_layer_keeps_items() {
        let layer = SceneLayer::new(Layer::Robots, false, vec![1, 2, 3]);
        assert!(layer.drawn().is_empty());
        assert_eq!(layer.items.len(), 3);
    }
}
