//! Overlay layers and their visibility.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Waypoints,
    Dispensers,
    Ingestors,
    Robots,
    Trajectories,
    Lifts,
    Doors,
}

impl Layer {
    pub const ALL: [Layer; 7] = [
        Layer::Waypoints,
        Layer::Dispensers,
        Layer::Ingestors,
        Layer::Robots,
        Layer::Trajectories,
        Layer::Lifts,
        Layer::Doors,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Layer::Waypoints => "waypoints",
            Layer::Dispensers => "dispensers",
            Layer::Ingestors => "ingestors",
            Layer::Robots => "robots",
            Layer::Trajectories => "trajectories",
            Layer::Lifts => "lifts",
            Layer::Doors => "doors",
        }
    }

    /// Parse a layer from its lowercase name.
    pub fn from_name(name: &str) -> Option<Layer> {
        Layer::ALL.into_iter().find(|l| l.name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One flag per layer. Every layer starts visible.
///
/// Visibility only gates drawing; data of a hidden layer keeps updating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerVisibility {
    visible: [bool; 7],
}

impl Default for LayerVisibility {
    fn default() -> Self {
        Self { visible: [true; 7] }
    }
}

impl LayerVisibility {
    pub fn is_visible(&self, layer: Layer) -> bool {
        self.visible[layer.index()]
    }

    pub fn set(&mut self, layer: Layer, visible: bool) {
        self.visible[layer.index()] = visible;
    }

    /// Flip `layer` and return its new visibility.
    pub fn toggle(&mut self, layer: Layer) -> bool {
        let slot = &mut self.visible[layer.index()];
        *slot = !*slot;
        *slot
    }

    pub fn iter(&self) -> impl Iterator<Item = (Layer, bool)> + '_ {
        Layer::ALL.into_iter().map(|l| (l, self.is_visible(l)))
    }
}
