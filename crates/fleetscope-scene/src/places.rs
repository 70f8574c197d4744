//! Named waypoints of the building.

use serde::{Deserialize, Serialize};

use fleetscope_core::{BuildingMap, GraphNode};

/// A named nav-graph vertex and the level it sits on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub level: String,
    pub vertex: GraphNode,
}

/// Every named waypoint of a building map, derived once when the map loads.
#[derive(Debug, Clone, Default)]
pub struct PlaceIndex {
    places: Vec<Place>,
}

impl PlaceIndex {
    pub fn from_building(map: &BuildingMap) -> Self {
        let places = map
            .levels
            .iter()
            .flat_map(|level| {
                level.nav_graphs.iter().flat_map(move |graph| {
                    graph
                        .vertices
                        .iter()
                        .filter(|v| !v.name.is_empty())
                        .map(move |v| Place {
                            level: level.name.clone(),
                            vertex: v.clone(),
                        })
                })
            })
            .collect();
        Self { places }
    }

    /// Waypoints on `level`.
    pub fn for_level(&self, level: &str) -> Vec<Place> {
        self.places
            .iter()
            .filter(|p| p.level == level)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }
}
