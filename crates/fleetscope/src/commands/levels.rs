use std::path::Path;

use fleetscope_core::BuildingMap;
use fleetscope_scene::{sort_levels, PlaceIndex};

use crate::setup::read_json;

/// Print levels in display order with their place, door and image counts.
pub fn list(building: &Path) -> anyhow::Result<()> {
    let mut map: BuildingMap = read_json(building)?;
    sort_levels(&mut map.levels);
    let places = PlaceIndex::from_building(&map);

    println!("{} ({} levels, {} lifts)", map.name, map.levels.len(), map.lifts.len());
    for level in &map.levels {
        let image = level
            .primary_image()
            .map(|i| i.data.as_str())
            .unwrap_or("-");
        println!(
            "  {:<12} elevation {:>6.2}  places {:>3}  doors {:>3}  image {}",
            level.name,
            level.elevation,
            places.for_level(&level.name).len(),
            level.doors.len(),
            image
        );
    }
    Ok(())
}
