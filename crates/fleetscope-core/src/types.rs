//! Wire types shared across fleetscope crates.
//!
//! These mirror the payloads of the fleet-management API: the static
//! building map, per-fleet robot states, door/lift/workcell states, and
//! trajectory schedule responses. Field names follow the API's snake_case.

use serde::{Deserialize, Deserializer, Serialize};

/// Name of a building level (unique within a building map).
pub type LevelName = String;

/// Identifier of a trajectory in the schedule.
pub type TrajectoryId = String;

// ── Building map ───────────────────────────────────────────────────

/// Static geometry of the whole building.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BuildingMap {
    pub name: String,
    pub levels: Vec<Level>,
    #[serde(default)]
    pub lifts: Vec<Lift>,
}

/// One floor of the building.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Level {
    pub name: LevelName,
    #[serde(default)]
    pub elevation: f64,
    /// Raster images for this level; the first one is the primary image.
    #[serde(default)]
    pub images: Vec<AffineImage>,
    #[serde(default)]
    pub doors: Vec<Door>,
    #[serde(default)]
    pub nav_graphs: Vec<Graph>,
}

impl Level {
    /// The image used as the level's base layer.
    pub fn primary_image(&self) -> Option<&AffineImage> {
        self.images.first()
    }
}

/// A raster image placed in world coordinates by an affine transform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AffineImage {
    pub name: String,
    pub x_offset: f64,
    pub y_offset: f64,
    #[serde(default)]
    pub yaw: f64,
    /// Metres per pixel.
    pub scale: f64,
    #[serde(default)]
    pub encoding: String,
    /// URI or filesystem path of the image data.
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Door {
    pub name: String,
    pub v1_x: f64,
    pub v1_y: f64,
    pub v2_x: f64,
    pub v2_y: f64,
    #[serde(default)]
    pub door_type: u8,
    #[serde(default)]
    pub motion_range: f64,
    #[serde(default)]
    pub motion_direction: i8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Lift {
    pub name: String,
    /// Levels this lift can stop at.
    pub levels: Vec<LevelName>,
    #[serde(default)]
    pub doors: Vec<Door>,
    pub ref_x: f64,
    pub ref_y: f64,
    #[serde(default)]
    pub ref_yaw: f64,
    pub width: f64,
    pub depth: f64,
}

/// Navigation graph of a level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Graph {
    #[serde(default)]
    pub name: String,
    pub vertices: Vec<GraphNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GraphNode {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub name: String,
}

// ── Fleets ─────────────────────────────────────────────────────────

/// Snapshot of every robot reported by one fleet adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FleetState {
    pub name: String,
    #[serde(default)]
    pub robots: Vec<RobotState>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RobotState {
    pub name: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub battery_percent: f64,
    pub location: Location,
    /// Time the robot produced this report, in unix milliseconds.
    #[serde(default)]
    pub unix_millis_time: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Location {
    pub level_name: LevelName,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub yaw: f64,
    #[serde(default)]
    pub t: i64,
}

// ── Doors and lifts ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoorState {
    pub door_name: String,
    pub current_mode: DoorMode,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DoorMode {
    Closed,
    Moving,
    Open,
    Offline,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LiftState {
    pub lift_name: String,
    pub current_floor: LevelName,
    #[serde(default)]
    pub destination_floor: LevelName,
    #[serde(default)]
    pub door_state: String,
    #[serde(default)]
    pub motion_state: String,
}

// ── Workcells ──────────────────────────────────────────────────────

/// Roster entry for a dispenser.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dispenser {
    pub guid: String,
}

/// Roster entry for an ingestor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ingestor {
    pub guid: String,
}

/// Live state reported by a dispenser or ingestor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct WorkcellState {
    pub guid: String,
    #[serde(default)]
    pub mode: i32,
    #[serde(default)]
    pub request_guid_queue: Vec<String>,
    #[serde(default)]
    pub seconds_remaining: f64,
}

// ── Schedule ───────────────────────────────────────────────────────

/// Request sent to the trajectory service on every poll.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrajectoryRequest {
    pub map_name: LevelName,
    /// Lookback window in milliseconds.
    pub duration: u64,
    pub trim: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TrajectoryResponse {
    #[serde(default)]
    pub values: Vec<Trajectory>,
    /// Groups of trajectory ids that conflict with each other.
    #[serde(default, deserialize_with = "id_groups")]
    pub conflicts: Vec<Vec<TrajectoryId>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Trajectory {
    #[serde(deserialize_with = "id")]
    pub id: TrajectoryId,
    #[serde(default)]
    pub shape: String,
    #[serde(default)]
    pub dimensions: f64,
    #[serde(default)]
    pub fleet_name: String,
    #[serde(default)]
    pub robot_name: String,
    #[serde(default)]
    pub segments: Vec<TrajectorySegment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TrajectorySegment {
    /// Position `[x, y, yaw]`.
    pub x: [f64; 3],
    /// Velocity `[vx, vy, omega]`.
    pub v: [f64; 3],
    /// Time in milliseconds.
    pub t: i64,
}

/// The schedule server reports ids as integers, other producers as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Str(String),
}

impl From<RawId> for TrajectoryId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Int(n) => n.to_string(),
            RawId::Str(s) => s,
        }
    }
}

fn id<'de, D: Deserializer<'de>>(d: D) -> Result<TrajectoryId, D::Error> {
    RawId::deserialize(d).map(Into::into)
}

fn id_groups<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<TrajectoryId>>, D::Error> {
    let raw = Vec::<Vec<RawId>>::deserialize(d)?;
    Ok(raw
        .into_iter()
        .map(|group| group.into_iter().map(Into::into).collect())
        .collect())
}
