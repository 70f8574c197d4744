//! Level-scoped scene composition for the fleet map.
//!
//! # Architecture
//!
//! ```text
//!  StateHub<T> ×5 ──▶ LiveState ──snapshot──┐
//!                                           ▼
//!  BuildingMap ──▶ PlaceIndex ─────▶ OverlayComposer::compose ──▶ Scene
//!           └───▶ LevelImageLoader ──bounds─┘  │  ▲
//!                                              │  └── TrajectoryPoller (watch)
//!                     RobotStateProjector ◀────┤
//!                 WorkcellStateProjector ×2 ◀──┘
//!                              │
//!                              └──▶ ResourceCache (Arc, shared)
//! ```
//!
//! Projectors hold only derived, per-entity resources. Live pose and status
//! always come from the snapshot passed to `compose`.

pub mod composer;
pub mod error;
pub mod fixtures;
pub mod layers;
pub mod levels;
pub mod live;
pub mod places;
pub mod robots;
pub mod scene;
pub mod workcells;

pub use composer::{ComposerOptions, OverlayComposer};
pub use error::{SceneError, SceneResult};
pub use fixtures::{door_views, lift_views, DoorView, LiftView};
pub use layers::{Layer, LayerVisibility};
pub use levels::{
    affine_image_bounds, sort_levels, FileImageSource, ImageDimensions, ImageFuture, ImageSource,
    LevelBounds, LevelImageLoader, StaticImageSource,
};
pub use live::{LiveKeys, LiveSnapshot, LiveState, StateHubs};
pub use places::{Place, PlaceIndex};
pub use robots::{RobotRecord, RobotStateProjector, RobotView, UpdateClock};
pub use scene::{IgnoreEvents, Scene, SceneEvents, SceneLayer, SceneTarget};
pub use workcells::{WorkcellKind, WorkcellRecord, WorkcellStateProjector};
