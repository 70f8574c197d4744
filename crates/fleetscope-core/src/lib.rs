//! fleetscope-core: shared types and plumbing for the fleetscope pipeline.
//!
//! Holds the fleet-management wire types (building map, fleet, door, lift,
//! workcell and schedule payloads), the `fleetscope.toml` config, persisted
//! visualizer settings, the keyed [`StateHub`] that stands in for the
//! real-time client, and the [`CancelToken`] every committing async
//! operation checks.

pub mod cancel;
pub mod config;
pub mod error;
pub mod hub;
pub mod types;

pub use cancel::CancelToken;
pub use config::{DisplayMode, ScopeConfig, VisualizerSettings};
pub use error::{CoreError, CoreResult};
pub use hub::{StateHub, Subscription};
pub use types::*;
