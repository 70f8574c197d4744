//! fleetscope-trajectory: schedule trajectories for the map.
//!
//! Polls a [`TrajectoryService`] for the predicted trajectories of the
//! displayed level, tags the ones involved in conflicts, and publishes the
//! result as a [`TrajectorySet`] that is replaced wholesale on every tick.
//!
//! # Architecture
//!
//! ```text
//! TrajectoryPoller
//!   ├── poll session (one per level / window / token)
//!   │   ├── interval ticker (default 2s)
//!   │   ├── tick task → service.latest_trajectory() → tag_conflicts()
//!   │   └── CancelToken checked before every commit
//!   └── watch channels: TrajectorySet, PollState
//! ```
//!
//! Animations are sped up by `trajectory_time / (0.9 * interval)` so each
//! one finishes just before the next tick replaces it.

pub mod error;
pub mod poller;
pub mod records;
pub mod service;

pub use error::{TrajectoryError, TrajectoryResult};
pub use poller::{PollParams, PollState, TrajectoryPoller};
pub use records::{
    animation_scale, negotiation_trajectories, tag_conflicts, NegotiationStore, TrajectoryRecord,
    TrajectorySet,
};
pub use service::{ReplayTrajectoryService, TrajectoryFuture, TrajectoryService};
