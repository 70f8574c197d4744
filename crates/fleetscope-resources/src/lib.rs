//! fleetscope-resources: derived visual resources for map entities.
//!
//! Robots and workcells are drawn with an icon (when the registry has one)
//! and robots with a deterministic primary colour. Both are resolved once
//! per entity and memoized in a [`ResourceCache`] owned by the composer.
//!
//! # Architecture
//!
//! ```text
//! ResourceCache
//!   ├── ColorManager        (pure, hash-derived colours)
//!   ├── dyn ResourceRegistry
//!   │     └── ResourceManifest (resources.json + optional asset root)
//!   └── RwLock<HashMap<..>> per resource kind, first writer wins
//! ```

pub mod cache;
pub mod color;
pub mod error;
pub mod registry;

pub use cache::{CacheStats, ResourceCache, RobotKey};
pub use color::{Color, ColorManager};
pub use error::{ResourceError, ResourceResult};
pub use registry::{IconFuture, ResourceManifest, ResourceRegistry, WorkcellLocation};
