//! Per-entity resource cache.
//!
//! Memoizes robot colours, robot icons and workcell icons for the lifetime
//! of the cache. The entity population is small and bounded, so nothing is
//! ever evicted.
//!
//! # Concurrency model
//!
//! Lookups for different keys may be in flight at once. The maps are behind
//! `std::sync::RwLock`s that are never held across an `.await`: a miss drops
//! the lock, resolves through the registry, then inserts with
//! first-writer-wins. Two concurrent misses for the same key may both hit
//! the registry; the second result is discarded and both callers see the
//! first stored value.
//!
//! Failed icon lookups are not cached, so they are retried the next time
//! the entity is seen. A lookup that succeeds with "no icon" is cached.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::color::{Color, ColorManager};
use crate::error::ResourceResult;
use crate::registry::{ResourceRegistry, WorkcellLocation};

/// Composite identity of a robot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RobotKey {
    pub fleet: String,
    pub robot: String,
}

impl RobotKey {
    pub fn new(fleet: impl Into<String>, robot: impl Into<String>) -> Self {
        Self {
            fleet: fleet.into(),
            robot: robot.into(),
        }
    }
}

impl std::fmt::Display for RobotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.fleet, self.robot)
    }
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Colour computations performed.
    pub color_computations: u64,
    /// Registry icon lookups issued.
    pub icon_lookups: u64,
    /// Registry icon lookups that returned an error.
    pub icon_failures: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    color_computations: AtomicU64,
    icon_lookups: AtomicU64,
    icon_failures: AtomicU64,
}

/// Memoizing front of a [`ResourceRegistry`] and [`ColorManager`].
pub struct ResourceCache {
    registry: Arc<dyn ResourceRegistry>,
    colors: ColorManager,
    robot_colors: RwLock<HashMap<RobotKey, Color>>,
    /// (fleet, model) → icon.
    robot_icons: RwLock<HashMap<(String, String), Option<String>>>,
    /// guid → icon.
    workcell_icons: RwLock<HashMap<String, Option<String>>>,
    counters: Counters,
}

impl ResourceCache {
    pub fn new(registry: Arc<dyn ResourceRegistry>) -> Self {
        Self {
            registry,
            colors: ColorManager::new(),
            robot_colors: RwLock::new(HashMap::new()),
            robot_icons: RwLock::new(HashMap::new()),
            workcell_icons: RwLock::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    /// The registry this cache resolves through.
    pub fn registry(&self) -> &dyn ResourceRegistry {
        self.registry.as_ref()
    }

    /// Static location of a workcell. Not cached; registries answer this
    /// synchronously from static data.
    pub fn workcell_location(&self, guid: &str) -> Option<WorkcellLocation> {
        self.registry.workcell_location(guid)
    }

    /// Primary colour of a robot, computed at most once per key.
    pub fn resolve_color(&self, fleet: &str, robot: &str, model: &str) -> Color {
        let key = RobotKey::new(fleet, robot);
        if let Some(color) = self.cached(&self.robot_colors, &key) {
            return color;
        }
        self.counters.color_computations.fetch_add(1, Ordering::Relaxed);
        let color = self.colors.robot_primary_color(fleet, robot, model);
        debug!(%key, %color, "robot colour resolved");
        self.store(&self.robot_colors, key, color)
    }

    /// Icon of a robot model in a fleet; `None` falls back to default rendering.
    pub async fn resolve_icon(&self, fleet: &str, model: &str) -> Option<String> {
        self.try_resolve_icon(fleet, model).await.unwrap_or_default()
    }

    /// Like [`resolve_icon`](Self::resolve_icon), but reports a failed
    /// lookup instead of folding it into "no icon". Failures are not cached.
    pub async fn try_resolve_icon(&self, fleet: &str, model: &str) -> ResourceResult<Option<String>> {
        let key = (fleet.to_string(), model.to_string());
        if let Some(icon) = self.cached(&self.robot_icons, &key) {
            return Ok(icon);
        }
        self.counters.icon_lookups.fetch_add(1, Ordering::Relaxed);
        match self.registry.robot_icon(fleet, model).await {
            Ok(icon) => {
                debug!(%fleet, %model, icon = ?icon, "robot icon resolved");
                Ok(self.store(&self.robot_icons, key, icon))
            }
            Err(e) => {
                self.counters.icon_failures.fetch_add(1, Ordering::Relaxed);
                warn!(%fleet, %model, error = %e, "robot icon lookup failed, using default");
                Err(e)
            }
        }
    }

    /// Icon of a dispenser or ingestor.
    pub async fn resolve_workcell_icon(&self, guid: &str) -> Option<String> {
        let key = guid.to_string();
        if let Some(icon) = self.cached(&self.workcell_icons, &key) {
            return icon;
        }
        self.counters.icon_lookups.fetch_add(1, Ordering::Relaxed);
        match self.registry.workcell_icon(guid).await {
            Ok(icon) => {
                debug!(%guid, icon = ?icon, "workcell icon resolved");
                self.store(&self.workcell_icons, key, icon)
            }
            Err(e) => {
                self.counters.icon_failures.fetch_add(1, Ordering::Relaxed);
                warn!(%guid, error = %e, "workcell icon lookup failed, using default");
                None
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            color_computations: self.counters.color_computations.load(Ordering::Relaxed),
            icon_lookups: self.counters.icon_lookups.load(Ordering::Relaxed),
            icon_failures: self.counters.icon_failures.load(Ordering::Relaxed),
        }
    }

    fn cached<K, V>(&self, map: &RwLock<HashMap<K, V>>, key: &K) -> Option<V>
    where
        K: Eq + Hash,
        V: Clone,
    {
        let found = map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();
        let counter = if found.is_some() {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Insert unless another resolution got there first; return the stored value.
    fn store<K, V>(&self, map: &RwLock<HashMap<K, V>>, key: K, value: V) -> V
    where
        K: Eq + Hash,
        V: Clone,
    {
        map.write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert(value)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResourceError;
    use crate::registry::IconFuture;
    use std::sync::atomic::AtomicBool;

    /// Registry that counts calls and can be told to fail.
    #[derive(Default)]
    struct CountingRegistry {
        robot_calls: AtomicU64,
        workcell_calls: AtomicU64,
        fail: AtomicBool,
    }

    impl ResourceRegistry for CountingRegistry {
        fn robot_icon<'a>(&'a self, fleet: &'a str, model: &'a str) -> IconFuture<'a> {
            Box::pin(async move {
                self.robot_calls.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                if self.fail.load(Ordering::SeqCst) {
                    return Err(ResourceError::Lookup {
                        key: fleet.to_string(),
                        reason: "unreachable".to_string(),
                    });
                }
                if model == "iconless" {
                    Ok(None)
                } else {
                    Ok(Some(format!("/icons/{fleet}/{model}.png")))
                }
            })
        }

        fn workcell_icon<'a>(&'a self, guid: &'a str) -> IconFuture<'a> {
            Box::pin(async move {
                self.workcell_calls.fetch_add(1, Ordering::SeqCst);
                Ok(Some(format!("/icons/{guid}.png")))
            })
        }

        fn workcell_location(&self, _guid: &str) -> Option<WorkcellLocation> {
            None
        }
    }

    fn cache_with(registry: Arc<CountingRegistry>) -> ResourceCache {
        ResourceCache::new(registry)
    }

    #[test]
    fn color_computed_once_per_key() {
        let cache = cache_with(Arc::default());
        let first = cache.resolve_color("fleet", "r1", "m");
        for _ in 0..10 {
            assert_eq!(cache.resolve_color("fleet", "r1", "m"), first);
        }
        cache.resolve_color("fleet", "r2", "m");

        let stats = cache.stats();
        assert_eq!(stats.color_computations, 2);
        assert_eq!(stats.hits, 10);
    }

    #[tokio::test]
    async fn icon_looked_up_once_per_key() {
        let registry = Arc::new(CountingRegistry::default());
        let cache = cache_with(registry.clone());

        for _ in 0..5 {
            assert_eq!(
                cache.resolve_icon("tiny", "m1").await.as_deref(),
                Some("/icons/tiny/m1.png")
            );
        }
        assert_eq!(registry.robot_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn absent_icon_is_cached() {
        let registry = Arc::new(CountingRegistry::default());
        let cache = cache_with(registry.clone());

        assert!(cache.resolve_icon("tiny", "iconless").await.is_none());
        assert!(cache.resolve_icon("tiny", "iconless").await.is_none());
        assert_eq!(registry.robot_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_lookup_falls_back_and_retries() {
        let registry = Arc::new(CountingRegistry::default());
        registry.fail.store(true, Ordering::SeqCst);
        let cache = cache_with(registry.clone());

        assert!(cache.resolve_icon("tiny", "m1").await.is_none());
        assert_eq!(cache.stats().icon_failures, 1);

        registry.fail.store(false, Ordering::SeqCst);
        assert!(cache.resolve_icon("tiny", "m1").await.is_some());
        assert_eq!(registry.robot_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn try_resolve_separates_failure_from_no_icon() {
        let registry = Arc::new(CountingRegistry::default());
        let cache = cache_with(registry.clone());

        assert_eq!(cache.try_resolve_icon("tiny", "iconless").await.unwrap(), None);
        registry.fail.store(true, Ordering::SeqCst);
        assert!(cache.try_resolve_icon("tiny", "m1").await.is_err());
        // Cached "no icon" is still served while the registry is down.
        assert_eq!(cache.try_resolve_icon("tiny", "iconless").await.unwrap(), None);
    }

    #[tokio::test]
    async fn concurrent_misses_agree_on_one_value() {
        let registry = Arc::new(CountingRegistry::default());
        let cache = cache_with(registry.clone());

        let results = futures_util::future::join_all(
            (0..4).map(|_| cache.resolve_icon("tiny", "m1")),
        )
        .await;
        assert!(results.iter().all(|r| r.as_deref() == Some("/icons/tiny/m1.png")));

        // Later calls are served from the cache.
        let calls = registry.robot_calls.load(Ordering::SeqCst);
        cache.resolve_icon("tiny", "m1").await;
        assert_eq!(registry.robot_calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn workcell_icons_are_cached_separately() {
        let registry = Arc::new(CountingRegistry::default());
        let cache = cache_with(registry.clone());

        cache.resolve_workcell_icon("coke").await;
        cache.resolve_workcell_icon("coke").await;
        cache.resolve_workcell_icon("sprite").await;
        assert_eq!(registry.workcell_calls.load(Ordering::SeqCst), 2);
        assert_eq!(registry.robot_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn robot_key_display() {
        assert_eq!(RobotKey::new("tiny", "r1").to_string(), "tiny/r1");
    }
}
