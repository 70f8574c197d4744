//! Robot state projection.
//!
//! Joins per-fleet robot snapshots with cached resources into render-ready
//! [`RobotView`]s for one level. Each `(fleet, robot)` gets a stored
//! [`RobotRecord`] on first sighting, with colour and icon resolved exactly
//! then. If the icon lookup fails the robot is still stored and drawn with
//! the default icon, and only the icon is looked up again on later ticks
//! until a lookup succeeds. Pose and status are always taken from the tick
//! being projected, never from the stored record.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use futures_util::future::join_all;
use serde::Serialize;
use tracing::debug;

use fleetscope_core::{FleetState, RobotState};
use fleetscope_resources::{Color, ResourceCache, RobotKey};

/// Identity and derived resources of a robot. Never changes once stored,
/// except for an icon whose lookup failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotRecord {
    pub fleet: String,
    pub name: String,
    pub model: String,
    /// Footprint radius in metres.
    pub footprint: f64,
    pub color: Color,
    pub icon_path: Option<String>,
}

/// A robot as drawn on the current tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotView {
    #[serde(flatten)]
    pub record: RobotRecord,
    pub level: String,
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
    pub battery_percent: f64,
    pub mode: String,
    pub task_id: String,
    /// Seconds since the robot's report stamp last changed; `None` if the
    /// robot does not stamp its reports.
    pub seconds_since_update: Option<f64>,
}

/// Tracks when one robot's report stamp last changed.
#[derive(Debug, Clone)]
pub struct UpdateClock {
    last_stamp: Option<i64>,
    changed_at: Instant,
}

impl UpdateClock {
    pub fn new(now: Instant) -> Self {
        Self {
            last_stamp: None,
            changed_at: now,
        }
    }

    /// Record `stamp` seen at `now` and return seconds since it last changed.
    pub fn observe(&mut self, stamp: Option<i64>, now: Instant) -> Option<f64> {
        let stamp = stamp?;
        if self.last_stamp != Some(stamp) {
            self.last_stamp = Some(stamp);
            self.changed_at = now;
        }
        Some(now.saturating_duration_since(self.changed_at).as_secs_f64())
    }
}

struct StoredRobot {
    record: RobotRecord,
    clock: UpdateClock,
    /// Icon lookup failed; retried on the next projection.
    icon_pending: bool,
}

/// Projects fleet states onto a level, memoizing per-robot resources.
pub struct RobotStateProjector {
    cache: Arc<ResourceCache>,
    footprint: f64,
    store: Mutex<HashMap<RobotKey, StoredRobot>>,
}

impl RobotStateProjector {
    pub fn new(cache: Arc<ResourceCache>, footprint: f64) -> Self {
        Self {
            cache,
            footprint,
            store: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RobotKey, StoredRobot>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Project `fleets` onto `level`.
    ///
    /// Resources of robots not seen before are resolved concurrently and
    /// stored before any view is built, as are icons whose earlier lookup
    /// failed. Output is ordered by fleet, then robot name.
    pub async fn project(&self, fleets: &HashMap<String, FleetState>, level: &str) -> Vec<RobotView> {
        let (unseen, pending) = {
            let store = self.lock();
            let mut unseen: BTreeMap<RobotKey, &str> = BTreeMap::new();
            let mut pending: BTreeMap<RobotKey, String> = BTreeMap::new();
            for fleet in fleets.values() {
                for r in &fleet.robots {
                    let key = RobotKey::new(&fleet.name, &r.name);
                    match store.get(&key) {
                        None => {
                            unseen.insert(key, r.model.as_str());
                        }
                        Some(stored) if stored.icon_pending => {
                            pending.insert(key, stored.record.model.clone());
                        }
                        Some(_) => {}
                    }
                }
            }
            (unseen, pending)
        };

        if !unseen.is_empty() {
            let resolved = join_all(unseen.into_iter().map(|(key, model)| self.resolve(key, model))).await;
            for (record, icon_pending) in resolved {
                self.insert(record, icon_pending);
            }
        }

        if !pending.is_empty() {
            let icons = join_all(pending.into_iter().map(|(key, model)| async move {
                let icon = self.cache.try_resolve_icon(&key.fleet, &model).await;
                (key, icon)
            }))
            .await;
            for (key, icon) in icons {
                if let Ok(icon) = icon {
                    self.fill_icon(&key, icon);
                }
            }
        }

        self.views(fleets, level)
    }

    /// Resolve a new robot's record; the flag is set if the icon lookup failed.
    async fn resolve(&self, key: RobotKey, model: &str) -> (RobotRecord, bool) {
        let color = self.cache.resolve_color(&key.fleet, &key.robot, model);
        let icon = self.cache.try_resolve_icon(&key.fleet, model).await;
        let icon_pending = icon.is_err();
        let record = RobotRecord {
            fleet: key.fleet,
            name: key.robot,
            model: model.to_string(),
            footprint: self.footprint,
            color,
            icon_path: icon.unwrap_or_default(),
        };
        (record, icon_pending)
    }

    /// Store `record` unless its key is already present.
    ///
    /// Returns `true` if the record was inserted.
    pub fn upsert(&self, record: RobotRecord) -> bool {
        self.insert(record, false)
    }

    fn insert(&self, record: RobotRecord, icon_pending: bool) -> bool {
        let key = RobotKey::new(&record.fleet, &record.name);
        let mut store = self.lock();
        if store.contains_key(&key) {
            return false;
        }
        debug!(%key, model = %record.model, icon = ?record.icon_path, icon_pending, "robot first seen");
        store.insert(
            key,
            StoredRobot {
                record,
                clock: UpdateClock::new(Instant::now()),
                icon_pending,
            },
        );
        true
    }

    fn fill_icon(&self, key: &RobotKey, icon: Option<String>) {
        let mut store = self.lock();
        let Some(stored) = store.get_mut(key) else {
            return;
        };
        if stored.icon_pending {
            debug!(%key, icon = ?icon, "robot icon recovered");
            stored.record.icon_path = icon;
            stored.icon_pending = false;
        }
    }

    fn views(&self, fleets: &HashMap<String, FleetState>, level: &str) -> Vec<RobotView> {
        let now = Instant::now();
        let mut store = self.lock();
        let mut views: Vec<RobotView> = fleets
            .values()
            .flat_map(|fleet| fleet.robots.iter().map(move |r| (fleet.name.as_str(), r)))
            .filter(|(_, r)| r.location.level_name == level)
            .filter_map(|(fleet, r)| {
                let stored = store.get_mut(&RobotKey::new(fleet, &r.name))?;
                let since = stored.clock.observe(r.unix_millis_time, now);
                Some(view(&stored.record, r, since))
            })
            .collect();
        views.sort_by(|a, b| {
            (&a.record.fleet, &a.record.name).cmp(&(&b.record.fleet, &b.record.name))
        });
        views
    }

    /// Stored record for `key`, if the robot has been seen.
    pub fn record(&self, key: &RobotKey) -> Option<RobotRecord> {
        self.lock().get(key).map(|s| s.record.clone())
    }

    /// Number of robots ever seen.
    pub fn known_robots(&self) -> usize {
        self.lock().len()
    }
}

fn view(record: &RobotRecord, state: &RobotState, seconds_since_update: Option<f64>) -> RobotView {
    RobotView {
        record: record.clone(),
        level: state.location.level_name.clone(),
        x: state.location.x,
        y: state.location.y,
        yaw: state.location.yaw,
        battery_percent: state.battery_percent,
        mode: state.mode.clone(),
        task_id: state.task_id.clone(),
        seconds_since_update,
    }
}
