//! Aggregated live state.
//!
//! [`LiveState`] subscribes to one key per entity across the real-time
//! hubs and keeps the latest value of each. Composition reads an immutable
//! [`LiveSnapshot`] copy so a compose pass never observes a half-applied
//! update. Doors, lifts and workcells are fixed by the building map and
//! rosters; fleets that start reporting later are added with
//! [`LiveState::track_fleet`].

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use fleetscope_core::{
    BuildingMap, Dispenser, DoorState, FleetState, Ingestor, LiftState, StateHub, Subscription,
    WorkcellState,
};

/// Latest known state of every subscribed entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveSnapshot {
    /// Fleet states keyed by fleet name.
    pub fleets: HashMap<String, FleetState>,
    /// Door states keyed by door name.
    pub doors: HashMap<String, DoorState>,
    /// Lift states keyed by lift name.
    pub lifts: HashMap<String, LiftState>,
    pub dispenser_states: HashMap<String, WorkcellState>,
    pub ingestor_states: HashMap<String, WorkcellState>,
    /// Dispenser roster.
    pub dispensers: Vec<Dispenser>,
    /// Ingestor roster.
    pub ingestors: Vec<Ingestor>,
}

/// The real-time hubs a dashboard session reads from.
#[derive(Clone, Default)]
pub struct StateHubs {
    pub fleets: StateHub<FleetState>,
    pub doors: StateHub<DoorState>,
    pub lifts: StateHub<LiftState>,
    pub dispensers: StateHub<WorkcellState>,
    pub ingestors: StateHub<WorkcellState>,
}

/// Which keys to subscribe to.
#[derive(Debug, Clone, Default)]
pub struct LiveKeys {
    pub fleets: Vec<String>,
    pub doors: Vec<String>,
    pub lifts: Vec<String>,
    pub dispensers: Vec<Dispenser>,
    pub ingestors: Vec<Ingestor>,
}

impl LiveKeys {
    /// Keys for every door and lift of `map`, plus the given fleets and rosters.
    pub fn from_building(
        map: &BuildingMap,
        fleets: Vec<String>,
        dispensers: Vec<Dispenser>,
        ingestors: Vec<Ingestor>,
    ) -> Self {
        let doors = map
            .levels
            .iter()
            .flat_map(|l| l.doors.iter())
            .chain(map.lifts.iter().flat_map(|l| l.doors.iter()))
            .map(|d| d.name.clone())
            .collect();
        let lifts = map.lifts.iter().map(|l| l.name.clone()).collect();
        Self {
            fleets,
            doors,
            lifts,
            dispensers,
            ingestors,
        }
    }
}

/// Live state fed by hub subscriptions. Unsubscribes on drop.
pub struct LiveState {
    state: Arc<Mutex<LiveSnapshot>>,
    subscriptions: Vec<Subscription>,
    fleets: HashSet<String>,
}

fn lock(state: &Mutex<LiveSnapshot>) -> MutexGuard<'_, LiveSnapshot> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Subscribe `key` on `hub`, writing each value into the map picked by `slot`.
fn track<T, F>(
    hub: &StateHub<T>,
    key: &str,
    state: &Arc<Mutex<LiveSnapshot>>,
    slot: F,
) -> Subscription
where
    T: Clone + Send + 'static,
    F: Fn(&mut LiveSnapshot) -> &mut HashMap<String, T> + Send + Sync + 'static,
{
    let state = Arc::clone(state);
    let owned = key.to_string();
    hub.subscribe(key, move |value: &T| {
        let mut guard = lock(&state);
        slot(&mut *guard).insert(owned.clone(), value.clone());
    })
}

impl LiveState {
    pub fn attach(hubs: &StateHubs, keys: LiveKeys) -> Self {
        let state = Arc::new(Mutex::new(LiveSnapshot {
            dispensers: keys.dispensers.clone(),
            ingestors: keys.ingestors.clone(),
            ..Default::default()
        }));

        let mut subscriptions = Vec::new();
        for door in &keys.doors {
            subscriptions.push(track(&hubs.doors, door, &state, |s| &mut s.doors));
        }
        for lift in &keys.lifts {
            subscriptions.push(track(&hubs.lifts, lift, &state, |s| &mut s.lifts));
        }
        for d in &keys.dispensers {
            subscriptions.push(track(&hubs.dispensers, &d.guid, &state, |s| {
                &mut s.dispenser_states
            }));
        }
        for i in &keys.ingestors {
            subscriptions.push(track(&hubs.ingestors, &i.guid, &state, |s| {
                &mut s.ingestor_states
            }));
        }

        let mut live = Self {
            state,
            subscriptions,
            fleets: HashSet::new(),
        };
        for fleet in &keys.fleets {
            live.track_fleet(&hubs.fleets, fleet);
        }
        debug!(subscriptions = live.subscriptions.len(), "live state attached");
        live
    }

    /// Start following `fleet` on `hub`. Its latest state, if any, lands in
    /// the snapshot immediately.
    ///
    /// Returns `false` if the fleet was already tracked.
    pub fn track_fleet(&mut self, hub: &StateHub<FleetState>, fleet: &str) -> bool {
        if !self.fleets.insert(fleet.to_string()) {
            return false;
        }
        self.subscriptions
            .push(track(hub, fleet, &self.state, |s| &mut s.fleets));
        debug!(%fleet, "fleet tracked");
        true
    }

    /// Names of the fleets being followed.
    pub fn tracked_fleets(&self) -> impl Iterator<Item = &str> {
        self.fleets.iter().map(String::as_str)
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        lock(&self.state).clone()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}
