//! Keyed push subscriptions for real-time state streams.
//!
//! A [`StateHub`] stands in for the real-time client: producers
//! [`publish`](StateHub::publish) values per key (a fleet name, a door
//! name, a workcell guid) and consumers register callbacks per key. The
//! hub keeps the latest value per key and replays it to new subscribers,
//! so a late subscriber never waits for the next update to see state.
//!
//! Every published value carries a hub-wide version. Each subscriber
//! remembers the newest version it was handed and drops anything older, so
//! a replay racing a concurrent publish can never overwrite the newer
//! value. Deliveries to one subscriber are serialized; a callback must not
//! publish to the key it is subscribed to.
//!
//! ```text
//! producer ── publish("tinyRobot", FleetState) ──▶ StateHub
//!                                                    ├── latest["tinyRobot"]
//!                                                    └── callbacks["tinyRobot"] ─▶ consumer
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::debug;

/// Callback invoked with every value published for a key.
pub type StateCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Subscriber<T> {
    id: u64,
    callback: StateCallback<T>,
    /// Version of the last value handed to `callback`; held while it runs.
    delivered: Mutex<u64>,
}

impl<T> Subscriber<T> {
    /// Run the callback unless a value at least as new was already delivered.
    fn deliver(&self, version: u64, value: &T) -> bool {
        let mut delivered = self.delivered.lock().unwrap_or_else(PoisonError::into_inner);
        if version <= *delivered {
            return false;
        }
        *delivered = version;
        (self.callback)(value);
        true
    }
}

struct HubInner<T> {
    /// key → (version, value).
    latest: HashMap<String, (u64, T)>,
    subscribers: HashMap<String, Vec<Arc<Subscriber<T>>>>,
    next_id: u64,
    version: u64,
}

/// Latest-value store with keyed callback subscriptions.
pub struct StateHub<T> {
    inner: Arc<Mutex<HubInner<T>>>,
}

impl<T> Clone for StateHub<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> StateHub<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner {
                latest: HashMap::new(),
                subscribers: HashMap::new(),
                next_id: 0,
                version: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubInner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `callback` for `key`.
    ///
    /// If a value was already published for `key`, the callback is invoked
    /// with it before this returns, unless a concurrent publish already
    /// delivered something newer. Dropping the returned [`Subscription`]
    /// unsubscribes.
    pub fn subscribe<F>(&self, key: &str, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let (subscriber, replay) = {
            let mut inner = self.lock();
            let subscriber = Arc::new(Subscriber {
                id: inner.next_id,
                callback: Arc::new(callback),
                delivered: Mutex::new(0),
            });
            inner.next_id += 1;
            inner
                .subscribers
                .entry(key.to_string())
                .or_default()
                .push(subscriber.clone());
            (subscriber, inner.latest.get(key).cloned())
        };
        let id = subscriber.id;
        debug!(%key, id, "state subscription added");

        if let Some((version, value)) = replay {
            if !subscriber.deliver(version, &value) {
                debug!(%key, id, version, "replay superseded by newer publish");
            }
        }

        let weak: Weak<Mutex<HubInner<T>>> = Arc::downgrade(&self.inner);
        let key = key.to_string();
        Subscription {
            remove: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
                    if let Some(subs) = inner.subscribers.get_mut(&key) {
                        subs.retain(|sub| sub.id != id);
                    }
                }
            })),
        }
    }

    /// Store `value` as the latest for `key` and notify subscribers.
    ///
    /// Callbacks run on the publishing task, outside the hub's lock.
    pub fn publish(&self, key: &str, value: T) {
        let (version, subscribers) = {
            let mut inner = self.lock();
            inner.version += 1;
            let version = inner.version;
            inner.latest.insert(key.to_string(), (version, value.clone()));
            let subscribers: Vec<Arc<Subscriber<T>>> = inner.subscribers.get(key).cloned().unwrap_or_default();
            (version, subscribers)
        };
        for sub in subscribers {
            sub.deliver(version, &value);
        }
    }

    /// Latest value published for `key`.
    pub fn latest(&self, key: &str) -> Option<T> {
        self.lock().latest.get(key).map(|(_, value)| value.clone())
    }

    /// Copy of the latest value for every key.
    pub fn snapshot(&self) -> HashMap<String, T> {
        self.lock()
            .latest
            .iter()
            .map(|(key, (_, value))| (key.clone(), value.clone()))
            .collect()
    }

    /// Number of live subscriptions for `key`.
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.lock().subscribers.get(key).map_or(0, Vec::len)
    }
}

impl<T: Clone + Send + 'static> Default for StateHub<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by [`StateHub::subscribe`]; unsubscribes on drop.
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Explicitly unsubscribe.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remove.is_some())
            .finish()
    }
}
