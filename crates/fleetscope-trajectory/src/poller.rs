//! Trajectory poller: background task that keeps the visible trajectory
//! set of the current level fresh.
//!
//! Each poll session runs one loop task that fires a tick every
//! `interval`. Every tick is its own task, so a slow response never delays
//! the next request, and every request is bounded by `interval` so a hung
//! service costs at most one outstanding request per tick. Ticks capture
//! the session's [`CancelToken`] and a sequence number; a response is
//! committed only if the session is still live and no newer tick of the
//! same session has committed already. A tick that is already outdated
//! never touches [`PollState`] either.
//!
//! ```text
//! start(params) ──▶ loop task ──tick──▶ tick task ──▶ service.latest_trajectory()
//!                      │                    │
//!      stop()/restart  │                    └─▶ commit iff !cancelled && seq is newest
//!      cancel + abort ─┘
//! ```
//!
//! In [`DisplayMode::Negotiation`] no session is started at all.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use fleetscope_core::config::DEFAULT_UPDATE_INTERVAL;
use fleetscope_core::{CancelToken, DisplayMode, TrajectoryRequest};

use crate::error::TrajectoryError;
use crate::records::{animation_scale, tag_conflicts, TrajectorySet};
use crate::service::TrajectoryService;

/// Inputs of one poll session. Changing any of them restarts polling.
#[derive(Debug, Clone, PartialEq)]
pub struct PollParams {
    pub level: String,
    /// Lookback window requested from the schedule.
    pub trajectory_time: Duration,
    /// Tick period.
    pub interval: Duration,
    /// Session token forwarded with each request.
    pub token: Option<String>,
    pub mode: DisplayMode,
}

impl PollParams {
    pub fn animation_scale(&self) -> f64 {
        animation_scale(self.trajectory_time, self.effective_interval())
    }

    /// Tick period actually used; zero falls back to the default.
    pub fn effective_interval(&self) -> Duration {
        if self.interval.is_zero() {
            DEFAULT_UPDATE_INTERVAL
        } else {
            self.interval
        }
    }

    fn normalized(mut self) -> Self {
        self.interval = self.effective_interval();
        self
    }

    pub fn request(&self) -> TrajectoryRequest {
        TrajectoryRequest {
            map_name: self.level.clone(),
            duration: self.trajectory_time.as_millis() as u64,
            trim: true,
            token: self.token.clone(),
        }
    }
}

/// Outcome of the most recent tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// No session, or no tick has finished yet.
    Idle,
    /// A request is in flight.
    Polling,
    /// The last tick committed a new set.
    Succeeded,
    /// The last tick failed; the previous set is still shown.
    Failed,
}

struct PollSession {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
    cancel: CancelToken,
    params: PollParams,
}

/// Owns the poll session for the currently displayed level.
pub struct TrajectoryPoller {
    service: Arc<dyn TrajectoryService>,
    records: Arc<watch::Sender<TrajectorySet>>,
    state: Arc<watch::Sender<PollState>>,
    session: Option<PollSession>,
}

impl TrajectoryPoller {
    pub fn new(service: Arc<dyn TrajectoryService>) -> Self {
        let (records, _) = watch::channel(TrajectorySet::default());
        let (state, _) = watch::channel(PollState::Idle);
        Self {
            service,
            records: Arc::new(records),
            state: Arc::new(state),
            session: None,
        }
    }

    /// Start (or restart) polling with `params`.
    ///
    /// Any running session is cancelled first; its in-flight responses are
    /// discarded. Switching level clears the visible set immediately so the
    /// previous level's trajectories are never shown on the new one.
    /// A zero interval is replaced by the default interval.
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, params: PollParams) {
        if params.interval.is_zero() {
            warn!(
                level = %params.level,
                default_ms = DEFAULT_UPDATE_INTERVAL.as_millis() as u64,
                "zero poll interval, using default"
            );
        }
        let params = params.normalized();
        self.stop();

        self.records.send_modify(|set| {
            if set.level != params.level {
                *set = TrajectorySet::empty(&params.level);
            } else {
                set.seq = 0;
            }
        });

        if params.mode != DisplayMode::Normal {
            debug!(level = %params.level, mode = ?params.mode, "trajectory polling suspended");
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let cancel = CancelToken::new();

        let handle = tokio::spawn(run_poll_loop(
            self.service.clone(),
            params.clone(),
            cancel.clone(),
            self.records.clone(),
            self.state.clone(),
            shutdown_rx,
        ));

        info!(
            level = %params.level,
            interval_ms = params.interval.as_millis() as u64,
            trajectory_time_ms = params.trajectory_time.as_millis() as u64,
            "trajectory poller started"
        );

        self.session = Some(PollSession {
            handle,
            shutdown_tx,
            cancel,
            params,
        });
    }

    /// Restart only if `params` differ from the running session's.
    pub fn ensure(&mut self, params: PollParams) {
        if self.session.as_ref().map(|s| &s.params) != Some(&params.clone().normalized()) {
            self.start(params);
        }
    }

    /// Stop polling. In-flight responses are discarded.
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel.cancel();
            let _ = session.shutdown_tx.send(true);
            session.handle.abort();
            self.state.send_replace(PollState::Idle);
            debug!(level = %session.params.level, "trajectory poller stopped");
        }
    }

    pub fn is_polling(&self) -> bool {
        self.session.is_some()
    }

    /// Parameters of the running session.
    pub fn params(&self) -> Option<&PollParams> {
        self.session.as_ref().map(|s| &s.params)
    }

    /// Latest committed set.
    pub fn current(&self) -> TrajectorySet {
        self.records.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrajectorySet> {
        self.records.subscribe()
    }

    pub fn state(&self) -> PollState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PollState> {
        self.state.subscribe()
    }
}

impl Drop for TrajectoryPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The tick loop of a single poll session.
async fn run_poll_loop(
    service: Arc<dyn TrajectoryService>,
    params: PollParams,
    cancel: CancelToken,
    records: Arc<watch::Sender<TrajectorySet>>,
    state: Arc<watch::Sender<PollState>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(params.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Dropping the set aborts ticks still in flight.
    let mut ticks = JoinSet::new();
    let mut seq = 0u64;

    debug!(level = %params.level, "trajectory poll loop starting");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                seq += 1;
                let service = service.clone();
                let params = params.clone();
                let cancel = cancel.clone();
                let records = records.clone();
                let state = state.clone();
                ticks.spawn(async move {
                    poll_tick(service.as_ref(), &params, seq, &cancel, &records, &state).await;
                });
            }
            Some(_) = ticks.join_next(), if !ticks.is_empty() => {}
            _ = shutdown.changed() => {
                debug!(level = %params.level, "trajectory poll loop shutting down");
                break;
            }
        }
    }
}

/// Fetch once and commit the result if it is still wanted.
///
/// The request is abandoned after one interval and counts as a failure.
/// Returns `true` if the visible set was replaced.
pub(crate) async fn poll_tick(
    service: &dyn TrajectoryService,
    params: &PollParams,
    seq: u64,
    cancel: &CancelToken,
    records: &watch::Sender<TrajectorySet>,
    state: &watch::Sender<PollState>,
) -> bool {
    if cancel.is_cancelled() || is_outdated(records, seq) {
        return false;
    }
    state.send_replace(PollState::Polling);
    debug!(level = %params.level, seq, "updating trajectories");

    let request = params.request();
    let result = match tokio::time::timeout(params.interval, service.latest_trajectory(&request)).await {
        Ok(result) => result,
        Err(_) => Err(TrajectoryError::Timeout(params.interval)),
    };
    match result {
        Ok(response) => {
            let next = tag_conflicts(response, params.animation_scale());
            let count = next.len();
            // Checked under the channel's write lock, so a restart that
            // cancels first can never be overwritten by this tick.
            let committed = records.send_if_modified(|current| {
                if cancel.is_cancelled() || seq <= current.seq {
                    return false;
                }
                *current = TrajectorySet {
                    level: params.level.clone(),
                    seq,
                    records: next,
                };
                true
            });
            if committed {
                state.send_replace(PollState::Succeeded);
                debug!(level = %params.level, seq, trajectories = count, "set trajectories");
            } else {
                debug!(level = %params.level, seq, "discarded stale trajectory response");
            }
            committed
        }
        Err(e) => {
            if cancel.is_cancelled() || is_outdated(records, seq) {
                debug!(level = %params.level, seq, error = %e, "ignoring failure of outdated tick");
            } else {
                state.send_replace(PollState::Failed);
                warn!(level = %params.level, seq, error = %e, "trajectory poll failed, keeping previous set");
            }
            false
        }
    }
}

/// A newer tick of the session has already committed.
fn is_outdated(records: &watch::Sender<TrajectorySet>, seq: u64) -> bool {
    seq <= records.borrow().seq
}
