//! Overlay composition.
//!
//! [`OverlayComposer`] owns everything a map view needs between frames: the
//! building map, the current level, layer visibility, the resource cache,
//! the projectors and the trajectory poller. Each [`compose`] call joins a
//! [`LiveSnapshot`] with that state into one [`Scene`] for the current level.
//!
//! [`compose`]: OverlayComposer::compose

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use fleetscope_core::config::{DEFAULT_FOOTPRINT, DEFAULT_TRAJECTORY_TIME, DEFAULT_UPDATE_INTERVAL};
use fleetscope_core::{BuildingMap, CancelToken, DisplayMode, ScopeConfig, VisualizerSettings};
use fleetscope_resources::{ResourceCache, ResourceRegistry};
use fleetscope_trajectory::{
    negotiation_trajectories, NegotiationStore, PollParams, TrajectoryPoller, TrajectoryRecord,
    TrajectoryService,
};

use crate::error::{SceneError, SceneResult};
use crate::fixtures::{door_views, lift_views};
use crate::layers::{Layer, LayerVisibility};
use crate::levels::{sort_levels, ImageSource, LevelImageLoader};
use crate::live::LiveSnapshot;
use crate::places::PlaceIndex;
use crate::robots::RobotStateProjector;
use crate::scene::{dispatch, IgnoreEvents, Scene, SceneEvents, SceneLayer, SceneTarget};
use crate::workcells::{WorkcellKind, WorkcellStateProjector};

/// Tunables of a composer.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposerOptions {
    pub trajectory_time: Duration,
    pub update_interval: Duration,
    pub mode: DisplayMode,
    /// Robot footprint radius in metres.
    pub footprint: f64,
    pub token: Option<String>,
}

impl Default for ComposerOptions {
    fn default() -> Self {
        Self {
            trajectory_time: DEFAULT_TRAJECTORY_TIME,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            mode: DisplayMode::Normal,
            footprint: DEFAULT_FOOTPRINT,
            token: None,
        }
    }
}

impl ComposerOptions {
    /// Options from `config`; saved `settings` override the trajectory time.
    pub fn from_config(config: &ScopeConfig, settings: Option<&VisualizerSettings>) -> Self {
        Self {
            trajectory_time: settings
                .map(VisualizerSettings::trajectory_time)
                .unwrap_or_else(|| config.trajectory_time()),
            update_interval: config.update_interval(),
            mode: config.mode(),
            footprint: config.footprint(),
            token: config.token(),
        }
    }
}

pub struct OverlayComposer {
    building: BuildingMap,
    current: String,
    options: ComposerOptions,
    visibility: LayerVisibility,
    cache: Arc<ResourceCache>,
    places: PlaceIndex,
    robots: RobotStateProjector,
    dispensers: WorkcellStateProjector,
    ingestors: WorkcellStateProjector,
    images: LevelImageLoader,
    poller: TrajectoryPoller,
    polling: bool,
    negotiation: NegotiationStore,
    events: Arc<dyn SceneEvents>,
    cancel: CancelToken,
}

impl OverlayComposer {
    /// Build a composer for `building`. Levels are sorted by name, ignoring
    /// case, and the first one becomes current.
    pub fn new(
        mut building: BuildingMap,
        registry: Arc<dyn ResourceRegistry>,
        images: Arc<dyn ImageSource>,
        trajectories: Arc<dyn TrajectoryService>,
        options: ComposerOptions,
    ) -> SceneResult<Self> {
        sort_levels(&mut building.levels);
        let current = building
            .levels
            .first()
            .map(|l| l.name.clone())
            .ok_or(SceneError::NoLevels)?;

        let cache = Arc::new(ResourceCache::new(registry));
        let places = PlaceIndex::from_building(&building);
        info!(
            building = %building.name,
            levels = building.levels.len(),
            places = places.len(),
            %current,
            "overlay composer created"
        );

        Ok(Self {
            robots: RobotStateProjector::new(cache.clone(), options.footprint),
            dispensers: WorkcellStateProjector::new(WorkcellKind::Dispenser, cache.clone()),
            ingestors: WorkcellStateProjector::new(WorkcellKind::Ingestor, cache.clone()),
            images: LevelImageLoader::new(images),
            poller: TrajectoryPoller::new(trajectories),
            polling: false,
            negotiation: NegotiationStore::new(),
            events: Arc::new(IgnoreEvents),
            cancel: CancelToken::new(),
            building,
            current,
            options,
            visibility: LayerVisibility::default(),
            cache,
            places,
        })
    }

    pub fn with_events(mut self, events: Arc<dyn SceneEvents>) -> Self {
        self.events = events;
        self
    }

    /// Load every level's image. Returns the number of levels with bounds.
    pub async fn load_images(&self) -> usize {
        self.images.load_all(&self.building.levels, &self.cancel).await
    }

    /// Begin trajectory polling for the current level.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        self.polling = true;
        self.poller.ensure(self.poll_params());
    }

    fn poll_params(&self) -> PollParams {
        PollParams {
            level: self.current.clone(),
            trajectory_time: self.options.trajectory_time,
            interval: self.options.update_interval,
            token: self.options.token.clone(),
            mode: self.options.mode,
        }
    }

    fn refresh_polling(&mut self) {
        if self.polling {
            self.poller.ensure(self.poll_params());
        }
    }

    pub fn current_level(&self) -> &str {
        &self.current
    }

    pub fn level_names(&self) -> Vec<String> {
        self.building.levels.iter().map(|l| l.name.clone()).collect()
    }

    pub fn building(&self) -> &BuildingMap {
        &self.building
    }

    /// Make `name` the current level and restart polling for it.
    pub fn select_level(&mut self, name: &str) -> SceneResult<()> {
        if !self.building.levels.iter().any(|l| l.name == name) {
            return Err(SceneError::UnknownLevel(name.to_string()));
        }
        if !self.images.is_ready(name) {
            return Err(SceneError::LevelNotReady(name.to_string()));
        }
        if self.current != name {
            info!(from = %self.current, to = %name, "level selected");
            self.current = name.to_string();
            self.refresh_polling();
        }
        Ok(())
    }

    pub fn visibility(&self) -> LayerVisibility {
        self.visibility
    }

    pub fn set_layer_visible(&mut self, layer: Layer, visible: bool) {
        self.visibility.set(layer, visible);
    }

    pub fn toggle_layer(&mut self, layer: Layer) -> bool {
        let visible = self.visibility.toggle(layer);
        debug!(%layer, visible, "layer toggled");
        visible
    }

    pub fn options(&self) -> &ComposerOptions {
        &self.options
    }

    pub fn set_trajectory_time(&mut self, trajectory_time: Duration) {
        self.options.trajectory_time = trajectory_time;
        self.refresh_polling();
    }

    pub fn set_mode(&mut self, mode: DisplayMode) {
        self.options.mode = mode;
        self.refresh_polling();
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.options.token = token;
        self.refresh_polling();
    }

    /// Replace the negotiation preview shown in [`DisplayMode::Negotiation`].
    pub fn set_negotiation_trajectories(&mut self, store: NegotiationStore) {
        self.negotiation = store;
    }

    pub fn cache(&self) -> &Arc<ResourceCache> {
        &self.cache
    }

    pub fn poller(&self) -> &TrajectoryPoller {
        &self.poller
    }

    /// Trajectories for the current level in the current mode.
    pub fn trajectories(&self) -> Vec<TrajectoryRecord> {
        match self.options.mode {
            DisplayMode::Negotiation => negotiation_trajectories(
                &self.negotiation,
                &self.current,
                self.poll_params().animation_scale(),
            ),
            DisplayMode::Normal => {
                let set = self.poller.current();
                if set.level == self.current {
                    set.records
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Compose the scene of the current level from `live`.
    ///
    /// Returns `None` while the current level has no bounds.
    pub async fn compose(&self, live: &LiveSnapshot) -> Option<Scene> {
        let level_name = self.current.as_str();
        let bounds = self.images.bounds(level_name)?;
        let level = self.building.levels.iter().find(|l| l.name == level_name)?;

        let (robots, dispensers, ingestors) = tokio::join!(
            self.robots.project(&live.fleets, level_name),
            self.dispensers.project(
                live.dispensers.iter().map(|d| d.guid.as_str()),
                &live.dispenser_states,
                level_name,
            ),
            self.ingestors.project(
                live.ingestors.iter().map(|i| i.guid.as_str()),
                &live.ingestor_states,
                level_name,
            ),
        );

        let vis = self.visibility;
        let layer = |l: Layer| vis.is_visible(l);
        let scene = Scene {
            level: level_name.to_string(),
            levels: self.level_names(),
            bounds,
            waypoints: SceneLayer::new(Layer::Waypoints, layer(Layer::Waypoints), self.places.for_level(level_name)),
            dispensers: SceneLayer::new(Layer::Dispensers, layer(Layer::Dispensers), dispensers),
            ingestors: SceneLayer::new(Layer::Ingestors, layer(Layer::Ingestors), ingestors),
            lifts: SceneLayer::new(
                Layer::Lifts,
                layer(Layer::Lifts),
                lift_views(&self.building.lifts, level_name, &live.lifts),
            ),
            doors: SceneLayer::new(Layer::Doors, layer(Layer::Doors), door_views(level, &live.doors)),
            trajectories: SceneLayer::new(Layer::Trajectories, layer(Layer::Trajectories), self.trajectories()),
            robots: SceneLayer::new(Layer::Robots, layer(Layer::Robots), robots),
        };
        debug!(level = %scene.level, robots = scene.robots.items.len(), "scene composed");
        Some(scene)
    }

    /// Route a click to the registered handlers.
    pub fn click(&self, target: &SceneTarget) {
        debug!(?target, "scene click");
        dispatch(self.events.as_ref(), target);
    }

    /// Cancel pending image loads and stop polling.
    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        self.poller.stop();
        self.polling = false;
        info!(level = %self.current, "overlay composer shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use fleetscope_core::{AffineImage, Level, Trajectory, TrajectoryRequest, TrajectoryResponse};
    use fleetscope_resources::{IconFuture, WorkcellLocation};
    use fleetscope_trajectory::{ReplayTrajectoryService, TrajectoryFuture};

    use crate::levels::StaticImageSource;

    struct NoResources;

    impl ResourceRegistry for NoResources {
        fn robot_icon<'a>(&'a self, _fleet: &'a str, _model: &'a str) -> IconFuture<'a> {
            Box::pin(async { Ok(None) })
        }
        fn workcell_icon<'a>(&'a self, _guid: &'a str) -> IconFuture<'a> {
            Box::pin(async { Ok(None) })
        }
        fn workcell_location(&self, _guid: &str) -> Option<WorkcellLocation> {
            None
        }
    }

    #[derive(Default)]
    struct Requests(Mutex<Vec<TrajectoryRequest>>);

    impl TrajectoryService for Requests {
        fn latest_trajectory<'a>(&'a self, request: &'a TrajectoryRequest) -> TrajectoryFuture<'a> {
            Box::pin(async move {
                self.0.lock().unwrap().push(request.clone());
                Ok(TrajectoryResponse::default())
            })
        }
    }

    fn level(name: &str) -> Level {
        Level {
            name: name.to_string(),
            images: vec![AffineImage {
                scale: 1.0,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn building(names: &[&str]) -> BuildingMap {
        BuildingMap {
            name: "office".to_string(),
            levels: names.iter().map(|n| level(n)).collect(),
            lifts: vec![],
        }
    }

    fn composer(names: &[&str], ready: &[&str]) -> OverlayComposer {
        let source = ready
            .iter()
            .fold(StaticImageSource::default(), |s, l| s.with(l, 10, 10));
        OverlayComposer::new(
            building(names),
            Arc::new(NoResources),
            Arc::new(source),
            Arc::new(ReplayTrajectoryService::default()),
            ComposerOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn empty_building_is_rejected() {
        let result = OverlayComposer::new(
            building(&[]),
            Arc::new(NoResources),
            Arc::new(StaticImageSource::default()),
            Arc::new(ReplayTrajectoryService::default()),
            ComposerOptions::default(),
        );
        assert!(matches!(result, Err(SceneError::NoLevels)));
    }

    #[test]
    fn first_sorted_level_is_current() {
        let composer = composer(&["L2", "B1", "L1"], &[]);
        assert_eq!(composer.current_level(), "B1");
        assert_eq!(composer.level_names(), vec!["B1", "L1", "L2"]);

        let composer = self::composer(&["level2", "Basement", "Level1"], &[]);
        assert_eq!(composer.current_level(), "Basement");
        assert_eq!(composer.level_names(), vec!["Basement", "Level1", "level2"]);
    }

    #[tokio::test]
    async fn compose_waits_for_bounds() {
        let composer = composer(&["L1"], &[]);
        composer.load_images().await;
        assert!(composer.compose(&LiveSnapshot::default()).await.is_none());

        let composer = self::composer(&["L1"], &["L1"]);
        composer.load_images().await;
        let scene = composer.compose(&LiveSnapshot::default()).await.unwrap();
        assert_eq!(scene.bounds, [[-10.0, 0.0], [0.0, 10.0]]);
    }

    #[tokio::test]
    async fn select_level_rejects_unknown_and_unready() {
        let mut composer = composer(&["L1", "L2", "L3"], &["L1", "L2"]);
        composer.load_images().await;
        assert!(matches!(composer.select_level("L9"), Err(SceneError::UnknownLevel(_))));
        assert!(matches!(composer.select_level("L3"), Err(SceneError::LevelNotReady(_))));
        assert_eq!(composer.current_level(), "L1");
        composer.select_level("L2").unwrap();
        assert_eq!(composer.current_level(), "L2");
    }

    #[tokio::test(start_paused = true)]
    async fn select_level_restarts_polling_for_new_level() {
        let service = Arc::new(Requests::default());
        let source = StaticImageSource::default().with("L1", 1, 1).with("L2", 1, 1);
        let mut composer = OverlayComposer::new(
            building(&["L1", "L2"]),
            Arc::new(NoResources),
            Arc::new(source),
            service.clone(),
            ComposerOptions {
                token: Some("secret".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        composer.load_images().await;
        composer.start();
        tokio::time::sleep(Duration::from_millis(100)).await;

        composer.select_level("L2").unwrap();
        assert_eq!(composer.poller().params().map(|p| p.level.as_str()), Some("L2"));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let requests = service.0.lock().unwrap().clone();
        let levels: Vec<&str> = requests.iter().map(|r| r.map_name.as_str()).collect();
        assert_eq!(levels, vec!["L1", "L2"]);
        assert!(requests.iter().all(|r| r.trim && r.duration == 60_000));
        assert_eq!(requests[0].token.as_deref(), Some("secret"));
        composer.shutdown();
        assert!(!composer.poller().is_polling());
    }

    #[tokio::test]
    async fn negotiation_mode_shows_preview() {
        let mut composer = composer(&["L1"], &["L1"]);
        composer.load_images().await;
        let mut store = NegotiationStore::new();
        store.insert(
            "L1".to_string(),
            TrajectoryResponse {
                values: vec![Trajectory {
                    id: "7".to_string(),
                    ..Default::default()
                }],
                conflicts: vec![],
            },
        );
        composer.set_negotiation_trajectories(store);
        assert!(composer.trajectories().is_empty());

        composer.set_mode(DisplayMode::Negotiation);
        let scene = composer.compose(&LiveSnapshot::default()).await.unwrap();
        assert_eq!(scene.trajectories.items.len(), 1);
        assert_eq!(scene.trajectories.items[0].color, "orange");
    }

    #[test]
    fn options_prefer_saved_settings() {
        let config = ScopeConfig::scaffold("resources.json");
        let settings = VisualizerSettings { trajectory_time: 5_000 };
        let options = ComposerOptions::from_config(&config, Some(&settings));
        assert_eq!(options.trajectory_time, Duration::from_millis(5_000));
        assert_eq!(options.update_interval, Duration::from_secs(2));

        let options = ComposerOptions::from_config(&config, None);
        assert_eq!(options.trajectory_time, Duration::from_secs(60));
        assert_eq!(options.footprint, 0.5);
    }
}
