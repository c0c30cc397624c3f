//! TrackingSession - the application context of a simulated map.
//!
//! Owns the virtual clock, the map scene and every running feed, and is
//! passed explicitly to whatever needs them. Nothing here is global, so
//! any number of independent sessions can run side by side.

use crate::context::SimContext;

use std::sync::Arc;
use std::time::Duration;
use trackfeed_core::{ConfigError, EmitterConfig, MapScene, ObserverError, Retention, TrackEmitter};
use trackfeed_env::{FeedContext, FeedId};
use tracing::debug;

/// Emitter type driven by a session.
pub type SimEmitter = TrackEmitter<SimContext>;

/// Configuration for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Virtual time advanced per step
    pub step: Duration,

    /// Track layer retention of the scene
    pub retention: Retention,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            step: Duration::from_millis(100),
            retention: Retention::Unbounded,
        }
    }
}

/// A simulated map with its feeds.
pub struct TrackingSession {
    /// Configuration
    pub config: SessionConfig,

    /// Shared simulation context (virtual clock)
    pub context: Arc<SimContext>,

    /// Scene every feed renders into
    pub scene: Arc<MapScene>,

    feeds: Vec<Arc<SimEmitter>>,

    /// Steps taken so far
    step_count: u64,
}

impl TrackingSession {
    /// Creates an empty session.
    pub fn new(config: SessionConfig) -> Self {
        let context = SimContext::shared(config.seed);
        let scene = Arc::new(MapScene::new().with_retention(config.retention));

        Self {
            config,
            context,
            scene,
            feeds: Vec::new(),
            step_count: 0,
        }
    }

    /// Adds a feed rendering into the session scene.
    ///
    /// Feeds get random streams 1, 2, ... in the order they are added, so
    /// the same seed and feed list always produce the same paths.
    pub fn add_feed(&mut self, config: EmitterConfig) -> Result<FeedId, ConfigError> {
        let stream = self.feeds.len() as u64 + 1;
        let emitter = Arc::new(SimEmitter::seeded(self.context.clone(), config, stream)?);
        emitter.attach_sink(self.scene.clone());

        let id = emitter.id();
        self.feeds.push(emitter);
        Ok(id)
    }

    pub fn feeds(&self) -> &[Arc<SimEmitter>] {
        &self.feeds
    }

    pub fn feed(&self, id: FeedId) -> Option<&Arc<SimEmitter>> {
        self.feeds.iter().find(|f| f.id() == id)
    }

    pub fn start_all(&self) {
        for feed in &self.feeds {
            feed.start();
        }
    }

    pub fn stop_all(&self) {
        for feed in &self.feeds {
            feed.stop();
        }
    }

    /// Advances the clock by one step and runs every tick that came due.
    ///
    /// Returns the number of ticks run across all feeds.
    pub fn step(&mut self) -> usize {
        self.context.advance_time(self.config.step);
        self.step_count += 1;

        let ticks: usize = self.feeds.iter().map(|f| f.poll()).sum();
        if ticks > 0 {
            debug!(t = self.time(), ticks, "step");
        }
        ticks
    }

    /// Steps until at least `duration` of virtual time has passed.
    pub fn run_for(&mut self, duration: Duration) -> usize {
        let target = self.context.now() + duration;
        let mut ticks = 0;
        while self.context.now() < target {
            ticks += self.step();
        }
        ticks
    }

    /// Renders every stored path into a fresh scene, as after a reload.
    pub fn rebuild_scene(&self) -> Result<MapScene, ObserverError> {
        let scene = MapScene::new().with_retention(self.config.retention);
        for feed in &self.feeds {
            feed.replay(&scene)?;
        }
        Ok(scene)
    }

    /// Returns the current simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.context.now().as_secs_f64()
    }

    /// Returns the number of steps taken.
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Observer faults across all feeds.
    pub fn observer_faults(&self) -> u64 {
        self.feeds.iter().map(|f| f.observer_faults()).sum()
    }
}
