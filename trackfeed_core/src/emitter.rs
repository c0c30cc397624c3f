//! The tick-driven track emitter.
//!
//! A [`TrackEmitter`] moves a simulated object forward on a fixed cadence.
//! Each tick it asks its [`PositionSource`] for the next coordinate,
//! appends it to the trajectory store and notifies every observer with a
//! [`SegmentAdded`] event.
//!
//! # Scheduling
//!
//! ```text
//!  start()           deadline         deadline         deadline
//!    |------interval------|------interval-----|------interval-----|
//!    ^ initial point      ^ tick 1            ^ tick 2            ^ tick 3
//! ```
//!
//! Ticks never overlap and are never skipped: if the clock has moved past
//! several deadlines when [`TrackEmitter::poll`] runs, the missed ticks run
//! back to back, in order. `stop()` only prevents later ticks; a tick that
//! is already running completes.
//!
//! Observers run synchronously inside the tick, after the store lock has
//! been released, so they may read the store. They must not call `tick()`
//! or `poll()` on the same emitter.

use crate::config::EmitterConfig;
use crate::coordinate::{Coordinate, Segment};
use crate::error::{ConfigError, ObserverError};
use crate::events::{EventBus, SubscriptionId};
use crate::position_source::PositionSource;
use crate::sink::MapSink;
use crate::trajectory::{SharedTrajectory, TrajectoryPoint, TrajectoryStore};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};
use std::time::Duration;
use trackfeed_env::{FeedContext, FeedId, FeedRng};
use tracing::{debug, info};

/// Notification sent to observers after every appended point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentAdded {
    /// Feed that produced the point
    pub feed: FeedId,

    /// Store index of `to`
    pub sequence: u64,

    /// Previous position; `None` for the first point of the track
    pub from: Option<Coordinate>,

    /// Newly appended position
    pub to: Coordinate,

    /// Context clock time of the append
    pub at: Duration,
}

impl SegmentAdded {
    /// The connecting segment, if there was a previous point.
    pub fn segment(&self) -> Option<Segment> {
        self.from.map(|from| Segment::new(from, self.to))
    }

    pub fn is_point_only(&self) -> bool {
        self.from.is_none()
    }
}

#[derive(Debug, Default)]
struct Schedule {
    running: bool,
    next_deadline: Duration,
    ticks: u64,
    /// Stored points have been shown to observers
    announced: bool,
}

/// Drives one simulated track.
///
/// Generic over the context so the same emitter runs on the tokio clock
/// or on a virtual clock.
pub struct TrackEmitter<Ctx: FeedContext> {
    id: FeedId,

    context: Arc<Ctx>,

    config: EmitterConfig,

    source: PositionSource,

    /// Single writer: this emitter
    store: SharedTrajectory,

    rng: Mutex<FeedRng>,

    schedule: Mutex<Schedule>,

    /// Held for the whole of a tick, including observer calls
    tick_lock: Mutex<()>,

    observers: EventBus<SegmentAdded>,
}

impl<Ctx: FeedContext> TrackEmitter<Ctx> {
    /// Creates an emitter with a random id and the context's default stream.
    ///
    /// # Errors
    /// Any invalid field of `config` (see [`EmitterConfig::validate`]).
    pub fn new(context: Arc<Ctx>, config: EmitterConfig) -> Result<Self, ConfigError> {
        Self::build(context, config, FeedId::new(), 0)
    }

    /// Creates an emitter whose id and random stream derive from `stream`.
    ///
    /// Under a seeded context two emitters built with the same stream
    /// produce the same trajectory.
    pub fn seeded(context: Arc<Ctx>, config: EmitterConfig, stream: u64) -> Result<Self, ConfigError> {
        Self::build(context, config, FeedId::from_seed(stream), stream)
    }

    fn build(
        context: Arc<Ctx>,
        config: EmitterConfig,
        id: FeedId,
        stream: u64,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let source = PositionSource::new(config.strategy)?;

        let mut store = TrajectoryStore::new();
        let now = context.now();
        for coordinate in &config.history {
            store.record(*coordinate, now);
        }

        let rng = context.rng(stream);

        Ok(Self {
            id,
            context,
            config,
            source,
            store: Arc::new(RwLock::new(store)),
            rng: Mutex::new(rng),
            schedule: Mutex::new(Schedule::default()),
            tick_lock: Mutex::new(()),
            observers: EventBus::new("track-emitter"),
        })
    }

    pub fn id(&self) -> FeedId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    /// Shared handle to the trajectory store.
    pub fn store(&self) -> SharedTrajectory {
        Arc::clone(&self.store)
    }

    fn read_store(&self) -> RwLockReadGuard<'_, TrajectoryStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn schedule(&self) -> MutexGuard<'_, Schedule> {
        self.schedule.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the full trajectory.
    pub fn snapshot(&self) -> Vec<TrajectoryPoint> {
        self.read_store().all().to_vec()
    }

    /// Most recent point.
    pub fn last(&self) -> Option<TrajectoryPoint> {
        self.read_store().last()
    }

    pub fn is_running(&self) -> bool {
        self.schedule().running
    }

    /// Scheduled ticks run so far (the initial point is not a tick).
    pub fn tick_count(&self) -> u64 {
        self.schedule().ticks
    }

    /// Observer calls that failed or panicked.
    pub fn observer_faults(&self) -> u64 {
        self.observers.fault_count()
    }

    /// Registers a segment observer.
    pub fn on_segment<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SegmentAdded) -> Result<(), ObserverError> + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    /// Routes every notification to a renderer.
    pub fn attach_sink<S>(&self, sink: Arc<S>) -> SubscriptionId
    where
        S: MapSink + ?Sized + 'static,
    {
        self.observers
            .subscribe(move |event: &SegmentAdded| sink.render_segment(event.from, event.to))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Begins the periodic cycle.
    ///
    /// The first tick is due one interval from now. An empty store gets the
    /// initial coordinate immediately, announced with `from = None`. A store
    /// seeded with history is announced instead, point by point, the first
    /// time the emitter starts.
    /// Calling `start` on a running emitter does nothing.
    pub fn start(&self) {
        let first_start = {
            let mut schedule = self.schedule();
            if schedule.running {
                debug!(feed = %self.id, "start ignored, already running");
                return;
            }
            schedule.running = true;
            schedule.next_deadline = self.context.now() + self.config.tick_interval;
            !std::mem::replace(&mut schedule.announced, true)
        };

        info!(
            feed = %self.id,
            name = %self.config.name,
            strategy = %self.source.strategy().kind(),
            interval_ms = self.config.tick_interval.as_millis() as u64,
            "feed started"
        );

        let empty = self.read_store().is_empty();
        if empty {
            self.advance();
        } else if first_start {
            self.announce_history();
        }
    }

    /// Publishes every stored point, linked to its predecessor.
    fn announce_history(&self) {
        let _tick = self.tick_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let points = self.snapshot();

        let mut previous = None;
        for point in &points {
            self.observers.publish(&SegmentAdded {
                feed: self.id,
                sequence: point.sequence,
                from: previous,
                to: point.coordinate,
                at: point.recorded_at,
            });
            previous = Some(point.coordinate);
        }
        debug!(feed = %self.id, points = points.len(), "history announced");
    }

    /// Halts future ticks. Returns false if the emitter was not running.
    pub fn stop(&self) -> bool {
        let was_running = std::mem::replace(&mut self.schedule().running, false);
        if was_running {
            info!(feed = %self.id, ticks = self.tick_count(), "feed stopped");
        }
        was_running
    }

    /// Runs one tick immediately, outside the schedule.
    pub fn tick(&self) -> SegmentAdded {
        let event = self.advance();
        self.schedule().ticks += 1;
        event
    }

    /// Runs every tick whose deadline has passed, in order.
    ///
    /// Returns the number of ticks run.
    pub fn poll(&self) -> usize {
        let now = self.context.now();
        let mut ran = 0;

        loop {
            {
                let mut schedule = self.schedule();
                if !schedule.running || schedule.next_deadline > now {
                    break;
                }
                schedule.next_deadline += self.config.tick_interval;
            }
            self.tick();
            ran += 1;
        }

        if ran > 1 {
            debug!(feed = %self.id, ticks = ran, "caught up on queued ticks");
        }
        ran
    }

    /// Time left until the next tick, or `None` when stopped.
    pub fn time_until_next_tick(&self) -> Option<Duration> {
        let schedule = self.schedule();
        schedule
            .running
            .then(|| schedule.next_deadline.saturating_sub(self.context.now()))
    }

    /// Starts the emitter and keeps ticking on the context clock until
    /// `stop()` is called.
    pub async fn run(self: Arc<Self>) {
        self.start();

        while let Some(wait) = self.time_until_next_tick() {
            self.context.sleep(wait).await;
            self.poll();
        }

        debug!(feed = %self.id, "feed loop exited");
    }

    /// Launches [`run`](Self::run) as a background task on the context.
    pub fn spawn(self: &Arc<Self>) {
        let name = format!("feed-{}", self.id);
        self.context.spawn(&name, Arc::clone(self).run());
    }

    /// Re-renders the stored path into `sink`: the first point alone, then
    /// one segment per following point.
    ///
    /// Returns the number of render calls made.
    pub fn replay(&self, sink: &dyn MapSink) -> Result<usize, ObserverError> {
        let points = self.snapshot();
        let mut previous = None;
        for point in &points {
            sink.render_segment(previous, point.coordinate)?;
            previous = Some(point.coordinate);
        }
        Ok(points.len())
    }

    /// Appends the next point and notifies observers.
    fn advance(&self) -> SegmentAdded {
        let _tick = self.tick_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.context.now();

        let event = {
            let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
            let previous = store.last();
            let next = match previous {
                Some(point) => {
                    let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
                    self.source.next(point.coordinate, &mut **rng)
                }
                None => self.config.initial_coordinate,
            };
            let point = store.record(next, now);

            SegmentAdded {
                feed: self.id,
                sequence: point.sequence,
                from: previous.map(|p| p.coordinate),
                to: next,
                at: point.recorded_at,
            }
        };

        debug!(feed = %self.id, seq = event.sequence, "position ({})", event.to);

        let delivery = self.observers.publish(&event);
        if delivery.failed > 0 {
            debug!(feed = %self.id, failed = delivery.failed, "tick completed with observer faults");
        }
        event
    }
}
