//! trackfeed Core - Simulated Live-Tracking Feed
//!
//! A synthetic producer of time-ordered geographic positions that drives
//! incremental map updates:
//! 1. **PositionSource**: derives the next coordinate (random walk or fixed increment)
//! 2. **TrajectoryStore**: append-only history of visited coordinates
//! 3. **TrackEmitter**: ticks on a fixed cadence and notifies observers of new segments
//!
//! Drawing is left to a [`MapSink`]. [`MapScene`] is an in-memory sink that
//! also keeps the surrounding map state (base layer, view, marker, regions).

pub mod config;
pub mod coordinate;
pub mod emitter;
pub mod error;
pub mod events;
pub mod position_source;
pub mod scene;
pub mod sink;
pub mod trajectory;

// Re-export key types for convenience
pub use config::EmitterConfig;
pub use coordinate::{Coordinate, Segment};
pub use emitter::{SegmentAdded, TrackEmitter};
pub use error::{ConfigError, ObserverError, TrajectoryError};
pub use events::{Delivery, EventBus, MapEvent, SubscriptionId};
pub use position_source::{PositionSource, Strategy, StrategyKind};
pub use scene::{BaseLayer, MapScene, Region, Retention, Style, TrackFeature, TrackLayer, ViewState};
pub use sink::{LogSink, MapSink};
pub use trajectory::{SharedTrajectory, TrajectoryPoint, TrajectoryStore};
