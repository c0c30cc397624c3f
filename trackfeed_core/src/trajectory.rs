//! Append-only trajectory history.
//!
//! The store is the single record of where a feed has been. Points are
//! only ever appended: sequence indices run `0..len` without gaps and
//! record times never go backwards. Windowing, if wanted, is a sink
//! concern (see `scene::Retention`).

use crate::coordinate::{Coordinate, Segment};
use crate::error::TrajectoryError;
use geo::{Coord, HaversineLength, LineString};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Store shared between the emitter (single writer) and render callbacks.
pub type SharedTrajectory = Arc<RwLock<TrajectoryStore>>;

/// A visited coordinate and its place in the trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    /// Index in the store (0 = first point)
    pub sequence: u64,

    /// Position
    pub coordinate: Coordinate,

    /// Context clock time at which the point was recorded
    pub recorded_at: Duration,
}

impl TrajectoryPoint {
    pub fn new(sequence: u64, coordinate: Coordinate, recorded_at: Duration) -> Self {
        Self {
            sequence,
            coordinate,
            recorded_at,
        }
    }
}

/// Ordered history of visited positions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrajectoryStore {
    points: Vec<TrajectoryPoint>,
}

impl TrajectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a new empty store for sharing.
    pub fn shared() -> SharedTrajectory {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Appends a point to the end of the trajectory.
    ///
    /// # Errors
    /// * `OutOfSequence` - `point.sequence` is not the next index
    /// * `TimeReversed` - `point.recorded_at` precedes the last point
    pub fn append(&mut self, point: TrajectoryPoint) -> Result<(), TrajectoryError> {
        let expected = self.points.len() as u64;
        if point.sequence != expected {
            return Err(TrajectoryError::OutOfSequence {
                expected,
                got: point.sequence,
            });
        }

        if let Some(last) = self.points.last() {
            if point.recorded_at < last.recorded_at {
                return Err(TrajectoryError::TimeReversed {
                    last_ms: last.recorded_at.as_millis(),
                    got_ms: point.recorded_at.as_millis(),
                });
            }
        }

        self.points.push(point);
        Ok(())
    }

    /// Records `coordinate` as the next point.
    ///
    /// A timestamp earlier than the last point is raised to the last
    /// point's time, so recording never fails.
    pub fn record(&mut self, coordinate: Coordinate, at: Duration) -> TrajectoryPoint {
        let recorded_at = match self.points.last() {
            Some(last) => at.max(last.recorded_at),
            None => at,
        };
        let point = TrajectoryPoint::new(self.points.len() as u64, coordinate, recorded_at);
        self.points.push(point);
        point
    }

    /// Most recent point, if any.
    pub fn last(&self) -> Option<TrajectoryPoint> {
        self.points.last().copied()
    }

    /// Up to `n` most recent points, oldest first.
    pub fn last_n(&self, n: usize) -> &[TrajectoryPoint] {
        let start = self.points.len().saturating_sub(n);
        &self.points[start..]
    }

    /// Full history in insertion order.
    pub fn all(&self) -> &[TrajectoryPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn coordinates(&self) -> impl Iterator<Item = Coordinate> + '_ {
        self.points.iter().map(|p| p.coordinate)
    }

    /// Consecutive point pairs as segments.
    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        self.points
            .windows(2)
            .map(|pair| Segment::new(pair[0].coordinate, pair[1].coordinate))
    }

    /// The whole path as one geometry.
    pub fn to_line_string(&self) -> LineString<f64> {
        self.coordinates().map(Coord::from).collect::<Vec<_>>().into()
    }

    /// Great-circle length of the path in meters.
    pub fn path_length_m(&self) -> f64 {
        self.to_line_string().haversine_length()
    }
}
