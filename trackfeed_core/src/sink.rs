//! Renderer boundary.
//!
//! The feed never draws anything itself. It hands each new position to a
//! [`MapSink`], which owns styling, projection and drawing.

use crate::coordinate::Coordinate;
use crate::error::ObserverError;
use tracing::info;

/// Consumer of new track positions.
///
/// `from` is `None` for the first point of a track, which has no
/// connecting segment.
pub trait MapSink: Send + Sync {
    fn render_segment(&self, from: Option<Coordinate>, to: Coordinate) -> Result<(), ObserverError>;
}

/// Sink that only logs what it would draw.
#[derive(Debug, Clone)]
pub struct LogSink {
    label: String,
}

impl LogSink {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

impl MapSink for LogSink {
    fn render_segment(&self, from: Option<Coordinate>, to: Coordinate) -> Result<(), ObserverError> {
        match from {
            Some(from) => info!(feed = %self.label, "segment ({}) -> ({})", from, to),
            None => info!(feed = %self.label, "point ({})", to),
        }
        Ok(())
    }
}
