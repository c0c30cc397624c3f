//! Error types for the tracking feed.
//!
//! Configuration errors surface at construction and are fatal. Observer
//! errors are contained by the emitter and never stop the schedule.

use thiserror::Error;

/// Invalid emitter configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid tick interval: {0}ms (must be > 0)")]
    InvalidTickInterval(f64),

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("Invalid parameters for {strategy}: {reason}")]
    InvalidStrategyParams {
        strategy: &'static str,
        reason: String,
    },

    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure raised by a segment observer or map sink.
#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("Render failed: {0}")]
    Render(String),

    #[error("Observer panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Other(String),
}

impl ObserverError {
    /// Creates a render error.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }
}

/// Violation of the append-only ordering of a trajectory.
#[derive(Debug, Error, PartialEq)]
pub enum TrajectoryError {
    #[error("Out of sequence: expected index {expected}, got {got}")]
    OutOfSequence { expected: u64, got: u64 },

    #[error("Time went backwards: {got_ms}ms is before last point at {last_ms}ms")]
    TimeReversed { last_ms: u128, got_ms: u128 },
}
