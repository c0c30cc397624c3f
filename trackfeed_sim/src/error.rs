//! Error types for the simulation harness.

use std::time::Duration;
use thiserror::Error;
use trackfeed_core::{ConfigError, ObserverError};

/// Errors raised while loading feeds, running or exporting a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Render error: {0}")]
    Render(#[from] ObserverError),

    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("Invalid duration: {0} seconds")]
    InvalidDuration(f64),
}

/// Converts a duration given in seconds, rejecting negative, non-finite
/// and out-of-range values.
pub fn duration_from_secs(secs: f64) -> Result<Duration, SimError> {
    Duration::try_from_secs_f64(secs).map_err(|_| SimError::InvalidDuration(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::ScenarioId;

    #[test]
    fn test_unknown_scenario_message_names_it_once() {
        let err = "split_brain"
            .parse::<ScenarioId>()
            .map_err(SimError::UnknownScenario)
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown scenario: split_brain");
    }

    #[test]
    fn test_duration_from_secs() {
        assert_eq!(duration_from_secs(2.5).unwrap(), Duration::from_millis(2500));
        assert_eq!(duration_from_secs(0.0).unwrap(), Duration::ZERO);
        assert!(matches!(duration_from_secs(-1.0), Err(SimError::InvalidDuration(_))));
        assert!(matches!(duration_from_secs(f64::INFINITY), Err(SimError::InvalidDuration(_))));
        assert!(matches!(duration_from_secs(1e30), Err(SimError::InvalidDuration(_))));
    }
}
