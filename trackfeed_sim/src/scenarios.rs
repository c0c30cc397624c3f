//! Scenario presets reproducing the feeds of the original map demo.

use std::time::Duration;
use trackfeed_core::{Coordinate, EmitterConfig, Strategy};

/// Historic points the mock feed starts from.
pub const MOCK_HISTORY: [Coordinate; 7] = [
    Coordinate::new(108.945951, 34.465262),
    Coordinate::new(109.04724, 34.262504),
    Coordinate::new(108.580321, 34.076162),
    Coordinate::new(110.458983, 35.071209),
    Coordinate::new(105.734862, 35.49272),
    Coordinate::new(104.458983, 35.071209),
    Coordinate::new(103.734862, 35.49272),
];

/// Where the simulated vehicle starts.
pub const VEHICLE_START: Coordinate = Coordinate::new(118.793767, 32.020157);

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// Random walk continuing from a fixed history, every 5 s
    MockFeed,

    /// Straight-line vehicle track, every 1 s
    Vehicle,

    /// Both feeds rendered into one scene
    Combined,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![ScenarioId::MockFeed, ScenarioId::Vehicle, ScenarioId::Combined]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::MockFeed => "mock_feed",
            ScenarioId::Vehicle => "vehicle",
            ScenarioId::Combined => "combined",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::MockFeed => "Random walk (0.1 deg) from 7 historic points, 5000ms ticks",
            ScenarioId::Vehicle => "Fixed increment (0.00001, 0.001) from Nanjing, 1000ms ticks",
            ScenarioId::Combined => "Mock feed and vehicle sharing one map scene",
        }
    }

    /// Returns the feeds this scenario runs.
    pub fn feeds(&self) -> Vec<EmitterConfig> {
        match self {
            ScenarioId::MockFeed => vec![mock_feed()],
            ScenarioId::Vehicle => vec![vehicle()],
            ScenarioId::Combined => vec![mock_feed(), vehicle()],
        }
    }
}

/// The periodic mock feed.
pub fn mock_feed() -> EmitterConfig {
    EmitterConfig::default()
        .with_name("mock_feed")
        .with_tick_interval(Duration::from_millis(5000))
        .with_strategy(Strategy::random_walk(0.1, 0.1))
        .with_initial_coordinate(MOCK_HISTORY[MOCK_HISTORY.len() - 1])
        .with_history(MOCK_HISTORY.to_vec())
}

/// The navigation vehicle.
pub fn vehicle() -> EmitterConfig {
    EmitterConfig::default()
        .with_name("vehicle")
        .with_tick_interval(Duration::from_millis(1000))
        .with_strategy(Strategy::fixed_increment(0.00001, 0.001))
        .with_initial_coordinate(VEHICLE_START)
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock_feed" | "mockfeed" | "mock" => Ok(ScenarioId::MockFeed),
            "vehicle" | "car" => Ok(ScenarioId::Vehicle),
            "combined" | "both" => Ok(ScenarioId::Combined),
            _ => Err(s.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_names_round_trip() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
        }
        assert_eq!("split_brain".parse::<ScenarioId>(), Err("split_brain".to_string()));
    }

    #[test]
    fn test_presets_are_valid() {
        for scenario in ScenarioId::all() {
            for feed in scenario.feeds() {
                assert!(feed.validate().is_ok(), "{} / {}", scenario, feed.name);
            }
        }
        assert_eq!(ScenarioId::Combined.feeds().len(), 2);
    }

    #[test]
    fn test_mock_feed_continues_from_last_history_point() {
        let feed = mock_feed();
        assert_eq!(feed.history.len(), 7);
        assert_eq!(feed.initial_coordinate, Coordinate::new(103.734862, 35.49272));
    }
}
