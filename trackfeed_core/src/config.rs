//! Feed configuration.
//!
//! [`EmitterConfig`] is the validated, typed form used by the emitter.
//! Feeds can also be described in JSON with camelCase keys:
//!
//! ```json
//! {
//!   "name": "vehicle",
//!   "tickIntervalMs": 1000,
//!   "strategy": "fixed-increment",
//!   "strategyParams": { "lonStep": 0.00001, "latStep": 0.001 },
//!   "initialCoordinate": [118.793767, 32.020157]
//! }
//! ```
//!
//! Missing `strategyParams` keys fall back to the strategy defaults.

use crate::coordinate::Coordinate;
use crate::error::ConfigError;
use crate::position_source::{
    Strategy, StrategyKind, DEFAULT_LAT_STEP, DEFAULT_LON_STEP, DEFAULT_MAX_DELTA,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a single tracking feed.
#[derive(Debug, Clone, PartialEq)]
pub struct EmitterConfig {
    /// Feed name (for logging and export)
    pub name: String,

    /// Time between ticks (default: 1000ms)
    pub tick_interval: Duration,

    /// Position strategy and its parameters
    pub strategy: Strategy,

    /// First point, used when the store starts empty
    pub initial_coordinate: Coordinate,

    /// Points preloaded into the store before the first tick
    pub history: Vec<Coordinate>,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            name: "feed".to_string(),
            tick_interval: Duration::from_millis(1000),
            strategy: Strategy::default(),
            initial_coordinate: Coordinate::new(118.793767, 32.020157),
            history: Vec::new(),
        }
    }
}

impl EmitterConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_initial_coordinate(mut self, coordinate: Coordinate) -> Self {
        self.initial_coordinate = coordinate;
        self
    }

    pub fn with_history(mut self, history: Vec<Coordinate>) -> Self {
        self.history = history;
        self
    }

    /// Checks every field. Called by `TrackEmitter::new`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::InvalidTickInterval(0.0));
        }

        self.strategy.validate()?;

        if !self.initial_coordinate.is_finite() {
            return Err(ConfigError::InvalidCoordinate(format!(
                "initialCoordinate ({})",
                self.initial_coordinate
            )));
        }

        if let Some((i, bad)) = self.history.iter().enumerate().find(|(_, c)| !c.is_finite()) {
            return Err(ConfigError::InvalidCoordinate(format!("history[{}] ({})", i, bad)));
        }

        Ok(())
    }

    /// Parses and validates one feed description.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let file: FeedConfigFile = serde_json::from_str(json)?;
        file.try_into()
    }

    /// Parses a single feed object or an array of them.
    pub fn list_from_json(json: &str) -> Result<Vec<Self>, ConfigError> {
        match serde_json::from_str::<OneOrMany>(json)? {
            OneOrMany::One(file) => Ok(vec![EmitterConfig::try_from(file)?]),
            OneOrMany::Many(files) => files.into_iter().map(EmitterConfig::try_from).collect(),
        }
    }

    /// Serializes to the JSON configuration surface.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(&FeedConfigFile::from(self))?)
    }
}

/// JSON shape of a feed description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,

    tick_interval_ms: f64,

    strategy: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    strategy_params: Option<serde_json::Value>,

    initial_coordinate: Coordinate,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    history: Vec<Coordinate>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(FeedConfigFile),
    Many(Vec<FeedConfigFile>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RandomWalkParams {
    max_lon_delta: Option<f64>,
    max_lat_delta: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct FixedIncrementParams {
    lon_step: Option<f64>,
    lat_step: Option<f64>,
}

fn parse_params<T>(kind: StrategyKind, value: Option<serde_json::Value>) -> Result<T, ConfigError>
where
    T: Default + serde::de::DeserializeOwned,
{
    match value {
        None | Some(serde_json::Value::Null) => Ok(T::default()),
        Some(v) => serde_json::from_value(v).map_err(|e| ConfigError::InvalidStrategyParams {
            strategy: kind.name(),
            reason: e.to_string(),
        }),
    }
}

fn resolve_strategy(name: &str, params: Option<serde_json::Value>) -> Result<Strategy, ConfigError> {
    let kind: StrategyKind = name.parse()?;
    let strategy = match kind {
        StrategyKind::RandomWalk => {
            let p: RandomWalkParams = parse_params(kind, params)?;
            Strategy::random_walk(
                p.max_lon_delta.unwrap_or(DEFAULT_MAX_DELTA),
                p.max_lat_delta.unwrap_or(DEFAULT_MAX_DELTA),
            )
        }
        StrategyKind::FixedIncrement => {
            let p: FixedIncrementParams = parse_params(kind, params)?;
            Strategy::fixed_increment(
                p.lon_step.unwrap_or(DEFAULT_LON_STEP),
                p.lat_step.unwrap_or(DEFAULT_LAT_STEP),
            )
        }
    };
    Ok(strategy)
}

impl TryFrom<FeedConfigFile> for EmitterConfig {
    type Error = ConfigError;

    fn try_from(file: FeedConfigFile) -> Result<Self, Self::Error> {
        let ms = file.tick_interval_ms;
        if !ms.is_finite() || ms <= 0.0 {
            return Err(ConfigError::InvalidTickInterval(ms));
        }
        let tick_interval = Duration::try_from_secs_f64(ms / 1000.0)
            .map_err(|_| ConfigError::InvalidTickInterval(ms))?;

        let config = EmitterConfig {
            name: file.name.unwrap_or_else(|| "feed".to_string()),
            tick_interval,
            strategy: resolve_strategy(&file.strategy, file.strategy_params)?,
            initial_coordinate: file.initial_coordinate,
            history: file.history,
        };
        config.validate()?;
        Ok(config)
    }
}

impl From<&EmitterConfig> for FeedConfigFile {
    fn from(config: &EmitterConfig) -> Self {
        let params = match config.strategy {
            Strategy::RandomWalk {
                max_lon_delta,
                max_lat_delta,
            } => serde_json::json!({ "maxLonDelta": max_lon_delta, "maxLatDelta": max_lat_delta }),
            Strategy::FixedIncrement { lon_step, lat_step } => {
                serde_json::json!({ "lonStep": lon_step, "latStep": lat_step })
            }
        };

        FeedConfigFile {
            name: Some(config.name.clone()),
            tick_interval_ms: config.tick_interval.as_nanos() as f64 / 1e6,
            strategy: config.strategy.kind().name().to_string(),
            strategy_params: Some(params),
            initial_coordinate: config.initial_coordinate,
            history: config.history.clone(),
        }
    }
}
