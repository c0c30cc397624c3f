//! Position generation strategies.
//!
//! A [`PositionSource`] derives the next simulated coordinate from the
//! current one. Two policies exist:
//!
//! - **Random walk**: each axis moves forward by a uniform random amount in
//!   `[0, max)`. This is the periodic mock feed.
//! - **Fixed increment**: each axis moves by a constant step. This is the
//!   vehicle track.
//!
//! The source holds no state of its own; all randomness comes from the RNG
//! the caller passes in, so a seeded RNG yields a reproducible path.

use crate::coordinate::Coordinate;
use crate::error::ConfigError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default per-axis bound of the random walk, in degrees.
pub const DEFAULT_MAX_DELTA: f64 = 0.1;

/// Default vehicle longitude step, in degrees per tick.
pub const DEFAULT_LON_STEP: f64 = 0.00001;

/// Default vehicle latitude step, in degrees per tick.
pub const DEFAULT_LAT_STEP: f64 = 0.001;

/// Strategy selector without parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    RandomWalk,
    FixedIncrement,
}

impl StrategyKind {
    /// Returns every available strategy.
    pub fn all() -> Vec<StrategyKind> {
        vec![StrategyKind::RandomWalk, StrategyKind::FixedIncrement]
    }

    /// Returns the configuration name.
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::RandomWalk => "random-walk",
            StrategyKind::FixedIncrement => "fixed-increment",
        }
    }

    /// Returns the strategy with its default parameters.
    pub fn with_defaults(&self) -> Strategy {
        match self {
            StrategyKind::RandomWalk => Strategy::random_walk(DEFAULT_MAX_DELTA, DEFAULT_MAX_DELTA),
            StrategyKind::FixedIncrement => {
                Strategy::fixed_increment(DEFAULT_LON_STEP, DEFAULT_LAT_STEP)
            }
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random-walk" | "random_walk" | "randomwalk" => Ok(StrategyKind::RandomWalk),
            "fixed-increment" | "fixed_increment" | "fixedincrement" => {
                Ok(StrategyKind::FixedIncrement)
            }
            _ => Err(ConfigError::UnknownStrategy(s.to_string())),
        }
    }
}

/// A position strategy together with its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "strategyParams", rename_all = "kebab-case")]
pub enum Strategy {
    #[serde(rename_all = "camelCase")]
    RandomWalk {
        /// Exclusive upper bound of the longitude delta
        max_lon_delta: f64,
        /// Exclusive upper bound of the latitude delta
        max_lat_delta: f64,
    },

    #[serde(rename_all = "camelCase")]
    FixedIncrement {
        /// Longitude added per tick
        lon_step: f64,
        /// Latitude added per tick
        lat_step: f64,
    },
}

impl Strategy {
    pub fn random_walk(max_lon_delta: f64, max_lat_delta: f64) -> Self {
        Strategy::RandomWalk {
            max_lon_delta,
            max_lat_delta,
        }
    }

    pub fn fixed_increment(lon_step: f64, lat_step: f64) -> Self {
        Strategy::FixedIncrement { lon_step, lat_step }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::RandomWalk { .. } => StrategyKind::RandomWalk,
            Strategy::FixedIncrement { .. } => StrategyKind::FixedIncrement,
        }
    }

    /// Checks the parameters.
    ///
    /// Random-walk bounds must be finite and non-negative; fixed steps must
    /// be finite.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidStrategyParams {
            strategy: self.kind().name(),
            reason,
        };

        match *self {
            Strategy::RandomWalk {
                max_lon_delta,
                max_lat_delta,
            } => {
                for (axis, max) in [("maxLonDelta", max_lon_delta), ("maxLatDelta", max_lat_delta)] {
                    if !max.is_finite() || max < 0.0 {
                        return Err(invalid(format!("{} must be finite and >= 0, got {}", axis, max)));
                    }
                }
            }
            Strategy::FixedIncrement { lon_step, lat_step } => {
                for (axis, step) in [("lonStep", lon_step), ("latStep", lat_step)] {
                    if !step.is_finite() {
                        return Err(invalid(format!("{} must be finite, got {}", axis, step)));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for Strategy {
    fn default() -> Self {
        StrategyKind::RandomWalk.with_defaults()
    }
}

/// Produces the next simulated position from the current one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSource {
    strategy: Strategy,
}

impl PositionSource {
    /// Creates a source, rejecting invalid strategy parameters.
    pub fn new(strategy: Strategy) -> Result<Self, ConfigError> {
        strategy.validate()?;
        Ok(Self { strategy })
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Returns the coordinate following `current`.
    ///
    /// Only the random walk consumes `rng`.
    pub fn next<R: Rng + ?Sized>(&self, current: Coordinate, rng: &mut R) -> Coordinate {
        match self.strategy {
            Strategy::RandomWalk {
                max_lon_delta,
                max_lat_delta,
            } => Coordinate::new(
                walk_axis(current.lon, max_lon_delta, rng),
                walk_axis(current.lat, max_lat_delta, rng),
            ),
            Strategy::FixedIncrement { lon_step, lat_step } => current.offset(lon_step, lat_step),
        }
    }
}

/// Moves `value` forward by a uniform amount in `[0, max)`.
///
/// The result stays in `[value, value + max)` and differs from `value`
/// whenever `max > 0`. If `max` is smaller than the float spacing at
/// `value` both cannot hold; moving wins and the result is the next float
/// above `value`.
fn walk_axis<R: Rng + ?Sized>(value: f64, max: f64, rng: &mut R) -> f64 {
    if max <= 0.0 {
        return value;
    }

    let candidate = value + rng.gen::<f64>() * max;
    // Float rounding can land on either bound
    let clamped = candidate.min(next_down(value + max));
    if clamped <= value {
        next_up(value)
    } else {
        clamped
    }
}

/// Smallest float strictly greater than `x`.
fn next_up(x: f64) -> f64 {
    if x.is_nan() || x == f64::INFINITY {
        return x;
    }
    if x == 0.0 {
        return f64::from_bits(1);
    }
    let bits = x.to_bits();
    if x > 0.0 {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

/// Largest float strictly less than `x`.
fn next_down(x: f64) -> f64 {
    -next_up(-x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::Strategy;
    use proptest::prelude::*;
    use rand::rngs::mock::StepRng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_fixed_increment_vehicle_step() {
        let source = PositionSource::new(Strategy::fixed_increment(0.00001, 0.001)).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let start = Coordinate::new(118.793767, 32.020157);

        let next = source.next(start, &mut rng);

        assert_eq!(next, Coordinate::new(118.793767 + 0.00001, 32.020157 + 0.001));
    }

    #[test]
    fn test_random_walk_zero_draw_still_moves() {
        // StepRng(0, 0) makes gen::<f64>() return exactly 0.0
        let mut rng = StepRng::new(0, 0);
        let source = PositionSource::new(Strategy::random_walk(0.1, 0.1)).unwrap();
        let start = Coordinate::new(108.945951, 34.465262);

        let next = source.next(start, &mut rng);

        assert!(next.lon > start.lon);
        assert!(next.lat > start.lat);
        assert!(next.lon < start.lon + 0.1);
    }

    #[test]
    fn test_random_walk_bound_below_float_spacing_moves_one_step() {
        let source = PositionSource::new(Strategy::random_walk(1e-20, 1e-20)).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let start = Coordinate::new(100.0, 30.0);

        let next = source.next(start, &mut rng);

        assert_eq!(next.lon, next_up(100.0));
        assert_eq!(next.lat, next_up(30.0));
    }

    #[test]
    fn test_random_walk_zero_bound_is_stationary_axis() {
        let source = PositionSource::new(Strategy::random_walk(0.1, 0.0)).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let start = Coordinate::new(10.0, 20.0);

        let next = source.next(start, &mut rng);

        assert_eq!(next.lat, 20.0);
        assert!(next.lon > 10.0);
    }

    #[test]
    fn test_random_walk_is_reproducible_from_seed() {
        let source = PositionSource::new(Strategy::default()).unwrap();
        let start = Coordinate::new(103.734862, 35.49272);

        let mut a = ChaCha8Rng::seed_from_u64(42);
        let mut b = ChaCha8Rng::seed_from_u64(42);

        assert_eq!(source.next(start, &mut a), source.next(start, &mut b));
    }

    #[test]
    fn test_validate_rejects_bad_params() {
        assert!(PositionSource::new(Strategy::random_walk(-0.1, 0.1)).is_err());
        assert!(PositionSource::new(Strategy::random_walk(0.1, f64::NAN)).is_err());
        assert!(PositionSource::new(Strategy::fixed_increment(f64::INFINITY, 0.0)).is_err());
        assert!(PositionSource::new(Strategy::fixed_increment(-0.001, 0.0)).is_ok());
    }

    #[test]
    fn test_strategy_kind_from_str() {
        assert_eq!("random-walk".parse::<StrategyKind>().unwrap(), StrategyKind::RandomWalk);
        assert_eq!(
            "Fixed-Increment".parse::<StrategyKind>().unwrap(),
            StrategyKind::FixedIncrement
        );

        let err = "teleport".parse::<StrategyKind>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownStrategy(name) if name == "teleport"));
    }

    #[test]
    fn test_strategy_serde_shape() {
        let json = serde_json::to_value(Strategy::fixed_increment(0.00001, 0.001)).unwrap();
        assert_eq!(json["strategy"], "fixed-increment");
        assert_eq!(json["strategyParams"]["latStep"], 0.001);
    }

    #[test]
    fn test_next_up_down() {
        assert!(next_up(1.0) > 1.0);
        assert!(next_up(-1.0) > -1.0);
        assert!(next_up(0.0) > 0.0);
        assert!(next_down(1.0) < 1.0);
        assert!(next_down(0.0) < 0.0);
    }

    proptest! {
        #[test]
        fn prop_fixed_increment_exact_step(
            lon in -180.0f64..180.0,
            lat in -90.0f64..90.0,
            lon_step in -0.01f64..0.01,
            lat_step in -0.01f64..0.01,
        ) {
            let source = PositionSource::new(Strategy::fixed_increment(lon_step, lat_step)).unwrap();
            let mut rng = ChaCha8Rng::seed_from_u64(0);
            let c = Coordinate::new(lon, lat);

            let next = source.next(c, &mut rng);

            prop_assert_eq!(next.lon, c.lon + lon_step);
            prop_assert_eq!(next.lat, c.lat + lat_step);
        }

        #[test]
        fn prop_random_walk_bounds(
            lon in -180.0f64..180.0,
            lat in -90.0f64..90.0,
            max_delta in 1e-6f64..1.0,
            seed in any::<u64>(),
        ) {
            let source = PositionSource::new(Strategy::random_walk(max_delta, max_delta)).unwrap();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let c = Coordinate::new(lon, lat);

            let next = source.next(c, &mut rng);

            prop_assert!(next.lon >= c.lon && next.lon < c.lon + max_delta);
            prop_assert!(next.lat >= c.lat && next.lat < c.lat + max_delta);
            prop_assert_ne!(next, c);
        }
    }
}
