//! Scenario runner - drives feeds on the virtual clock and checks the
//! resulting trajectories.

use crate::scenarios::ScenarioId;
use crate::session::{SessionConfig, SimEmitter, TrackingSession};

use std::time::Duration;
use trackfeed_core::{EmitterConfig, Retention};
use trackfeed_env::FeedContext;
use tracing::{debug, info, warn};

/// Per-feed outcome of a run.
#[derive(Debug, Clone)]
pub struct FeedSummary {
    pub name: String,
    pub ticks: u64,
    pub points: usize,
    pub expected_points: usize,
    pub path_length_m: f64,
}

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Whether every check passed
    pub passed: bool,

    /// Total ticks executed across feeds
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// One summary per feed, in the order they were added
    pub feeds: Vec<FeedSummary>,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default)]
pub struct ScenarioMetrics {
    /// Render calls the scene received
    pub segments_rendered: u64,

    /// Observer failures isolated by the emitters
    pub observer_faults: u64,

    /// Sum of all path lengths in meters
    pub path_length_m: f64,
}

/// Runs feed scenarios on a virtual clock.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Virtual time per step
    step: Duration,

    /// Simulated duration
    duration: Duration,

    retention: Retention,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            step: Duration::from_millis(100),
            duration: Duration::from_secs(10),
            retention: Retention::Unbounded,
        }
    }

    /// Sets the simulated duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Sets the virtual time advanced per step.
    pub fn with_step(mut self, step: Duration) -> Self {
        if step.is_zero() {
            warn!("zero step ignored, keeping {:?}", self.step);
        } else {
            self.step = step;
        }
        self
    }

    /// Sets the scene retention.
    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
        self
    }

    /// Runs a preset scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        info!("  {}", scenario.description());
        self.run_feeds(scenario.name(), scenario.feeds()).0
    }

    /// Runs arbitrary feeds and returns the result with the finished session.
    pub fn run_feeds(
        &self,
        name: &str,
        feeds: Vec<EmitterConfig>,
    ) -> (ScenarioResult, TrackingSession) {
        let mut session = TrackingSession::new(SessionConfig {
            seed: self.seed,
            step: self.step,
            retention: self.retention,
        });

        let mut failures = Vec::new();
        for config in feeds {
            let feed_name = config.name.clone();
            if let Err(e) = session.add_feed(config) {
                failures.push(format!("feed '{}' rejected: {}", feed_name, e));
            }
        }

        session.start_all();
        let total_ticks = session.run_for(self.duration) as u64;
        session.stop_all();

        let now = session.context.now();
        let summaries: Vec<FeedSummary> = session
            .feeds()
            .iter()
            .map(|feed| summarize(feed, now))
            .collect();

        failures.extend(check_feeds(&session, &summaries));

        let metrics = ScenarioMetrics {
            segments_rendered: session.scene.rendered_total(),
            observer_faults: session.observer_faults(),
            path_length_m: summaries.iter().map(|s| s.path_length_m).sum(),
        };
        if metrics.observer_faults > 0 {
            failures.push(format!("{} observer faults", metrics.observer_faults));
        }

        for summary in &summaries {
            debug!(
                "  {}: {} ticks, {} points, {:.1} m",
                summary.name, summary.ticks, summary.points, summary.path_length_m
            );
        }

        let passed = failures.is_empty();
        let result = ScenarioResult {
            scenario: name.to_string(),
            seed: self.seed,
            passed,
            total_ticks,
            final_time_secs: session.time(),
            feeds: summaries,
            failure_reason: (!passed).then(|| failures.join("; ")),
            metrics,
        };
        (result, session)
    }
}

fn summarize(feed: &SimEmitter, now: Duration) -> FeedSummary {
    let config = feed.config();
    let seeded = config.history.len().max(1);
    let due = (now.as_nanos() / config.tick_interval.as_nanos().max(1)) as usize;

    let store = feed.store();
    let store = store.read().unwrap_or_else(std::sync::PoisonError::into_inner);
    FeedSummary {
        name: config.name.clone(),
        ticks: feed.tick_count(),
        points: store.len(),
        expected_points: seeded + due,
        path_length_m: store.path_length_m(),
    }
}

/// Point counts, ordering and rendering checks.
fn check_feeds(session: &TrackingSession, summaries: &[FeedSummary]) -> Vec<String> {
    let mut failures = Vec::new();

    for (feed, summary) in session.feeds().iter().zip(summaries) {
        if summary.points != summary.expected_points {
            failures.push(format!(
                "{}: {} points, expected {}",
                summary.name, summary.points, summary.expected_points
            ));
        }

        let points = feed.snapshot();
        let ordered = points.windows(2).all(|w| {
            w[1].sequence == w[0].sequence + 1 && w[1].recorded_at >= w[0].recorded_at
        });
        if !ordered {
            failures.push(format!("{}: trajectory out of order", summary.name));
        }
        if points.iter().any(|p| !p.coordinate.is_finite()) {
            failures.push(format!("{}: non-finite coordinate", summary.name));
        }
    }

    // Live renders: the history (or the initial point), then one per tick
    let expected_renders: u64 = session
        .feeds()
        .iter()
        .zip(summaries)
        .map(|(feed, s)| s.ticks + feed.config().history.len().max(1) as u64)
        .sum();
    let rendered = session.scene.rendered_total();
    if rendered != expected_renders {
        failures.push(format!(
            "scene received {} renders, expected {}",
            rendered, expected_renders
        ));
    }

    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use trackfeed_core::Strategy;

    #[test]
    fn test_all_presets_pass() {
        let runner = ScenarioRunner::new(42);
        for scenario in ScenarioId::all() {
            let result = runner.run(scenario);
            assert!(result.passed, "{}: {:?}", scenario, result.failure_reason);
            assert_eq!(result.metrics.observer_faults, 0);
        }
    }

    #[test]
    fn test_combined_counts() {
        let result = ScenarioRunner::new(1).run(ScenarioId::Combined);

        assert_eq!(result.total_ticks, 12);
        assert_eq!(result.feeds[0].name, "mock_feed");
        assert_eq!(result.feeds[0].points, 9);
        assert_eq!(result.feeds[1].points, 11);
        // mock: 7 history points + 2 ticks, vehicle: initial point + 10 ticks
        assert_eq!(result.metrics.segments_rendered, 9 + 11);
        assert!((result.final_time_secs - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_duration_keeps_only_seeded_points() {
        let result = ScenarioRunner::new(1)
            .with_duration(Duration::ZERO)
            .run(ScenarioId::Vehicle);

        assert!(result.passed);
        assert_eq!(result.total_ticks, 0);
        assert_eq!(result.feeds[0].points, 1);
    }

    #[test]
    fn test_rejected_feed_fails_run() {
        let bad = EmitterConfig::default().with_tick_interval(Duration::ZERO);
        let (result, session) = ScenarioRunner::new(1).run_feeds("bad", vec![bad]);

        assert!(!result.passed);
        assert!(result.failure_reason.unwrap().contains("rejected"));
        assert!(session.feeds().is_empty());
    }

    #[test]
    fn test_retention_limits_scene_not_trajectories() {
        let (result, session) = ScenarioRunner::new(1)
            .with_retention(Retention::LastSegments(4))
            .run_feeds("vehicle", ScenarioId::Vehicle.feeds());

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(session.scene.segments().len(), 4);
        assert_eq!(result.feeds[0].points, 11);
        assert_eq!(result.metrics.segments_rendered, 11);
    }

    #[test]
    fn test_zero_step_is_ignored() {
        let runner = ScenarioRunner::new(1).with_step(Duration::ZERO);
        let result = runner.run(ScenarioId::Vehicle);
        assert!(result.passed);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_runs_are_deterministic(seed in any::<u64>(), secs in 0u32..30) {
            let feeds = || vec![
                EmitterConfig::default()
                    .with_name("walker")
                    .with_tick_interval(Duration::from_millis(700))
                    .with_strategy(Strategy::random_walk(0.01, 0.01)),
            ];
            let runner = ScenarioRunner::new(seed).with_duration(Duration::from_secs(secs as u64));

            let (a, session_a) = runner.run_feeds("prop", feeds());
            let (b, session_b) = runner.run_feeds("prop", feeds());

            prop_assert!(a.passed, "{:?}", a.failure_reason);
            prop_assert_eq!(a.total_ticks, b.total_ticks);
            prop_assert_eq!(session_a.feeds()[0].snapshot(), session_b.feeds()[0].snapshot());
        }
    }
}
