//! JSON and GeoJSON exporter.
//!
//! Exports the trajectories of a finished session so they can be loaded
//! back onto a map.

use crate::error::SimError;
use crate::session::TrackingSession;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use trackfeed_core::{Coordinate, Region};

/// Exported trajectory of one feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedExport {
    pub id: String,
    pub name: String,
    pub strategy: String,
    pub tick_interval_ms: f64,
    pub ticks: u64,
    pub points: Vec<Coordinate>,
    pub path_length_m: f64,
}

/// Complete export of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Final simulation time in seconds
    pub time_sec: f64,

    /// One entry per feed
    pub feeds: Vec<FeedExport>,

    /// Drawn regions as closed rings
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub regions: Vec<Vec<Coordinate>>,

    /// Whether the scenario checks passed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,
}

/// File format picked from the export path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    GeoJson,
}

impl ExportFormat {
    /// `.geojson` selects GeoJSON; anything else is plain JSON.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("geojson") => ExportFormat::GeoJson,
            _ => ExportFormat::Json,
        }
    }
}

impl SimExport {
    /// Captures the current state of a session.
    pub fn from_session(scenario: &str, session: &TrackingSession) -> Self {
        let feeds = session
            .feeds()
            .iter()
            .map(|feed| {
                let store = feed.store();
                let store = store.read().unwrap_or_else(std::sync::PoisonError::into_inner);
                FeedExport {
                    id: feed.id().to_string(),
                    name: feed.name().to_string(),
                    strategy: feed.config().strategy.kind().name().to_string(),
                    tick_interval_ms: feed.config().tick_interval.as_nanos() as f64 / 1e6,
                    ticks: feed.tick_count(),
                    points: store.coordinates().collect(),
                    path_length_m: store.path_length_m(),
                }
            })
            .collect();

        Self {
            scenario: scenario.to_string(),
            seed: session.config.seed,
            time_sec: session.time(),
            feeds,
            regions: session.scene.regions().iter().map(Region::ring).collect(),
            passed: None,
        }
    }

    /// Records the scenario verdict.
    pub fn finalize(&mut self, passed: bool) {
        self.passed = Some(passed);
    }

    /// Builds a GeoJSON FeatureCollection: one LineString per feed and one
    /// Polygon per drawn region.
    pub fn to_geojson(&self) -> Value {
        let mut features: Vec<Value> = self
            .feeds
            .iter()
            .map(|feed| {
                json!({
                    "type": "Feature",
                    "geometry": {
                        "type": "LineString",
                        "coordinates": feed.points,
                    },
                    "properties": {
                        "id": feed.id,
                        "name": feed.name,
                        "strategy": feed.strategy,
                        "points": feed.points.len(),
                        "pathLengthM": feed.path_length_m,
                    },
                })
            })
            .collect();

        features.extend(self.regions.iter().map(|ring| {
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [ring],
                },
                "properties": { "kind": "region" },
            })
        }));

        json!({
            "type": "FeatureCollection",
            "features": features,
        })
    }

    /// Writes the export, choosing the format from the file extension.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let body = match ExportFormat::from_path(&path) {
            ExportFormat::Json => serde_json::to_string_pretty(self)?,
            ExportFormat::GeoJson => serde_json::to_string_pretty(&self.to_geojson())?,
        };
        let mut file = File::create(path)?;
        file.write_all(body.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::{mock_feed, vehicle};
    use crate::session::SessionConfig;
    use std::time::Duration;

    fn finished_session() -> TrackingSession {
        let mut session = TrackingSession::new(SessionConfig::default());
        session.add_feed(vehicle()).unwrap();
        session.add_feed(mock_feed()).unwrap();
        session.start_all();
        session.run_for(Duration::from_secs(5));
        session
            .scene
            .draw_region(Coordinate::new(114.0, 32.0), Coordinate::new(120.0, 40.0));
        session
    }

    #[test]
    fn test_export_captures_feeds() {
        let export = SimExport::from_session("combined", &finished_session());

        assert_eq!(export.feeds.len(), 2);
        assert_eq!(export.feeds[0].name, "vehicle");
        assert_eq!(export.feeds[0].points.len(), 6);
        assert_eq!(export.feeds[0].ticks, 5);
        assert_eq!(export.feeds[1].strategy, "random-walk");
        assert_eq!(export.regions.len(), 1);
        assert!(export.feeds[0].path_length_m > 0.0);
    }

    #[test]
    fn test_sub_millisecond_interval_exported() {
        let mut session = TrackingSession::new(SessionConfig::default());
        session
            .add_feed(vehicle().with_tick_interval(Duration::from_micros(250)))
            .unwrap();

        let export = SimExport::from_session("fast", &session);
        assert_eq!(export.feeds[0].tick_interval_ms, 0.25);
    }

    #[test]
    fn test_geojson_shape() {
        let geojson = SimExport::from_session("combined", &finished_session()).to_geojson();

        assert_eq!(geojson["type"], "FeatureCollection");
        let features = geojson["features"].as_array().unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[0]["geometry"]["type"], "LineString");
        assert_eq!(features[0]["geometry"]["coordinates"][0][0], 118.793767);
        assert_eq!(features[2]["geometry"]["type"], "Polygon");
        assert_eq!(features[2]["geometry"]["coordinates"][0].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_export_format_from_path() {
        assert_eq!(ExportFormat::from_path("out.geojson"), ExportFormat::GeoJson);
        assert_eq!(ExportFormat::from_path("out.GEOJSON"), ExportFormat::GeoJson);
        assert_eq!(ExportFormat::from_path("out.json"), ExportFormat::Json);
        assert_eq!(ExportFormat::from_path("out"), ExportFormat::Json);
    }

    #[test]
    fn test_write_and_read_back() {
        let path = std::env::temp_dir().join(format!("trackfeed-export-{}.json", std::process::id()));
        let mut export = SimExport::from_session("combined", &finished_session());
        export.finalize(true);

        export.write_to_file(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let back: SimExport = serde_json::from_str(&text).unwrap();
        assert_eq!(back.feeds.len(), 2);
        assert_eq!(back.passed, Some(true));
        assert_eq!(back.feeds[0].points, export.feeds[0].points);
    }
}
