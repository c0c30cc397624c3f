//! Geographic coordinates and the segments drawn between them.
//!
//! Coordinates are plain (longitude, latitude) pairs in degrees. No datum
//! transform or projection is applied here; that belongs to the renderer.

use geo::{Coord, HaversineDistance, Line, Point};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A (longitude, latitude) pair in degrees.
///
/// Serialized as a `[lon, lat]` array, the GeoJSON position order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinate {
    /// Longitude in degrees
    pub lon: f64,

    /// Latitude in degrees
    pub lat: f64,
}

impl Coordinate {
    /// Creates a coordinate from longitude and latitude.
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Returns the coordinate offset by the given deltas.
    pub fn offset(&self, d_lon: f64, d_lat: f64) -> Self {
        Self::new(self.lon + d_lon, self.lat + d_lat)
    }

    /// True when both components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }
}

impl fmt::Display for Coordinate {
    /// Mouse-position readout format: six decimals, lon first.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.lon, self.lat)
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from([lon, lat]: [f64; 2]) -> Self {
        Self::new(lon, lat)
    }
}

impl From<Coordinate> for [f64; 2] {
    fn from(c: Coordinate) -> Self {
        [c.lon, c.lat]
    }
}

impl From<Coordinate> for Coord<f64> {
    fn from(c: Coordinate) -> Self {
        Coord { x: c.lon, y: c.lat }
    }
}

impl From<Coord<f64>> for Coordinate {
    fn from(c: Coord<f64>) -> Self {
        Self::new(c.x, c.y)
    }
}

/// The directed pairing of two consecutive trajectory coordinates.
///
/// Derived on the fly for rendering; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub from: Coordinate,
    pub to: Coordinate,
}

impl Segment {
    pub fn new(from: Coordinate, to: Coordinate) -> Self {
        Self { from, to }
    }

    /// Great-circle length of the segment in meters.
    pub fn length_m(&self) -> f64 {
        let a: Point<f64> = Coord::from(self.from).into();
        let b: Point<f64> = Coord::from(self.to).into();
        a.haversine_distance(&b)
    }
}

impl From<Segment> for Line<f64> {
    fn from(s: Segment) -> Self {
        Line::new(Coord::from(s.from), Coord::from(s.to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_display_matches_readout() {
        let c = Coordinate::new(118.793767, 32.020157);
        assert_eq!(c.to_string(), "118.793767, 32.020157");

        let c = Coordinate::new(-0.5, 1.0);
        assert_eq!(c.to_string(), "-0.500000, 1.000000");
    }

    #[test]
    fn test_coordinate_serializes_as_position_array() {
        let c = Coordinate::new(118.0, 33.0);
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, "[118.0,33.0]");

        let back: Coordinate = serde_json::from_str("[104.458983,35.071209]").unwrap();
        assert_eq!(back, Coordinate::new(104.458983, 35.071209));
    }

    #[test]
    fn test_coordinate_is_finite() {
        assert!(Coordinate::new(1.0, 2.0).is_finite());
        assert!(!Coordinate::new(f64::NAN, 2.0).is_finite());
        assert!(!Coordinate::new(1.0, f64::INFINITY).is_finite());
    }

    #[test]
    fn test_segment_length_one_degree_latitude() {
        let s = Segment::new(Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 1.0));
        // ~111.2 km per degree on the mean-radius sphere
        let len = s.length_m();
        assert!((len - 111_195.0).abs() < 100.0, "got {}", len);
    }

    #[test]
    fn test_segment_into_geo_line() {
        let s = Segment::new(Coordinate::new(1.0, 2.0), Coordinate::new(3.0, 4.0));
        let line: Line<f64> = s.into();
        assert_eq!(line.start, Coord { x: 1.0, y: 2.0 });
        assert_eq!(line.end, Coord { x: 3.0, y: 4.0 });
    }
}
