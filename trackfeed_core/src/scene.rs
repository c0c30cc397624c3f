//! In-memory map scene.
//!
//! `MapScene` is the application-side state of the map: which base tiles
//! are visible, where the view is, the click marker, drawn box regions and
//! the rendered track layers. It implements [`MapSink`] so feeds can render
//! into it, and publishes a [`MapEvent`] for every change.
//!
//! Every render call becomes one [`TrackLayer`] holding a point and, when a
//! previous position exists, the segment leading to it. Layer growth is
//! bounded by the scene's [`Retention`]; the trajectory store itself is
//! never trimmed.

use crate::coordinate::{Coordinate, Segment};
use crate::error::ObserverError;
use crate::events::{EventBus, MapEvent};
use crate::sink::MapSink;
use geo::{Coord, Rect};
use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Lowest zoom level of the view.
pub const MIN_ZOOM: f64 = 0.0;

/// Highest zoom level of the view.
pub const MAX_ZOOM: f64 = 22.0;

/// Initial view center (Nanjing).
pub const DEFAULT_CENTER: Coordinate = Coordinate::new(118.793767, 32.020157);

/// Initial zoom level.
pub const DEFAULT_ZOOM: f64 = 15.0;

/// Base tile layer. Exactly one is visible at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BaseLayer {
    #[default]
    Osm,
    Gaode,
}

impl BaseLayer {
    pub fn name(&self) -> &'static str {
        match self {
            BaseLayer::Osm => "osm",
            BaseLayer::Gaode => "gaode",
        }
    }
}

/// Visible center and zoom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub center: Coordinate,
    pub zoom: f64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
        }
    }
}

/// An axis-aligned box region drawn by the user.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    rect: Rect<f64>,
}

impl Region {
    /// Builds the box spanned by two opposite corners, in any order.
    pub fn from_corners(a: Coordinate, b: Coordinate) -> Self {
        Self {
            rect: Rect::new(Coord::from(a), Coord::from(b)),
        }
    }

    /// South-west corner.
    pub fn min(&self) -> Coordinate {
        self.rect.min().into()
    }

    /// North-east corner.
    pub fn max(&self) -> Coordinate {
        self.rect.max().into()
    }

    pub fn center(&self) -> Coordinate {
        self.rect.center().into()
    }

    /// Inclusive containment test.
    pub fn contains(&self, c: Coordinate) -> bool {
        let (min, max) = (self.min(), self.max());
        c.lon >= min.lon && c.lon <= max.lon && c.lat >= min.lat && c.lat <= max.lat
    }

    /// Closed exterior ring, counter-clockwise from the south-west corner.
    pub fn ring(&self) -> Vec<Coordinate> {
        let (min, max) = (self.min(), self.max());
        vec![
            min,
            Coordinate::new(max.lon, min.lat),
            max,
            Coordinate::new(min.lon, max.lat),
            min,
        ]
    }

    pub fn as_rect(&self) -> Rect<f64> {
        self.rect
    }
}

/// How many rendered track layers the scene keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Retention {
    /// Keep everything
    #[default]
    Unbounded,

    /// Keep only the layers holding the most recent `k` segments
    LastSegments(usize),
}

/// Draw style resolved for a feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Style {
    Circle {
        radius: f64,
        fill: &'static str,
        stroke: &'static str,
        stroke_width: f64,
    },
    Line {
        color: &'static str,
        width: f64,
    },
}

/// A rendered track element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackFeature {
    Point(Coordinate),
    Segment(Segment),
}

impl TrackFeature {
    pub fn style(&self) -> Style {
        match self {
            TrackFeature::Point(_) => Style::Circle {
                radius: 4.0,
                fill: "#e3e3",
                stroke: "#fff",
                stroke_width: 1.0,
            },
            TrackFeature::Segment(_) => Style::Line {
                color: "#222",
                width: 2.0,
            },
        }
    }
}

/// Features added by one render call.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackLayer {
    pub features: Vec<TrackFeature>,
}

impl TrackLayer {
    fn new(from: Option<Coordinate>, to: Coordinate) -> Self {
        let mut features = vec![TrackFeature::Point(to)];
        if let Some(from) = from {
            features.push(TrackFeature::Segment(Segment::new(from, to)));
        }
        Self { features }
    }

    pub fn segment(&self) -> Option<Segment> {
        self.features.iter().find_map(|f| match f {
            TrackFeature::Segment(s) => Some(*s),
            TrackFeature::Point(_) => None,
        })
    }
}

#[derive(Debug, Default)]
struct SceneState {
    base_layer: BaseLayer,
    view: ViewState,
    marker: Option<Coordinate>,
    regions: Vec<Region>,
    track_layers: VecDeque<TrackLayer>,
    /// Kept layers that hold a segment
    segment_count: usize,
    retention: Retention,
    rendered_total: u64,
}

impl SceneState {
    fn push_layer(&mut self, layer: TrackLayer) {
        if layer.segment().is_some() {
            self.segment_count += 1;
        }
        self.track_layers.push_back(layer);
        self.rendered_total += 1;
        self.enforce_retention();
    }

    fn enforce_retention(&mut self) {
        if let Retention::LastSegments(k) = self.retention {
            while self.segment_count > k {
                match self.track_layers.pop_front() {
                    Some(layer) if layer.segment().is_some() => self.segment_count -= 1,
                    Some(_) => {}
                    None => break,
                }
            }
        }
    }
}

/// Application-side map state and renderer stand-in.
pub struct MapScene {
    state: RwLock<SceneState>,
    events: EventBus<MapEvent>,
}

impl MapScene {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(SceneState::default()),
            events: EventBus::new("map-scene"),
        }
    }

    /// Sets the track layer retention policy.
    pub fn with_retention(self, retention: Retention) -> Self {
        {
            let mut state = self.write();
            state.retention = retention;
            state.enforce_retention();
        }
        self
    }

    /// Scene event bus.
    pub fn events(&self) -> &EventBus<MapEvent> {
        &self.events
    }

    fn read(&self) -> RwLockReadGuard<'_, SceneState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SceneState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn base_layer(&self) -> BaseLayer {
        self.read().base_layer
    }

    /// Shows `layer` and hides the other base layer.
    pub fn select_base_layer(&self, layer: BaseLayer) {
        let changed = {
            let mut state = self.write();
            let changed = state.base_layer != layer;
            state.base_layer = layer;
            changed
        };
        if changed {
            self.events.publish(&MapEvent::BaseLayerChanged(layer));
        }
    }

    pub fn view(&self) -> ViewState {
        self.read().view
    }

    fn set_view(&self, view: ViewState) {
        self.write().view = view;
        self.events.publish(&MapEvent::ViewChanged(view));
    }

    /// Recenters on the middle of `extent`, keeping the zoom.
    pub fn zoom_to_extent(&self, extent: &Region) {
        let zoom = self.view().zoom;
        self.set_view(ViewState {
            center: extent.center(),
            zoom,
        });
    }

    /// Single click: moves the marker, replacing the previous one.
    pub fn click(&self, at: Coordinate) {
        self.write().marker = Some(at);
        self.events.publish(&MapEvent::MarkerPlaced(at));
    }

    pub fn marker(&self) -> Option<Coordinate> {
        self.read().marker
    }

    /// Double click: zooms in one level around `at` and clears all regions.
    pub fn double_click(&self, at: Coordinate) {
        let zoom = (self.view().zoom + 1.0).clamp(MIN_ZOOM, MAX_ZOOM);
        self.set_view(ViewState { center: at, zoom });
        self.clear_regions();
    }

    /// Adds the box spanned by two corners.
    pub fn draw_region(&self, a: Coordinate, b: Coordinate) -> Region {
        let region = Region::from_corners(a, b);
        self.write().regions.push(region);
        self.events.publish(&MapEvent::RegionDrawn(region));
        region
    }

    /// Removes all drawn regions and returns how many there were.
    pub fn clear_regions(&self) -> usize {
        let count = {
            let mut state = self.write();
            let count = state.regions.len();
            state.regions.clear();
            count
        };
        self.events.publish(&MapEvent::RegionsCleared { count });
        count
    }

    pub fn regions(&self) -> Vec<Region> {
        self.read().regions.clone()
    }

    /// Track layers currently kept, oldest first.
    pub fn track_layers(&self) -> Vec<TrackLayer> {
        self.read().track_layers.iter().cloned().collect()
    }

    /// Segments currently kept, oldest first.
    pub fn segments(&self) -> Vec<Segment> {
        self.read()
            .track_layers
            .iter()
            .filter_map(TrackLayer::segment)
            .collect()
    }

    /// Render calls received since creation, including evicted layers.
    pub fn rendered_total(&self) -> u64 {
        self.read().rendered_total
    }
}

impl Default for MapScene {
    fn default() -> Self {
        Self::new()
    }
}

impl MapSink for MapScene {
    fn render_segment(&self, from: Option<Coordinate>, to: Coordinate) -> Result<(), ObserverError> {
        if !to.is_finite() {
            return Err(ObserverError::render(format!("non-finite position ({})", to)));
        }

        {
            self.write().push_layer(TrackLayer::new(from, to));
        }
        self.events.publish(&MapEvent::SegmentAdded { from, to });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn c(lon: f64, lat: f64) -> Coordinate {
        Coordinate::new(lon, lat)
    }

    fn record_events(scene: &MapScene) -> Arc<Mutex<Vec<MapEvent>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        scene.events().subscribe(move |e: &MapEvent| {
            sink.lock().unwrap().push(e.clone());
            Ok(())
        });
        log
    }

    #[test]
    fn test_render_builds_point_and_segment_layers() {
        let scene = MapScene::new();
        scene.render_segment(None, c(1.0, 1.0)).unwrap();
        scene.render_segment(Some(c(1.0, 1.0)), c(2.0, 2.0)).unwrap();

        let layers = scene.track_layers();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].features, vec![TrackFeature::Point(c(1.0, 1.0))]);
        assert_eq!(layers[1].segment(), Some(Segment::new(c(1.0, 1.0), c(2.0, 2.0))));
    }

    #[test]
    fn test_feature_styles() {
        assert!(matches!(
            TrackFeature::Point(c(0.0, 0.0)).style(),
            Style::Circle { radius, .. } if radius == 4.0
        ));
        assert_eq!(
            TrackFeature::Segment(Segment::new(c(0.0, 0.0), c(1.0, 1.0))).style(),
            Style::Line { color: "#222", width: 2.0 }
        );
    }

    #[test]
    fn test_retention_caps_segments() {
        let scene = MapScene::new().with_retention(Retention::LastSegments(2));
        let mut prev = None;
        for i in 0..5 {
            let to = c(i as f64, 0.0);
            scene.render_segment(prev, to).unwrap();
            prev = Some(to);
        }

        let segments = scene.segments();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].to, c(4.0, 0.0));
        assert_eq!(scene.track_layers().len(), 2);
        assert_eq!(scene.rendered_total(), 5);
    }

    #[test]
    fn test_retention_with_interleaved_point_layers() {
        let scene = MapScene::new().with_retention(Retention::LastSegments(2));
        scene.render_segment(None, c(0.0, 0.0)).unwrap();
        scene.render_segment(Some(c(0.0, 0.0)), c(1.0, 0.0)).unwrap();
        scene.render_segment(None, c(5.0, 5.0)).unwrap();
        scene.render_segment(Some(c(5.0, 5.0)), c(6.0, 5.0)).unwrap();
        scene.render_segment(Some(c(1.0, 0.0)), c(2.0, 0.0)).unwrap();

        let layers = scene.track_layers();
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[0].features, vec![TrackFeature::Point(c(5.0, 5.0))]);
        assert_eq!(scene.segments().len(), 2);

        scene.render_segment(Some(c(2.0, 0.0)), c(3.0, 0.0)).unwrap();
        assert_eq!(scene.segments(), vec![
            Segment::new(c(1.0, 0.0), c(2.0, 0.0)),
            Segment::new(c(2.0, 0.0), c(3.0, 0.0)),
        ]);
    }

    #[test]
    fn test_unbounded_retention_keeps_everything() {
        let scene = MapScene::new();
        for i in 0..20 {
            scene.render_segment(Some(c(0.0, 0.0)), c(i as f64, 1.0)).unwrap();
        }
        assert_eq!(scene.segments().len(), 20);
    }

    #[test]
    fn test_render_rejects_non_finite() {
        let scene = MapScene::new();
        assert!(scene.render_segment(None, c(f64::NAN, 0.0)).is_err());
        assert!(scene.track_layers().is_empty());
    }

    #[test]
    fn test_click_replaces_marker() {
        let scene = MapScene::new();
        scene.click(c(1.0, 1.0));
        scene.click(c(2.0, 2.0));

        assert_eq!(scene.marker(), Some(c(2.0, 2.0)));
    }

    #[test]
    fn test_double_click_zooms_and_clears_regions() {
        let scene = MapScene::new();
        let log = record_events(&scene);
        scene.draw_region(c(114.0, 32.0), c(120.0, 40.0));
        scene.draw_region(c(0.0, 0.0), c(1.0, 1.0));

        scene.double_click(c(117.0, 36.0));

        assert!(scene.regions().is_empty());
        assert_eq!(scene.view().center, c(117.0, 36.0));
        assert_eq!(scene.view().zoom, DEFAULT_ZOOM + 1.0);

        let events = log.lock().unwrap();
        assert!(events.contains(&MapEvent::RegionsCleared { count: 2 }));
    }

    #[test]
    fn test_zoom_is_clamped() {
        let scene = MapScene::new();
        for _ in 0..30 {
            scene.double_click(DEFAULT_CENTER);
        }
        assert_eq!(scene.view().zoom, MAX_ZOOM);
    }

    #[test]
    fn test_region_corners_normalized() {
        let region = Region::from_corners(c(120.0, 40.0), c(114.0, 32.0));

        assert_eq!(region.min(), c(114.0, 32.0));
        assert_eq!(region.max(), c(120.0, 40.0));
        assert_eq!(region.center(), c(117.0, 36.0));
        assert!(region.contains(c(114.0, 35.0)));
        assert!(!region.contains(c(113.9, 35.0)));

        let ring = region.ring();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.first(), ring.last());
    }

    #[test]
    fn test_zoom_to_extent_recenters() {
        let scene = MapScene::new();
        scene.zoom_to_extent(&Region::from_corners(c(114.0, 32.0), c(120.0, 40.0)));

        assert_eq!(scene.view().center, c(117.0, 36.0));
        assert_eq!(scene.view().zoom, DEFAULT_ZOOM);
    }

    #[test]
    fn test_base_layer_toggle_publishes_once() {
        let scene = MapScene::new();
        let log = record_events(&scene);

        scene.select_base_layer(BaseLayer::Gaode);
        scene.select_base_layer(BaseLayer::Gaode);

        assert_eq!(scene.base_layer(), BaseLayer::Gaode);
        assert_eq!(*log.lock().unwrap(), vec![MapEvent::BaseLayerChanged(BaseLayer::Gaode)]);
    }
}
