//! Atrapy mapy i źródła danych dla testów jednostkowych.

use geo::Rect;
use geojson::GeoJson;
use std::{
    cell::RefCell,
    collections::{BTreeSet, HashMap},
    rc::Rc,
    str::FromStr,
};

use crate::adapter::MapAdapter;
use crate::bridge::{SessionEvent, SessionObserver};
use crate::data::{AreaCatalog, AreaInfo, LatLng, NetworkInfo, ScreenPoint};
use crate::error::{MapError, MapResult};
use crate::layers::{Layer, LayerId};
use crate::source::{GeoSource, SnapRequest, SnapResponse, SnappedLocation};
use crate::tiles::TileLayer;

pub fn area_json(x0: f64, y0: f64, size: f64) -> String {
    format!(
        r#"{{"type":"FeatureCollection","features":[{{"type":"Feature","properties":{{}},
            "geometry":{{"type":"Polygon","coordinates":[[[{x0},{y0}],[{x1},{y0}],[{x1},{y1}],[{x0},{y1}],[{x0},{y0}]]]}}}}]}}"#,
        x0 = x0,
        y0 = y0,
        x1 = x0 + size,
        y1 = y0 + size
    )
}

pub fn line_json(x0: f64, y0: f64) -> String {
    format!(
        r#"{{"type":"Feature","properties":{{}},
            "geometry":{{"type":"LineString","coordinates":[[{x0},{y0}],[{x1},{y1}]]}}}}"#,
        x0 = x0,
        y0 = y0,
        x1 = x0 + 0.1,
        y1 = y0 + 0.1
    )
}

fn network(id: &str, source: &str, file: Option<&str>) -> NetworkInfo {
    NetworkInfo {
        unique_id: id.into(),
        full_name: format!("Network {}", id),
        map_source: source.into(),
        map_file: file.map(str::to_string),
    }
}

pub fn areas() -> Vec<AreaInfo> {
    vec![
        AreaInfo {
            unique_id: "d1".into(),
            full_name: "District One".into(),
            map_name: "d1".into(),
            map_style: "blue".into(),
            networks: vec![
                network("n-area", "custom", None),
                network("n-line", "osm", Some("l1.json|l2.json")),
                network("n-missing", "osm", Some("gone.json")),
                network("n-nomap", "osm", Some("-")),
            ],
        },
        AreaInfo {
            unique_id: "d2".into(),
            full_name: "District Two".into(),
            map_name: "d2".into(),
            map_style: "green".into(),
            networks: vec![network("n2", "custom", None)],
        },
    ]
}

pub fn catalog() -> AreaCatalog {
    AreaCatalog::new(areas())
}

/// Źródło w pamięci; nieznane adresy dają 404.
#[derive(Default)]
pub struct FakeSource {
    files: HashMap<String, String>,
    pub snap: Option<SnapResponse>,
    pub fetches: RefCell<Vec<String>>,
    pub snaps: RefCell<Vec<SnapRequest>>,
}

impl FakeSource {
    pub fn standard() -> Self {
        let mut files = HashMap::new();
        files.insert("/maps/areas/d1.json".to_string(), area_json(0.0, 0.0, 1.0));
        files.insert("/maps/areas/d2.json".to_string(), area_json(2.0, 0.0, 1.0));
        files.insert("/maps/custom/n-area.json".to_string(), area_json(0.2, 0.2, 0.3));
        files.insert("/maps/osm/l1.json".to_string(), line_json(0.5, 0.5));
        files.insert("/maps/osm/l2.json".to_string(), line_json(0.6, 0.5));
        files.insert("/maps/custom/n2.json".to_string(), area_json(2.2, 0.2, 0.3));
        Self {
            files,
            ..Self::default()
        }
    }

    pub fn without(mut self, url: &str) -> Self {
        self.files.remove(url);
        self
    }

    /// Serwis zwraca podane punkty z jedną nazwą ścieżki.
    pub fn snapping(mut self, points: &[LatLng]) -> Self {
        self.snap = Some(SnapResponse {
            locations: points
                .iter()
                .map(|p| SnappedLocation {
                    location: [p.lng, p.lat],
                    name: Some("Footpath".into()),
                })
                .collect(),
        });
        self
    }
}

impl GeoSource for FakeSource {
    async fn fetch_geojson(&self, url: &str) -> MapResult<GeoJson> {
        self.fetches.borrow_mut().push(url.to_string());
        let body = self.files.get(url).ok_or_else(|| MapError::Status {
            url: url.to_string(),
            status: 404,
        })?;
        Ok(GeoJson::from_str(body)?)
    }

    async fn snap_route(&self, request: &SnapRequest) -> MapResult<SnapResponse> {
        self.snaps.borrow_mut().push(request.clone());
        self.snap.clone().ok_or_else(|| MapError::Status {
            url: "/api/maps/snap-route".into(),
            status: 500,
        })
    }
}

/// Mapa zapisująca wywołania; rzutowanie liniowe wokół `view_center`.
pub struct RecordingMap {
    pub layers: Vec<Layer>,
    pub removed: Vec<LayerId>,
    pub updates: usize,
    pub fits: Vec<(Rect<f64>, bool)>,
    pub dragging: bool,
    pub tiles: Vec<TileLayer>,
    pub container_classes: BTreeSet<String>,
    pub view_center: LatLng,
    pub px_per_degree: f64,
}

impl Default for RecordingMap {
    fn default() -> Self {
        Self {
            layers: Vec::new(),
            removed: Vec::new(),
            updates: 0,
            fits: Vec::new(),
            dragging: true,
            tiles: Vec::new(),
            container_classes: BTreeSet::new(),
            view_center: LatLng::new(0.0, 0.0),
            // ~1 px na 1.1 m
            px_per_degree: 100_000.0,
        }
    }
}

impl RecordingMap {
    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }
}

impl MapAdapter for RecordingMap {
    fn add_layer(&mut self, layer: &Layer) {
        self.layers.push(layer.clone());
    }

    fn remove_layer(&mut self, id: LayerId) {
        self.layers.retain(|l| l.id != id);
        self.removed.push(id);
    }

    fn update_layer(&mut self, layer: &Layer) {
        self.updates += 1;
        if let Some(existing) = self.layers.iter_mut().find(|l| l.id == layer.id) {
            *existing = layer.clone();
        }
    }

    fn fit_bounds(&mut self, bounds: Rect<f64>, animate: bool) {
        self.fits.push((bounds, animate));
    }

    fn center(&self) -> LatLng {
        self.view_center
    }

    fn lat_lng_to_container_point(&self, point: LatLng) -> ScreenPoint {
        ScreenPoint::new(
            (point.lng - self.view_center.lng) * self.px_per_degree + 400.0,
            (self.view_center.lat - point.lat) * self.px_per_degree + 300.0,
        )
    }

    fn container_size(&self) -> ScreenPoint {
        ScreenPoint::new(800.0, 600.0)
    }

    fn container_point_to_lat_lng(&self, point: ScreenPoint) -> LatLng {
        LatLng::new(
            self.view_center.lat - (point.y - 300.0) / self.px_per_degree,
            self.view_center.lng + (point.x - 400.0) / self.px_per_degree,
        )
    }

    fn set_dragging(&mut self, enabled: bool) {
        self.dragging = enabled;
    }

    fn set_tile_layers(&mut self, layers: &[TileLayer]) {
        self.tiles = layers.to_vec();
    }

    fn set_container_class(&mut self, class: &str, enabled: bool) {
        if enabled {
            self.container_classes.insert(class.to_string());
        } else {
            self.container_classes.remove(class);
        }
    }
}

/// Obserwator zbierający zdarzenia do wspólnego wektora.
pub fn recorder() -> (Rc<RefCell<Vec<SessionEvent>>>, Box<dyn SessionObserver>) {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    (
        events,
        Box::new(move |event: &SessionEvent| sink.borrow_mut().push(event.clone())),
    )
}
