use serde::{Deserialize, Serialize};
use serde_json::from_slice;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::MapResult;

/// Tryb pracy mapy: przeglądanie, stawianie znaczników albo rysowanie.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MapMode {
    #[default]
    Browse,
    LocationMarkers,
    LocationDraw,
}

impl MapMode {
    pub const LOCATION_MARKERS: &'static str = "location-markers";
    pub const LOCATION_DRAW: &'static str = "location-draw";

    /// Nieznane wartości dają tryb domyślny.
    pub fn parse(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            Self::LOCATION_MARKERS => MapMode::LocationMarkers,
            Self::LOCATION_DRAW => MapMode::LocationDraw,
            _ => MapMode::Browse,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MapMode::Browse => "",
            MapMode::LocationMarkers => Self::LOCATION_MARKERS,
            MapMode::LocationDraw => Self::LOCATION_DRAW,
        }
    }
}

/// Punkt geograficzny w kolejności Leafleta.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<LatLng> for geo::Point<f64> {
    fn from(p: LatLng) -> Self {
        geo::Point::new(p.lng, p.lat)
    }
}

impl From<LatLng> for geo::Coord<f64> {
    fn from(p: LatLng) -> Self {
        geo::Coord { x: p.lng, y: p.lat }
    }
}

impl From<geo::Coord<f64>> for LatLng {
    fn from(c: geo::Coord<f64>) -> Self {
        LatLng { lat: c.y, lng: c.x }
    }
}

impl From<geo::Point<f64>> for LatLng {
    fn from(p: geo::Point<f64>) -> Self {
        LatLng { lat: p.y(), lng: p.x() }
    }
}

/// Punkt w pikselach kontenera mapy.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &ScreenPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Sieć (grupa sprzątająca) wewnątrz obszaru.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub unique_id: String,
    pub full_name: String,
    #[serde(default)]
    pub map_source: String,
    #[serde(default)]
    pub map_file: Option<String>,
}

impl NetworkInfo {
    /// Pliki GeoJSON sieci; `mapFile` może zawierać kilka nazw rozdzielonych `|`.
    pub fn map_files(&self) -> Vec<String> {
        let file = match self.map_file.as_deref() {
            Some(f) if f != "-" && f.to_lowercase().ends_with("json") => f.to_string(),
            _ if self.map_source == "custom" => format!("{}.json", self.unique_id),
            _ => return Vec::new(),
        };
        file.split('|')
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Obszar (dystrykt) z katalogu.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaInfo {
    pub unique_id: String,
    pub full_name: String,
    pub map_name: String,
    pub map_style: String,
    #[serde(default)]
    pub networks: Vec<NetworkInfo>,
}

/// Zaznaczenie przekazane przez stronę osadzającą.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSelection {
    #[serde(default)]
    pub district_id: Option<String>,
    #[serde(default)]
    pub network_id: Option<String>,
}

/// Katalog obszarów wczytywany raz na sesję.
#[derive(Clone, Debug, Default)]
pub struct AreaCatalog {
    areas: Vec<AreaInfo>,
}

impl AreaCatalog {
    pub fn new(areas: Vec<AreaInfo>) -> Self {
        Self { areas }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> MapResult<Self> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let data = fs::read(&path)?;
        let areas: Vec<AreaInfo> = from_slice(&data)?;
        log::info!("loaded {} areas from {}", areas.len(), path.display());
        Ok(Self { areas })
    }

    pub fn areas(&self) -> &[AreaInfo] {
        &self.areas
    }

    pub fn area(&self, unique_id: &str) -> Option<&AreaInfo> {
        self.areas.iter().find(|a| a.unique_id == unique_id)
    }

    pub fn network(&self, area_id: &str, network_id: &str) -> Option<&NetworkInfo> {
        self.area(area_id)?
            .networks
            .iter()
            .find(|n| n.unique_id == network_id)
    }

    pub fn area_full_name(&self, unique_id: &str) -> Option<String> {
        self.area(unique_id).map(|a| a.full_name.clone())
    }

    pub fn network_full_name(&self, area_id: &str, network_id: &str) -> Option<String> {
        self.network(area_id, network_id).map(|n| n.full_name.clone())
    }
}
