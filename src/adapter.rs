//! Minimalny interfejs biblioteki mapowej. Rdzeń zaznaczania i rysowania
//! widzi mapę wyłącznie przez ten trait.

use geo::Rect;

use crate::data::{LatLng, ScreenPoint};
use crate::layers::{Layer, LayerId};
use crate::tiles::TileLayer;

pub trait MapAdapter {
    /// Dodaje warstwę na wierzch.
    fn add_layer(&mut self, layer: &Layer);
    fn remove_layer(&mut self, id: LayerId);
    /// Zmiana stylu, klas albo geometrii już dodanej warstwy.
    fn update_layer(&mut self, layer: &Layer);
    fn fit_bounds(&mut self, bounds: Rect<f64>, animate: bool);
    fn center(&self) -> LatLng;
    fn lat_lng_to_container_point(&self, point: LatLng) -> ScreenPoint;
    fn container_point_to_lat_lng(&self, point: ScreenPoint) -> LatLng;
    /// Szerokość i wysokość kontenera w pikselach.
    fn container_size(&self) -> ScreenPoint;
    fn set_dragging(&mut self, enabled: bool);
    fn set_tile_layers(&mut self, layers: &[TileLayer]);
    fn set_container_class(&mut self, class: &str, enabled: bool);
}

/// Licznik identyfikatorów warstw w obrębie jednej sesji.
#[derive(Debug, Default)]
pub struct LayerIds {
    next: u64,
}

impl LayerIds {
    pub fn next(&mut self) -> LayerId {
        self.next += 1;
        LayerId(self.next)
    }
}
