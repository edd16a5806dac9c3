//! Rejestr warstw: obszary ładowane raz na sesję, sieci ładowane leniwie
//! pod aktywnym obszarem, podświetlenie i nakładka przyciemniająca.

use futures_util::future::join_all;
use geo::{BoundingRect, Coord, LineString, Polygon, Rect};
use geojson::GeoJson;
use std::collections::BTreeSet;

use crate::adapter::{LayerIds, MapAdapter};
use crate::data::{AreaCatalog, AreaInfo};
use crate::error::{MapError, MapResult};
use crate::geometry::{flatten_to_rings, geometry_has_filled_surface, union_bounds};
use crate::source::{GeoSource, area_url, network_urls};

pub const NETWORK_HIGHLIGHT_CLASS: &str = "highlighted-network";
pub const NO_FILL_CLASS: &str = "no-fill";
pub const SPOTLIGHT_CLASS: &str = "spotlight-overlay";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerKind {
    Area,
    Network,
    Spotlight,
    Drawing,
    HitPane,
    Marker,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Pane {
    #[default]
    Overlay,
    /// Własny panel rysunków (półprzezroczysty, nad nakładkami).
    Drawing,
    Markers,
}

/// Sposób malowania warstwy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Paint {
    pub pane: Pane,
    pub visible: bool,
    pub interactive: bool,
    /// Grubość linii w pikselach.
    pub weight: f64,
}

impl Default for Paint {
    fn default() -> Self {
        Self {
            pane: Pane::Overlay,
            visible: true,
            interactive: true,
            weight: 3.0,
        }
    }
}

impl Paint {
    /// Obecna na mapie, ale niewidoczna i nieklikalna.
    pub fn hidden() -> Self {
        Self {
            visible: false,
            interactive: false,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LayerFeature {
    pub geometry: geo::Geometry<f64>,
    pub filled: bool,
}

/// Wyrenderowany obiekt mapy oznaczony identyfikatorem z katalogu.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub id: LayerId,
    pub kind: LayerKind,
    pub unique_id: String,
    pub features: Vec<LayerFeature>,
    /// Klasa stylu przywracana po odznaczeniu.
    pub original_style: String,
    pub style_override: Option<String>,
    pub classes: BTreeSet<String>,
    pub paint: Paint,
}

impl Layer {
    pub fn new(
        id: LayerId,
        kind: LayerKind,
        unique_id: impl Into<String>,
        original_style: impl Into<String>,
        paint: Paint,
    ) -> Self {
        Self {
            id,
            kind,
            unique_id: unique_id.into(),
            features: Vec::new(),
            original_style: original_style.into(),
            style_override: None,
            classes: BTreeSet::new(),
            paint,
        }
    }

    pub fn with_geometry(mut self, geometry: geo::Geometry<f64>, filled: bool) -> Self {
        self.features.push(LayerFeature { geometry, filled });
        self
    }

    pub fn extend_from_geojson(&mut self, data: GeoJson) -> MapResult<()> {
        self.features.extend(features_from_geojson(data)?);
        Ok(())
    }

    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.features
            .iter()
            .filter_map(|f| f.geometry.bounding_rect())
            .reduce(union_bounds)
    }

    /// Powierzchniowa, jeśli każdy obiekt ma wypełnienie.
    pub fn is_area_based(&self) -> bool {
        !self.features.is_empty() && self.features.iter().all(|f| f.filled)
    }

    /// Klasa CSS obiektu: nadpisanie, albo styl oryginalny z `-nofill`
    /// dla geometrii liniowych.
    pub fn feature_class(&self, feature: &LayerFeature) -> String {
        match &self.style_override {
            Some(class) => class.clone(),
            None if !self.paint.visible => String::new(),
            None if feature.filled => self.original_style.clone(),
            None => format!("{}-nofill", self.original_style),
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }
}

pub fn features_from_geojson(data: GeoJson) -> MapResult<Vec<LayerFeature>> {
    let raw: Vec<Option<geojson::Geometry>> = match data {
        GeoJson::FeatureCollection(fc) => fc.features.into_iter().map(|f| f.geometry).collect(),
        GeoJson::Feature(f) => vec![f.geometry],
        GeoJson::Geometry(_) => {
            return Err(MapError::Geometry(
                "expected a Feature or FeatureCollection".into(),
            ));
        }
    };
    raw.into_iter()
        .flatten()
        .map(|g| {
            let filled = geometry_has_filled_surface(Some(&g));
            let geometry: geo::Geometry<f64> = g.value.try_into()?;
            Ok(LayerFeature { geometry, filled })
        })
        .collect()
}

/// Ładuje warstwy wszystkich obszarów równolegle. Nieudany obszar jest
/// logowany i pomijany.
pub async fn fetch_area_layers<S: GeoSource>(
    source: &S,
    source_domain: &str,
    areas: &[AreaInfo],
    ids: &mut LayerIds,
    paint: Paint,
) -> Vec<Layer> {
    let fetched = join_all(areas.iter().map(|area| {
        let url = area_url(source_domain, area);
        async move {
            let result = source.fetch_geojson(&url).await;
            (url, result)
        }
    }))
    .await;

    let mut layers = Vec::new();
    for (area, (url, result)) in areas.iter().zip(fetched) {
        let data = match result {
            Ok(data) => data,
            Err(err) => {
                log::error!("error fetching area geojson {}: {}", url, err);
                continue;
            }
        };
        let mut layer = Layer::new(ids.next(), LayerKind::Area, &area.unique_id, &area.map_style, paint);
        if let Err(err) = layer.extend_from_geojson(data) {
            log::error!("invalid area geojson {}: {}", url, err);
            continue;
        }
        layers.push(layer);
    }
    layers
}

#[derive(Clone, Debug, PartialEq)]
pub struct NetworkRequest {
    pub network_id: String,
    pub urls: Vec<String>,
}

/// Zlecenie załadowania sieci dla obszaru, ważne tylko w swojej generacji.
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkLoadPlan {
    pub area_id: String,
    pub area_layer: LayerId,
    pub style: String,
    pub generation: u64,
    pub requests: Vec<NetworkRequest>,
}

#[derive(Debug)]
pub struct FetchedNetwork {
    pub network_id: String,
    pub parts: Vec<GeoJson>,
}

/// Pobiera wszystkie pliki wszystkich sieci równolegle; błąd jednego pliku
/// nie przerywa pozostałych.
pub async fn fetch_network_layers<S: GeoSource>(
    source: &S,
    plan: &NetworkLoadPlan,
) -> Vec<FetchedNetwork> {
    let fetches = plan.requests.iter().map(|req| async move {
        let results = join_all(req.urls.iter().map(|url| async move {
            (url, source.fetch_geojson(url).await)
        }))
        .await;
        let parts = results
            .into_iter()
            .filter_map(|(url, result)| match result {
                Ok(data) => Some(data),
                Err(err) => {
                    log::error!("error fetching network geojson {}: {}", url, err);
                    None
                }
            })
            .collect();
        FetchedNetwork {
            network_id: req.network_id.clone(),
            parts,
        }
    });
    join_all(fetches)
        .await
        .into_iter()
        .filter(|f| !f.parts.is_empty())
        .collect()
}

#[derive(Debug, Default)]
pub struct LayerRegistry {
    area_layers: Vec<Layer>,
    network_layers: Vec<Layer>,
    active_area: Option<LayerId>,
    active_network: Option<LayerId>,
    spotlight: Option<Layer>,
    generation: u64,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dodaje warstwy obszarów do mapy; zwraca sumę ich granic.
    pub fn install_area_layers<M: MapAdapter>(
        &mut self,
        layers: Vec<Layer>,
        map: &mut M,
    ) -> Option<Rect<f64>> {
        for layer in &layers {
            map.add_layer(layer);
        }
        self.area_layers = layers;
        self.all_bounds()
    }

    pub fn all_bounds(&self) -> Option<Rect<f64>> {
        self.area_layers
            .iter()
            .filter_map(Layer::bounds)
            .reduce(union_bounds)
    }

    pub fn area_layers(&self) -> &[Layer] {
        &self.area_layers
    }

    pub fn network_layers(&self) -> &[Layer] {
        &self.network_layers
    }

    pub fn area(&self, id: LayerId) -> Option<&Layer> {
        self.area_layers.iter().find(|l| l.id == id)
    }

    pub fn area_by_unique_id(&self, unique_id: &str) -> Option<&Layer> {
        self.area_layers.iter().find(|l| l.unique_id == unique_id)
    }

    pub fn network(&self, id: LayerId) -> Option<&Layer> {
        self.network_layers.iter().find(|l| l.id == id)
    }

    pub fn network_by_unique_id(&self, unique_id: &str) -> Option<&Layer> {
        self.network_layers.iter().find(|l| l.unique_id == unique_id)
    }

    pub fn active_area(&self) -> Option<&Layer> {
        self.active_area.and_then(|id| self.area(id))
    }

    pub fn active_network(&self) -> Option<&Layer> {
        self.active_network.and_then(|id| self.network(id))
    }

    pub fn spotlight(&self) -> Option<&Layer> {
        self.spotlight.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn area_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.area_layers.iter_mut().find(|l| l.id == id)
    }

    fn network_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.network_layers.iter_mut().find(|l| l.id == id)
    }

    /// Ustawia obszar aktywny z klasą `no-fill`, tak żeby nakładka była
    /// widoczna przez niego.
    pub fn activate_area<M: MapAdapter>(&mut self, id: LayerId, map: &mut M) -> bool {
        let Some(layer) = self.area_mut(id) else {
            return false;
        };
        layer.style_override = Some(NO_FILL_CLASS.to_string());
        map.update_layer(layer);
        self.active_area = Some(id);
        self.generation += 1;
        true
    }

    /// Przywraca styl aktywnego obszaru i usuwa jego sieci.
    pub fn deactivate_area<M: MapAdapter>(&mut self, map: &mut M) {
        if let Some(id) = self.active_area.take() {
            if let Some(layer) = self.area_mut(id) {
                layer.style_override = None;
                map.update_layer(layer);
            }
            self.remove_network_layers(map);
        }
        self.generation += 1;
    }

    pub fn remove_network_layers<M: MapAdapter>(&mut self, map: &mut M) {
        self.active_network = None;
        for layer in self.network_layers.drain(..) {
            map.remove_layer(layer.id);
        }
        self.generation += 1;
    }

    /// Przenosi klasę podświetlenia na nową warstwę sieci. Nic nie robi,
    /// gdy warstwa już jest aktywna.
    pub fn set_active_network_layer<M: MapAdapter>(&mut self, id: Option<LayerId>, map: &mut M) {
        if self.active_network == id {
            return;
        }
        let prev = self.active_network.take();
        if let Some(layer) = prev.and_then(|prev| self.network_mut(prev)) {
            layer.classes.remove(NETWORK_HIGHLIGHT_CLASS);
            map.update_layer(layer);
        }
        if let Some(layer) = id.and_then(|id| self.network_mut(id)) {
            layer.classes.insert(NETWORK_HIGHLIGHT_CLASS.to_string());
            map.update_layer(layer);
            let active = layer.id;
            self.active_network = Some(active);
        }
    }

    /// Plan pobrania sieci aktywnego obszaru (tylko sieci z plikiem mapy).
    pub fn plan_network_load(
        &self,
        catalog: &AreaCatalog,
        source_domain: &str,
    ) -> Option<NetworkLoadPlan> {
        let area_layer = self.active_area()?;
        let area = catalog.area(&area_layer.unique_id)?;
        let requests = area
            .networks
            .iter()
            .filter_map(|network| {
                let urls = network_urls(source_domain, network);
                (!urls.is_empty()).then(|| NetworkRequest {
                    network_id: network.unique_id.clone(),
                    urls,
                })
            })
            .collect();
        Some(NetworkLoadPlan {
            area_id: area_layer.unique_id.clone(),
            area_layer: area_layer.id,
            style: area_layer.original_style.clone(),
            generation: self.generation,
            requests,
        })
    }

    /// Dołącza pobrane sieci, jeśli plan wciąż dotyczy aktywnego obszaru.
    /// Warstwy powierzchniowe idą pod liniowe.
    pub fn attach_network_layers<M: MapAdapter>(
        &mut self,
        plan: &NetworkLoadPlan,
        fetched: Vec<FetchedNetwork>,
        ids: &mut LayerIds,
        paint: Paint,
        map: &mut M,
    ) -> usize {
        if plan.generation != self.generation || self.active_area != Some(plan.area_layer) {
            log::debug!(
                "dropping stale network load for area {} (generation {} != {})",
                plan.area_id,
                plan.generation,
                self.generation
            );
            return 0;
        }

        let mut area_based = Vec::new();
        let mut line_based = Vec::new();
        for network in fetched {
            let mut layer = Layer::new(
                ids.next(),
                LayerKind::Network,
                &network.network_id,
                &plan.style,
                paint,
            );
            for part in network.parts {
                if let Err(err) = layer.extend_from_geojson(part) {
                    log::error!("invalid network geojson for {}: {}", network.network_id, err);
                }
            }
            if layer.features.is_empty() {
                continue;
            }
            if layer.is_area_based() {
                area_based.push(layer);
            } else {
                line_based.push(layer);
            }
        }

        let count = area_based.len() + line_based.len();
        for layer in area_based.into_iter().chain(line_based) {
            map.add_layer(&layer);
            self.network_layers.push(layer);
        }
        count
    }

    /// Nakładka przyciemniająca: wielokąt obejmujący cały świat z dziurami
    /// w kształcie aktywnego obszaru.
    pub fn apply_spotlight<M: MapAdapter>(&mut self, ids: &mut LayerIds, map: &mut M) {
        self.remove_spotlight(map);
        let Some(area) = self.active_area() else {
            return;
        };
        let holes: Vec<LineString<f64>> = area
            .features
            .iter()
            .flat_map(|f| flatten_to_rings(&f.geometry))
            .collect();
        if holes.is_empty() {
            log::error!("no polygon rings in area {} for the spotlight", area.unique_id);
            return;
        }
        let world = LineString::from(vec![
            Coord { x: -180.0, y: 90.0 },
            Coord { x: 180.0, y: 90.0 },
            Coord { x: 180.0, y: -90.0 },
            Coord { x: -180.0, y: -90.0 },
            Coord { x: -180.0, y: 90.0 },
        ]);
        let overlay = Layer::new(
            ids.next(),
            LayerKind::Spotlight,
            "",
            SPOTLIGHT_CLASS,
            Paint {
                interactive: false,
                ..Paint::default()
            },
        )
        .with_geometry(geo::Geometry::Polygon(Polygon::new(world, holes)), true);
        map.add_layer(&overlay);
        self.spotlight = Some(overlay);
    }

    pub fn remove_spotlight<M: MapAdapter>(&mut self, map: &mut M) {
        if let Some(overlay) = self.spotlight.take() {
            map.remove_layer(overlay.id);
        }
    }
}
