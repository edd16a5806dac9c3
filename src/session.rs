//! Sesja mapy: cały stan jednej instancji mapy i rozdział zdarzeń
//! wejściowych między zaznaczanie, rysowanie i znaczniki.

use std::time::{Duration, Instant};

use crate::adapter::{LayerIds, MapAdapter};
use crate::bridge::{EventBus, SessionEvent, SessionObserver};
use crate::data::{AreaCatalog, CurrentSelection, LatLng, MapMode};
use crate::drawing::{DrawingEngine, MarkerSet, PendingStroke, PointerEvent, StrokeOutcome};
use crate::geometry::{
    ALL_BOUNDS_SCALE, AREA_BOUNDS_SCALE, NETWORK_BOUNDS_SCALE, scale_bounds,
};
use crate::layers::{
    FetchedNetwork, LayerId, LayerRegistry, NetworkLoadPlan, Paint, fetch_area_layers,
    fetch_network_layers,
};
use crate::source::{GeoSource, snap_points};
use crate::tiles::{BaseView, SATELLITE_FILTER_CLASS};

pub const STREET_VIEW_TIMEOUT: Duration = Duration::from_secs(5);

pub fn street_view_url(at: LatLng) -> String {
    format!(
        "https://www.google.com/maps/@?api=1&map_action=pano&viewpoint={},{}",
        at.lat, at.lng
    )
}

/// Parametry `createMap`.
#[derive(Clone, Debug)]
pub struct MapConfig {
    pub mode: MapMode,
    pub source_domain: String,
    pub show_networks: bool,
    pub current_selection: Option<CurrentSelection>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            mode: MapMode::Browse,
            source_domain: String::new(),
            show_networks: true,
            current_selection: None,
        }
    }
}

/// Stan przycisków mapy. `None` oznacza przycisk nieobecny w tym trybie,
/// `Some(false)` przycisk wyszarzony.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlState {
    pub frame_all: bool,
    pub frame_area: Option<bool>,
    pub frame_network: Option<bool>,
    pub snap_label: Option<&'static str>,
    pub base_view_label: &'static str,
    pub street_view_armed: bool,
}

/// Praca asynchroniczna zlecona przez sesję.
#[derive(Clone, Debug, PartialEq)]
pub enum PendingWork {
    Networks(NetworkLoadPlan),
    Snap(PendingStroke),
}

#[derive(Debug)]
pub enum WorkResult {
    Networks(NetworkLoadPlan, Vec<FetchedNetwork>),
    Snap {
        polyline: LayerId,
        snapped: Option<Vec<LatLng>>,
    },
}

/// Wykonuje zlecenie bez dostępu do sesji, tak że wiele zleceń może
/// biec równolegle.
pub async fn perform<S: GeoSource>(source: &S, work: PendingWork) -> WorkResult {
    match work {
        PendingWork::Networks(plan) => {
            let fetched = fetch_network_layers(source, &plan).await;
            WorkResult::Networks(plan, fetched)
        }
        PendingWork::Snap(stroke) => {
            let snapped = match snap_points(source, &stroke.points).await {
                Ok(points) => Some(points),
                Err(err) => {
                    log::error!("error snapping polyline to footpaths: {}", err);
                    None
                }
            };
            WorkResult::Snap {
                polyline: stroke.polyline,
                snapped,
            }
        }
    }
}

pub struct MapSession<M: MapAdapter> {
    pub(crate) map: M,
    pub(crate) config: MapConfig,
    pub(crate) catalog: AreaCatalog,
    pub(crate) registry: LayerRegistry,
    pub(crate) ids: LayerIds,
    pub(crate) events: EventBus,
    drawing: DrawingEngine,
    markers: MarkerSet,
    base_view: BaseView,
    street_view_deadline: Option<Instant>,
    street_view: Option<String>,
}

impl<M: MapAdapter> MapSession<M> {
    /// Pusta sesja: podkład i tryb, bez warstw.
    pub fn new(mut map: M, config: MapConfig, catalog: AreaCatalog) -> Self {
        let base_view = BaseView::default();
        map.set_tile_layers(&base_view.layers());
        let mut drawing = DrawingEngine::default();
        if config.mode == MapMode::LocationDraw {
            drawing.enable(&mut map);
        }
        Self {
            map,
            config,
            catalog,
            registry: LayerRegistry::new(),
            ids: LayerIds::default(),
            events: EventBus::default(),
            drawing,
            markers: MarkerSet::default(),
            base_view,
            street_view_deadline: None,
            street_view: None,
        }
    }

    /// Tworzy mapę: ładuje obszary, kadruje całość i odtwarza zaznaczenie.
    pub async fn create_map<S: GeoSource>(
        map: M,
        config: MapConfig,
        catalog: AreaCatalog,
        source: &S,
    ) -> Self {
        let selection = config.current_selection.clone();
        let mut session = Self::new(map, config, catalog);
        session.load_areas(source).await;
        if let Some(selection) = selection {
            session.apply_selection(source, &selection).await;
        }
        session
    }

    pub async fn load_areas<S: GeoSource>(&mut self, source: &S) {
        let paint = self.layer_paint();
        let layers = fetch_area_layers(
            source,
            &self.config.source_domain,
            self.catalog.areas(),
            &mut self.ids,
            paint,
        )
        .await;
        log::info!(
            "loaded {} of {} areas",
            layers.len(),
            self.catalog.areas().len()
        );
        if let Some(bounds) = self.registry.install_area_layers(layers, &mut self.map) {
            self.map.fit_bounds(scale_bounds(bounds, ALL_BOUNDS_SCALE), false);
        }
    }

    pub fn subscribe(&mut self, observer: Box<dyn SessionObserver>) {
        self.events.subscribe(observer);
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut M {
        &mut self.map
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn catalog(&self) -> &AreaCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    pub fn drawing(&self) -> &DrawingEngine {
        &self.drawing
    }

    pub fn markers(&self) -> &MarkerSet {
        &self.markers
    }

    pub fn base_view(&self) -> BaseView {
        self.base_view
    }

    // poza trybem domyślnym warstwy są obecne, ale niewidoczne
    fn layer_paint(&self) -> Paint {
        if self.config.mode == MapMode::Browse {
            Paint::default()
        } else {
            Paint::hidden()
        }
    }

    fn areas_clickable(&self) -> bool {
        self.config.mode == MapMode::Browse && self.config.show_networks
    }

    /// Kliknięcie w warstwę. Warstwa bez obsługi przekazuje kliknięcie mapie.
    pub fn click_layer(&mut self, id: LayerId, at: LatLng) -> Option<PendingWork> {
        if self.street_view_deadline.is_some() {
            self.pick_street_view(at);
            return None;
        }
        let mode = self.config.mode;
        match mode {
            MapMode::LocationDraw if self.drawing.click_layer(id, &mut self.map) => {
                self.emit_user_data();
                return None;
            }
            MapMode::LocationMarkers if self.markers.remove_marker(id, &mut self.map) => {
                self.emit_user_data();
                return None;
            }
            MapMode::Browse if self.registry.network(id).is_some() => {
                self.click_network(id, at);
                return None;
            }
            MapMode::Browse if self.areas_clickable() && self.registry.area(id).is_some() => {
                return self.click_area(id, at);
            }
            _ => {}
        }
        self.click_map(at);
        None
    }

    /// Kliknięcie w tło mapy.
    pub fn click_map(&mut self, at: LatLng) {
        if self.street_view_deadline.is_some() {
            self.pick_street_view(at);
            return;
        }
        if self.config.mode == MapMode::LocationMarkers {
            self.markers.drop_marker(at, &mut self.ids, &mut self.map);
            self.emit_user_data();
        }
        self.click_background(at);
    }

    pub fn double_click_layer(&mut self, id: LayerId) {
        if self.config.mode != MapMode::Browse {
            return;
        }
        if self.registry.network(id).is_some() {
            self.double_click_network(id);
        } else {
            self.double_click_area(id);
        }
    }

    pub fn drag_marker(&mut self, id: LayerId, to: LatLng) {
        if self.markers.move_marker(id, to, &mut self.map) {
            self.emit_user_data();
        }
    }

    fn drawing_enabled(&self) -> bool {
        self.config.mode == MapMode::LocationDraw
    }

    pub fn pointer_down(&mut self, event: PointerEvent) {
        if !self.drawing_enabled() {
            return;
        }
        self.drawing.dismiss_offer();
        self.drawing.pointer_down(event, &mut self.ids, &mut self.map);
    }

    pub fn pointer_move(&mut self, event: PointerEvent) {
        if self.drawing_enabled() {
            self.drawing.pointer_move(event, &mut self.map);
        }
    }

    pub fn pointer_end(&mut self, event: PointerEvent) -> Option<PendingWork> {
        if !self.drawing_enabled() {
            return None;
        }
        let outcome = self.drawing.pointer_end(event, &mut self.map);
        self.after_stroke(outcome)
    }

    pub fn pointer_cancel(&mut self, event: PointerEvent) -> Option<PendingWork> {
        if !self.drawing_enabled() {
            return None;
        }
        let outcome = self.drawing.pointer_cancel(event, &mut self.map);
        self.after_stroke(outcome)
    }

    pub fn key_space(&mut self, pressed: bool) {
        if !self.drawing_enabled() {
            return;
        }
        if pressed {
            self.drawing.key_down_space(&mut self.map);
        } else {
            self.drawing.key_up_space(&mut self.map);
        }
    }

    /// Obsługa zegarów: przytrzymanie dotyku i wygaśnięcie wyboru Street View.
    pub fn tick(&mut self, now: Instant) {
        if self.drawing_enabled() {
            self.drawing.tick(now, &mut self.ids, &mut self.map);
        }
        if self.street_view_deadline.is_some_and(|deadline| now >= deadline) {
            log::debug!("street view selection timed out");
            self.street_view_deadline = None;
        }
    }

    /// Najbliższy termin, na który trzeba wywołać `tick`.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.drawing.pending_deadline(), self.street_view_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn after_stroke(&mut self, outcome: StrokeOutcome) -> Option<PendingWork> {
        let StrokeOutcome::Kept(stroke) = outcome else {
            return None;
        };
        self.emit_user_data();
        if stroke.snap {
            return Some(PendingWork::Snap(stroke));
        }
        self.drawing
            .complete_stroke(stroke.polyline, None, &mut self.ids, &mut self.map);
        None
    }

    /// Przycisk "Make Area".
    pub fn make_area(&mut self) -> bool {
        if !self.drawing.make_area(&mut self.ids, &mut self.map) {
            return false;
        }
        self.emit_user_data();
        true
    }

    pub fn frame_all(&mut self) {
        if let Some(bounds) = self.registry.all_bounds() {
            self.map.fit_bounds(scale_bounds(bounds, ALL_BOUNDS_SCALE), true);
        }
    }

    pub fn frame_area(&mut self) {
        if let Some(bounds) = self.registry.active_area().and_then(|l| l.bounds()) {
            self.map.fit_bounds(scale_bounds(bounds, AREA_BOUNDS_SCALE), true);
        }
    }

    pub fn frame_network(&mut self) {
        if let Some(bounds) = self.registry.active_network().and_then(|l| l.bounds()) {
            self.map.fit_bounds(scale_bounds(bounds, NETWORK_BOUNDS_SCALE), true);
        }
    }

    pub fn controls(&self) -> ControlState {
        let browse = self.config.mode == MapMode::Browse;
        let framed = browse && self.config.show_networks;
        ControlState {
            frame_all: browse,
            frame_area: framed.then(|| self.registry.active_area().is_some()),
            frame_network: framed.then(|| self.registry.active_network().is_some()),
            snap_label: self.drawing_enabled().then(|| {
                if self.drawing.snap_enabled() {
                    "Disable Snap"
                } else {
                    "Enable Snap"
                }
            }),
            base_view_label: self.base_view.toggle_label(),
            street_view_armed: self.street_view_deadline.is_some(),
        }
    }

    pub fn toggle_base_view(&mut self) -> BaseView {
        self.base_view = self.base_view.toggled();
        self.map.set_tile_layers(&self.base_view.layers());
        self.map.set_container_class(
            SATELLITE_FILTER_CLASS,
            self.base_view == BaseView::Satellite,
        );
        self.base_view
    }

    pub fn toggle_snap(&mut self) -> bool {
        self.drawing.toggle_snap()
    }

    /// Następne kliknięcie w ciągu `STREET_VIEW_TIMEOUT` wybiera miejsce
    /// dla Street View.
    pub fn arm_street_view(&mut self, now: Instant) {
        self.street_view_deadline = Some(now + STREET_VIEW_TIMEOUT);
    }

    fn pick_street_view(&mut self, at: LatLng) {
        self.street_view_deadline = None;
        let url = street_view_url(at);
        log::info!("street view requested at {}", url);
        self.street_view = Some(url);
    }

    pub fn take_street_view(&mut self) -> Option<String> {
        self.street_view.take()
    }

    /// Nakłada wynik zlecenia na sesję.
    pub fn complete(&mut self, result: WorkResult) {
        match result {
            WorkResult::Networks(plan, fetched) => {
                let paint = self.layer_paint();
                let added = self.registry.attach_network_layers(
                    &plan,
                    fetched,
                    &mut self.ids,
                    paint,
                    &mut self.map,
                );
                log::debug!("attached {} network layers for {}", added, plan.area_id);
            }
            WorkResult::Snap { polyline, snapped } => {
                if self
                    .drawing
                    .complete_stroke(polyline, snapped, &mut self.ids, &mut self.map)
                {
                    self.emit_user_data();
                }
            }
        }
    }

    pub async fn settle<S: GeoSource>(&mut self, source: &S, work: PendingWork) {
        let result = perform(source, work).await;
        self.complete(result);
    }

    pub(crate) fn emit_user_data(&mut self) {
        let mut data = self.drawing.user_data();
        data.markers = self.markers.positions();
        match serde_json::to_string(&data) {
            Ok(json_data) => self.events.emit(SessionEvent::UserDataChanged { json_data }),
            Err(err) => log::error!("failed to serialize user data: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ScreenPoint;
    use crate::drawing::PointerKind;
    use crate::testing::{FakeSource, RecordingMap, catalog, recorder};
    use serde_json::Value;

    fn config(mode: MapMode) -> MapConfig {
        MapConfig {
            mode,
            ..MapConfig::default()
        }
    }

    async fn session(source: &FakeSource, mode: MapMode) -> MapSession<RecordingMap> {
        MapSession::create_map(RecordingMap::default(), config(mode), catalog(), source).await
    }

    fn mouse(x: f64, y: f64) -> PointerEvent {
        PointerEvent {
            pointer_id: 1,
            kind: PointerKind::Mouse,
            button: 0,
            position: ScreenPoint::new(x, y),
            at: Instant::now(),
        }
    }

    fn draw(s: &mut MapSession<RecordingMap>, path: &[(f64, f64)]) -> Option<PendingWork> {
        s.pointer_down(mouse(path[0].0, path[0].1));
        for &(x, y) in &path[1..] {
            s.pointer_move(mouse(x, y));
        }
        let (x, y) = path[path.len() - 1];
        s.pointer_end(mouse(x, y))
    }

    fn square_loop() -> Vec<(f64, f64)> {
        let mut path = Vec::new();
        for i in 0..50 {
            path.push((100.0 + i as f64 * 10.0, 100.0));
        }
        for i in 0..50 {
            path.push((600.0, 100.0 + i as f64 * 10.0));
        }
        for i in 0..50 {
            path.push((600.0 - i as f64 * 10.0, 600.0));
        }
        for i in 0..=50 {
            path.push((100.0, 600.0 - i as f64 * 10.0));
        }
        path
    }

    fn user_data(events: &[SessionEvent]) -> Vec<Value> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::UserDataChanged { json_data } => {
                    Some(serde_json::from_str(json_data).unwrap())
                }
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn create_map_frames_all_areas_and_skips_failed_ones() {
        let source = FakeSource::standard().without("/maps/areas/d2.json");
        let s = session(&source, MapMode::Browse).await;
        assert_eq!(s.registry().area_layers().len(), 1);
        let (bounds, animate) = s.map().fits[0];
        assert!(!animate);
        assert!((bounds.width() - 1.05).abs() < 1e-9);
        assert_eq!(s.map().tiles.len(), 1);
    }

    #[tokio::test]
    async fn create_map_applies_initial_selection() {
        let source = FakeSource::standard();
        let mut cfg = config(MapMode::Browse);
        cfg.current_selection = Some(CurrentSelection {
            district_id: Some("d1".into()),
            network_id: Some("n-line".into()),
        });
        let s = MapSession::create_map(RecordingMap::default(), cfg, catalog(), &source).await;
        assert_eq!(s.registry().active_network().unwrap().unique_id, "n-line");
    }

    #[tokio::test]
    async fn non_default_modes_hide_areas() {
        let source = FakeSource::standard();
        let mut s = session(&source, MapMode::LocationMarkers).await;
        let d1 = s.registry().area_by_unique_id("d1").unwrap();
        assert!(!d1.paint.visible);
        assert!(!d1.paint.interactive);
        let id = d1.id;

        // kliknięcie w obszar trafia do mapy: znacznik zamiast zaznaczenia
        assert!(s.click_layer(id, LatLng::new(0.5, 0.5)).is_none());
        assert!(s.registry().active_area().is_none());
        assert_eq!(s.markers().positions(), vec![LatLng::new(0.5, 0.5)]);
        assert!(s.controls().frame_area.is_none());
        assert!(!s.controls().frame_all);
    }

    #[tokio::test]
    async fn stale_network_load_never_attaches() {
        let source = FakeSource::standard();
        let mut s = session(&source, MapMode::Browse).await;
        let d1 = s.registry().area_by_unique_id("d1").unwrap().id;
        let d2 = s.registry().area_by_unique_id("d2").unwrap().id;

        let first = s.click_area(d1, LatLng::new(0.5, 0.5)).unwrap();
        let second = s.click_area(d2, LatLng::new(0.5, 2.5)).unwrap();
        let first = perform(&source, first).await;
        let second = perform(&source, second).await;
        s.complete(second);
        s.complete(first);

        let ids: Vec<&str> = s
            .registry()
            .network_layers()
            .iter()
            .map(|l| l.unique_id.as_str())
            .collect();
        assert_eq!(ids, vec!["n2"]);
    }

    #[tokio::test]
    async fn closed_loop_make_area_emits_single_polygon() {
        let source = FakeSource::standard();
        let mut s = session(&source, MapMode::LocationDraw).await;
        assert!(!s.toggle_snap());
        let (events, observer) = recorder();
        s.subscribe(observer);

        assert!(draw(&mut s, &square_loop()).is_none());
        assert_eq!(s.drawing().polylines().len(), 1);
        assert!(s.drawing().offer().is_some());
        events.borrow_mut().clear();

        assert!(s.make_area());
        assert!(s.drawing().polylines().is_empty());
        assert_eq!(s.drawing().polygons().len(), 1);

        let payloads = user_data(&events.borrow());
        assert_eq!(payloads.len(), 1);
        assert!(payloads[0].get("polylines").is_none());
        assert_eq!(payloads[0]["polygons"].as_array().unwrap().len(), 1);
        assert!(payloads[0].get("markers").is_none());
    }

    #[tokio::test]
    async fn tap_never_reaches_collections_or_events() {
        let source = FakeSource::standard();
        let mut s = session(&source, MapMode::LocationDraw).await;
        let (events, observer) = recorder();
        s.subscribe(observer);

        assert!(draw(&mut s, &[(300.0, 300.0), (305.0, 310.0)]).is_none());
        assert!(s.drawing().polylines().is_empty());
        assert!(s.drawing().polygons().is_empty());
        assert!(user_data(&events.borrow()).is_empty());
    }

    #[tokio::test]
    async fn successful_snap_replaces_points_and_reserializes() {
        let snapped = vec![LatLng::new(0.001, 0.001), LatLng::new(0.001, 0.002)];
        let source = FakeSource::standard().snapping(&snapped);
        let mut s = session(&source, MapMode::LocationDraw).await;
        let (events, observer) = recorder();
        s.subscribe(observer);

        let path: Vec<(f64, f64)> = (0..30).map(|i| (100.0 + i as f64 * 10.0, 100.0)).collect();
        let work = draw(&mut s, &path).unwrap();
        let PendingWork::Snap(stroke) = &work else {
            panic!("expected snap work");
        };
        assert_eq!(stroke.points.len(), 30);
        s.settle(&source, work).await;

        assert_eq!(source.snaps.borrow().len(), 1);
        assert_eq!(s.drawing().polylines()[0].points, snapped);
        let payloads = user_data(&events.borrow());
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[1]["polylines"][0][1]["lng"], 0.002);
    }

    #[tokio::test]
    async fn failed_snap_keeps_simplified_stroke() {
        let source = FakeSource::standard();
        let mut s = session(&source, MapMode::LocationDraw).await;
        let (events, observer) = recorder();
        s.subscribe(observer);

        let path: Vec<(f64, f64)> = (0..30).map(|i| (100.0 + i as f64 * 10.0, 100.0)).collect();
        let work = draw(&mut s, &path).unwrap();
        s.settle(&source, work).await;

        let shape = &s.drawing().polylines()[0];
        assert_eq!(shape.points.len(), 30);
        assert!(shape.hit_pane.is_some());
        assert_eq!(user_data(&events.borrow()).len(), 1);
    }

    #[tokio::test]
    async fn hit_pane_click_deletes_and_notifies() {
        let source = FakeSource::standard();
        let mut s = session(&source, MapMode::LocationDraw).await;
        s.toggle_snap();
        let path: Vec<(f64, f64)> = (0..30).map(|i| (100.0 + i as f64 * 10.0, 100.0)).collect();
        draw(&mut s, &path);
        let pane = s.drawing().polylines()[0].hit_pane.as_ref().unwrap().id;

        let (events, observer) = recorder();
        s.subscribe(observer);
        s.click_layer(pane, LatLng::new(0.0, 0.0));
        assert!(s.drawing().polylines().is_empty());
        let payloads = user_data(&events.borrow());
        assert_eq!(payloads, vec![Value::Object(Default::default())]);
    }

    #[tokio::test]
    async fn polygon_hit_pane_click_deletes_polygon_and_notifies() {
        let source = FakeSource::standard();
        let mut s = session(&source, MapMode::LocationDraw).await;
        s.toggle_snap();
        draw(&mut s, &square_loop());
        assert!(s.make_area());
        let polygon = &s.drawing().polygons()[0];
        let (shape, pane) = (polygon.layer.id, polygon.hit_pane.as_ref().unwrap().id);

        let (events, observer) = recorder();
        s.subscribe(observer);
        assert!(s.click_layer(pane, LatLng::new(0.0, 0.0)).is_none());

        assert!(s.drawing().polygons().is_empty());
        assert!(s.map().layer(shape).is_none());
        assert!(s.map().layer(pane).is_none());
        let payloads = user_data(&events.borrow());
        assert_eq!(payloads, vec![Value::Object(Default::default())]);
    }

    #[tokio::test]
    async fn pointer_down_dismisses_make_area_offer() {
        let source = FakeSource::standard();
        let mut s = session(&source, MapMode::LocationDraw).await;
        s.toggle_snap();
        draw(&mut s, &square_loop());
        assert!(s.drawing().offer().is_some());
        s.pointer_down(mouse(50.0, 50.0));
        assert!(s.drawing().offer().is_none());
        assert!(!s.make_area());
    }

    #[tokio::test]
    async fn markers_drop_drag_and_remove() {
        let source = FakeSource::standard();
        let mut s = session(&source, MapMode::LocationMarkers).await;
        let (events, observer) = recorder();
        s.subscribe(observer);

        s.click_map(LatLng::new(10.0, 10.0));
        let id = s.markers().markers()[0].layer.id;
        s.drag_marker(id, LatLng::new(11.0, 12.0));
        s.click_layer(id, LatLng::new(11.0, 12.0));
        assert!(s.markers().markers().is_empty());

        let payloads = user_data(&events.borrow());
        assert_eq!(payloads.len(), 3);
        assert_eq!(payloads[1]["markers"][0]["lng"], 12.0);
        assert!(payloads[2].get("markers").is_none());
    }

    #[tokio::test]
    async fn street_view_picks_next_click_or_times_out() {
        let source = FakeSource::standard();
        let mut s = session(&source, MapMode::Browse).await;
        let (events, observer) = recorder();
        s.subscribe(observer);

        let now = Instant::now();
        s.arm_street_view(now);
        assert!(s.controls().street_view_armed);
        s.click_map(LatLng::new(51.5, -0.1));
        assert_eq!(
            s.take_street_view().as_deref(),
            Some("https://www.google.com/maps/@?api=1&map_action=pano&viewpoint=51.5,-0.1")
        );
        // wybór miejsca nie odznacza
        assert!(events.borrow().is_empty());

        s.arm_street_view(now);
        s.tick(now + STREET_VIEW_TIMEOUT);
        assert!(!s.controls().street_view_armed);
        s.click_map(LatLng::new(51.5, -0.1));
        assert!(s.take_street_view().is_none());
        assert_eq!(events.borrow().len(), 1);
    }

    #[tokio::test]
    async fn controls_follow_selection_and_views() {
        let source = FakeSource::standard();
        let mut s = session(&source, MapMode::Browse).await;
        let c = s.controls();
        assert!(c.frame_all);
        assert_eq!(c.frame_area, Some(false));
        assert_eq!(c.frame_network, Some(false));
        assert_eq!(c.snap_label, None);

        let d1 = s.registry().area_by_unique_id("d1").unwrap().id;
        s.click_area(d1, LatLng::new(0.5, 0.5));
        assert_eq!(s.controls().frame_area, Some(true));

        assert_eq!(s.toggle_base_view(), BaseView::Satellite);
        assert_eq!(s.map().tiles.len(), 3);
        assert!(s.map().container_classes.contains(SATELLITE_FILTER_CLASS));
        assert_eq!(s.controls().base_view_label, "Normal View");
        s.toggle_base_view();
        assert!(s.map().container_classes.is_empty());
    }

    #[tokio::test]
    async fn snap_label_tracks_toggle_in_draw_mode() {
        let source = FakeSource::standard();
        let mut s = session(&source, MapMode::LocationDraw).await;
        assert!(!s.map().dragging);
        assert_eq!(s.controls().snap_label, Some("Disable Snap"));
        s.toggle_snap();
        assert_eq!(s.controls().snap_label, Some("Enable Snap"));
    }
}
