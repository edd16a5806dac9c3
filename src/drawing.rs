//! Rysowanie odręczne: przechwytywanie wskaźnika, przerzedzanie,
//! domykanie pętli w obszar i usuwanie przez niewidoczny pas trafień.
//! Tryb znaczników korzysta z `MarkerSet`.

use geo::{Coord, LineString, Polygon};
use std::{
    collections::BTreeSet,
    time::{Duration, Instant},
};

use crate::adapter::{LayerIds, MapAdapter};
use crate::bridge::UserData;
use crate::data::{LatLng, ScreenPoint};
use crate::geometry::{
    CLOSED_LOOP_PERCENTAGE, CLOSED_LOOP_TOLERANCE_M, SIMPLIFY_TOLERANCE_M, all_within_pixels,
    centroid, close_to_ring, is_polyline_closed, simplify_latlngs,
};
use crate::layers::{Layer, LayerId, LayerKind, Pane, Paint};

pub const DRAW_HOLD_DELAY: Duration = Duration::from_millis(200);
pub const TAP_THRESHOLD_PX: f64 = 20.0;
pub const HIT_PANE_WEIGHT: f64 = 20.0;
pub const STROKE_WEIGHT: f64 = 8.0;
pub const DRAWING_STYLE: &str = "user-drawing";
pub const MARKER_STYLE: &str = "location-marker";

// przesunięcie przycisku "Make Area" względem środka linii
const OFFER_OFFSET_X: f64 = -45.0;
const OFFER_OFFSET_Y: f64 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    Touch,
    Pen,
}

#[derive(Clone, Copy, Debug)]
pub struct PointerEvent {
    pub pointer_id: u32,
    pub kind: PointerKind,
    /// 0 = lewy przycisk myszy.
    pub button: u8,
    pub position: ScreenPoint,
    pub at: Instant,
}

#[derive(Debug)]
enum DrawState {
    Idle,
    /// Dotyk czeka `DRAW_HOLD_DELAY`, zanim zacznie rysować.
    PendingTouch {
        start: ScreenPoint,
        deadline: Instant,
    },
    Drawing {
        layer: Layer,
        points: Vec<LatLng>,
    },
}

/// Narysowana linia albo wielokąt wraz z pasem trafień.
#[derive(Clone, Debug)]
pub struct DrawnShape {
    pub layer: Layer,
    pub hit_pane: Option<Layer>,
    pub points: Vec<LatLng>,
}

/// Linia po przerzedzeniu, czekająca na przyciągnięcie do ścieżek.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingStroke {
    pub polyline: LayerId,
    pub points: Vec<LatLng>,
    pub snap: bool,
}

#[derive(Debug, PartialEq)]
pub enum StrokeOutcome {
    Nothing,
    /// Przypadkowe stuknięcie; linia usunięta z mapy.
    Discarded,
    Kept(PendingStroke),
}

/// Propozycja zamiany zamkniętej linii w obszar.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MakeAreaOffer {
    pub polyline: LayerId,
    pub crossing_index: usize,
}

fn stroke_paint() -> Paint {
    Paint {
        pane: Pane::Drawing,
        visible: true,
        interactive: true,
        weight: STROKE_WEIGHT,
    }
}

fn hit_pane_paint() -> Paint {
    Paint {
        pane: Pane::Drawing,
        visible: false,
        interactive: true,
        weight: HIT_PANE_WEIGHT,
    }
}

fn line_geometry(points: &[LatLng]) -> geo::Geometry<f64> {
    let line: LineString<f64> = points.iter().map(|&p| Coord::from(p)).collect();
    geo::Geometry::LineString(line)
}

fn polygon_geometry(ring: &[LatLng]) -> geo::Geometry<f64> {
    let exterior: LineString<f64> = ring.iter().map(|&p| Coord::from(p)).collect();
    geo::Geometry::Polygon(Polygon::new(exterior, vec![]))
}

#[derive(Debug)]
pub struct DrawingEngine {
    state: DrawState,
    active_pointers: BTreeSet<u32>,
    space_pressed: bool,
    snap_enabled: bool,
    polylines: Vec<DrawnShape>,
    polygons: Vec<DrawnShape>,
    offer: Option<MakeAreaOffer>,
}

impl Default for DrawingEngine {
    fn default() -> Self {
        Self {
            state: DrawState::Idle,
            active_pointers: BTreeSet::new(),
            space_pressed: false,
            snap_enabled: true,
            polylines: Vec::new(),
            polygons: Vec::new(),
            offer: None,
        }
    }
}

impl DrawingEngine {
    /// W trybie rysowania mapa nie przesuwa się, dopóki nie trzymamy spacji.
    pub fn enable<M: MapAdapter>(&mut self, map: &mut M) {
        map.set_dragging(false);
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.state, DrawState::Drawing { .. })
    }

    pub fn snap_enabled(&self) -> bool {
        self.snap_enabled
    }

    pub fn toggle_snap(&mut self) -> bool {
        self.snap_enabled = !self.snap_enabled;
        log::info!(
            "snap to paths {}",
            if self.snap_enabled { "enabled" } else { "disabled" }
        );
        self.snap_enabled
    }

    pub fn polylines(&self) -> &[DrawnShape] {
        &self.polylines
    }

    pub fn polygons(&self) -> &[DrawnShape] {
        &self.polygons
    }

    pub fn offer(&self) -> Option<MakeAreaOffer> {
        self.offer
    }

    /// Termin, w którym oczekujący dotyk zacznie rysować.
    pub fn pending_deadline(&self) -> Option<Instant> {
        match self.state {
            DrawState::PendingTouch { deadline, .. } => Some(deadline),
            _ => None,
        }
    }

    /// Punkty linii w trakcie rysowania.
    pub fn current_points(&self) -> Option<&[LatLng]> {
        match &self.state {
            DrawState::Drawing { points, .. } => Some(points),
            _ => None,
        }
    }

    pub fn key_down_space<M: MapAdapter>(&mut self, map: &mut M) {
        if !self.space_pressed {
            self.space_pressed = true;
            map.set_dragging(true);
        }
    }

    pub fn key_up_space<M: MapAdapter>(&mut self, map: &mut M) {
        if self.space_pressed {
            self.space_pressed = false;
            map.set_dragging(false);
        }
    }

    pub fn pointer_down<M: MapAdapter>(&mut self, event: PointerEvent, ids: &mut LayerIds, map: &mut M) {
        self.active_pointers.insert(event.pointer_id);
        if self.space_pressed {
            return;
        }
        match event.kind {
            PointerKind::Touch if self.active_pointers.len() > 1 => {
                // drugi palec: pinch-zoom ma pierwszeństwo
                map.set_dragging(true);
                self.abandon(map);
            }
            PointerKind::Touch => {
                map.set_dragging(false);
                if matches!(self.state, DrawState::Idle) {
                    self.state = DrawState::PendingTouch {
                        start: event.position,
                        deadline: event.at + DRAW_HOLD_DELAY,
                    };
                }
            }
            PointerKind::Mouse if event.button == 0 => {
                map.set_dragging(false);
                self.start_drawing(event.position, ids, map);
            }
            _ => {}
        }
    }

    /// Odpala oczekujący dotyk, jeśli minął czas przytrzymania.
    pub fn tick<M: MapAdapter>(&mut self, now: Instant, ids: &mut LayerIds, map: &mut M) {
        let DrawState::PendingTouch { start, deadline } = self.state else {
            return;
        };
        if now < deadline {
            return;
        }
        self.state = DrawState::Idle;
        if self.active_pointers.len() == 1 {
            self.start_drawing(start, ids, map);
        }
    }

    pub fn pointer_move<M: MapAdapter>(&mut self, event: PointerEvent, map: &mut M) {
        let single_touch =
            self.active_pointers.len() == 1 && self.active_pointers.contains(&event.pointer_id);
        let DrawState::Drawing { layer, points } = &mut self.state else {
            return;
        };
        let accept = match event.kind {
            PointerKind::Touch => single_touch,
            PointerKind::Mouse => true,
            PointerKind::Pen => false,
        };
        if !accept {
            return;
        }
        points.push(map.container_point_to_lat_lng(event.position));
        layer.features[0].geometry = line_geometry(points);
        map.update_layer(layer);
    }

    /// Podniesienie lub wyjście wskaźnika poza mapę.
    pub fn pointer_end<M: MapAdapter>(&mut self, event: PointerEvent, map: &mut M) -> StrokeOutcome {
        self.active_pointers.remove(&event.pointer_id);
        match event.kind {
            PointerKind::Touch => {
                if matches!(self.state, DrawState::PendingTouch { .. }) {
                    self.state = DrawState::Idle;
                }
                let outcome = if self.is_drawing() && self.active_pointers.is_empty() {
                    self.finalize(map)
                } else {
                    StrokeOutcome::Nothing
                };
                if self.active_pointers.is_empty() && !self.space_pressed {
                    map.set_dragging(false);
                }
                outcome
            }
            PointerKind::Mouse => {
                let outcome = if self.is_drawing() {
                    self.finalize(map)
                } else {
                    StrokeOutcome::Nothing
                };
                if !self.space_pressed {
                    map.set_dragging(false);
                }
                outcome
            }
            PointerKind::Pen => StrokeOutcome::Nothing,
        }
    }

    pub fn pointer_cancel<M: MapAdapter>(&mut self, event: PointerEvent, map: &mut M) -> StrokeOutcome {
        self.active_pointers.remove(&event.pointer_id);
        if matches!(self.state, DrawState::PendingTouch { .. }) {
            self.state = DrawState::Idle;
        }
        if self.is_drawing() && self.active_pointers.is_empty() {
            self.finalize(map)
        } else {
            StrokeOutcome::Nothing
        }
    }

    fn start_drawing<M: MapAdapter>(&mut self, at: ScreenPoint, ids: &mut LayerIds, map: &mut M) {
        if self.is_drawing() {
            return;
        }
        let points = vec![map.container_point_to_lat_lng(at)];
        let layer = Layer::new(ids.next(), LayerKind::Drawing, "", DRAWING_STYLE, stroke_paint())
            .with_geometry(line_geometry(&points), false);
        map.add_layer(&layer);
        self.state = DrawState::Drawing { layer, points };
    }

    fn abandon<M: MapAdapter>(&mut self, map: &mut M) {
        if let DrawState::Drawing { layer, .. } = std::mem::replace(&mut self.state, DrawState::Idle) {
            log::debug!("abandoning stroke {:?} on multi-touch", layer.id);
            map.remove_layer(layer.id);
        }
    }

    fn finalize<M: MapAdapter>(&mut self, map: &mut M) -> StrokeOutcome {
        let DrawState::Drawing { mut layer, points } =
            std::mem::replace(&mut self.state, DrawState::Idle)
        else {
            return StrokeOutcome::Nothing;
        };

        let screen: Vec<ScreenPoint> = points
            .iter()
            .map(|&p| map.lat_lng_to_container_point(p))
            .collect();
        if all_within_pixels(&screen, TAP_THRESHOLD_PX) {
            map.remove_layer(layer.id);
            return StrokeOutcome::Discarded;
        }

        let simplified = simplify_latlngs(&points, SIMPLIFY_TOLERANCE_M);
        log::debug!("stroke simplified from {} to {} points", points.len(), simplified.len());
        layer.features[0].geometry = line_geometry(&simplified);
        map.update_layer(&layer);

        let id = layer.id;
        self.polylines.push(DrawnShape {
            layer,
            hit_pane: None,
            points: simplified.clone(),
        });
        StrokeOutcome::Kept(PendingStroke {
            polyline: id,
            points: simplified,
            snap: self.snap_enabled,
        })
    }

    /// Kończy linię: podmienia punkty na przyciągnięte (jeśli są), dodaje
    /// pas trafień i sprawdza domknięcie pętli. Zwraca `true`, gdy punkty
    /// się zmieniły.
    pub fn complete_stroke<M: MapAdapter>(
        &mut self,
        polyline: LayerId,
        snapped: Option<Vec<LatLng>>,
        ids: &mut LayerIds,
        map: &mut M,
    ) -> bool {
        let Some(shape) = self.polylines.iter_mut().find(|s| s.layer.id == polyline) else {
            log::debug!("stroke {:?} no longer exists", polyline);
            return false;
        };

        let changed = match snapped {
            Some(points) if !points.is_empty() => {
                shape.layer.features[0].geometry = line_geometry(&points);
                shape.points = points;
                map.update_layer(&shape.layer);
                true
            }
            _ => false,
        };

        if shape.hit_pane.is_none() {
            let pane = Layer::new(ids.next(), LayerKind::HitPane, "", "", hit_pane_paint())
                .with_geometry(line_geometry(&shape.points), false);
            map.add_layer(&pane);
            shape.hit_pane = Some(pane);
        }

        if let Some(closed) =
            is_polyline_closed(&shape.points, CLOSED_LOOP_PERCENTAGE, CLOSED_LOOP_TOLERANCE_M)
        {
            log::debug!(
                "stroke {:?} closes at {:?}",
                polyline,
                closed.crossing_point
            );
            self.offer = Some(MakeAreaOffer {
                polyline,
                crossing_index: closed.crossing_index,
            });
        }
        changed
    }

    /// Pozycja przycisku "Make Area" liczona z bieżącego widoku.
    pub fn offer_position<M: MapAdapter>(&self, map: &M) -> Option<ScreenPoint> {
        let offer = self.offer?;
        let shape = self.polylines.iter().find(|s| s.layer.id == offer.polyline)?;
        let center = map.lat_lng_to_container_point(centroid(&shape.points)?);
        // przycisk zawsze w obrębie kontenera
        let size = map.container_size();
        Some(ScreenPoint::new(
            (center.x + OFFER_OFFSET_X).clamp(0.0, (size.x - 1.0).max(0.0)),
            (center.y + OFFER_OFFSET_Y).clamp(0.0, (size.y - 1.0).max(0.0)),
        ))
    }

    pub fn dismiss_offer(&mut self) {
        if self.offer.take().is_some() {
            log::debug!("make area offer dismissed");
        }
    }

    /// Zamienia zaproponowaną linię w wielokąt.
    pub fn make_area<M: MapAdapter>(&mut self, ids: &mut LayerIds, map: &mut M) -> bool {
        let Some(offer) = self.offer.take() else {
            return false;
        };
        let Some(index) = self.polylines.iter().position(|s| s.layer.id == offer.polyline) else {
            return false;
        };
        let source = self.polylines.remove(index);
        map.remove_layer(source.layer.id);
        if let Some(pane) = &source.hit_pane {
            map.remove_layer(pane.id);
        }

        let ring = close_to_ring(&source.points, offer.crossing_index, CLOSED_LOOP_PERCENTAGE);
        let geometry = polygon_geometry(&ring);
        let layer = Layer::new(ids.next(), LayerKind::Drawing, "", DRAWING_STYLE, stroke_paint())
            .with_geometry(geometry.clone(), true);
        map.add_layer(&layer);
        let pane = Layer::new(ids.next(), LayerKind::HitPane, "", "", hit_pane_paint())
            .with_geometry(geometry, true);
        map.add_layer(&pane);

        log::info!("converted stroke {:?} into area {:?}", source.layer.id, layer.id);
        self.polygons.push(DrawnShape {
            layer,
            hit_pane: Some(pane),
            points: ring,
        });
        true
    }

    /// Kliknięcie w pas trafień usuwa kształt. Zwraca `true`, gdy coś usunięto.
    pub fn click_layer<M: MapAdapter>(&mut self, id: LayerId, map: &mut M) -> bool {
        let hit = |s: &DrawnShape| s.hit_pane.as_ref().is_some_and(|p| p.id == id);
        let removed = if let Some(i) = self.polylines.iter().position(hit) {
            self.polylines.remove(i)
        } else if let Some(i) = self.polygons.iter().position(hit) {
            self.polygons.remove(i)
        } else {
            return false;
        };

        map.remove_layer(removed.layer.id);
        map.remove_layer(id);
        if self.offer.is_some_and(|o| o.polyline == removed.layer.id) {
            self.offer = None;
        }
        log::info!("deleted drawing {:?}", removed.layer.id);
        true
    }

    pub fn user_data(&self) -> UserData {
        UserData {
            polylines: self.polylines.iter().map(|s| s.points.clone()).collect(),
            polygons: self
                .polygons
                .iter()
                .map(|s| {
                    // pierścień bez powtórzonego wierzchołka zamykającego
                    let mut ring = s.points.clone();
                    if ring.len() > 1 && ring.first() == ring.last() {
                        ring.pop();
                    }
                    vec![ring]
                })
                .collect(),
            markers: Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Marker {
    pub layer: Layer,
    pub position: LatLng,
}

/// Przeciągalne znaczniki trybu `location-markers`.
#[derive(Debug, Default)]
pub struct MarkerSet {
    markers: Vec<Marker>,
}

impl MarkerSet {
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.markers.iter().any(|m| m.layer.id == id)
    }

    pub fn positions(&self) -> Vec<LatLng> {
        self.markers.iter().map(|m| m.position).collect()
    }

    pub fn drop_marker<M: MapAdapter>(&mut self, at: LatLng, ids: &mut LayerIds, map: &mut M) -> LayerId {
        let layer = Layer::new(
            ids.next(),
            LayerKind::Marker,
            "",
            MARKER_STYLE,
            Paint {
                pane: Pane::Markers,
                ..Paint::default()
            },
        )
        .with_geometry(geo::Geometry::Point(at.into()), false);
        map.add_layer(&layer);
        let id = layer.id;
        self.markers.push(Marker { layer, position: at });
        id
    }

    pub fn remove_marker<M: MapAdapter>(&mut self, id: LayerId, map: &mut M) -> bool {
        let Some(i) = self.markers.iter().position(|m| m.layer.id == id) else {
            return false;
        };
        self.markers.remove(i);
        map.remove_layer(id);
        true
    }

    pub fn move_marker<M: MapAdapter>(&mut self, id: LayerId, to: LatLng, map: &mut M) -> bool {
        let Some(marker) = self.markers.iter_mut().find(|m| m.layer.id == id) else {
            return false;
        };
        marker.position = to;
        marker.layer.features[0].geometry = geo::Geometry::Point(to.into());
        map.update_layer(&marker.layer);
        true
    }
}
