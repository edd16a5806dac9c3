use geo::{Closest, ClosestPoint, Contains, Geometry, LineString, Point, Rect};
use ratatui::layout::Rect as TuiRect;
use ratatui::widgets::canvas::{Canvas, Line, Points};
use ratatui::widgets::{Block, Borders};
use ratatui::{Frame, style::Color};
use std::collections::BTreeSet;

use networkmap::adapter::MapAdapter;
use networkmap::data::{LatLng, ScreenPoint};
use networkmap::layers::{
    Layer, LayerId, LayerKind, NETWORK_HIGHLIGHT_CLASS, NO_FILL_CLASS,
};
use networkmap::tiles::{SATELLITE_FILTER_CLASS, TileLayer};

/// Umowny rozmiar komórki terminala w pikselach kontenera.
pub const CELL_WIDTH_PX: f64 = 8.0;
pub const CELL_HEIGHT_PX: f64 = 16.0;

/// Kolor konturu dla klasy stylu z katalogu.
fn style_color(style: &str) -> Color {
    match style.split('-').next().unwrap_or_default() {
        "blue" => Color::Blue,
        "green" => Color::Green,
        "red" => Color::LightRed,
        "yellow" => Color::Yellow,
        "orange" => Color::LightYellow,
        "purple" => Color::Magenta,
        "teal" | "cyan" => Color::Cyan,
        _ => Color::White,
    }
}

/// Wszystkie linie geometrii (kontury wielokątów i linie).
fn outlines(geometry: &Geometry<f64>) -> Vec<&LineString<f64>> {
    match geometry {
        Geometry::LineString(l) => vec![l],
        Geometry::MultiLineString(m) => m.0.iter().collect(),
        Geometry::Polygon(p) => std::iter::once(p.exterior()).chain(p.interiors()).collect(),
        Geometry::MultiPolygon(m) => m
            .0
            .iter()
            .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
            .collect(),
        Geometry::GeometryCollection(c) => c.0.iter().flat_map(outlines).collect(),
        _ => Vec::new(),
    }
}

/// Mapa w terminalu: przechowuje warstwy w kolejności dodania i rysuje
/// je na kanwie ratatui.
pub struct TerminalMap {
    layers: Vec<Layer>,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
    viewport: TuiRect,
    dragging: bool,
    tiles: Vec<TileLayer>,
    classes: BTreeSet<String>,
}

impl TerminalMap {
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            x_bounds: [-180.0, 180.0],
            y_bounds: [-90.0, 90.0],
            viewport: TuiRect::new(0, 0, 80, 24),
            dragging: true,
            tiles: Vec::new(),
            classes: BTreeSet::new(),
        }
    }

    pub fn dragging(&self) -> bool {
        self.dragging
    }

    pub fn satellite(&self) -> bool {
        self.classes.contains(SATELLITE_FILTER_CLASS)
    }

    pub fn tile_source(&self) -> Option<&str> {
        self.tiles.first().map(|t| t.url_template)
    }

    /// Wnętrze ramki, w którym rysowana jest kanwa.
    pub fn set_viewport(&mut self, area: TuiRect) {
        self.viewport = TuiRect::new(
            area.x + 1,
            area.y + 1,
            area.width.saturating_sub(2).max(1),
            area.height.saturating_sub(2).max(1),
        );
    }

    fn size_px(&self) -> (f64, f64) {
        (
            self.viewport.width as f64 * CELL_WIDTH_PX,
            self.viewport.height as f64 * CELL_HEIGHT_PX,
        )
    }

    /// Komórka terminala → punkt kontenera; `None` poza mapą.
    pub fn cell_to_container(&self, column: u16, row: u16) -> Option<ScreenPoint> {
        let v = self.viewport;
        if column < v.x || row < v.y || column >= v.x + v.width || row >= v.y + v.height {
            return None;
        }
        Some(ScreenPoint::new(
            (column - v.x) as f64 * CELL_WIDTH_PX + CELL_WIDTH_PX / 2.0,
            (row - v.y) as f64 * CELL_HEIGHT_PX + CELL_HEIGHT_PX / 2.0,
        ))
    }

    pub fn container_to_cell(&self, point: ScreenPoint) -> Option<(u16, u16)> {
        let (w, h) = self.size_px();
        if point.x < 0.0 || point.y < 0.0 || point.x >= w || point.y >= h {
            return None;
        }
        Some((
            self.viewport.x + (point.x / CELL_WIDTH_PX) as u16,
            self.viewport.y + (point.y / CELL_HEIGHT_PX) as u16,
        ))
    }

    /// Przesuwa widok o ułamek jego rozmiaru.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        let w = self.x_bounds[1] - self.x_bounds[0];
        let h = self.y_bounds[1] - self.y_bounds[0];
        self.x_bounds = [self.x_bounds[0] + dx * w, self.x_bounds[1] + dx * w];
        self.y_bounds = [self.y_bounds[0] + dy * h, self.y_bounds[1] + dy * h];
    }

    /// Przesunięcie w pikselach kontenera (przeciąganie myszą).
    pub fn pan_px(&mut self, dx: f64, dy: f64) {
        let (w, h) = self.size_px();
        self.pan(-dx / w, dy / h);
    }

    pub fn zoom(&mut self, factor: f64) {
        let c = self.center();
        let half_w = (self.x_bounds[1] - self.x_bounds[0]) / 2.0 / factor;
        let half_h = (self.y_bounds[1] - self.y_bounds[0]) / 2.0 / factor;
        self.x_bounds = [c.lng - half_w, c.lng + half_w];
        self.y_bounds = [c.lat - half_h, c.lat + half_h];
    }

    fn hits(&self, layer: &Layer, at: LatLng) -> bool {
        let point = Point::from(at);
        let screen = self.lat_lng_to_container_point(at);
        let reach = (layer.paint.weight / 2.0).max(CELL_WIDTH_PX);
        layer.features.iter().any(|feature| {
            let inside = feature.filled
                && match &feature.geometry {
                    Geometry::Polygon(p) => p.contains(&point),
                    Geometry::MultiPolygon(m) => m.contains(&point),
                    _ => false,
                };
            if inside {
                return true;
            }
            match feature.geometry.closest_point(&point) {
                Closest::Intersection(p) | Closest::SinglePoint(p) => {
                    self.lat_lng_to_container_point(p.into()).distance_to(&screen) <= reach
                }
                Closest::Indeterminate => false,
            }
        })
    }

    /// Najwyższa klikalna warstwa pod punktem.
    pub fn pick(&self, at: LatLng) -> Option<LayerId> {
        self.layers
            .iter()
            .rev()
            .filter(|l| l.paint.interactive)
            .find(|l| self.hits(l, at))
            .map(|l| l.id)
    }

    fn layer_color(&self, layer: &Layer, spotlight: bool) -> Color {
        match layer.kind {
            LayerKind::Area if spotlight && layer.style_override.as_deref() != Some(NO_FILL_CLASS) => {
                Color::DarkGray
            }
            LayerKind::Area => style_color(&layer.original_style),
            LayerKind::Network if layer.has_class(NETWORK_HIGHLIGHT_CLASS) => Color::Red,
            LayerKind::Network => style_color(&layer.original_style),
            LayerKind::Drawing => Color::Cyan,
            LayerKind::Marker => Color::Yellow,
            LayerKind::Spotlight | LayerKind::HitPane => Color::Reset,
        }
    }

    /// Rysuje wszystkie widoczne warstwy; obszary poza aktywnym są
    /// przyciemnione, gdy jest nakładka.
    pub fn render(&self, f: &mut Frame, area: TuiRect, title: &str) {
        let spotlight = self.layers.iter().any(|l| l.kind == LayerKind::Spotlight);
        let canvas = Canvas::default()
            .block(Block::default().title(title).borders(Borders::ALL))
            .x_bounds(self.x_bounds)
            .y_bounds(self.y_bounds)
            .paint(|ctx| {
                for layer in &self.layers {
                    if !layer.paint.visible
                        || matches!(layer.kind, LayerKind::Spotlight | LayerKind::HitPane)
                    {
                        continue;
                    }
                    let color = self.layer_color(layer, spotlight);
                    for feature in &layer.features {
                        if let Geometry::Point(p) = feature.geometry {
                            ctx.draw(&Points { coords: &[(p.x(), p.y())], color });
                            continue;
                        }
                        for line in outlines(&feature.geometry) {
                            for window in line.0.windows(2) {
                                let a = window[0];
                                let b = window[1];
                                ctx.draw(&Line { x1: a.x, y1: a.y, x2: b.x, y2: b.y, color });
                            }
                        }
                    }
                }
            });
        f.render_widget(canvas, area);
    }
}

impl MapAdapter for TerminalMap {
    fn add_layer(&mut self, layer: &Layer) {
        self.layers.push(layer.clone());
    }

    fn remove_layer(&mut self, id: LayerId) {
        self.layers.retain(|l| l.id != id);
    }

    fn update_layer(&mut self, layer: &Layer) {
        if let Some(existing) = self.layers.iter_mut().find(|l| l.id == layer.id) {
            *existing = layer.clone();
        }
    }

    fn fit_bounds(&mut self, bounds: Rect<f64>, _animate: bool) {
        self.x_bounds = [bounds.min().x, bounds.max().x];
        self.y_bounds = [bounds.min().y, bounds.max().y];
    }

    fn center(&self) -> LatLng {
        LatLng::new(
            (self.y_bounds[0] + self.y_bounds[1]) / 2.0,
            (self.x_bounds[0] + self.x_bounds[1]) / 2.0,
        )
    }

    fn lat_lng_to_container_point(&self, point: LatLng) -> ScreenPoint {
        let (w, h) = self.size_px();
        ScreenPoint::new(
            (point.lng - self.x_bounds[0]) / (self.x_bounds[1] - self.x_bounds[0]) * w,
            (self.y_bounds[1] - point.lat) / (self.y_bounds[1] - self.y_bounds[0]) * h,
        )
    }

    fn container_point_to_lat_lng(&self, point: ScreenPoint) -> LatLng {
        let (w, h) = self.size_px();
        LatLng::new(
            self.y_bounds[1] - point.y / h * (self.y_bounds[1] - self.y_bounds[0]),
            self.x_bounds[0] + point.x / w * (self.x_bounds[1] - self.x_bounds[0]),
        )
    }

    fn container_size(&self) -> ScreenPoint {
        let (w, h) = self.size_px();
        ScreenPoint::new(w, h)
    }

    fn set_dragging(&mut self, enabled: bool) {
        self.dragging = enabled;
    }

    fn set_tile_layers(&mut self, layers: &[TileLayer]) {
        self.tiles = layers.to_vec();
    }

    fn set_container_class(&mut self, class: &str, enabled: bool) {
        if enabled {
            self.classes.insert(class.to_string());
        } else {
            self.classes.remove(class);
        }
    }
}
