//! Czyste funkcje geometryczne: skalowanie granic, klasyfikacja GeoJSON,
//! upraszczanie i wykrywanie zamkniętych pętli.

use geo::{Coord, Distance, Haversine, LineString, Rect};
use geojson::{GeoJson, Value};

use crate::data::{LatLng, ScreenPoint};
use crate::source::SnappedLocation;

pub const ALL_BOUNDS_SCALE: f64 = 1.05;
pub const AREA_BOUNDS_SCALE: f64 = 1.05;
pub const NETWORK_BOUNDS_SCALE: f64 = 1.25;

pub const SIMPLIFY_TOLERANCE_M: f64 = 10.0;
pub const CLOSED_LOOP_PERCENTAGE: f64 = 0.1;
pub const CLOSED_LOOP_TOLERANCE_M: f64 = 50.0;

/// Rozszerza (lub zwęża) prostokąt wokół jego środka.
pub fn scale_bounds(bounds: Rect<f64>, factor: f64) -> Rect<f64> {
    let center = bounds.center();
    let max = bounds.max();
    let min = bounds.min();
    Rect::new(
        Coord {
            x: center.x + (max.x - center.x) * factor,
            y: center.y + (max.y - center.y) * factor,
        },
        Coord {
            x: center.x + (min.x - center.x) * factor,
            y: center.y + (min.y - center.y) * factor,
        },
    )
}

/// Suma dwóch prostokątów.
pub fn union_bounds(a: Rect<f64>, b: Rect<f64>) -> Rect<f64> {
    Rect::new(
        Coord {
            x: a.min().x.min(b.min().x),
            y: a.min().y.min(b.min().y),
        },
        Coord {
            x: a.max().x.max(b.max().x),
            y: a.max().y.max(b.max().y),
        },
    )
}

/// Czy geometria ma wypełnioną powierzchnię (Polygon/MultiPolygon,
/// także zagnieżdżone w GeometryCollection).
pub fn geometry_has_filled_surface(geometry: Option<&geojson::Geometry>) -> bool {
    geometry.is_some_and(|g| value_has_filled_surface(&g.value))
}

fn value_has_filled_surface(value: &Value) -> bool {
    match value {
        Value::Polygon(_) | Value::MultiPolygon(_) => true,
        Value::GeometryCollection(children) => children
            .iter()
            .any(|child| value_has_filled_surface(&child.value)),
        _ => false,
    }
}

/// Warstwa jest "powierzchniowa", jeśli każdy obiekt ma wypełnienie.
pub fn classify_as_area_based(data: &GeoJson) -> bool {
    match data {
        GeoJson::FeatureCollection(fc) => fc
            .features
            .iter()
            .all(|f| geometry_has_filled_surface(f.geometry.as_ref())),
        GeoJson::Feature(f) => geometry_has_filled_surface(f.geometry.as_ref()),
        GeoJson::Geometry(_) => false,
    }
}

/// Spłaszcza (Multi)Polygony do listy pierścieni liniowych.
pub fn flatten_to_rings(geometry: &geo::Geometry<f64>) -> Vec<LineString<f64>> {
    let mut rings = Vec::new();
    collect_rings(geometry, &mut rings);
    rings
}

fn collect_rings(geometry: &geo::Geometry<f64>, rings: &mut Vec<LineString<f64>>) {
    match geometry {
        geo::Geometry::Polygon(p) => push_polygon_rings(p, rings),
        geo::Geometry::MultiPolygon(mp) => mp.0.iter().for_each(|p| push_polygon_rings(p, rings)),
        geo::Geometry::Rect(r) => push_polygon_rings(&r.to_polygon(), rings),
        geo::Geometry::Triangle(t) => push_polygon_rings(&t.to_polygon(), rings),
        geo::Geometry::GeometryCollection(gc) => gc.0.iter().for_each(|g| collect_rings(g, rings)),
        _ => {}
    }
}

fn push_polygon_rings(polygon: &geo::Polygon<f64>, rings: &mut Vec<LineString<f64>>) {
    if !polygon.exterior().0.is_empty() {
        rings.push(polygon.exterior().clone());
    }
    rings.extend(polygon.interiors().iter().filter(|r| !r.0.is_empty()).cloned());
}

/// Odległość po kole wielkim w metrach.
pub fn distance_m(a: LatLng, b: LatLng) -> f64 {
    Haversine.distance(geo::Point::from(a), geo::Point::from(b))
}

pub fn total_length_m(points: &[LatLng]) -> f64 {
    points.windows(2).map(|w| distance_m(w[0], w[1])).sum()
}

/// Zachłanne przerzedzanie: punkt zostaje, gdy jest co najmniej
/// `tolerance_m` od ostatnio zachowanego.
pub fn simplify_latlngs(points: &[LatLng], tolerance_m: f64) -> Vec<LatLng> {
    let Some(&first) = points.first() else {
        return Vec::new();
    };
    let mut simplified = vec![first];
    let mut prev = first;
    for &p in &points[1..] {
        if distance_m(prev, p) >= tolerance_m {
            simplified.push(p);
            prev = p;
        }
    }
    simplified
}

/// Czy wszystkie punkty leżą w promieniu `threshold_px` od pierwszego.
pub fn all_within_pixels(points: &[ScreenPoint], threshold_px: f64) -> bool {
    let Some(reference) = points.first() else {
        return false;
    };
    points[1..]
        .iter()
        .all(|p| reference.distance_to(p) <= threshold_px)
}

/// Wynik wykrycia zamkniętej pętli.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClosedLoop {
    pub crossing_index: usize,
    pub crossing_point: LatLng,
}

// indeksy punktów w pierwszych `percentage` długości
fn start_segment(points: &[LatLng], threshold: f64) -> Vec<usize> {
    let mut segment = Vec::new();
    let mut accumulated = 0.0;
    for i in 1..points.len() {
        accumulated += distance_m(points[i - 1], points[i]);
        if accumulated > threshold {
            break;
        }
        segment.push(i);
    }
    segment
}

fn end_segment(points: &[LatLng], threshold: f64) -> Vec<usize> {
    let mut segment = Vec::new();
    let mut accumulated = 0.0;
    for i in (1..points.len()).rev() {
        accumulated += distance_m(points[i], points[i - 1]);
        if accumulated > threshold {
            break;
        }
        segment.push(i - 1);
    }
    segment
}

/// Sprawdza, czy linia zamyka się w pętlę: któryś punkt z początkowych
/// `percentage` długości leży w `tolerance_m` od punktu z końcowych
/// `percentage`, albo pierwszy i ostatni punkt są blisko siebie.
pub fn is_polyline_closed(
    points: &[LatLng],
    percentage: f64,
    tolerance_m: f64,
) -> Option<ClosedLoop> {
    if points.len() < 2 {
        return None;
    }
    let threshold = total_length_m(points) * percentage;
    let starts = start_segment(points, threshold);
    let ends = end_segment(points, threshold);

    for &s in &starts {
        for &e in &ends {
            if distance_m(points[s], points[e]) <= tolerance_m {
                return Some(ClosedLoop {
                    crossing_index: e,
                    crossing_point: points[e],
                });
            }
        }
    }

    let last = points.len() - 1;
    if distance_m(points[0], points[last]) <= tolerance_m {
        return Some(ClosedLoop {
            crossing_index: last,
            crossing_point: points[last],
        });
    }
    None
}

/// Buduje pierścień wielokąta: obcina `percentage` długości z obu końców
/// i domyka go punktem przecięcia. Zwrócony pierścień jest jawnie domknięty.
pub fn close_to_ring(points: &[LatLng], crossing_index: usize, percentage: f64) -> Vec<LatLng> {
    let Some(&crossing) = points.get(crossing_index) else {
        return points.to_vec();
    };
    let prune = total_length_m(points) * percentage;

    let mut start_keep = 0;
    let mut accumulated = 0.0;
    for i in 1..points.len() {
        accumulated += distance_m(points[i - 1], points[i]);
        if accumulated >= prune {
            start_keep = i;
            break;
        }
    }

    let mut end_keep = points.len() - 1;
    accumulated = 0.0;
    for i in (1..points.len()).rev() {
        accumulated += distance_m(points[i], points[i - 1]);
        if accumulated >= prune {
            end_keep = i - 1;
            break;
        }
    }

    let mut ring: Vec<LatLng> = if start_keep <= end_keep {
        points[start_keep..=end_keep].to_vec()
    } else {
        Vec::new()
    };
    if ring.first() != Some(&crossing) {
        ring.insert(0, crossing);
    }
    if ring.last() != Some(&crossing) || ring.len() == 1 {
        ring.push(crossing);
    }
    ring
}

/// Średnia arytmetyczna wierzchołków.
pub fn centroid(points: &[LatLng]) -> Option<LatLng> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (lat, lng) = points
        .iter()
        .fold((0.0, 0.0), |(lat, lng), p| (lat + p.lat, lng + p.lng));
    Some(LatLng::new(lat / n, lng / n))
}

fn usable_name(name: Option<&str>) -> Option<&str> {
    name.filter(|n| !n.is_empty())
}

/// Usuwa krótkie (≤ 2 punkty) przeskoki nazwy ścieżki w odpowiedzi
/// serwisu przyciągania, gdy sąsiednie serie mają tę samą nazwę.
pub fn adjust_snapped_locations(locations: &[SnappedLocation]) -> Vec<SnappedLocation> {
    let mut adjusted = Vec::with_capacity(locations.len());
    let mut i = 0;
    while i < locations.len() {
        let current = locations[i].name.as_deref();
        let mut j = i + 1;
        while j < locations.len() && locations[j].name.as_deref() == current {
            j += 1;
        }

        let previous = if i > 0 { locations[i - 1].name.as_deref() } else { None };
        let next = locations.get(j).and_then(|l| l.name.as_deref());
        let blip = j - i <= 2
            && usable_name(previous).is_some()
            && previous == next
            && current != previous;

        if !blip {
            adjusted.extend_from_slice(&locations[i..j]);
        }
        i = j;
    }
    adjusted
}

#[cfg(test)]
mod tests {
    use super::*;
    use geojson::{Feature, FeatureCollection, Geometry};

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Rect<f64> {
        Rect::new(Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 })
    }

    fn loc(name: &str) -> SnappedLocation {
        SnappedLocation {
            location: [0.0, 0.0],
            name: Some(name.to_string()),
        }
    }

    #[test]
    fn scale_bounds_keeps_center_and_contains_original() {
        let b = rect(-2.0, 51.0, -1.0, 52.0);
        let scaled = scale_bounds(b, NETWORK_BOUNDS_SCALE);
        assert!((scaled.center().x - b.center().x).abs() < 1e-12);
        assert!((scaled.center().y - b.center().y).abs() < 1e-12);
        assert!(scaled.min().x < b.min().x && scaled.min().y < b.min().y);
        assert!(scaled.max().x > b.max().x && scaled.max().y > b.max().y);
        assert!((scaled.width() - 1.25).abs() < 1e-12);
    }

    #[test]
    fn union_covers_both() {
        let u = union_bounds(rect(0.0, 0.0, 1.0, 1.0), rect(2.0, -1.0, 3.0, 0.5));
        assert_eq!(u, rect(0.0, -1.0, 3.0, 1.0));
    }

    #[test]
    fn filled_surface_recurses_into_collections() {
        let line = Geometry::new(Value::LineString(vec![vec![0.0, 0.0], vec![1.0, 1.0]]));
        let poly = Geometry::new(Value::Polygon(vec![vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 0.0],
        ]]));
        let only_lines = Geometry::new(Value::GeometryCollection(vec![line.clone()]));
        let mixed = Geometry::new(Value::GeometryCollection(vec![line.clone(), poly.clone()]));

        assert!(!geometry_has_filled_surface(None));
        assert!(!geometry_has_filled_surface(Some(&line)));
        assert!(geometry_has_filled_surface(Some(&poly)));
        assert!(!geometry_has_filled_surface(Some(&only_lines)));
        assert!(geometry_has_filled_surface(Some(&mixed)));

        let fc = GeoJson::FeatureCollection(FeatureCollection {
            bbox: None,
            features: vec![
                Feature::from(poly.clone()),
                Feature::from(line),
            ],
            foreign_members: None,
        });
        assert!(!classify_as_area_based(&fc));
        let single = GeoJson::Feature(Feature::from(poly));
        assert!(classify_as_area_based(&single));
    }

    #[test]
    fn flatten_collects_all_rings() {
        let outer = LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 0.0)]);
        let hole = LineString::from(vec![(1.0, 1.0), (2.0, 1.0), (2.0, 2.0), (1.0, 1.0)]);
        let p1 = geo::Polygon::new(outer.clone(), vec![hole]);
        let p2 = geo::Polygon::new(outer, vec![]);
        let mp = geo::Geometry::MultiPolygon(geo::MultiPolygon(vec![p1, p2]));
        assert_eq!(flatten_to_rings(&mp).len(), 3);
        let line = geo::Geometry::LineString(LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]));
        assert!(flatten_to_rings(&line).is_empty());
    }

    #[test]
    fn simplify_keeps_first_and_spaces_points() {
        let pts: Vec<LatLng> = (0..100)
            .map(|i| LatLng::new(53.0, -2.0 + i as f64 * 0.00002))
            .collect();
        let out = simplify_latlngs(&pts, SIMPLIFY_TOLERANCE_M);
        assert_eq!(out[0], pts[0]);
        assert!(out.len() < pts.len());
        for w in out.windows(2) {
            assert!(distance_m(w[0], w[1]) >= SIMPLIFY_TOLERANCE_M);
        }
        assert!(simplify_latlngs(&[], 10.0).is_empty());
    }

    #[test]
    fn explicit_closure_short_circuits() {
        let pts = vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 1.0),
            LatLng::new(0.0, 0.0001),
        ];
        let closed = is_polyline_closed(&pts, CLOSED_LOOP_PERCENTAGE, CLOSED_LOOP_TOLERANCE_M)
            .expect("closed");
        assert_eq!(closed.crossing_index, 2);
        assert_eq!(closed.crossing_point, pts[2]);
    }

    #[test]
    fn open_line_is_not_closed() {
        let pts: Vec<LatLng> = (0..20).map(|i| LatLng::new(53.0, -2.0 + i as f64 * 0.001)).collect();
        assert!(is_polyline_closed(&pts, 0.1, 50.0).is_none());
        assert!(is_polyline_closed(&pts[..1], 0.1, 50.0).is_none());
    }

    fn square_loop() -> Vec<LatLng> {
        // ~1 km kwadrat, koniec zachodzi na początek
        let mut pts = Vec::new();
        for i in 0..10 {
            pts.push(LatLng::new(53.0, -2.0 + i as f64 * 0.0015));
        }
        for i in 0..10 {
            pts.push(LatLng::new(53.0 + i as f64 * 0.0009, -1.985));
        }
        for i in 0..10 {
            pts.push(LatLng::new(53.009, -1.985 - i as f64 * 0.0015));
        }
        for i in 0..11 {
            pts.push(LatLng::new(53.009 - i as f64 * 0.0009, -2.0));
        }
        pts.push(LatLng::new(53.0001, -1.999));
        pts.push(LatLng::new(53.0001, -1.998));
        pts
    }

    #[test]
    fn overlapping_ends_close_the_loop() {
        let pts = square_loop();
        let closed = is_polyline_closed(&pts, 0.1, 50.0).expect("closed");
        assert!(closed.crossing_index > pts.len() / 2);
        let ring = close_to_ring(&pts, closed.crossing_index, 0.1);
        assert_eq!(ring.first(), Some(&closed.crossing_point));
        assert_eq!(ring.last(), Some(&closed.crossing_point));
        assert!(ring.len() < pts.len() + 2);
    }

    #[test]
    fn all_within_pixels_uses_first_point() {
        let pts = [ScreenPoint::new(10.0, 10.0), ScreenPoint::new(25.0, 10.0)];
        assert!(all_within_pixels(&pts, 20.0));
        let far = [ScreenPoint::new(10.0, 10.0), ScreenPoint::new(40.0, 10.0)];
        assert!(!all_within_pixels(&far, 20.0));
        assert!(!all_within_pixels(&[], 20.0));
    }

    #[test]
    fn centroid_is_mean() {
        let c = centroid(&[LatLng::new(0.0, 0.0), LatLng::new(2.0, 4.0)]).unwrap();
        assert_eq!(c, LatLng::new(1.0, 2.0));
        assert!(centroid(&[]).is_none());
    }

    #[test]
    fn single_blip_is_dropped() {
        let input = vec![loc("A"), loc("A"), loc("B"), loc("A"), loc("A")];
        let out = adjust_snapped_locations(&input);
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|l| l.name.as_deref() == Some("A")));
    }

    #[test]
    fn long_or_unbracketed_runs_survive() {
        let input = vec![loc("A"), loc("B"), loc("B"), loc("B"), loc("A")];
        assert_eq!(adjust_snapped_locations(&input).len(), 5);
        let input = vec![loc("A"), loc("B"), loc("C")];
        assert_eq!(adjust_snapped_locations(&input).len(), 3);
        let input = vec![loc("B"), loc("A")];
        assert_eq!(adjust_snapped_locations(&input).len(), 2);
    }

    #[test]
    fn two_point_blip_is_dropped() {
        let input = vec![loc("A"), loc("A"), loc("B"), loc("B"), loc("A"), loc("A")];
        let out = adjust_snapped_locations(&input);
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|l| l.name.as_deref() == Some("A")));
    }

    #[test]
    fn three_point_run_is_kept() {
        let input = vec![loc("A"), loc("B"), loc("B"), loc("B"), loc("A"), loc("A")];
        let out = adjust_snapped_locations(&input);
        assert_eq!(out, input);
    }

    #[test]
    fn runs_at_the_ends_are_kept() {
        let input = vec![loc("B"), loc("A"), loc("A")];
        assert_eq!(adjust_snapped_locations(&input), input);
        let input = vec![loc("A"), loc("A"), loc("B")];
        assert_eq!(adjust_snapped_locations(&input), input);
        let input = vec![loc("B"), loc("B"), loc("A"), loc("A"), loc("A")];
        assert_eq!(adjust_snapped_locations(&input), input);
    }

    #[test]
    fn unnamed_neighbours_do_not_drop_a_run() {
        let unnamed = SnappedLocation {
            location: [0.0, 0.0],
            name: None,
        };
        let input = vec![unnamed.clone(), loc("B"), unnamed.clone()];
        assert_eq!(adjust_snapped_locations(&input), input);

        let empty = SnappedLocation {
            location: [0.0, 0.0],
            name: Some(String::new()),
        };
        let input = vec![empty.clone(), loc("B"), empty];
        assert_eq!(adjust_snapped_locations(&input).len(), 3);
    }
}
