//! Region offsetting through Clipper.
//!
//! Coordinates are handed to Clipper in scaled units with a unit factor,
//! so results land back on the integer grid unchanged.

use geo::{Coord as GeoCoord, LineString, Polygon as GeoPolygon};
use geo_clipper::{Clipper, EndType, JoinType};
use octofill_math::{scale, Coord, Point};

use crate::path::{ExPolygon, Polygon};

/// Miter limit for offset corners, in multiples of the offset distance.
const MITER_LIMIT: f64 = 2.0;

fn ring_to_geo(polygon: &Polygon) -> LineString<f64> {
    let mut coords: Vec<GeoCoord<f64>> = polygon
        .points
        .iter()
        .map(|p| GeoCoord {
            x: p.x as f64,
            y: p.y as f64,
        })
        .collect();

    // Close the ring
    if let Some(&first) = coords.first() {
        if coords.last() != Some(&first) {
            coords.push(first);
        }
    }
    LineString::new(coords)
}

fn ring_from_geo(ring: &LineString<f64>) -> Option<Polygon> {
    let mut points: Vec<Point> = ring
        .coords()
        .map(|c| Point::new(c.x.round() as Coord, c.y.round() as Coord))
        .collect();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    (points.len() >= 3).then(|| Polygon::new(points))
}

fn expolygon_to_geo(region: &ExPolygon) -> GeoPolygon<f64> {
    GeoPolygon::new(
        ring_to_geo(&region.contour),
        region.holes.iter().map(ring_to_geo).collect(),
    )
}

/// Offset `region` by `delta` mm with mitered corners.
///
/// Positive delta grows the region, negative delta shrinks it (holes grow).
/// A shrink may split the region into several parts or remove it entirely;
/// an empty result means the region collapsed.
pub fn offset_expolygon(region: &ExPolygon, delta: f64) -> Vec<ExPolygon> {
    let result = expolygon_to_geo(region).offset(
        scale(delta) as f64,
        JoinType::Miter(MITER_LIMIT),
        EndType::ClosedPolygon,
        1.0,
    );

    result
        .0
        .iter()
        .filter_map(|poly| {
            let contour = ring_from_geo(poly.exterior())?;
            let holes = poly.interiors().iter().filter_map(ring_from_geo).collect();
            Some(ExPolygon::new(contour, holes))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Polygon {
        Polygon::new_scale(&[(x0, y0), (x0 + size, y0), (x0 + size, y0 + size), (x0, y0 + size)])
    }

    fn area_mm2(region: &ExPolygon) -> f64 {
        region.area() * 1e-12
    }

    #[test]
    fn test_shrink_square() {
        let region = ExPolygon::new(square(0.0, 0.0, 10.0), Vec::new());
        let shrunk = offset_expolygon(&region, -1.0);
        assert_eq!(shrunk.len(), 1);
        assert!((area_mm2(&shrunk[0]) - 64.0).abs() < 1e-3);
        assert!(shrunk[0].contour.is_ccw());
        assert!(shrunk[0].contains(&Point::new_scale(5.0, 5.0)));
        assert!(!shrunk[0].contains(&Point::new_scale(0.5, 5.0)));
    }

    #[test]
    fn test_grow_square() {
        let region = ExPolygon::new(square(0.0, 0.0, 10.0), Vec::new());
        let grown = offset_expolygon(&region, 1.0);
        assert_eq!(grown.len(), 1);
        assert!((area_mm2(&grown[0]) - 144.0).abs() < 1e-3);
    }

    #[test]
    fn test_shrink_past_half_width_collapses() {
        let region = ExPolygon::new(square(0.0, 0.0, 10.0), Vec::new());
        assert!(offset_expolygon(&region, -6.0).is_empty());
        assert!(offset_expolygon(&ExPolygon::new(square(0.0, 0.0, 1.0), Vec::new()), -0.6).is_empty());
    }

    #[test]
    fn test_shrink_grows_holes() {
        let region = ExPolygon::new(square(0.0, 0.0, 10.0), vec![square(4.0, 4.0, 2.0)]);
        let shrunk = offset_expolygon(&region, -1.0);
        assert_eq!(shrunk.len(), 1);
        assert_eq!(shrunk[0].holes.len(), 1);
        // 8x8 contour around a 4x4 hole.
        assert!((area_mm2(&shrunk[0]) - 48.0).abs() < 1e-3);
        assert!(!shrunk[0].contains(&Point::new_scale(3.5, 5.0)));
    }

    #[test]
    fn test_shrink_splits_narrow_neck() {
        // Two 4x4 squares joined by a 1mm wide bridge.
        let dumbbell = Polygon::new_scale(&[
            (0.0, 0.0),
            (4.0, 0.0),
            (4.0, 1.5),
            (6.0, 1.5),
            (6.0, 0.0),
            (10.0, 0.0),
            (10.0, 4.0),
            (6.0, 4.0),
            (6.0, 2.5),
            (4.0, 2.5),
            (4.0, 4.0),
            (0.0, 4.0),
        ]);
        let region = ExPolygon::new(dumbbell, Vec::new());
        let parts = offset_expolygon(&region, -0.6);
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().any(|p| p.contains(&Point::new_scale(2.0, 2.0))));
        assert!(parts.iter().any(|p| p.contains(&Point::new_scale(8.0, 2.0))));
        for part in &parts {
            assert!(part.holes.is_empty());
            assert!(area_mm2(part) > 7.0 && area_mm2(part) < 9.0);
        }
    }
}
