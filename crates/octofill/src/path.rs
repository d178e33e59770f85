//! Slice-plane path types and travel optimization.

use octofill_math::{Line, Point, SCALED_EPSILON};

/// A 2D polygon (closed path) in scaled coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polygon {
    /// Vertices of the polygon in order.
    pub points: Vec<Point>,
}

impl Polygon {
    /// Create a new polygon from points.
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Create a polygon from millimetre coordinates.
    pub fn new_scale(points: &[(f64, f64)]) -> Self {
        Self::new(points.iter().map(|&(x, y)| Point::new_scale(x, y)).collect())
    }

    /// Check if the polygon is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Signed area in scaled units squared.
    /// Positive for counter-clockwise, negative for clockwise.
    pub fn signed_area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut area: i128 = 0;
        for i in 0..n {
            let j = (i + 1) % n;
            area += self.points[i].x as i128 * self.points[j].y as i128;
            area -= self.points[j].x as i128 * self.points[i].y as i128;
        }
        area as f64 / 2.0
    }

    /// Is the polygon counter-clockwise?
    pub fn is_ccw(&self) -> bool {
        self.signed_area() > 0.0
    }

    /// Reverse the winding order.
    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    /// Ensure counter-clockwise winding.
    pub fn ensure_ccw(&mut self) {
        if !self.is_ccw() {
            self.reverse();
        }
    }

    /// Ensure clockwise winding.
    pub fn ensure_cw(&mut self) {
        if self.is_ccw() {
            self.reverse();
        }
    }

    /// Closed edges of the polygon, last vertex back to the first.
    pub fn lines(&self) -> impl Iterator<Item = Line> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| Line::new(self.points[i], self.points[(i + 1) % n]))
    }

    /// Perimeter length in scaled units.
    pub fn perimeter(&self) -> f64 {
        if self.points.len() < 2 {
            return 0.0;
        }
        self.lines().map(|l| l.length()).sum()
    }

    /// Even-odd point containment test.
    pub fn contains(&self, point: &Point) -> bool {
        let n = self.points.len();
        if n < 3 {
            return false;
        }

        let (px, py) = (point.x as f64, point.y as f64);
        let mut inside = false;
        let mut j = n - 1;

        for i in 0..n {
            let (xi, yi) = (self.points[i].x as f64, self.points[i].y as f64);
            let (xj, yj) = (self.points[j].x as f64, self.points[j].y as f64);

            if ((yi > py) != (yj > py)) && (px < (xj - xi) * (py - yi) / (yj - yi) + xi) {
                inside = !inside;
            }
            j = i;
        }

        inside
    }

    /// Squared distance from `point` to the nearest edge, in scaled units.
    pub fn boundary_distance_sq(&self, point: &Point) -> f64 {
        self.lines()
            .map(|l| point_segment_distance_sq(point, &l))
            .fold(f64::INFINITY, f64::min)
    }
}

/// An open polyline (non-closed path) in scaled coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Polyline {
    /// Points along the path.
    pub points: Vec<Point>,
}

impl Polyline {
    /// Create a new polyline.
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Two-point polyline for a single segment.
    pub fn from_line(line: &Line) -> Self {
        Self::new(vec![line.a, line.b])
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Segments between consecutive points.
    pub fn lines(&self) -> Vec<Line> {
        self.points.windows(2).map(|w| Line::new(w[0], w[1])).collect()
    }

    /// Total length in scaled units.
    pub fn length(&self) -> f64 {
        self.points.windows(2).map(|w| w[0].distance(&w[1])).sum()
    }

    /// Starting point.
    pub fn first_point(&self) -> Option<Point> {
        self.points.first().copied()
    }

    /// Ending point.
    pub fn last_point(&self) -> Option<Point> {
        self.points.last().copied()
    }

    /// Reverse the direction of travel.
    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    /// Append points, skipping a leading point equal to the current end.
    pub fn append(&mut self, points: &[Point]) {
        let skip = match (self.points.last(), points.first()) {
            (Some(last), Some(first)) if last == first => 1,
            _ => 0,
        };
        self.points.extend_from_slice(&points[skip..]);
    }
}

/// A polygon with holes: one CCW outer contour and any number of CW holes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExPolygon {
    /// Outer boundary (counter-clockwise).
    pub contour: Polygon,
    /// Holes (clockwise).
    pub holes: Vec<Polygon>,
}

impl ExPolygon {
    /// Create from a contour and holes, normalizing winding.
    pub fn new(mut contour: Polygon, mut holes: Vec<Polygon>) -> Self {
        contour.ensure_ccw();
        for hole in &mut holes {
            hole.ensure_cw();
        }
        Self { contour, holes }
    }

    /// The outer contour followed by all holes.
    pub fn boundaries(&self) -> impl Iterator<Item = &Polygon> {
        std::iter::once(&self.contour).chain(self.holes.iter())
    }

    /// Inside the contour and outside every hole.
    pub fn contains(&self, point: &Point) -> bool {
        self.contour.contains(point) && !self.holes.iter().any(|h| h.contains(point))
    }

    /// Does `point` lie on the contour or a hole, within [`SCALED_EPSILON`]?
    pub fn has_boundary_point(&self, point: &Point) -> bool {
        let eps = SCALED_EPSILON as f64;
        self.boundaries()
            .any(|poly| poly.boundary_distance_sq(point) <= eps * eps)
    }

    /// Area in scaled units squared (contour minus holes).
    pub fn area(&self) -> f64 {
        self.boundaries().map(|p| p.signed_area()).sum()
    }

    /// Group loose contours into polygons with holes.
    ///
    /// CCW polygons are outer contours, CW polygons are holes. Each hole is
    /// assigned to the smallest outer contour containing its first vertex;
    /// holes with no parent are dropped.
    pub fn group(contours: &[Polygon]) -> Vec<ExPolygon> {
        let mut outers: Vec<(Polygon, Vec<Polygon>)> = contours
            .iter()
            .filter(|c| c.is_ccw())
            .map(|c| (c.clone(), Vec::new()))
            .collect();

        for hole in contours.iter().filter(|c| !c.is_ccw() && c.len() >= 3) {
            let Some(pt) = hole.points.first() else {
                continue;
            };
            let parent = outers
                .iter_mut()
                .filter(|(outer, _)| outer.contains(pt))
                .min_by(|(a, _), (b, _)| {
                    a.signed_area()
                        .partial_cmp(&b.signed_area())
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
            if let Some((_, holes)) = parent {
                holes.push(hole.clone());
            }
        }

        outers
            .into_iter()
            .map(|(contour, holes)| ExPolygon::new(contour, holes))
            .collect()
    }
}

/// Squared distance from `p` to segment `line`, in scaled units.
pub fn point_segment_distance_sq(p: &Point, line: &Line) -> f64 {
    let (ax, ay) = (line.a.x as f64, line.a.y as f64);
    let (dx, dy) = ((line.b.x - line.a.x) as f64, (line.b.y - line.a.y) as f64);
    let (px, py) = (p.x as f64 - ax, p.y as f64 - ay);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq > 0.0 {
        ((px * dx + py * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (ex, ey) = (px - t * dx, py - t * dy);
    ex * ex + ey * ey
}

/// Chain polylines into a travel-minimizing order.
///
/// Greedy nearest neighbor starting from the first polyline; each next
/// polyline is the one whose start or end is closest to the current
/// position, reversed when its end is the closer one. Empty polylines
/// are dropped.
pub fn chain_polylines(polylines: Vec<Polyline>) -> Vec<Polyline> {
    let mut remaining: Vec<Option<Polyline>> = polylines
        .into_iter()
        .filter(|p| !p.is_empty())
        .map(Some)
        .collect();
    let mut out: Vec<Polyline> = Vec::with_capacity(remaining.len());

    let mut current = remaining.first_mut().and_then(Option::take);
    while let Some(polyline) = current {
        let pos = polyline.last_point();
        out.push(polyline);
        current = pos.and_then(|pos| take_nearest(&mut remaining, pos));
    }

    out
}

/// Take the remaining polyline nearest to `pos`, oriented to start there.
fn take_nearest(remaining: &mut [Option<Polyline>], pos: Point) -> Option<Polyline> {
    let mut best: Option<(usize, bool, f64)> = None;

    for (idx, slot) in remaining.iter().enumerate() {
        let Some(pl) = slot else { continue };
        let (Some(first), Some(last)) = (pl.first_point(), pl.last_point()) else {
            continue;
        };
        let d_start = pos.distance_sq(&first);
        let d_end = pos.distance_sq(&last);
        let (reversed, d) = if d_end < d_start {
            (true, d_end)
        } else {
            (false, d_start)
        };
        if best.map_or(true, |(_, _, bd)| d < bd) {
            best = Some((idx, reversed, d));
        }
    }

    let (idx, reversed, _) = best?;
    let mut pl = remaining[idx].take()?;
    if reversed {
        pl.reverse();
    }
    Some(pl)
}
