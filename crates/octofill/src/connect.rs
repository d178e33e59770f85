//! Joining boundary-touching infill runs along the region boundary.
//!
//! Consecutive runs of a chained sequence are linked when the end of one
//! and the start of the next sit on the same boundary ring and the shorter
//! way around that ring between them is short enough. The link follows the
//! boundary, so the nozzle never leaves the filled region.

use std::cmp::Ordering;

use octofill_math::{scale, Line, Point, SCALED_EPSILON};

use crate::path::{point_segment_distance_sq, ExPolygon, Polygon, Polyline};

/// Maximal link length, in multiples of the line spacing.
pub const CONNECTION_LENGTH_FACTOR: f64 = 3.0;

/// A boundary ring with its arc-length parametrization.
struct Ring<'a> {
    polygon: &'a Polygon,
    /// Arc length at every vertex, starting at zero.
    offsets: Vec<f64>,
    perimeter: f64,
}

impl<'a> Ring<'a> {
    fn new(polygon: &'a Polygon) -> Self {
        let mut offsets = Vec::with_capacity(polygon.len());
        let mut acc = 0.0;
        for line in polygon.lines() {
            offsets.push(acc);
            acc += line.length();
        }
        Self {
            polygon,
            offsets,
            perimeter: acc,
        }
    }

    /// Arc parameter of `p` if it lies on this ring, with its distance².
    fn locate(&self, p: &Point) -> Option<(f64, f64)> {
        let eps = SCALED_EPSILON as f64;
        let mut best: Option<(f64, f64)> = None;
        for (k, line) in self.polygon.lines().enumerate() {
            let d = point_segment_distance_sq(p, &line);
            if d > eps * eps || best.is_some_and(|(_, bd)| bd <= d) {
                continue;
            }
            best = Some((self.offsets[k] + projection(p, &line), d));
        }
        best
    }

    /// Ring vertices strictly inside `arc`, in travel order.
    fn vertices_between(&self, arc: &Arc) -> Vec<Point> {
        let tol = SCALED_EPSILON as f64;
        let mut inside: Vec<(f64, Point)> = self
            .offsets
            .iter()
            .zip(self.polygon.points.iter())
            .filter_map(|(&s, &p)| {
                let off = (s - arc.start).rem_euclid(self.perimeter);
                (off > tol && off < arc.length - tol).then_some((off, p))
            })
            .collect();
        inside.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        let mut points: Vec<Point> = inside.into_iter().map(|(_, p)| p).collect();
        if !arc.forward {
            points.reverse();
        }
        points
    }
}

/// Distance along `line` from its start to the projection of `p`.
fn projection(p: &Point, line: &Line) -> f64 {
    let (dx, dy) = ((line.b.x - line.a.x) as f64, (line.b.y - line.a.y) as f64);
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        return 0.0;
    }
    let (px, py) = ((p.x - line.a.x) as f64, (p.y - line.a.y) as f64);
    ((px * dx + py * dy) / len).clamp(0.0, len)
}

/// Position of a point on the region boundary.
#[derive(Debug, Clone, Copy)]
struct BoundaryPos {
    ring: usize,
    param: f64,
}

/// A boundary stretch, stored as the forward interval `[start, start + length]`.
#[derive(Debug, Clone, Copy)]
struct Arc {
    ring: usize,
    start: f64,
    length: f64,
    /// Travel direction matches the ring orientation.
    forward: bool,
}

impl Arc {
    /// Shorter way around the ring from `from` to `to`.
    fn shortest(from: BoundaryPos, to: BoundaryPos, perimeter: f64) -> Option<Self> {
        if from.ring != to.ring {
            return None;
        }
        let fwd = (to.param - from.param).rem_euclid(perimeter);
        let bwd = perimeter - fwd;
        Some(if fwd <= bwd {
            Arc {
                ring: from.ring,
                start: from.param,
                length: fwd,
                forward: true,
            }
        } else {
            Arc {
                ring: from.ring,
                start: to.param,
                length: bwd,
                forward: false,
            }
        })
    }

    fn overlaps(&self, other: &Arc, perimeter: f64) -> bool {
        if self.ring != other.ring {
            return false;
        }
        let tol = SCALED_EPSILON as f64;
        let d = (other.start - self.start).rem_euclid(perimeter);
        d < self.length - tol || perimeter - d < other.length - tol
    }

    fn strictly_contains(&self, pos: &BoundaryPos, perimeter: f64) -> bool {
        if self.ring != pos.ring {
            return false;
        }
        let tol = SCALED_EPSILON as f64;
        let off = (pos.param - self.start).rem_euclid(perimeter);
        off > tol && off < self.length - tol
    }
}

/// Link consecutive boundary-touching runs along the region boundary.
///
/// `polylines` must be in chained order, each starting and ending on the
/// boundary of `region`. A link from run `i` to run `i + 1` is made when
/// both endpoints lie on the same ring and the shorter boundary stretch
/// between them is at most [`CONNECTION_LENGTH_FACTOR`] × `spacing`, does
/// not pass over any other run's endpoint and does not reuse a stretch an
/// earlier link already took. Shorter links are decided first.
pub fn connect_infill(polylines: Vec<Polyline>, region: &ExPolygon, spacing: f64) -> Vec<Polyline> {
    let polylines: Vec<Polyline> = polylines.into_iter().filter(|p| p.len() >= 2).collect();
    if polylines.len() < 2 {
        return polylines;
    }

    let rings: Vec<Ring> = region.boundaries().map(Ring::new).collect();
    let locate = |p: Option<Point>| -> Option<BoundaryPos> {
        let p = p?;
        rings
            .iter()
            .enumerate()
            .filter_map(|(ring, r)| r.locate(&p).map(|(param, d)| (ring, param, d)))
            .min_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal))
            .map(|(ring, param, _)| BoundaryPos { ring, param })
    };

    let ends: Vec<(Option<BoundaryPos>, Option<BoundaryPos>)> = polylines
        .iter()
        .map(|pl| (locate(pl.first_point()), locate(pl.last_point())))
        .collect();

    let length_max = CONNECTION_LENGTH_FACTOR * scale(spacing) as f64;
    let mut candidates: Vec<(usize, Arc)> = Vec::new();
    for i in 0..polylines.len() - 1 {
        let (Some(from), Some(to)) = (ends[i].1, ends[i + 1].0) else {
            continue;
        };
        let Some(arc) = Arc::shortest(from, to, rings[from.ring].perimeter) else {
            continue;
        };
        if arc.length <= length_max {
            candidates.push((i, arc));
        }
    }
    candidates.sort_by(|a, b| a.1.length.partial_cmp(&b.1.length).unwrap_or(Ordering::Equal));

    let mut taken: Vec<Arc> = Vec::new();
    let mut links: Vec<Option<Arc>> = vec![None; polylines.len()];
    for (i, arc) in candidates {
        let perimeter = rings[arc.ring].perimeter;
        if taken.iter().any(|t| t.overlaps(&arc, perimeter)) {
            continue;
        }
        let blocked = ends.iter().enumerate().any(|(j, (start, end))| {
            let start_hit = j != i + 1 && start.is_some_and(|s| arc.strictly_contains(&s, perimeter));
            let end_hit = j != i && end.is_some_and(|e| arc.strictly_contains(&e, perimeter));
            start_hit || end_hit
        });
        if blocked {
            continue;
        }
        taken.push(arc);
        links[i] = Some(arc);
    }

    let mut out: Vec<Polyline> = Vec::new();
    let mut current: Option<Polyline> = None;
    for (i, polyline) in polylines.into_iter().enumerate() {
        let mut run = match current.take() {
            Some(mut run) => {
                run.append(&polyline.points);
                run
            }
            None => polyline,
        };
        match links[i] {
            Some(arc) => {
                run.append(&rings[arc.ring].vertices_between(&arc));
                current = Some(run);
            }
            None => out.push(run),
        }
    }
    if let Some(run) = current {
        out.push(run);
    }

    tracing::trace!(runs = out.len(), "connected infill runs");
    out
}
