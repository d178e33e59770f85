//! Cropping of open paths against a fillable region.

use octofill_math::Point;

use crate::path::{ExPolygon, Polyline};

/// Parameter tolerance along a segment.
const T_EPS: f64 = 1e-9;

/// Crop polylines to the inside of `region`.
///
/// Each input polyline is split where it crosses the contour or a hole;
/// only the inside pieces are kept. Consecutive inside pieces of the same
/// polyline stay joined. Output order follows input order.
pub fn intersection_pl(polylines: &[Polyline], region: &ExPolygon) -> Vec<Polyline> {
    let mut out = Vec::new();
    for polyline in polylines {
        clip_polyline(polyline, region, &mut out);
    }
    out
}

fn clip_polyline(polyline: &Polyline, region: &ExPolygon, out: &mut Vec<Polyline>) {
    let mut current: Vec<Point> = Vec::new();

    for w in polyline.points.windows(2) {
        let (a, b) = (w[0], w[1]);
        if a == b {
            continue;
        }

        let mut ts = boundary_crossings(a, b, region);
        ts.push(0.0);
        ts.push(1.0);
        ts.sort_by(|x, y| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal));
        ts.dedup_by(|x, y| (*x - *y).abs() < T_EPS);

        for pair in ts.windows(2) {
            let (t0, t1) = (pair[0], pair[1]);
            let mid = lerp(a, b, (t0 + t1) / 2.0);
            if region.contains(&mid) {
                let p0 = lerp(a, b, t0);
                let p1 = lerp(a, b, t1);
                if current.last() != Some(&p0) {
                    flush(&mut current, out);
                    current.push(p0);
                }
                if p1 != p0 {
                    current.push(p1);
                }
            } else {
                flush(&mut current, out);
            }
        }
    }

    flush(&mut current, out);
}

/// Move a finished piece into the output; single points are discarded.
fn flush(current: &mut Vec<Point>, out: &mut Vec<Polyline>) {
    if current.len() >= 2 {
        out.push(Polyline::new(std::mem::take(current)));
    } else {
        current.clear();
    }
}

/// Parameters in (0, 1) where segment `ab` crosses any boundary edge.
fn boundary_crossings(a: Point, b: Point, region: &ExPolygon) -> Vec<f64> {
    let (ax, ay) = (a.x as f64, a.y as f64);
    let (rx, ry) = ((b.x - a.x) as f64, (b.y - a.y) as f64);
    let mut ts = Vec::new();

    for poly in region.boundaries() {
        for edge in poly.lines() {
            let (cx, cy) = (edge.a.x as f64, edge.a.y as f64);
            let (qx, qy) = ((edge.b.x - edge.a.x) as f64, (edge.b.y - edge.a.y) as f64);

            // Solve a + t * r = c + s * q
            let cross = rx * qy - ry * qx;
            if cross.abs() < f64::EPSILON {
                // Parallel edges are handled by the midpoint test.
                continue;
            }

            let (dx, dy) = (cx - ax, cy - ay);
            let t = (dx * qy - dy * qx) / cross;
            let s = (dx * ry - dy * rx) / cross;

            if (-T_EPS..=1.0 + T_EPS).contains(&s) && t > T_EPS && t < 1.0 - T_EPS {
                ts.push(t);
            }
        }
    }

    ts
}

fn lerp(a: Point, b: Point, t: f64) -> Point {
    if t <= 0.0 {
        return a;
    }
    if t >= 1.0 {
        return b;
    }
    Point::new(
        (a.x as f64 + (b.x - a.x) as f64 * t).round() as i64,
        (a.y as f64 + (b.y - a.y) as f64 * t).round() as i64,
    )
}
