//! Greedy fusion of collinear lattice segments.

use octofill_math::{scale, Coord, Line, Point};

/// Per-axis distance under which two endpoints are treated as the same point.
pub fn merge_epsilon() -> Coord {
    scale(0.10)
}

fn touches(p: &Point, q: &Point, eps: Coord) -> bool {
    (p.x - q.x).abs() < eps && (p.y - q.y).abs() < eps
}

/// Add `new_line` to `lines`, fusing it with segments it continues.
///
/// A stored segment ending where `new_line` starts is absorbed and its start
/// becomes the new start; a stored segment starting where `new_line` ends is
/// absorbed and its end becomes the new end. The extended segment is then
/// appended.
pub fn connect_lines(lines: &mut Vec<Line>, mut new_line: Line) {
    let eps = merge_epsilon();
    let mut i = 0;
    while i < lines.len() {
        if touches(&new_line.a, &lines[i].b, eps) {
            new_line.a = lines.remove(i).a;
        } else if touches(&new_line.b, &lines[i].a, eps) {
            new_line.b = lines.remove(i).b;
        } else {
            i += 1;
        }
    }
    lines.push(new_line);
}
