//! Per-layer synthesis of the tri-directional cubic lattice.
//!
//! Every octree cube is viewed standing on a corner: the fixed octree
//! rotation maps the cube body diagonal onto +Z. Slicing such a cube at a
//! given height yields a triangle whose edges run in three directions 120°
//! apart; each cube close enough to the plane contributes one segment per
//! direction.

use std::f64::consts::{PI, SQRT_2};

use octofill_math::{scale, Line, Point, Point3, Transform, Vec3};

use crate::merge::connect_lines;
use crate::octree::{Cube, CubeProperties, Octree};

/// Lines grouped by direction, one bucket per multiple of 120°.
pub type LineBuckets = [Vec<Line>; 3];

/// Euler angles of the octree rotation, X applied first.
pub fn octree_rotation_angles() -> Vec3 {
    Vec3::new(5.0 * PI / 4.0, 215.264_f64.to_radians(), PI / 6.0)
}

/// Rotation that stands every octree cube on its corner.
pub fn octree_rotation() -> Transform {
    Transform::from_euler_xyz(octree_rotation_angles())
}

/// Generate the lattice lines of `octree` at height `z`.
pub fn generate_infill_lines(octree: &Octree, z: f64) -> LineBuckets {
    let mut buckets = LineBuckets::default();
    if let Some(depth) = octree.max_depth() {
        let rotation = octree_rotation();
        let origin = rotation.apply_point(octree.origin());
        generate_cube_lines(
            octree.root(),
            z,
            &origin,
            &rotation,
            octree.cubes_properties(),
            depth,
            &mut buckets,
        );
    }
    buckets
}

/// Emit the lines of `cube` (at `depth`) and its subtree into `buckets`.
///
/// `rotated_origin` is the octree origin already transformed by `rotation`;
/// line positions are relative to it.
pub(crate) fn generate_cube_lines(
    cube: &Cube,
    z: f64,
    rotated_origin: &Point3,
    rotation: &Transform,
    props: &[CubeProperties],
    depth: usize,
    buckets: &mut LineBuckets,
) {
    let level = &props[depth];
    let center = rotation.apply_point(&cube.center);
    let z_diff = (z - center.z).abs();

    if z_diff <= level.height / 2.0 && z_diff < level.line_z_distance {
        let half_length =
            (level.diagonal_length / 2.0) * (level.line_z_distance - z_diff) / level.line_z_distance;
        let xy_offset = level.line_xy_distance - (z - (center.z - level.line_z_distance)) / SQRT_2;

        let mut from = Point::new(scale(half_length), scale(xy_offset));
        let mut to = Point::new(-from.x, from.y);

        let offset = center - *rotated_origin;
        let shift = Point::new(scale(offset.x), scale(offset.y));

        let rotation_angle = 2.0 * PI / 3.0;
        for lines in buckets.iter_mut() {
            connect_lines(lines, Line::new(from + shift, to + shift));
            from.rotate(rotation_angle);
            to.rotate(rotation_angle);
        }
    }

    // Children are positioned independently of the parent's band test.
    if let Some(child_depth) = depth.checked_sub(1) {
        for child in cube.children() {
            generate_cube_lines(child, z, rotated_origin, rotation, props, child_depth, buckets);
        }
    }
}
