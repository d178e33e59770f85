#![warn(missing_docs)]

//! Math types for the octofill adaptive infill engine.
//!
//! Thin wrappers around nalgebra for the 3D side (octree cube centers,
//! the fixed octree rotation) and a fixed-point integer coordinate
//! system for the 2D slice plane, where infill lines are emitted.

use std::ops::{Add, Sub};

use nalgebra::{Matrix4, Vector3, Vector4};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A point in the slice plane, in unscaled millimetres.
pub type Point2 = nalgebra::Point2<f64>;

/// Integer slice-plane coordinate.
pub type Coord = i64;

/// Millimetres per integer coordinate unit.
pub const SCALING_FACTOR: f64 = 1e-6;

/// Maximal distance (in scaled units) at which a point still counts as
/// lying on a polygon boundary.
pub const SCALED_EPSILON: Coord = 100;

/// Convert millimetres to scaled coordinates, rounding to the nearest unit.
#[inline]
pub fn scale(v: f64) -> Coord {
    (v / SCALING_FACTOR).round() as Coord
}

/// Convert scaled coordinates back to millimetres.
#[inline]
pub fn unscale(v: Coord) -> f64 {
    v as f64 * SCALING_FACTOR
}

/// A 4x4 affine transformation matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Rotation about the X axis by `angle` radians.
    pub fn rotation_x(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(1, 1)] = c;
        m[(1, 2)] = -s;
        m[(2, 1)] = s;
        m[(2, 2)] = c;
        Self { matrix: m }
    }

    /// Rotation about the Y axis by `angle` radians.
    pub fn rotation_y(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(0, 0)] = c;
        m[(0, 2)] = s;
        m[(2, 0)] = -s;
        m[(2, 2)] = c;
        Self { matrix: m }
    }

    /// Rotation about the Z axis by `angle` radians.
    pub fn rotation_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(0, 0)] = c;
        m[(0, 1)] = -s;
        m[(1, 0)] = s;
        m[(1, 1)] = c;
        Self { matrix: m }
    }

    /// Rotation from Euler angles `(x, y, z)` in radians.
    ///
    /// The X rotation is applied first, then Y, then Z (`Rz * Ry * Rx`).
    pub fn from_euler_xyz(angles: Vec3) -> Self {
        Self::rotation_z(angles.z)
            .then(&Self::rotation_y(angles.y))
            .then(&Self::rotation_x(angles.x))
    }

    /// Compose: `self` then `other` (self * other).
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a direction vector (ignores translation).
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        let r = self.matrix * Vector4::new(v.x, v.y, v.z, 0.0);
        Vec3::new(r.x, r.y, r.z)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// A point in scaled integer slice-plane coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    /// X coordinate.
    pub x: Coord,
    /// Y coordinate.
    pub y: Coord,
}

impl Point {
    /// Create a point from scaled coordinates.
    pub const fn new(x: Coord, y: Coord) -> Self {
        Self { x, y }
    }

    /// Create a point from millimetre coordinates.
    pub fn new_scale(x: f64, y: f64) -> Self {
        Self::new(scale(x), scale(y))
    }

    /// Convert to an unscaled millimetre point.
    pub fn to_point2(self) -> Point2 {
        Point2::new(unscale(self.x), unscale(self.y))
    }

    /// Rotate about the origin by `angle` radians, rounding to whole units.
    pub fn rotate(&mut self, angle: f64) {
        let (s, c) = angle.sin_cos();
        let x = self.x as f64;
        let y = self.y as f64;
        self.x = (c * x - s * y).round() as Coord;
        self.y = (c * y + s * x).round() as Coord;
    }

    /// Squared distance in scaled units, as `f64`.
    pub fn distance_sq(&self, other: &Point) -> f64 {
        let dx = (other.x - self.x) as f64;
        let dy = (other.y - self.y) as f64;
        dx * dx + dy * dy
    }

    /// Distance in scaled units.
    pub fn distance(&self, other: &Point) -> f64 {
        self.distance_sq(other).sqrt()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// A straight segment between two scaled points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Line {
    /// Start point.
    pub a: Point,
    /// End point.
    pub b: Point,
}

impl Line {
    /// Create a segment from `a` to `b`.
    pub const fn new(a: Point, b: Point) -> Self {
        Self { a, b }
    }

    /// Length in scaled units.
    pub fn length(&self) -> f64 {
        self.a.distance(&self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_identity_transform() {
        let t = Transform::identity();
        let p = Point3::new(1.0, 2.0, 3.0);
        let result = t.apply_point(&p);
        assert!((result - p).norm() < 1e-12);
    }

    #[test]
    fn test_rotation_z_90() {
        let t = Transform::rotation_z(PI / 2.0);
        let p = Point3::new(1.0, 0.0, 0.0);
        let result = t.apply_point(&p);
        assert!(result.x.abs() < 1e-12);
        assert!((result.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_euler_order_applies_x_first() {
        // X by 90° takes +Y to +Z, then Z by 90° leaves +Z alone.
        let t = Transform::from_euler_xyz(Vec3::new(PI / 2.0, 0.0, PI / 2.0));
        let r = t.apply_vec(&Vec3::new(0.0, 1.0, 0.0));
        assert_abs_diff_eq!(r.x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(r.y, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(r.z, 1.0, epsilon = 1e-12);

        // ...whereas +X goes to +Y under the Z rotation.
        let r = t.apply_vec(&Vec3::new(1.0, 0.0, 0.0));
        assert_abs_diff_eq!(r.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_scale_roundtrip() {
        assert_eq!(scale(1.0), 1_000_000);
        assert_eq!(scale(0.1), 100_000);
        assert_eq!(scale(-2.5), -2_500_000);
        assert_abs_diff_eq!(unscale(scale(12.345678)), 12.345678, epsilon = 1e-9);
        assert_eq!(SCALED_EPSILON, scale(1e-4));
    }

    #[test]
    fn test_point_rotate_rounds() {
        let mut p = Point::new(1_000_000, 0);
        p.rotate(PI / 2.0);
        assert_eq!(p, Point::new(0, 1_000_000));

        let start = Point::new(707_107, 250_000);
        let mut q = start;
        for _ in 0..3 {
            q.rotate(2.0 * PI / 3.0);
        }
        assert!(q.distance(&start) <= 3.0);
    }

    #[test]
    fn test_line_length() {
        let l = Line::new(Point::new(0, 0), Point::new(3, 4));
        assert_abs_diff_eq!(l.length(), 5.0);
    }
}
