#![warn(missing_docs)]

//! Triangle meshes and triangle proximity queries for octofill.
//!
//! The mesh is a flat indexed triangle set. A mesh may also arrive as a
//! triangle soup (vertices only, three per triangle); [`TriangleMesh::indexed`]
//! materializes the shared-vertex form on demand.

pub mod aabb_tree;

pub use aabb_tree::{closest_point_on_triangle, TriangleTree};

use std::borrow::Cow;
use std::collections::HashMap;

use octofill_math::{Point3, Vec3};

/// Triangle mesh of a printable solid.
#[derive(Debug, Clone)]
pub struct TriangleMesh {
    /// Flat array of vertex positions: `[x0, y0, z0, x1, y1, z1, ...]` (f32).
    pub vertices: Vec<f32>,
    /// Flat array of triangle indices: `[i0, i1, i2, ...]` (u32).
    ///
    /// Empty for a triangle soup, where every three vertices form a triangle.
    pub indices: Vec<u32>,
    /// Flat array of vertex normals: `[nx0, ny0, nz0, ...]` (f32). May be empty.
    pub normals: Vec<f32>,
}

impl TriangleMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            normals: Vec::new(),
        }
    }

    /// Create an indexed mesh from vertex positions and triangle indices.
    pub fn from_indexed(vertices: Vec<f32>, indices: Vec<u32>) -> Self {
        Self {
            vertices,
            indices,
            normals: Vec::new(),
        }
    }

    /// Create a triangle soup: every nine floats are one triangle.
    pub fn from_soup(vertices: Vec<f32>) -> Self {
        Self {
            vertices,
            indices: Vec::new(),
            normals: Vec::new(),
        }
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        if self.has_shared_vertices() {
            self.indices.len() / 3
        } else {
            self.vertices.len() / 9
        }
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Whether the mesh carries an index array.
    pub fn has_shared_vertices(&self) -> bool {
        !self.indices.is_empty() || self.vertices.is_empty()
    }

    /// Position of vertex `i`.
    pub fn vertex(&self, i: usize) -> Point3 {
        Point3::new(
            self.vertices[i * 3] as f64,
            self.vertices[i * 3 + 1] as f64,
            self.vertices[i * 3 + 2] as f64,
        )
    }

    /// Vertex indices of triangle `t`. Only valid on an indexed mesh.
    pub fn triangle_indices(&self, t: usize) -> [usize; 3] {
        [
            self.indices[t * 3] as usize,
            self.indices[t * 3 + 1] as usize,
            self.indices[t * 3 + 2] as usize,
        ]
    }

    /// The shared-vertex form of this mesh.
    ///
    /// Borrows `self` when it is already indexed; otherwise welds
    /// bit-identical soup vertices into a new indexed mesh.
    pub fn indexed(&self) -> Cow<'_, TriangleMesh> {
        if self.has_shared_vertices() {
            return Cow::Borrowed(self);
        }

        let mut lookup: HashMap<[u32; 3], u32> = HashMap::new();
        let mut vertices = Vec::new();
        let mut indices = Vec::with_capacity(self.vertices.len() / 3);

        for v in self.vertices.chunks_exact(3).take(self.num_triangles() * 3) {
            let key = [v[0].to_bits(), v[1].to_bits(), v[2].to_bits()];
            let idx = *lookup.entry(key).or_insert_with(|| {
                vertices.extend_from_slice(v);
                (vertices.len() / 3 - 1) as u32
            });
            indices.push(idx);
        }

        Cow::Owned(Self::from_indexed(vertices, indices))
    }

    /// Axis-aligned bounding box of all vertices, or `None` for an empty mesh.
    pub fn bounding_box(&self) -> Option<Aabb3> {
        if self.vertices.len() < 3 {
            return None;
        }
        let mut aabb = Aabb3::empty();
        for i in 0..self.num_vertices() {
            aabb.include_point(&self.vertex(i));
        }
        Some(aabb)
    }
}

impl Default for TriangleMesh {
    fn default() -> Self {
        Self::new()
    }
}

/// Axis-aligned bounding box in 3D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb3 {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Aabb3 {
    /// Create an AABB from min and max corners.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Create an empty (inverted) AABB suitable for expansion.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Expand this AABB to include a point.
    pub fn include_point(&mut self, p: &Point3) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Expand this AABB to include another one.
    pub fn include_aabb(&mut self, other: &Aabb3) {
        self.include_point(&other.min);
        self.include_point(&other.max);
    }

    /// Edge lengths along each axis.
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Center point.
    pub fn center(&self) -> Point3 {
        Point3::from((self.min.coords + self.max.coords) / 2.0)
    }

    /// Squared distance from `p` to the box; zero when `p` is inside.
    pub fn squared_exterior_distance(&self, p: &Point3) -> f64 {
        let mut d = 0.0;
        for axis in 0..3 {
            let v = p[axis];
            if v < self.min[axis] {
                d += (self.min[axis] - v).powi(2);
            } else if v > self.max[axis] {
                d += (v - self.max[axis]).powi(2);
            }
        }
        d
    }

    /// Surface area, used by the SAH split heuristic.
    pub fn surface_area(&self) -> f64 {
        let d = self.size();
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[rustfmt::skip]
    fn make_cube_mesh() -> TriangleMesh {
        let size = 10.0f32;
        let vertices = vec![
            0.0, 0.0, 0.0, size, 0.0, 0.0, size, size, 0.0, 0.0, size, 0.0,
            0.0, 0.0, size, size, 0.0, size, size, size, size, 0.0, size, size,
        ];
        let indices = vec![
            0, 2, 1, 0, 3, 2,
            4, 5, 6, 4, 6, 7,
            0, 1, 5, 0, 5, 4,
            2, 3, 7, 2, 7, 6,
            0, 4, 7, 0, 7, 3,
            1, 2, 6, 1, 6, 5,
        ];
        TriangleMesh::from_indexed(vertices, indices)
    }

    #[test]
    fn test_bounding_box() {
        let mesh = make_cube_mesh();
        let bb = mesh.bounding_box().unwrap();
        assert_abs_diff_eq!(bb.min.x, 0.0);
        assert_abs_diff_eq!(bb.max.z, 10.0);
        assert_abs_diff_eq!(bb.center().y, 5.0);
        assert_abs_diff_eq!(bb.size().x, 10.0);
    }

    #[test]
    fn test_empty_mesh_has_no_bounds() {
        let mesh = TriangleMesh::new();
        assert!(mesh.bounding_box().is_none());
        assert_eq!(mesh.num_triangles(), 0);
        assert!(mesh.has_shared_vertices());
    }

    #[test]
    fn test_soup_is_welded() {
        let cube = make_cube_mesh();
        let mut soup = Vec::new();
        for t in 0..cube.num_triangles() {
            for i in cube.triangle_indices(t) {
                let v = cube.vertex(i);
                soup.extend_from_slice(&[v.x as f32, v.y as f32, v.z as f32]);
            }
        }
        let soup = TriangleMesh::from_soup(soup);
        assert!(!soup.has_shared_vertices());
        assert_eq!(soup.num_triangles(), 12);

        let indexed = soup.indexed();
        assert!(matches!(indexed, Cow::Owned(_)));
        assert_eq!(indexed.num_vertices(), 8);
        assert_eq!(indexed.num_triangles(), 12);
    }

    #[test]
    fn test_indexed_mesh_is_borrowed() {
        let cube = make_cube_mesh();
        assert!(matches!(cube.indexed(), Cow::Borrowed(_)));
    }

    #[test]
    fn test_exterior_distance() {
        let bb = Aabb3::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        assert_abs_diff_eq!(bb.squared_exterior_distance(&Point3::new(0.5, 0.5, 0.5)), 0.0);
        assert_abs_diff_eq!(bb.squared_exterior_distance(&Point3::new(3.0, 0.5, 0.5)), 4.0);
        assert_abs_diff_eq!(bb.squared_exterior_distance(&Point3::new(2.0, 2.0, 0.5)), 2.0);
    }
}
