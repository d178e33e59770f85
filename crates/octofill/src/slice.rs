//! Mesh slicing - intersect triangle mesh with horizontal planes.

use octofill_math::{Point, Point2, Point3};
use octofill_mesh::TriangleMesh;
use rayon::prelude::*;

use crate::error::{InfillError, Result};
use crate::path::{ExPolygon, Polygon};

/// A single layer from slicing.
#[derive(Debug, Clone)]
pub struct SliceLayer {
    /// Z height of this layer (mm).
    pub z: f64,
    /// Layer index (0 = first layer).
    pub index: usize,
    /// Closed contours, largest first.
    /// Outer contours are CCW, holes are CW.
    pub contours: Vec<Polygon>,
}

impl SliceLayer {
    /// Create a new empty layer.
    pub fn new(z: f64, index: usize) -> Self {
        Self {
            z,
            index,
            contours: Vec::new(),
        }
    }

    /// Fillable regions of this layer: outer contours with their holes.
    pub fn regions(&self) -> Vec<ExPolygon> {
        ExPolygon::group(&self.contours)
    }
}

/// Slice a triangle mesh at multiple Z heights.
///
/// Returns layers in the order of `layer_heights`.
pub fn slice_mesh(mesh: &TriangleMesh, layer_heights: &[f64]) -> Result<Vec<SliceLayer>> {
    if mesh.num_triangles() == 0 {
        return Err(InfillError::EmptyMesh);
    }

    let triangles = extract_triangles(&mesh.indexed());

    let layers: Vec<SliceLayer> = layer_heights
        .par_iter()
        .enumerate()
        .map(|(idx, &z)| slice_at_z(&triangles, z, idx))
        .collect();

    Ok(layers)
}

/// A triangle with its vertices and bounding Z range.
#[derive(Debug, Clone, Copy)]
struct Triangle {
    v: [Point3; 3],
    z_min: f64,
    z_max: f64,
}

fn extract_triangles(mesh: &TriangleMesh) -> Vec<Triangle> {
    (0..mesh.num_triangles())
        .map(|t| {
            let [i0, i1, i2] = mesh.triangle_indices(t);
            let v = [mesh.vertex(i0), mesh.vertex(i1), mesh.vertex(i2)];
            Triangle {
                v,
                z_min: v[0].z.min(v[1].z).min(v[2].z),
                z_max: v[0].z.max(v[1].z).max(v[2].z),
            }
        })
        .collect()
}

/// Slice mesh at a single Z height.
fn slice_at_z(triangles: &[Triangle], z: f64, index: usize) -> SliceLayer {
    let segments: Vec<(Point2, Point2)> = triangles
        .iter()
        .filter(|tri| tri.z_min <= z && tri.z_max >= z)
        .filter_map(|tri| triangle_plane_intersection(tri, z))
        .collect();

    let mut contours = chain_segments(segments);
    orient_by_nesting(&mut contours);

    tracing::trace!(z, contours = contours.len(), "sliced layer");
    SliceLayer {
        z,
        index,
        contours,
    }
}

/// Intersect a triangle with a horizontal plane at Z.
/// Returns the 2D line segment (projected to XY) if intersection exists.
fn triangle_plane_intersection(tri: &Triangle, z: f64) -> Option<(Point2, Point2)> {
    let eps = 1e-10;

    let d = [tri.v[0].z - z, tri.v[1].z - z, tri.v[2].z - z];

    if d.iter().all(|&di| di > eps) || d.iter().all(|&di| di < -eps) {
        return None;
    }

    let mut points: Vec<Point2> = Vec::with_capacity(3);
    for k in 0..3 {
        let (va, vb) = (&tri.v[k], &tri.v[(k + 1) % 3]);
        let (da, db) = (d[k], d[(k + 1) % 3]);

        if (da > eps && db < -eps) || (da < -eps && db > eps) {
            let t = da / (da - db);
            points.push(Point2::new(va.x + t * (vb.x - va.x), va.y + t * (vb.y - va.y)));
        } else if da.abs() <= eps && db.abs() > eps {
            points.push(Point2::new(va.x, va.y));
        } else if db.abs() <= eps && da.abs() > eps {
            points.push(Point2::new(vb.x, vb.y));
        }
    }

    points.dedup_by(|a, b| (*a - *b).norm() < eps);

    match points.as_slice() {
        [a, b, ..] => Some((*a, *b)),
        _ => None,
    }
}

/// Chain line segments into closed polygons, largest first.
fn chain_segments(segments: Vec<(Point2, Point2)>) -> Vec<Polygon> {
    let eps = 1e-6;
    let mut remaining = segments;
    let mut contours: Vec<Polygon> = Vec::new();

    while !remaining.is_empty() {
        let (start, end) = remaining.remove(0);
        let mut chain = vec![start, end];
        let mut chain_start = start;
        let mut chain_end = end;

        let mut changed = true;
        while changed {
            changed = false;

            let mut i = 0;
            while i < remaining.len() {
                let (pa, pb) = remaining[i];

                if (pb - chain_end).norm() < eps {
                    chain.push(pa);
                    chain_end = pa;
                } else if (pa - chain_end).norm() < eps {
                    chain.push(pb);
                    chain_end = pb;
                } else if (pb - chain_start).norm() < eps {
                    chain.insert(0, pa);
                    chain_start = pa;
                } else if (pa - chain_start).norm() < eps {
                    chain.insert(0, pb);
                    chain_start = pb;
                } else {
                    i += 1;
                    continue;
                }
                remaining.remove(i);
                changed = true;
            }
        }

        if chain.len() >= 3 && (chain_start - chain_end).norm() < eps {
            chain.pop();
        }
        if chain.len() >= 3 {
            let points = chain.iter().map(|p| Point::new_scale(p.x, p.y)).collect();
            contours.push(Polygon::new(points));
        }
    }

    contours.sort_by(|a, b| {
        b.signed_area()
            .abs()
            .partial_cmp(&a.signed_area().abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    contours
}

/// Orient contours by how deeply they are nested: even depth is an outer
/// boundary (CCW), odd depth is a hole (CW). Triangle winding is ignored.
fn orient_by_nesting(contours: &mut [Polygon]) {
    let depths: Vec<usize> = contours
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let Some(p) = c.points.first() else {
                return 0;
            };
            contours
                .iter()
                .enumerate()
                .filter(|&(j, other)| j != i && other.contains(p))
                .count()
        })
        .collect();

    for (contour, depth) in contours.iter_mut().zip(depths) {
        if depth % 2 == 0 {
            contour.ensure_ccw();
        } else {
            contour.ensure_cw();
        }
    }
}

/// Generate layer heights for slicing.
///
/// The first layer is sliced at half its height; every further layer at
/// the middle of its own height.
pub fn generate_layer_heights(
    z_min: f64,
    z_max: f64,
    first_layer_height: f64,
    layer_height: f64,
) -> Vec<f64> {
    let mut heights = Vec::new();

    if z_max <= z_min {
        return heights;
    }

    let first_z = z_min + first_layer_height / 2.0;
    if first_z <= z_max {
        heights.push(first_z);
    }

    let mut z = z_min + first_layer_height + layer_height / 2.0;
    while z <= z_max {
        heights.push(z);
        z += layer_height;
    }

    heights
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use octofill_math::scale;

    /// Axis-aligned box triangles appended to `vertices`/`indices`.
    #[rustfmt::skip]
    fn push_box(vertices: &mut Vec<f32>, indices: &mut Vec<u32>, min: [f32; 3], max: [f32; 3]) {
        let base = (vertices.len() / 3) as u32;
        let [x0, y0, z0] = min;
        let [x1, y1, z1] = max;
        vertices.extend_from_slice(&[
            x0, y0, z0, x1, y0, z0, x1, y1, z0, x0, y1, z0,
            x0, y0, z1, x1, y0, z1, x1, y1, z1, x0, y1, z1,
        ]);
        let faces: [u32; 36] = [
            0, 2, 1, 0, 3, 2,
            4, 5, 6, 4, 6, 7,
            0, 1, 5, 0, 5, 4,
            2, 3, 7, 2, 7, 6,
            0, 4, 7, 0, 7, 3,
            1, 2, 6, 1, 6, 5,
        ];
        indices.extend(faces.iter().map(|i| base + i));
    }

    fn make_cube_mesh() -> TriangleMesh {
        let (mut vertices, mut indices) = (Vec::new(), Vec::new());
        push_box(&mut vertices, &mut indices, [0.0; 3], [10.0; 3]);
        TriangleMesh::from_indexed(vertices, indices)
    }

    #[test]
    fn test_generate_layer_heights() {
        let heights = generate_layer_heights(0.0, 10.0, 0.3, 0.2);
        assert!(!heights.is_empty());
        assert_relative_eq!(heights[0], 0.15);
        assert_relative_eq!(heights[1], 0.4);
        assert!(*heights.last().unwrap() <= 10.0);
        assert!(generate_layer_heights(1.0, 1.0, 0.2, 0.2).is_empty());
    }

    #[test]
    fn test_slice_cube() {
        let mesh = make_cube_mesh();
        let heights = generate_layer_heights(0.0, 10.0, 0.3, 0.2);
        let layers = slice_mesh(&mesh, &heights).unwrap();
        assert_eq!(layers.len(), heights.len());
        for layer in &layers {
            assert_eq!(layer.contours.len(), 1);
            let contour = &layer.contours[0];
            assert!(contour.is_ccw());
            assert_relative_eq!(contour.signed_area(), (scale(10.0) as f64).powi(2), max_relative = 1e-9);
        }
    }

    #[test]
    fn test_slice_soup_matches_indexed() {
        let mesh = make_cube_mesh();
        let mut soup = Vec::new();
        for t in 0..mesh.num_triangles() {
            for i in mesh.triangle_indices(t) {
                let v = mesh.vertex(i);
                soup.extend_from_slice(&[v.x as f32, v.y as f32, v.z as f32]);
            }
        }
        let soup = TriangleMesh::from_soup(soup);
        let a = slice_mesh(&mesh, &[5.0]).unwrap();
        let b = slice_mesh(&soup, &[5.0]).unwrap();
        assert_relative_eq!(a[0].contours[0].signed_area(), b[0].contours[0].signed_area());
    }

    #[test]
    fn test_hollow_box_has_hole() {
        let (mut vertices, mut indices) = (Vec::new(), Vec::new());
        push_box(&mut vertices, &mut indices, [0.0; 3], [10.0; 3]);
        // Same winding as the outer box: orientation comes from nesting.
        push_box(&mut vertices, &mut indices, [3.0; 3], [7.0; 3]);
        let mesh = TriangleMesh::from_indexed(vertices, indices);

        let layers = slice_mesh(&mesh, &[1.0, 5.0]).unwrap();
        assert_eq!(layers[0].contours.len(), 1);
        assert_eq!(layers[0].regions().len(), 1);

        let layer = &layers[1];
        assert_eq!(layer.contours.len(), 2);
        assert!(layer.contours[0].is_ccw());
        assert!(!layer.contours[1].is_ccw());

        let regions = layer.regions();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].holes.len(), 1);
        assert!(!regions[0].contains(&Point::new_scale(5.0, 5.0)));
        assert!(regions[0].contains(&Point::new_scale(1.0, 5.0)));
    }

    #[test]
    fn test_empty_mesh_is_error() {
        assert!(matches!(
            slice_mesh(&TriangleMesh::new(), &[0.5]),
            Err(InfillError::EmptyMesh)
        ));
    }
}
