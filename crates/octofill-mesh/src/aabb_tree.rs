//! Bounding volume hierarchy over mesh triangles for proximity queries.
//!
//! Uses Surface Area Heuristic (SAH) for construction.

use octofill_math::{Point3, Vec3};

use crate::{Aabb3, TriangleMesh};

/// Maximum number of triangles stored in a leaf.
const LEAF_SIZE: usize = 4;

/// A tree node - either a leaf holding triangles or an internal node with children.
#[derive(Debug, Clone)]
enum TreeNode {
    Leaf {
        aabb: Aabb3,
        triangles: Vec<usize>,
    },
    Internal {
        aabb: Aabb3,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn aabb(&self) -> &Aabb3 {
        match self {
            TreeNode::Leaf { aabb, .. } | TreeNode::Internal { aabb, .. } => aabb,
        }
    }
}

/// Static AABB tree over the triangles of an indexed mesh.
///
/// Built once and queried read-only, so it can be shared between threads.
#[derive(Debug, Clone)]
pub struct TriangleTree {
    root: Option<TreeNode>,
    triangles: Vec<[Point3; 3]>,
}

impl TriangleTree {
    /// Build a tree over all triangles of `mesh`.
    ///
    /// The mesh must be indexed; see [`TriangleMesh::indexed`].
    pub fn build(mesh: &TriangleMesh) -> Self {
        let triangles: Vec<[Point3; 3]> = (0..mesh.num_triangles())
            .map(|t| {
                let [i0, i1, i2] = mesh.triangle_indices(t);
                [mesh.vertex(i0), mesh.vertex(i1), mesh.vertex(i2)]
            })
            .collect();

        let mut tri_data: Vec<(usize, Aabb3, Point3)> = triangles
            .iter()
            .enumerate()
            .map(|(idx, tri)| {
                let mut aabb = Aabb3::empty();
                for v in tri {
                    aabb.include_point(v);
                }
                (idx, aabb, aabb.center())
            })
            .collect();

        let root = if tri_data.is_empty() {
            None
        } else {
            Some(build_node(&mut tri_data))
        };

        Self { root, triangles }
    }

    /// True when the tree holds no triangles.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of indexed triangles.
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    /// Is any triangle within `sqrt(radius_sq)` of `point`?
    pub fn any_triangle_in_radius(&self, point: &Point3, radius_sq: f64) -> bool {
        match &self.root {
            Some(root) => self.any_in_node(root, point, radius_sq),
            None => false,
        }
    }

    fn any_in_node(&self, node: &TreeNode, point: &Point3, radius_sq: f64) -> bool {
        if node.aabb().squared_exterior_distance(point) > radius_sq {
            return false;
        }
        match node {
            TreeNode::Leaf { triangles, .. } => triangles
                .iter()
                .any(|&t| self.triangle_distance_sq(t, point) <= radius_sq),
            TreeNode::Internal { left, right, .. } => {
                self.any_in_node(left, point, radius_sq)
                    || self.any_in_node(right, point, radius_sq)
            }
        }
    }

    fn triangle_distance_sq(&self, t: usize, point: &Point3) -> f64 {
        let [a, b, c] = &self.triangles[t];
        let closest = closest_point_on_triangle(point, a, b, c);
        (closest - point).norm_squared()
    }
}

/// Closest point to `p` on triangle `abc` (Ericson, Real-Time Collision Detection 5.1.5).
pub fn closest_point_on_triangle(p: &Point3, a: &Point3, b: &Point3, c: &Point3) -> Point3 {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;

    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return *a;
    }

    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return *b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return *c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = va + vb + vc;
    if denom.abs() < f64::EPSILON {
        // Degenerate (zero-area) triangle: fall back to its vertices.
        return [*a, *b, *c]
            .into_iter()
            .min_by(|x, y| {
                (x - p)
                    .norm_squared()
                    .partial_cmp(&(y - p).norm_squared())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(*a);
    }
    let v = vb / denom;
    let w = vc / denom;
    a + ab * v + ac * w
}

/// Build a tree node recursively using SAH.
fn build_node(tri_data: &mut [(usize, Aabb3, Point3)]) -> TreeNode {
    let mut bounds = Aabb3::empty();
    for (_, aabb, _) in tri_data.iter() {
        bounds.include_aabb(aabb);
    }

    if tri_data.len() <= LEAF_SIZE {
        return TreeNode::Leaf {
            aabb: bounds,
            triangles: tri_data.iter().map(|(id, _, _)| *id).collect(),
        };
    }

    let (best_axis, best_pos) = find_best_split(tri_data, &bounds);
    let mut mid = partition_triangles(tri_data, best_axis, best_pos);

    // Fallback if partition fails
    if mid == 0 || mid == tri_data.len() {
        mid = tri_data.len() / 2;
    }

    let (left_data, right_data) = tri_data.split_at_mut(mid);
    TreeNode::Internal {
        aabb: bounds,
        left: Box::new(build_node(left_data)),
        right: Box::new(build_node(right_data)),
    }
}

/// Find the best split axis and position using SAH.
fn find_best_split(tri_data: &[(usize, Aabb3, Point3)], bounds: &Aabb3) -> (usize, f64) {
    const NUM_BUCKETS: usize = 12;

    let extent: Vec3 = bounds.size();
    let total_area = bounds.surface_area();

    let mut best_cost = f64::INFINITY;
    let mut best_axis = 0;
    let mut best_pos = bounds.center()[0];

    for axis in 0..3 {
        let axis_extent = extent[axis];
        if axis_extent < 1e-10 {
            continue;
        }
        let axis_min = bounds.min[axis];

        let mut bucket_counts = [0usize; NUM_BUCKETS];
        let mut bucket_bounds = [Aabb3::empty(); NUM_BUCKETS];

        for (_, aabb, centroid) in tri_data {
            let b = ((centroid[axis] - axis_min) / axis_extent * NUM_BUCKETS as f64) as usize;
            let b = b.min(NUM_BUCKETS - 1);
            bucket_counts[b] += 1;
            bucket_bounds[b].include_aabb(aabb);
        }

        for split in 1..NUM_BUCKETS {
            let mut left_count = 0;
            let mut left_bounds = Aabb3::empty();
            for i in 0..split {
                left_count += bucket_counts[i];
                if bucket_counts[i] > 0 {
                    left_bounds.include_aabb(&bucket_bounds[i]);
                }
            }

            let mut right_count = 0;
            let mut right_bounds = Aabb3::empty();
            for i in split..NUM_BUCKETS {
                right_count += bucket_counts[i];
                if bucket_counts[i] > 0 {
                    right_bounds.include_aabb(&bucket_bounds[i]);
                }
            }

            if left_count == 0 || right_count == 0 {
                continue;
            }

            // SAH cost: traversal + P(left) * N_left + P(right) * N_right
            let cost = 0.125
                + left_bounds.surface_area() / total_area * left_count as f64
                + right_bounds.surface_area() / total_area * right_count as f64;

            if cost < best_cost {
                best_cost = cost;
                best_axis = axis;
                best_pos = axis_min + (split as f64 / NUM_BUCKETS as f64) * axis_extent;
            }
        }
    }

    (best_axis, best_pos)
}

/// Partition triangles by centroid along an axis.
fn partition_triangles(tri_data: &mut [(usize, Aabb3, Point3)], axis: usize, pos: f64) -> usize {
    let mut left = 0;
    let mut right = tri_data.len();

    while left < right {
        if tri_data[left].2[axis] < pos {
            left += 1;
        } else {
            right -= 1;
            tri_data.swap(left, right);
        }
    }

    left
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[rustfmt::skip]
    fn make_cube_mesh(size: f32) -> TriangleMesh {
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
    fn test_tree_build() {
        let tree = TriangleTree::build(&make_cube_mesh(10.0));
        assert!(!tree.is_empty());
        assert_eq!(tree.len(), 12);
    }

    #[test]
    fn test_empty_tree_never_hits() {
        let tree = TriangleTree::build(&TriangleMesh::new());
        assert!(tree.is_empty());
        assert!(!tree.any_triangle_in_radius(&Point3::origin(), 1e12));
    }

    #[test]
    fn test_radius_query_near_face() {
        let tree = TriangleTree::build(&make_cube_mesh(10.0));

        // Center of the cube is 5 away from every face.
        let center = Point3::new(5.0, 5.0, 5.0);
        assert!(!tree.any_triangle_in_radius(&center, 4.9 * 4.9));
        assert!(tree.any_triangle_in_radius(&center, 5.1 * 5.1));

        // Just outside the +X face.
        let outside = Point3::new(10.5, 5.0, 5.0);
        assert!(tree.any_triangle_in_radius(&outside, 0.3));
        assert!(!tree.any_triangle_in_radius(&outside, 0.2));
    }

    #[test]
    fn test_closest_point_regions() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);

        // Face interior.
        let p = closest_point_on_triangle(&Point3::new(0.25, 0.25, 3.0), &a, &b, &c);
        assert_abs_diff_eq!(p.x, 0.25);
        assert_abs_diff_eq!(p.z, 0.0);

        // Vertex region.
        let p = closest_point_on_triangle(&Point3::new(-1.0, -1.0, 0.0), &a, &b, &c);
        assert_abs_diff_eq!((p - a).norm(), 0.0);

        // Edge region of BC.
        let p = closest_point_on_triangle(&Point3::new(1.0, 1.0, 0.0), &a, &b, &c);
        assert_abs_diff_eq!(p.x, 0.5);
        assert_abs_diff_eq!(p.y, 0.5);
    }
}
