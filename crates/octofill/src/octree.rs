//! Adaptive octree whose cube size follows the mesh surface.
//!
//! The root cube is split into eight octants; an octant is kept (and split
//! further) only while some mesh triangle lies within the octant's
//! circumscribed sphere. Cubes near the surface therefore end up small and
//! cubes in the bulk of the solid stay large.

use octofill_math::{Point3, Vec3};
use octofill_mesh::{TriangleMesh, TriangleTree};

/// Geometric constants of one octree level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubeProperties {
    /// Length of a cube edge.
    pub edge_length: f64,
    /// Height of the cube standing on a corner (body diagonal).
    pub height: f64,
    /// Length of a face diagonal.
    pub diagonal_length: f64,
    /// Maximal Z distance from the cube center at which lines are created.
    pub line_z_distance: f64,
    /// XY offset baseline of the created lines.
    pub line_xy_distance: f64,
}

impl CubeProperties {
    /// Properties of a cube with the given edge length.
    pub fn new(edge_length: f64) -> Self {
        Self {
            edge_length,
            height: edge_length * 3.0_f64.sqrt(),
            diagonal_length: edge_length * 2.0_f64.sqrt(),
            line_z_distance: edge_length / 3.0_f64.sqrt(),
            line_xy_distance: edge_length / 6.0_f64.sqrt(),
        }
    }
}

/// Build the per-level table, smallest cubes first.
///
/// Edge lengths start at `2 * line_spacing` and double until a cube would
/// enclose the solid from any center inside its bounding box: the limit is
/// twice the diameter of the sphere around the bottom-center of the box.
pub fn make_cubes_properties(bbox_size: &Vec3, line_spacing: f64) -> Vec<CubeProperties> {
    // The furthest point from the center of the bottom of the bounding box.
    let furthest_point = (bbox_size.x * bbox_size.x / 4.0
        + bbox_size.y * bbox_size.y / 4.0
        + bbox_size.z * bbox_size.z)
        .sqrt();
    let max_cube_edge_length = furthest_point * 2.0;

    let mut properties = Vec::new();
    let mut edge_length = line_spacing * 2.0;
    while edge_length < max_cube_edge_length * 2.0 {
        properties.push(CubeProperties::new(edge_length));
        edge_length *= 2.0;
    }
    properties
}

/// Child center directions, in fixed octant order.
pub const CHILD_CENTERS: [[f64; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, -1.0],
];

/// One octree node. Its level is implied by its distance from the root.
#[derive(Debug, Clone, PartialEq)]
pub struct Cube {
    /// Center in unrotated object coordinates.
    pub center: Point3,
    /// Octants in [`CHILD_CENTERS`] order; `None` where pruned.
    pub children: [Option<Box<Cube>>; 8],
}

impl Cube {
    /// Leaf cube at `center`.
    pub fn new(center: Point3) -> Self {
        Self {
            center,
            children: Default::default(),
        }
    }

    /// Existing children.
    pub fn children(&self) -> impl Iterator<Item = &Cube> {
        self.children.iter().filter_map(|c| c.as_deref())
    }

    /// Does this cube have any children?
    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }

    /// Number of cubes in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children().map(Cube::count).sum::<usize>()
    }
}

/// Adaptive octree of a solid, built once and shared by all its layers.
#[derive(Debug, Clone, PartialEq)]
pub struct Octree {
    root_cube: Box<Cube>,
    origin: Point3,
    cubes_properties: Vec<CubeProperties>,
}

impl Octree {
    /// Build the octree for `mesh` with the root cube at `cube_center`.
    ///
    /// Returns `None` when `line_spacing` is not a positive finite number;
    /// adaptive infill does not apply and the caller should use another
    /// fill strategy. An empty mesh yields a childless root.
    #[tracing::instrument(skip(mesh))]
    pub fn build(mesh: &TriangleMesh, line_spacing: f64, cube_center: Point3) -> Option<Self> {
        if !line_spacing.is_finite() || line_spacing <= 0.0 {
            tracing::warn!(line_spacing, "adaptive infill disabled: invalid line spacing");
            return None;
        }

        let bbox_size = mesh
            .bounding_box()
            .map(|bb| bb.size())
            .unwrap_or_else(Vec3::zeros);
        let cubes_properties = make_cubes_properties(&bbox_size, line_spacing);

        let mesh = mesh.indexed();
        let tree = TriangleTree::build(&mesh);

        let mut root_cube = Box::new(Cube::new(cube_center));
        if let Some(depth) = cubes_properties.len().checked_sub(1) {
            expand_cube(&mut root_cube, &cubes_properties, &tree, depth);
        }

        let octree = Self {
            root_cube,
            origin: cube_center,
            cubes_properties,
        };
        tracing::debug!(
            levels = octree.cubes_properties.len(),
            cubes = octree.cube_count(),
            triangles = tree.len(),
            "built adaptive octree"
        );
        Some(octree)
    }

    /// The root cube.
    pub fn root(&self) -> &Cube {
        &self.root_cube
    }

    /// Reference point line offsets are measured from.
    pub fn origin(&self) -> &Point3 {
        &self.origin
    }

    /// Per-level constants, index = depth.
    pub fn cubes_properties(&self) -> &[CubeProperties] {
        &self.cubes_properties
    }

    /// Depth of the root cube, or `None` when the table is empty.
    pub fn max_depth(&self) -> Option<usize> {
        self.cubes_properties.len().checked_sub(1)
    }

    /// Total number of cubes.
    pub fn cube_count(&self) -> usize {
        self.root_cube.count()
    }
}

/// Recursively subdivide `cube`, keeping octants close to the surface.
fn expand_cube(cube: &mut Cube, props: &[CubeProperties], tree: &TriangleTree, depth: usize) {
    if depth == 0 {
        return;
    }

    let level = &props[depth];
    let radius_sq = level.height * level.height / 16.0;

    for (slot, dir) in cube.children.iter_mut().zip(CHILD_CENTERS.iter()) {
        let child_center = cube.center + Vec3::new(dir[0], dir[1], dir[2]) * (level.edge_length / 4.0);
        if tree.any_triangle_in_radius(&child_center, radius_sq) {
            let mut child = Box::new(Cube::new(child_center));
            expand_cube(&mut child, props, tree, depth - 1);
            *slot = Some(child);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[rustfmt::skip]
    pub(crate) fn make_cube_mesh(size: f32) -> TriangleMesh {
        let h = size / 2.0;
        let vertices = vec![
            -h, -h, -h, h, -h, -h, h, h, -h, -h, h, -h,
            -h, -h, h, h, -h, h, h, h, h, -h, h, h,
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
    fn test_cube_properties() {
        let p = CubeProperties::new(2.0);
        assert_relative_eq!(p.height, 2.0 * 3.0_f64.sqrt());
        assert_relative_eq!(p.diagonal_length, 2.0 * 2.0_f64.sqrt());
        assert_relative_eq!(p.line_z_distance, 2.0 / 3.0_f64.sqrt());
        assert_relative_eq!(p.line_xy_distance, 2.0 / 6.0_f64.sqrt());
    }

    #[test]
    fn test_table_level_count() {
        for spacing in [0.3, 1.0, 1.7, 4.0] {
            let size = Vec3::new(10.0, 10.0, 10.0);
            let props = make_cubes_properties(&size, spacing);

            let furthest = (25.0_f64 + 25.0 + 100.0).sqrt();
            let enclosing_edge = furthest * 4.0;
            let expected = (enclosing_edge / (2.0 * spacing)).log2().ceil() as usize;
            assert_eq!(props.len(), expected, "spacing {spacing}");

            assert_relative_eq!(props[0].edge_length, 2.0 * spacing);
            for w in props.windows(2) {
                assert!(w[1].edge_length > w[0].edge_length);
                assert!(w[1].height > w[0].height);
                assert!(w[1].line_z_distance > w[0].line_z_distance);
                assert_relative_eq!(w[1].edge_length, w[0].edge_length * 2.0);
            }
        }
    }

    #[test]
    fn test_table_is_deterministic() {
        let size = Vec3::new(3.0, 7.0, 2.5);
        assert_eq!(make_cubes_properties(&size, 0.8), make_cubes_properties(&size, 0.8));
    }

    #[test]
    fn test_invalid_spacing_returns_none() {
        let mesh = make_cube_mesh(10.0);
        for spacing in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(Octree::build(&mesh, spacing, Point3::origin()).is_none());
        }
    }

    #[test]
    fn test_empty_mesh_has_childless_root() {
        let octree = Octree::build(&TriangleMesh::new(), 1.0, Point3::origin()).unwrap();
        assert!(octree.root().is_leaf());
        assert_eq!(octree.cube_count(), 1);
        assert!(octree.max_depth().is_none());
    }

    #[test]
    fn test_cube_mesh_subdivides_near_surface() {
        let mesh = make_cube_mesh(10.0);
        let octree = Octree::build(&mesh, 1.0, Point3::origin()).unwrap();
        let depth = octree.max_depth().unwrap();
        assert_eq!(octree.cubes_properties().len(), 5);
        assert!(octree.cube_count() > 1);

        // Every kept cube at every level touches the surface within its sphere.
        let tree = TriangleTree::build(&mesh);
        check_prune(octree.root(), octree.cubes_properties(), &tree, depth);

        // The finest cubes exist and sit near a face.
        let mut leaves = Vec::new();
        collect_at_depth(octree.root(), depth, 0, &mut leaves);
        assert!(!leaves.is_empty());
        for c in leaves {
            let face_dist = 5.0 - c.x.abs().max(c.y.abs()).max(c.z.abs());
            assert!(face_dist.abs() < octree.cubes_properties()[0].height, "{c:?}");
        }
    }

    /// A child exists iff a triangle lies within its circumscribed sphere.
    fn check_prune(cube: &Cube, props: &[CubeProperties], tree: &TriangleTree, depth: usize) {
        if depth == 0 {
            assert!(cube.is_leaf());
            return;
        }
        let level = &props[depth];
        for (slot, dir) in cube.children.iter().zip(CHILD_CENTERS.iter()) {
            let center = cube.center + Vec3::new(dir[0], dir[1], dir[2]) * (level.edge_length / 4.0);
            let near = tree.any_triangle_in_radius(&center, level.height * level.height / 16.0);
            assert_eq!(slot.is_some(), near);
            if let Some(child) = slot {
                assert_eq!(child.center, center);
                check_prune(child, props, tree, depth - 1);
            }
        }
    }

    fn collect_at_depth(cube: &Cube, depth: usize, target: usize, out: &mut Vec<Point3>) {
        if depth == target {
            out.push(cube.center);
            return;
        }
        for child in cube.children() {
            collect_at_depth(child, depth - 1, target, out);
        }
    }
}
