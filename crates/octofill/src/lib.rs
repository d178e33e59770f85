#![warn(missing_docs)]

//! Adaptive cubic infill for 3D printing.
//!
//! An octree is built once per object; its cubes are small near the mesh
//! surface and large in the bulk. Every layer then slices the rotated cubes
//! into a tri-directional lattice whose density follows the octree, crops it
//! to the layer's fillable region and chains the result into print paths.
//!
//! # Example
//!
//! ```ignore
//! use octofill::{generate_adaptive_infill, AdaptiveInfillSettings};
//! use octofill_mesh::TriangleMesh;
//!
//! let mesh: TriangleMesh = // ... load a closed mesh
//! let settings = AdaptiveInfillSettings::default();
//! let result = generate_adaptive_infill(&mesh, &settings)?;
//!
//! println!("Layers: {}", result.layers.len());
//! println!("Infill length: {:.0}mm", result.stats.total_length_mm);
//! ```

pub mod clip;
pub mod connect;
pub mod error;
pub mod fill;
pub mod lattice;
pub mod merge;
pub mod octree;
pub mod offset;
pub mod path;
pub mod slice;
pub mod svg;

pub use error::{InfillError, Result};
pub use fill::{fill_adaptive, Fill, FillAdaptive, FillObserver, FillParams};
pub use lattice::{generate_infill_lines, octree_rotation};
pub use merge::connect_lines;
pub use octree::{Cube, CubeProperties, Octree};
pub use offset::offset_expolygon;
pub use path::{ExPolygon, Polygon, Polyline};
pub use slice::{generate_layer_heights, slice_mesh, SliceLayer};
pub use svg::SvgDump;

use std::sync::Arc;

use octofill_math::SCALING_FACTOR;
use octofill_mesh::TriangleMesh;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Parameters of the adaptive infill pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveInfillSettings {
    /// Nominal distance between infill lines at the finest level (mm).
    pub line_spacing: f64,
    /// Layer height for non-first layers (mm).
    pub layer_height: f64,
    /// First layer height (mm).
    pub first_layer_height: f64,
    /// Distance the sliced contours are shrunk before filling (mm).
    pub region_inset: f64,
    /// Return cropped lattice segments without chaining them.
    pub dont_connect: bool,
}

impl Default for AdaptiveInfillSettings {
    fn default() -> Self {
        Self {
            line_spacing: 2.0,
            layer_height: 0.2,
            first_layer_height: 0.2,
            region_inset: 0.0,
            dont_connect: false,
        }
    }
}

impl AdaptiveInfillSettings {
    /// Parse settings from TOML; missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let settings: Self = toml::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings.
    ///
    /// A non-positive `line_spacing` is accepted: adaptive infill then does
    /// not apply and every layer comes back empty.
    pub fn validate(&self) -> Result<()> {
        if self.layer_height.is_nan() || self.layer_height <= 0.0 || self.layer_height > 1.0 {
            return Err(InfillError::InvalidSettings(
                "layer_height must be between 0 and 1mm".into(),
            ));
        }
        if self.first_layer_height.is_nan() || self.first_layer_height <= 0.0 {
            return Err(InfillError::InvalidSettings(
                "first_layer_height must be positive".into(),
            ));
        }
        if !self.region_inset.is_finite() || self.region_inset < 0.0 {
            return Err(InfillError::InvalidSettings(
                "region_inset must be zero or positive".into(),
            ));
        }
        Ok(())
    }

    /// Per-fill options derived from these settings.
    pub fn fill_params(&self) -> FillParams {
        FillParams {
            dont_connect: self.dont_connect,
        }
    }
}

/// Infill paths of one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct InfillLayer {
    /// Z height (mm).
    pub z: f64,
    /// Layer index.
    pub index: usize,
    /// Infill paths, in print order.
    pub paths: Vec<Polyline>,
}

/// Statistics about the generated infill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfillStats {
    /// Total number of layers.
    pub layer_count: usize,
    /// Levels of the cube-scale table (0 when adaptive infill did not apply).
    pub octree_levels: usize,
    /// Cubes in the octree (0 when adaptive infill did not apply).
    pub cube_count: usize,
    /// Number of infill paths over all layers.
    pub path_count: usize,
    /// Total infill path length (mm).
    pub total_length_mm: f64,
}

/// Result of the adaptive infill pipeline.
#[derive(Debug, Clone)]
pub struct AdaptiveInfillResult {
    /// Layers bottom to top.
    pub layers: Vec<InfillLayer>,
    /// Infill statistics.
    pub stats: InfillStats,
}

/// Generate adaptive infill for every layer of `mesh`.
pub fn generate_adaptive_infill(
    mesh: &TriangleMesh,
    settings: &AdaptiveInfillSettings,
) -> Result<AdaptiveInfillResult> {
    generate_adaptive_infill_with(mesh, settings, None)
}

/// Generate adaptive infill, notifying `observer` of every filled region.
///
/// This:
/// 1. Slices the mesh into layers
/// 2. Builds the octree once, centered on the mesh bounding box
/// 3. Fills the regions of all layers in parallel
/// 4. Computes statistics
#[tracing::instrument(skip_all, fields(triangles = mesh.num_triangles()))]
pub fn generate_adaptive_infill_with(
    mesh: &TriangleMesh,
    settings: &AdaptiveInfillSettings,
    observer: Option<Arc<dyn FillObserver>>,
) -> Result<AdaptiveInfillResult> {
    settings.validate()?;

    let bounds = mesh.bounding_box().ok_or(InfillError::EmptyMesh)?;

    let layer_heights = generate_layer_heights(
        bounds.min.z,
        bounds.max.z,
        settings.first_layer_height,
        settings.layer_height,
    );
    if layer_heights.is_empty() {
        return Err(InfillError::SliceFailed("model too thin to slice".into()));
    }

    let slice_layers = slice_mesh(mesh, &layer_heights)?;

    let octree = Octree::build(mesh, settings.line_spacing, bounds.center()).map(Arc::new);
    let params = settings.fill_params();

    let layers: Vec<InfillLayer> = slice_layers
        .par_iter()
        .map(|slice| {
            let mut fill = FillAdaptive::new(octree.clone(), slice.z, settings.line_spacing);
            if let Some(observer) = &observer {
                fill = fill.with_observer(Arc::clone(observer));
            }

            let paths: Vec<Polyline> = slice
                .regions()
                .iter()
                .flat_map(|region| inset_region(region, settings.region_inset))
                .flat_map(|region| fill.fill_surface(&params, &region))
                .collect();

            tracing::debug!(index = slice.index, z = slice.z, paths = paths.len(), "filled layer");
            InfillLayer {
                z: slice.z,
                index: slice.index,
                paths,
            }
        })
        .collect();

    let stats = InfillStats {
        layer_count: layers.len(),
        octree_levels: octree.as_ref().map_or(0, |o| o.cubes_properties().len()),
        cube_count: octree.as_ref().map_or(0, |o| o.cube_count()),
        path_count: layers.iter().map(|l| l.paths.len()).sum(),
        total_length_mm: layers
            .iter()
            .flat_map(|l| l.paths.iter())
            .map(|p| p.length() * SCALING_FACTOR)
            .sum(),
    };

    Ok(AdaptiveInfillResult { layers, stats })
}

/// Shrink `region` by `inset` mm; holes grow by the same amount.
///
/// Parts that collapse are dropped, so the result may be empty or hold
/// several regions where a narrow neck was pinched off.
fn inset_region(region: &ExPolygon, inset: f64) -> Vec<ExPolygon> {
    if inset <= 0.0 {
        return vec![region.clone()];
    }
    offset_expolygon(region, -inset)
}
