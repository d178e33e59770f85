//! Surface filling: lattice lines cropped, chained and connected.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clip::intersection_pl;
use crate::connect::connect_infill;
use crate::lattice::generate_infill_lines;
use crate::octree::Octree;
use crate::path::{chain_polylines, ExPolygon, Polyline};

/// Per-call fill options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FillParams {
    /// Return the cropped segments as they are, without chaining.
    pub dont_connect: bool,
}

/// A fill strategy for one slice region.
pub trait Fill {
    /// Fill `region` with open paths.
    fn fill_surface(&self, params: &FillParams, region: &ExPolygon) -> Vec<Polyline>;

    /// Whether the caller must keep the output order as returned.
    fn no_sort(&self) -> bool {
        false
    }
}

/// Receives every finished fill, e.g. for debug dumps.
pub trait FillObserver: Send + Sync {
    /// Called once per fill with the final paths.
    fn on_fill(&self, z: f64, region: &ExPolygon, polylines: &[Polyline]);
}

/// Fill `region` at height `z` from `octree`.
///
/// A missing octree (adaptive infill not applicable) fills nothing.
pub fn fill_adaptive(
    octree: Option<&Octree>,
    z: f64,
    spacing: f64,
    region: &ExPolygon,
    params: &FillParams,
) -> Vec<Polyline> {
    let Some(octree) = octree else {
        return Vec::new();
    };

    let buckets = generate_infill_lines(octree, z);
    let all_polylines: Vec<Polyline> = buckets
        .iter()
        .flatten()
        .map(Polyline::from_line)
        .collect();

    let cropped = intersection_pl(&all_polylines, region);
    if params.dont_connect {
        return cropped;
    }

    // Only single segments spanning boundary to boundary can be linked.
    let (boundary, mut rest): (Vec<Polyline>, Vec<Polyline>) =
        cropped.into_iter().partition(|pl| {
            pl.len() == 2
                && region.has_boundary_point(&pl.points[0])
                && region.has_boundary_point(&pl.points[1])
        });

    let mut out = if boundary.is_empty() {
        Vec::new()
    } else {
        connect_infill(chain_polylines(boundary), region, spacing)
    };
    out.append(&mut rest);
    out
}

/// Adaptive cubic infill for one layer of one object.
#[derive(Clone)]
pub struct FillAdaptive {
    octree: Option<Arc<Octree>>,
    /// Height of the layer being filled.
    pub z: f64,
    /// Nominal line spacing (mm).
    pub spacing: f64,
    observer: Option<Arc<dyn FillObserver>>,
}

impl FillAdaptive {
    /// Filler for layer `z` of an object whose octree is `octree`.
    pub fn new(octree: Option<Arc<Octree>>, z: f64, spacing: f64) -> Self {
        Self {
            octree,
            z,
            spacing,
            observer: None,
        }
    }

    /// Attach an observer notified after every fill.
    pub fn with_observer(mut self, observer: Arc<dyn FillObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The shared octree, if adaptive infill applies.
    pub fn octree(&self) -> Option<&Octree> {
        self.octree.as_deref()
    }
}

impl std::fmt::Debug for FillAdaptive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FillAdaptive")
            .field("has_octree", &self.octree.is_some())
            .field("z", &self.z)
            .field("spacing", &self.spacing)
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}

impl Fill for FillAdaptive {
    #[tracing::instrument(level = "trace", skip_all, fields(z = self.z))]
    fn fill_surface(&self, params: &FillParams, region: &ExPolygon) -> Vec<Polyline> {
        let polylines = fill_adaptive(self.octree(), self.z, self.spacing, region, params);
        tracing::trace!(paths = polylines.len(), "filled surface");
        if let Some(observer) = &self.observer {
            observer.on_fill(self.z, region, &polylines);
        }
        polylines
    }

    fn no_sort(&self) -> bool {
        true
    }
}
