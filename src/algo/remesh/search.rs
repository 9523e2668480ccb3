//! Bracketing search on target edge length.
//!
//! Remeshing with a given edge length produces a vertex count that is only
//! known after the fact. The search re-runs a remesher from scratch with
//! shrinking, then growing, edge lengths until the vertex count lands in
//! `[floor_ratio * target, target]`:
//!
//! 1. **Shrink** while the count is below the floor.
//! 2. **Grow** while the count is above the target.
//! 3. **Refine** by bisection if growing jumped past the whole window.
//!
//! Every phase is bounded. Shrinking stops at the larger of
//! `min_edge_length` and the length at which the input's surface area would
//! hold `max_vertex_count` vertices.

use crate::error::{MeshError, Result};
use crate::mesh::TriangleMesh;

use super::{IsotropicParams, IsotropicRemesher};

/// Default seed edge length in working-space units.
pub const DEFAULT_EDGE_LENGTH: f64 = 3.9;

/// Default cap on the estimated vertex count of a single remesh attempt.
pub const DEFAULT_MAX_VERTEX_COUNT: usize = 250_000;

/// Options for [`search_edge_length`].
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeLengthSearchOptions {
    /// Seed used when the caller passes an edge length of zero.
    pub default_edge_length: f64,

    /// Multiplier applied while the mesh is too sparse.
    pub shrink_factor: f64,

    /// Multiplier applied while the mesh is too dense.
    pub grow_factor: f64,

    /// Lower end of the accepted window as a fraction of the target count.
    pub floor_ratio: f64,

    /// Shrinking never goes below this edge length.
    pub min_edge_length: f64,

    /// Shrinking never goes below the edge length whose estimated vertex
    /// count on the input surface exceeds this.
    pub max_vertex_count: usize,

    /// Maximum remesh attempts per phase.
    pub max_iterations: usize,

    /// Maximum bisection attempts after an overshoot.
    pub max_refinements: usize,
}

impl Default for EdgeLengthSearchOptions {
    fn default() -> Self {
        Self {
            default_edge_length: DEFAULT_EDGE_LENGTH,
            shrink_factor: 0.9,
            grow_factor: 1.1,
            floor_ratio: 0.9,
            min_edge_length: 0.05,
            max_vertex_count: DEFAULT_MAX_VERTEX_COUNT,
            max_iterations: 64,
            max_refinements: 8,
        }
    }
}

impl EdgeLengthSearchOptions {
    /// Set the seed edge length.
    pub fn with_default_edge_length(mut self, length: f64) -> Self {
        self.default_edge_length = length;
        self
    }

    /// Set the minimum edge length.
    pub fn with_min_edge_length(mut self, length: f64) -> Self {
        self.min_edge_length = length;
        self
    }

    /// Set the vertex count cap that bounds shrinking.
    pub fn with_max_vertex_count(mut self, count: usize) -> Self {
        self.max_vertex_count = count;
        self
    }

    /// Edge length below which shrinking stops for an input of `area`.
    ///
    /// An isotropic closed mesh with edge length `L` has about
    /// `2 * area / (sqrt(3) * L^2)` vertices.
    pub fn edge_length_floor(&self, area: f64) -> f64 {
        let capped = (2.0 * area / (3.0_f64.sqrt() * self.max_vertex_count as f64)).sqrt();
        if capped.is_finite() {
            self.min_edge_length.max(capped)
        } else {
            self.min_edge_length
        }
    }

    /// Set the per-phase attempt limit.
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Set the bisection limit.
    pub fn with_max_refinements(mut self, refinements: usize) -> Self {
        self.max_refinements = refinements;
        self
    }

    /// Check that every option is in range.
    pub fn validate(&self) -> Result<()> {
        if !(self.default_edge_length > 0.0) {
            return Err(MeshError::invalid_param(
                "default_edge_length",
                self.default_edge_length,
                "must be positive",
            ));
        }
        if !(self.shrink_factor > 0.0 && self.shrink_factor < 1.0) {
            return Err(MeshError::invalid_param(
                "shrink_factor",
                self.shrink_factor,
                "must be in (0, 1)",
            ));
        }
        if !(self.grow_factor > 1.0) {
            return Err(MeshError::invalid_param("grow_factor", self.grow_factor, "must be greater than 1"));
        }
        if !(self.floor_ratio > 0.0 && self.floor_ratio <= 1.0) {
            return Err(MeshError::invalid_param("floor_ratio", self.floor_ratio, "must be in (0, 1]"));
        }
        if !(self.min_edge_length > 0.0) {
            return Err(MeshError::invalid_param(
                "min_edge_length",
                self.min_edge_length,
                "must be positive",
            ));
        }
        if self.max_vertex_count == 0 {
            return Err(MeshError::invalid_param(
                "max_vertex_count",
                self.max_vertex_count,
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// Outcome of [`search_edge_length`].
#[derive(Debug, Clone)]
pub struct EdgeLengthSearch {
    /// The accepted remeshed mesh.
    pub mesh: TriangleMesh,
    /// Edge length that produced `mesh`.
    pub edge_length: f64,
    /// Attempts made while shrinking.
    pub shrink_iterations: usize,
    /// Attempts made while growing.
    pub grow_iterations: usize,
    /// Bisection attempts made after an overshoot.
    pub refine_iterations: usize,
    /// Shrinking stopped at the edge length floor.
    pub hit_min_edge_length: bool,
}

impl EdgeLengthSearch {
    /// Vertex count of the accepted mesh.
    pub fn vertex_count(&self) -> usize {
        self.mesh.num_vertices()
    }
}

/// Search for an edge length whose remesh has between
/// `floor_ratio * target_vertex_count` and `target_vertex_count` vertices.
///
/// `edge_length` seeds the search; zero selects the default. A seed below
/// the floor from [`EdgeLengthSearchOptions::edge_length_floor`] is raised
/// to it. Each attempt calls `remesher` afresh and reports
/// `(edge_length, vertex_count)` to `on_attempt`.
pub fn search_edge_length<R, F>(
    remesher: &R,
    input: &TriangleMesh,
    sharp_edge_degrees: f64,
    target_vertex_count: usize,
    edge_length: f64,
    options: &EdgeLengthSearchOptions,
    mut on_attempt: F,
) -> EdgeLengthSearch
where
    R: IsotropicRemesher + ?Sized,
    F: FnMut(f64, usize),
{
    let floor = target_vertex_count as f64 * options.floor_ratio;
    let min_length = options.edge_length_floor(input.surface_area());
    let mut run = |length: f64| {
        let params = IsotropicParams {
            sharp_edge_degrees,
            target_edge_length: length,
        };
        let mesh = remesher.remesh(input, &params);
        log::debug!("remesh attempt: edge length {:.4} -> {} vertices", length, mesh.num_vertices());
        on_attempt(length, mesh.num_vertices());
        mesh
    };

    let mut length = if edge_length == 0.0 {
        options.default_edge_length
    } else {
        edge_length
    };
    if length < min_length {
        log::debug!("seed edge length {:.4} raised to floor {:.4}", length, min_length);
        length = min_length;
    }
    let mut mesh = run(length);
    let mut shrink_iterations = 0;
    let mut grow_iterations = 0;
    let mut refine_iterations = 0;
    let mut hit_min_edge_length = false;

    // Phase 1: shrink while too sparse
    while (mesh.num_vertices() as f64) < floor {
        let next = length * options.shrink_factor;
        if next < min_length {
            log::debug!("edge length floor {:.4} reached at {} vertices", min_length, mesh.num_vertices());
            hit_min_edge_length = true;
            break;
        }
        if shrink_iterations >= options.max_iterations {
            break;
        }
        length = next;
        mesh = run(length);
        shrink_iterations += 1;
    }

    // Phase 2: grow while too dense
    let mut dense_length = None;
    while mesh.num_vertices() > target_vertex_count && grow_iterations < options.max_iterations {
        dense_length = Some(length);
        length *= options.grow_factor;
        mesh = run(length);
        grow_iterations += 1;
    }

    // Phase 3: growing skipped the whole window, bisect back toward it
    if let Some(mut dense) = dense_length {
        let mut sparse = length;
        while (mesh.num_vertices() as f64) < floor && refine_iterations < options.max_refinements {
            let mid = 0.5 * (dense + sparse);
            let candidate = run(mid);
            refine_iterations += 1;

            if candidate.num_vertices() > target_vertex_count {
                dense = mid;
            } else {
                // At most the target and denser than the best so far
                sparse = mid;
                length = mid;
                mesh = candidate;
            }
        }
    }

    EdgeLengthSearch {
        mesh,
        edge_length: length,
        shrink_iterations,
        grow_iterations,
        refine_iterations,
        hit_min_edge_length,
    }
}
