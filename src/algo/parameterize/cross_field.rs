//! Smooth 4-RoSy cross fields on triangle meshes.
//!
//! Each face stores its field as the complex number `e^{4iθ}`, where `θ` is
//! measured in a frame spanned by the face's first edge and the in-plane
//! perpendicular. Raising to the fourth power identifies the four directions
//! of a cross, so smoothness becomes a linear least-squares problem:
//!
//! ```text
//! E(z) = Σ_edges |z_g - r_fg z_f|² + λ Σ_constrained |z_f - c_f|²
//! ```
//!
//! `r_fg` transports a direction from face `f` to face `g` across their
//! shared edge. The normal equations are assembled as a real `2n × 2n`
//! system and solved by conjugate gradients.
//!
//! # References
//!
//! - Knöppel, F., Crane, K., Pinkall, U., & Schröder, P. (2013). "Globally
//!   optimal direction fields." ACM SIGGRAPH.

use std::f64::consts::{FRAC_PI_2, TAU};

use nalgebra::{DVector, Vector3};

use crate::error::{MeshError, Result};
use crate::mesh::{FaceId, HalfEdgeMesh, VertexId};

use super::sparse::{conjugate_gradient, CsrMatrix};
use super::{quantile_height_limit, select_constraints, Constraints, HeightLimit, Parameterizer, ParameterizerParams};

/// Solver settings for [`CrossFieldParameterizer`].
#[derive(Debug, Clone, PartialEq)]
pub struct CrossFieldOptions {
    /// Conjugate gradient iteration limit.
    pub max_iterations: usize,

    /// Relative residual at which the solve stops.
    pub tolerance: f64,

    /// Diagonal shift keeping the system positive definite.
    pub regularization: f64,
}

impl Default for CrossFieldOptions {
    fn default() -> Self {
        Self {
            max_iterations: 20_000,
            tolerance: 1e-9,
            regularization: 1e-6,
        }
    }
}

/// Orthonormal tangent frame of one face.
#[derive(Debug, Clone, Copy)]
struct FaceFrame {
    e1: Vector3<f64>,
    e2: Vector3<f64>,
}

impl FaceFrame {
    #[inline]
    fn angle_of(&self, v: &Vector3<f64>) -> f64 {
        v.dot(&self.e2).atan2(v.dot(&self.e1))
    }

    #[inline]
    fn direction(&self, angle: f64) -> Vector3<f64> {
        self.e1 * angle.cos() + self.e2 * angle.sin()
    }
}

/// Interior edge between two faces with the frame rotation across it.
#[derive(Debug, Clone, Copy)]
struct FaceLink {
    f: usize,
    g: usize,
    rotation: f64,
}

/// Default [`Parameterizer`]: a smoothest cross field under soft
/// per-face direction constraints.
#[derive(Debug, Clone)]
pub struct CrossFieldParameterizer {
    mesh: HalfEdgeMesh,
    params: ParameterizerParams,
    options: CrossFieldOptions,
    frames: Vec<FaceFrame>,
    links: Vec<FaceLink>,
}

impl CrossFieldParameterizer {
    /// Replace the solver settings.
    pub fn with_options(mut self, options: CrossFieldOptions) -> Self {
        self.options = options;
        self
    }

    /// Weight of a soft constraint: gradient size per unit of island extent.
    fn constraint_weight(&self) -> f64 {
        let extent = self
            .mesh
            .bounding_box()
            .map_or(0.0, |(min, max)| ((max - min) * 0.5).max());
        if extent > f64::EPSILON {
            self.params.gradient_size / extent
        } else {
            self.params.gradient_size
        }
    }

    /// Per-face field angles for the given constraints.
    fn solve_angles(&self, constraints: &Constraints) -> Result<Vec<f64>> {
        let n = self.mesh.num_faces();
        if n == 0 {
            return Ok(Vec::new());
        }

        let dim = 2 * n;
        let mut triplets = Vec::with_capacity(self.links.len() * 12 + dim);
        let mut rhs = DVector::zeros(dim);

        for link in &self.links {
            let (s, c) = (4.0 * link.rotation).sin_cos();
            let r = [[c, -s], [s, c]];
            for i in 0..2 {
                triplets.push((2 * link.f + i, 2 * link.f + i, 1.0));
                triplets.push((2 * link.g + i, 2 * link.g + i, 1.0));
                for j in 0..2 {
                    triplets.push((2 * link.g + i, 2 * link.f + j, -r[i][j]));
                    triplets.push((2 * link.f + j, 2 * link.g + i, -r[i][j]));
                }
            }
        }
        for i in 0..dim {
            triplets.push((i, i, self.options.regularization));
        }

        let weight = self.constraint_weight();
        let mut pin = |f: usize, target: (f64, f64)| {
            triplets.push((2 * f, 2 * f, weight));
            triplets.push((2 * f + 1, 2 * f + 1, weight));
            rhs[2 * f] += weight * target.0;
            rhs[2 * f + 1] += weight * target.1;
        };

        if constraints.is_empty() {
            // Anchor the largest face to its own first edge
            let anchor = self
                .mesh
                .face_ids()
                .max_by(|&a, &b| self.mesh.face_area(a).total_cmp(&self.mesh.face_area(b)))
                .map_or(0, FaceId::index);
            pin(anchor, (1.0, 0.0));
        } else {
            for ((&f, d1), d2) in constraints
                .faces
                .iter()
                .zip(&constraints.directions1)
                .zip(&constraints.directions2)
            {
                let Some(frame) = self.frames.get(f.index()) else {
                    return Err(MeshError::ParameterizationFailed(format!(
                        "constraint references missing face {}",
                        f.index()
                    )));
                };
                pin(f.index(), constraint_target(frame, d1, d2));
            }
        }

        let matrix = CsrMatrix::from_triplets(dim, dim, &triplets);
        let x = conjugate_gradient(&matrix, &rhs, None, self.options.max_iterations, self.options.tolerance)?;

        Ok((0..n).map(|f| x[2 * f + 1].atan2(x[2 * f]) / 4.0).collect())
    }

    /// Number of interior vertices with non-zero index under `angles`.
    fn count_for(&self, angles: &[f64]) -> usize {
        self.mesh
            .vertex_ids()
            .filter(|&v| self.vertex_index(v, angles).is_some_and(|index| index != 0))
            .count()
    }

    /// Index of the field around an interior vertex, in quarter turns.
    ///
    /// `None` for boundary vertices.
    fn vertex_index(&self, v: VertexId, angles: &[f64]) -> Option<i64> {
        let fan = self.mesh.vertex_halfedges_ccw(v)?;
        let mut angle_sum = 0.0;
        let mut turning = 0.0;

        for (i, &he) in fan.iter().enumerate() {
            let next = fan[(i + 1) % fan.len()];
            let f = self.mesh.face_of(he).index();
            let g = self.mesh.face_of(next).index();
            // Edge shared by f and g, pointing away from v
            let shared = self.mesh.edge_vector(next);
            let transport = self.frames[g].angle_of(&shared) - self.frames[f].angle_of(&shared);

            turning += reduce_quarter(angles[g] - angles[f] - transport);
            angle_sum += self.mesh.corner_angle(he);
        }

        let defect = TAU - angle_sum;
        Some(((turning + defect) / FRAC_PI_2).round() as i64)
    }
}

impl Parameterizer for CrossFieldParameterizer {
    fn new(mesh: HalfEdgeMesh, params: ParameterizerParams) -> Self {
        let frames: Vec<FaceFrame> = mesh
            .face_ids()
            .map(|f| {
                let normal = mesh.face(f).normal;
                let e1 = mesh
                    .edge_vector(mesh.face(f).halfedge)
                    .try_normalize(f64::EPSILON)
                    .unwrap_or_else(Vector3::x);
                FaceFrame {
                    e1,
                    e2: normal.cross(&e1),
                }
            })
            .collect();

        let links = mesh
            .halfedge_ids()
            .filter_map(|he| {
                let twin = mesh.twin(he);
                if he.index() > twin.index() || mesh.is_boundary_edge(he) {
                    return None;
                }
                let f = mesh.face_of(he).index();
                let g = mesh.face_of(twin).index();
                let e = mesh.edge_vector(he);
                Some(FaceLink {
                    f,
                    g,
                    rotation: frames[g].angle_of(&e) - frames[f].angle_of(&e),
                })
            })
            .collect();

        Self {
            mesh,
            params,
            options: CrossFieldOptions::default(),
            frames,
            links,
        }
    }

    fn limit_relative_height(&self, ratio: (f64, f64)) -> HeightLimit {
        quantile_height_limit(&self.mesh, ratio)
    }

    fn prepare_constraints(&self, limit: HeightLimit) -> Constraints {
        select_constraints(&self.mesh, limit)
    }

    fn count_singularities(&self, constraints: &Constraints) -> Result<usize> {
        let angles = self.solve_angles(constraints)?;
        Ok(self.count_for(&angles))
    }

    fn solve(&mut self, constraints: &Constraints) -> Result<usize> {
        let angles = self.solve_angles(constraints)?;
        let count = self.count_for(&angles);
        for (f, &angle) in angles.iter().enumerate() {
            self.mesh.face_mut(FaceId::new(f)).field = self.frames[f].direction(angle);
        }
        log::debug!(
            "cross field solved: {} faces, {} constraints, {} singularities",
            self.mesh.num_faces(),
            constraints.len(),
            count
        );
        Ok(count)
    }

    fn mesh(&self) -> &HalfEdgeMesh {
        &self.mesh
    }
}

/// Unit `e^{4iβ}` target blending both constraint directions.
fn constraint_target(frame: &FaceFrame, d1: &Vector3<f64>, d2: &Vector3<f64>) -> (f64, f64) {
    let (s1, c1) = (4.0 * frame.angle_of(d1)).sin_cos();
    let (s2, c2) = (4.0 * frame.angle_of(d2)).sin_cos();
    let (re, im) = (c1 + c2, s1 + s2);
    let norm = re.hypot(im);
    if norm > 1e-9 {
        (re / norm, im / norm)
    } else {
        (c1, s1)
    }
}

/// Reduce an angle into `[-π/4, π/4]` modulo quarter turns.
#[inline]
fn reduce_quarter(angle: f64) -> f64 {
    angle - FRAC_PI_2 * (angle / FRAC_PI_2).round()
}
