//! Cross-field parameterization of an island's working mesh.
//!
//! A [`Parameterizer`] owns the working [`HalfEdgeMesh`] of one island. The
//! driver asks it for a [`HeightLimit`] derived from a constraint ratio, turns
//! that into [`Constraints`], and then either counts the singularities those
//! constraints would produce or performs the full solve, which writes the
//! resulting field into the mesh.
//!
//! # Relative heights
//!
//! Every vertex carries a normalized relative height (see
//! [`HalfEdgeMesh::update_relative_heights`]). A ratio `(lo, hi)` selects the
//! heights found at those quantiles of the flatness order, and faces whose
//! mean height falls inside the limit become constrained.
//!
//! # Example
//!
//! ```
//! use nalgebra::Point3;
//! use quadremesh::algo::parameterize::{CrossFieldParameterizer, Parameterizer, ParameterizerParams};
//! use quadremesh::mesh::HalfEdgeMesh;
//!
//! let vertices = vec![
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(-1.0, 0.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//!     Point3::new(0.0, -1.0, 0.0),
//!     Point3::new(0.0, 0.0, 1.0),
//!     Point3::new(0.0, 0.0, -1.0),
//! ];
//! let faces = vec![
//!     [0, 2, 4], [2, 1, 4], [1, 3, 4], [3, 0, 4],
//!     [2, 0, 5], [1, 2, 5], [3, 1, 5], [0, 3, 5],
//! ];
//! let mesh = HalfEdgeMesh::from_triangles(&vertices, &faces).unwrap();
//!
//! let mut parameterizer = CrossFieldParameterizer::new(mesh, ParameterizerParams { gradient_size: 170.0 });
//! let limit = parameterizer.limit_relative_height((0.55, 1.0));
//! let constraints = parameterizer.prepare_constraints(limit);
//! let predicted = parameterizer.count_singularities(&constraints).unwrap();
//! let solved = parameterizer.solve(&constraints).unwrap();
//! assert_eq!(predicted, solved);
//! ```

mod cross_field;
mod sparse;

use nalgebra::Vector3;

use crate::error::Result;
use crate::mesh::{FaceId, HalfEdgeId, HalfEdgeMesh};

pub use cross_field::{CrossFieldOptions, CrossFieldParameterizer};
pub use sparse::{conjugate_gradient, CsrMatrix};

/// Default global gradient size.
pub const DEFAULT_GRADIENT_SIZE: f64 = 170.0;

/// Construction parameters for a [`Parameterizer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterizerParams {
    /// Island-scaled gradient size.
    pub gradient_size: f64,
}

impl Default for ParameterizerParams {
    fn default() -> Self {
        Self {
            gradient_size: DEFAULT_GRADIENT_SIZE,
        }
    }
}

/// Closed interval of relative heights selecting constrained faces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightLimit {
    /// Lowest accepted relative height.
    pub low: f64,
    /// Highest accepted relative height.
    pub high: f64,
}

impl HeightLimit {
    /// Create a limit from its bounds.
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Check whether a relative height lies inside the limit.
    #[inline]
    pub fn contains(&self, height: f64) -> bool {
        height >= self.low && height <= self.high
    }
}

/// Per-face direction constraints for the field solve.
///
/// The three vectors are parallel: `directions1[i]` and `directions2[i]` are
/// orthogonal unit tangents of `faces[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    /// Constrained faces.
    pub faces: Vec<FaceId>,
    /// First constrained direction per face.
    pub directions1: Vec<Vector3<f64>>,
    /// Second constrained direction per face.
    pub directions2: Vec<Vector3<f64>>,
}

impl Constraints {
    /// Number of constrained faces.
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    /// True when no face is constrained.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Add a constrained face.
    pub fn push(&mut self, face: FaceId, direction1: Vector3<f64>, direction2: Vector3<f64>) {
        self.faces.push(face);
        self.directions1.push(direction1);
        self.directions2.push(direction2);
    }
}

/// Global parameterization backend.
///
/// Implementations own the working mesh. `count_singularities` must not
/// change observable state; `solve` commits its field into the mesh and
/// returns the singularity count of that field.
pub trait Parameterizer: Send + Sync {
    /// Take ownership of a working mesh.
    fn new(mesh: HalfEdgeMesh, params: ParameterizerParams) -> Self
    where
        Self: Sized;

    /// Height limit for a constraint ratio `(lo, hi)` in `[0, 1]`.
    fn limit_relative_height(&self, ratio: (f64, f64)) -> HeightLimit;

    /// Constraints selected by a height limit.
    fn prepare_constraints(&self, limit: HeightLimit) -> Constraints;

    /// Singularity count of the field the constraints would produce.
    fn count_singularities(&self, constraints: &Constraints) -> Result<usize>;

    /// Solve and store the field; returns its singularity count.
    fn solve(&mut self, constraints: &Constraints) -> Result<usize>;

    /// The working mesh.
    fn mesh(&self) -> &HalfEdgeMesh;
}

/// Relative heights found at the `ratio` quantiles of the flatness order.
///
/// Returns an empty-range limit for meshes without vertices.
pub fn quantile_height_limit(mesh: &HalfEdgeMesh, ratio: (f64, f64)) -> HeightLimit {
    let order = mesh.vertices_by_flatness();
    if order.is_empty() {
        return HeightLimit::new(0.0, 0.0);
    }

    let last = order.len() - 1;
    let height_at = |r: f64| {
        let index = ((last as f64) * r.clamp(0.0, 1.0)).round() as usize;
        mesh.vertex(order[index.min(last)]).relative_height
    };
    HeightLimit::new(height_at(ratio.0), height_at(ratio.1))
}

/// Faces whose mean relative height is inside `limit`, each directed along
/// its sharpest edge.
pub fn select_constraints(mesh: &HalfEdgeMesh, limit: HeightLimit) -> Constraints {
    let mut constraints = Constraints::default();
    for f in mesh.face_ids() {
        if !limit.contains(mesh.face_relative_height(f)) {
            continue;
        }
        let normal = mesh.face(f).normal;
        let he = sharpest_edge(mesh, f);
        let Some(d1) = mesh.edge_vector(he).try_normalize(f64::EPSILON) else {
            continue;
        };
        let Some(d2) = normal.cross(&d1).try_normalize(f64::EPSILON) else {
            continue;
        };
        constraints.push(f, d1, d2);
    }
    constraints
}

/// Half-edge of `f` with the largest dihedral angle. Boundary edges count
/// as maximally sharp.
fn sharpest_edge(mesh: &HalfEdgeMesh, f: FaceId) -> HalfEdgeId {
    let normal = mesh.face(f).normal;
    let sharpness = |he: HalfEdgeId| {
        let twin = mesh.twin(he);
        if mesh.is_boundary_halfedge(twin) {
            return std::f64::consts::PI;
        }
        normal.angle(&mesh.face(mesh.face_of(twin)).normal)
    };

    let [h0, h1, h2] = mesh.face_halfedges(f);
    [h1, h2].into_iter().fold(h0, |best, he| {
        if sharpness(he) > sharpness(best) {
            he
        } else {
            best
        }
    })
}
