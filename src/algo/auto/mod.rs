//! Automatic quad remeshing of whole triangle surfaces.
//!
//! [`AutoRemesher`] runs the complete pipeline:
//!
//! 1. **Normalize** the input into a canonical working scale.
//! 2. **Split** it into connected islands, dropping tiny ones.
//! 3. Per island, in parallel: **search** an edge length that lands the
//!    remeshed vertex count near the target scaled down by the extractor's
//!    vertex growth, build the working mesh and
//!    **count singularities** at the default constraint ratio.
//! 4. For islands over the singularity budget, evaluate relaxed constraint
//!    ratios in parallel and keep the least relaxed one within budget.
//! 5. Per accepted island, in parallel: full **solve** and **extraction**.
//! 6. **Merge** island quads into one mesh in world coordinates.
//!
//! Islands that fail any stage are left out and listed in the
//! [`RemeshReport`]; only an input without usable islands is an error.
//!
//! # Example
//!
//! ```no_run
//! use quadremesh::algo::auto::{auto_remesh, AutoRemeshOptions};
//!
//! let input = quadremesh::io::load_triangles("model.obj").unwrap();
//! let options = AutoRemeshOptions::default().with_target_vertex_count(3000);
//! let quads = auto_remesh(&input.vertices, &input.triangles, &options).unwrap();
//! println!("{} quads", quads.num_quads());
//! ```

mod aggregate;
mod budget;
mod task;

use std::marker::PhantomData;

use nalgebra::Point3;
use rayon::prelude::*;

use crate::algo::islands::{split_to_islands, Island};
use crate::algo::normalize::{Normalization, DEFAULT_SCALE};
use crate::algo::observer::{Checkpoint, Observer};
use crate::algo::parameterize::{CrossFieldParameterizer, Parameterizer, DEFAULT_GRADIENT_SIZE};
use crate::algo::quad::{remesh_target, PairingQuadExtractor, QuadExtractor};
use crate::algo::remesh::{BotschKobbeltRemesher, EdgeLengthSearchOptions, IsotropicRemesher};
use crate::error::{MeshError, Result};
use crate::mesh::{QuadMesh, TriangleMesh};

pub use aggregate::merge_island_quads;
pub use budget::budget_candidates;
pub use task::{FailureReason, IslandReport, IslandStage, SearchStats};

use task::IslandTask;

/// Default dihedral angle above which edges are kept sharp, in degrees.
pub const DEFAULT_SHARP_EDGE_DEGREES: f64 = 60.0;

/// Default target of output vertices per island.
pub const DEFAULT_TARGET_VERTEX_COUNT: usize = 7000;

/// Default singularity budget per island.
pub const DEFAULT_MAX_SINGULARITY_COUNT: usize = 320;

/// Default constraint ratio `(lo, hi)`.
pub const DEFAULT_CONSTRAINT_RATIO: (f64, f64) = (0.55, 1.0);

/// Default step of the budget search.
pub const DEFAULT_RATIO_STEP: f64 = 0.01;

/// Smallest accepted budget search step. Bounds the candidate list to about
/// a thousand ratios.
pub const MIN_RATIO_STEP: f64 = 1e-3;

/// Options for [`AutoRemesher`].
#[derive(Debug, Clone, PartialEq)]
pub struct AutoRemeshOptions {
    /// Dihedral angle, in degrees, above which edges are kept sharp.
    pub sharp_edge_degrees: f64,

    /// Approximate output vertices per island. Islands are remeshed to this
    /// count divided by the extractor's [`QuadExtractor::vertex_growth`].
    pub target_vertex_count: usize,

    /// Global gradient size, scaled per island by its extent.
    pub gradient_size: f64,

    /// Singularity budget per island (inclusive).
    pub max_singularity_count: usize,

    /// Default constraint ratio `(lo, hi)`.
    pub constraint_ratio: (f64, f64),

    /// Increment of the lower ratio bound during the budget search.
    pub ratio_step: f64,

    /// Half-extent of the working space.
    pub scale: f64,

    /// Seed edge length in working units; zero selects the search default.
    pub edge_length: f64,

    /// Edge-length search settings.
    pub search: EdgeLengthSearchOptions,

    /// Run per-island stages on the rayon pool.
    pub parallel: bool,
}

impl Default for AutoRemeshOptions {
    fn default() -> Self {
        Self {
            sharp_edge_degrees: DEFAULT_SHARP_EDGE_DEGREES,
            target_vertex_count: DEFAULT_TARGET_VERTEX_COUNT,
            gradient_size: DEFAULT_GRADIENT_SIZE,
            max_singularity_count: DEFAULT_MAX_SINGULARITY_COUNT,
            constraint_ratio: DEFAULT_CONSTRAINT_RATIO,
            ratio_step: DEFAULT_RATIO_STEP,
            scale: DEFAULT_SCALE,
            edge_length: 0.0,
            search: EdgeLengthSearchOptions::default(),
            parallel: true,
        }
    }
}

impl AutoRemeshOptions {
    /// Set the sharp-edge angle in degrees.
    pub fn with_sharp_edge_degrees(mut self, degrees: f64) -> Self {
        self.sharp_edge_degrees = degrees;
        self
    }

    /// Set the target vertex count per island.
    pub fn with_target_vertex_count(mut self, count: usize) -> Self {
        self.target_vertex_count = count;
        self
    }

    /// Set the global gradient size.
    pub fn with_gradient_size(mut self, gradient_size: f64) -> Self {
        self.gradient_size = gradient_size;
        self
    }

    /// Set the singularity budget.
    pub fn with_max_singularity_count(mut self, count: usize) -> Self {
        self.max_singularity_count = count;
        self
    }

    /// Set the default constraint ratio.
    pub fn with_constraint_ratio(mut self, lo: f64, hi: f64) -> Self {
        self.constraint_ratio = (lo, hi);
        self
    }

    /// Set the budget search step.
    pub fn with_ratio_step(mut self, step: f64) -> Self {
        self.ratio_step = step;
        self
    }

    /// Set the working-space half-extent.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Set the seed edge length.
    pub fn with_edge_length(mut self, edge_length: f64) -> Self {
        self.edge_length = edge_length;
        self
    }

    /// Replace the edge-length search settings.
    pub fn with_search(mut self, search: EdgeLengthSearchOptions) -> Self {
        self.search = search;
        self
    }

    /// Enable or disable parallel stages.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run every stage on the calling thread.
    pub fn sequential(self) -> Self {
        self.with_parallel(false)
    }

    /// Check that every option is in range.
    pub fn validate(&self) -> Result<()> {
        if !(self.scale > 0.0 && self.scale.is_finite()) {
            return Err(MeshError::invalid_param("scale", self.scale, "must be positive"));
        }
        if self.target_vertex_count == 0 {
            return Err(MeshError::invalid_param(
                "target_vertex_count",
                self.target_vertex_count,
                "must be at least 1",
            ));
        }
        let (lo, hi) = self.constraint_ratio;
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
            return Err(MeshError::invalid_param(
                "constraint_ratio",
                format!("({}, {})", lo, hi),
                "bounds must satisfy 0 <= lo <= hi <= 1",
            ));
        }
        if !(self.ratio_step >= MIN_RATIO_STEP && self.ratio_step.is_finite()) {
            return Err(MeshError::invalid_param(
                "ratio_step",
                self.ratio_step,
                "must be at least 0.001",
            ));
        }
        if !(0.0..=180.0).contains(&self.sharp_edge_degrees) {
            return Err(MeshError::invalid_param(
                "sharp_edge_degrees",
                self.sharp_edge_degrees,
                "must be in [0, 180]",
            ));
        }
        if !(self.gradient_size > 0.0 && self.gradient_size.is_finite()) {
            return Err(MeshError::invalid_param(
                "gradient_size",
                self.gradient_size,
                "must be positive",
            ));
        }
        if !(self.edge_length >= 0.0 && self.edge_length.is_finite()) {
            return Err(MeshError::invalid_param(
                "edge_length",
                self.edge_length,
                "must be zero or positive",
            ));
        }
        self.search.validate()
    }
}

/// Result of [`AutoRemesher::remesh_with_report`].
#[derive(Debug, Clone)]
pub struct RemeshReport {
    /// Merged quads in world coordinates.
    pub mesh: QuadMesh,
    /// One entry per kept island, in split order.
    pub islands: Vec<IslandReport>,
    /// Components dropped for having fewer than four triangles.
    pub discarded_islands: usize,
}

impl RemeshReport {
    /// Islands that contributed quads.
    pub fn merged_islands(&self) -> usize {
        self.islands.iter().filter(|island| island.is_merged()).count()
    }

    /// Islands left out of the output.
    pub fn failed_islands(&self) -> usize {
        self.islands.len() - self.merged_islands()
    }
}

/// Quad remeshing pipeline over pluggable backends.
///
/// `R` remeshes islands, `P` solves the field on each island's working mesh
/// and `Q` extracts quads from it.
pub struct AutoRemesher<R, P, Q> {
    remesher: R,
    extractor: Q,
    options: AutoRemeshOptions,
    observer: Observer,
    parameterizer: PhantomData<fn() -> P>,
}

/// [`AutoRemesher`] over the crate's own backends.
pub type DefaultAutoRemesher = AutoRemesher<BotschKobbeltRemesher, CrossFieldParameterizer, PairingQuadExtractor>;

impl DefaultAutoRemesher {
    /// Pipeline with the default remesher, parameterizer and extractor.
    pub fn with_defaults(options: AutoRemeshOptions) -> Self {
        let remesher = BotschKobbeltRemesher::default().with_parallel(options.parallel);
        Self::new(remesher, PairingQuadExtractor::default(), options)
    }
}

impl<R, P, Q> AutoRemesher<R, P, Q>
where
    R: IsotropicRemesher + Sync,
    P: Parameterizer,
    Q: QuadExtractor + Sync,
{
    /// Pipeline over the given backends with no observer.
    pub fn new(remesher: R, extractor: Q, options: AutoRemeshOptions) -> Self {
        Self {
            remesher,
            extractor,
            options,
            observer: Observer::none(),
            parameterizer: PhantomData,
        }
    }

    /// Attach a checkpoint observer.
    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = observer;
        self
    }

    /// Current options.
    pub fn options(&self) -> &AutoRemeshOptions {
        &self.options
    }

    /// Remesh `input` and return the merged quads.
    pub fn remesh(&self, input: &TriangleMesh) -> Result<QuadMesh> {
        self.remesh_with_report(input).map(|report| report.mesh)
    }

    /// Remesh `input` and report what happened to every island.
    ///
    /// # Errors
    ///
    /// - [`MeshError::InvalidParameter`] for out-of-range options
    /// - [`MeshError::InvalidVertexIndex`] for malformed input
    /// - [`MeshError::EmptyInput`] when no island has at least four triangles
    pub fn remesh_with_report(&self, input: &TriangleMesh) -> Result<RemeshReport> {
        self.options.validate()?;
        input.validate()?;
        let options = &self.options;

        let normalization = Normalization::from_points(&input.vertices, options.scale);
        let working = TriangleMesh::new(normalization.encode_all(&input.vertices), input.triangles.clone());

        let split = split_to_islands(&working.triangles);
        self.observer.notify(&Checkpoint::IslandsSplit {
            kept: split.kept.len(),
            discarded: split.discarded.len(),
        });
        log::info!(
            "{} islands kept, {} discarded",
            split.kept.len(),
            split.discarded.len()
        );
        if split.kept.is_empty() {
            return Err(MeshError::EmptyInput);
        }

        let islands = Island::collect(&split, &working, &normalization, options.gradient_size);

        let target = remesh_target(options.target_vertex_count, self.extractor.vertex_growth());
        if target != options.target_vertex_count {
            log::debug!(
                "remeshing toward {} vertices for {} output vertices",
                target,
                options.target_vertex_count
            );
        }

        // Edge-length search and initial singularity count
        let prepare =
            |island: &Island| IslandTask::<P>::prepare(island, &self.remesher, target, options, &self.observer);
        let mut tasks: Vec<IslandTask<P>> = if options.parallel {
            islands.par_iter().map(prepare).collect()
        } else {
            islands.iter().map(prepare).collect()
        };
        log::info!(
            "parameterization: {} accepted, {} over budget, {} failed",
            count_stage(&tasks, |s| *s == IslandStage::Accepted),
            count_stage(&tasks, |s| *s == IslandStage::NeedsSearch),
            count_stage(&tasks, |s| matches!(s, IslandStage::Failed(_))),
        );

        budget::run_budget_search(&mut tasks, options, &self.observer);
        aggregate::extract_all(&mut tasks, &self.extractor, options.parallel);

        let mesh = merge_island_quads(
            tasks
                .iter()
                .filter_map(|task| task.quads.as_ref().map(|quads| (task.island, quads))),
            &normalization,
            &self.observer,
        );

        let report = RemeshReport {
            mesh,
            islands: tasks.iter().map(IslandTask::report).collect(),
            discarded_islands: split.discarded.len(),
        };
        log::info!(
            "merged {} of {} islands: {} vertices, {} quads",
            report.merged_islands(),
            report.islands.len(),
            report.mesh.num_vertices(),
            report.mesh.num_quads()
        );
        Ok(report)
    }
}

fn count_stage<P>(tasks: &[IslandTask<P>], predicate: impl Fn(&IslandStage) -> bool) -> usize {
    tasks.iter().filter(|task| predicate(&task.stage)).count()
}

/// Remesh a triangle soup with the default backends.
pub fn auto_remesh(
    vertices: &[Point3<f64>],
    triangles: &[[usize; 3]],
    options: &AutoRemeshOptions,
) -> Result<QuadMesh> {
    let input = TriangleMesh::new(vertices.to_vec(), triangles.to_vec());
    DefaultAutoRemesher::with_defaults(options.clone()).remesh(&input)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use nalgebra::Vector3;

    use super::*;
    use crate::algo::parameterize::{Constraints, HeightLimit, ParameterizerParams};
    use crate::algo::remesh::IsotropicParams;
    use crate::mesh::{FaceId, HalfEdgeMesh};

    /// Returns its input unchanged.
    struct IdentityRemesher;

    impl IsotropicRemesher for IdentityRemesher {
        fn remesh(&self, input: &TriangleMesh, _params: &IsotropicParams) -> TriangleMesh {
            input.clone()
        }
    }

    /// Behavior keyed on face count:
    /// - 4 faces: no singularities
    /// - 8 faces: `round((1 - lo) * 1000)` singularities
    /// - 12 faces: always over any budget
    /// - 6 faces: counts fine, full solve fails
    struct ShapeParameterizer {
        mesh: HalfEdgeMesh,
    }

    impl ShapeParameterizer {
        fn count_for(&self, low: f64) -> usize {
            match self.mesh.num_faces() {
                8 => ((1.0 - low) * 1000.0).round() as usize,
                12 => 100_000,
                _ => 0,
            }
        }
    }

    impl Parameterizer for ShapeParameterizer {
        fn new(mesh: HalfEdgeMesh, _params: ParameterizerParams) -> Self {
            Self { mesh }
        }

        fn limit_relative_height(&self, ratio: (f64, f64)) -> HeightLimit {
            HeightLimit::new(ratio.0, ratio.1)
        }

        fn prepare_constraints(&self, limit: HeightLimit) -> Constraints {
            let mut constraints = Constraints::default();
            constraints.push(FaceId::new(0), Vector3::new(limit.low, limit.high, 0.0), Vector3::z());
            constraints
        }

        fn count_singularities(&self, constraints: &Constraints) -> Result<usize> {
            Ok(self.count_for(constraints.directions1[0].x))
        }

        fn solve(&mut self, constraints: &Constraints) -> Result<usize> {
            if self.mesh.num_faces() == 6 {
                return Err(MeshError::ConvergenceFailed { iterations: 1 });
            }
            self.count_singularities(constraints)
        }

        fn mesh(&self) -> &HalfEdgeMesh {
            &self.mesh
        }
    }

    /// One quad over the first four working vertices.
    struct FirstQuadExtractor;

    impl QuadExtractor for FirstQuadExtractor {
        fn extract(&self, mesh: &HalfEdgeMesh) -> Option<QuadMesh> {
            let vertices = mesh.vertex_ids().take(4).map(|v| *mesh.position(v)).collect();
            Some(QuadMesh::new(vertices, vec![[0, 1, 2, 3]]))
        }
    }

    /// Collapses every island onto one degenerate triangle.
    struct DegenerateRemesher;

    impl IsotropicRemesher for DegenerateRemesher {
        fn remesh(&self, input: &TriangleMesh, _params: &IsotropicParams) -> TriangleMesh {
            TriangleMesh::new(input.vertices.clone(), vec![[0, 0, 1]])
        }
    }

    struct NoneExtractor;

    impl QuadExtractor for NoneExtractor {
        fn extract(&self, _mesh: &HalfEdgeMesh) -> Option<QuadMesh> {
            None
        }
    }

    struct EmptyExtractor;

    impl QuadExtractor for EmptyExtractor {
        fn extract(&self, _mesh: &HalfEdgeMesh) -> Option<QuadMesh> {
            Some(QuadMesh::default())
        }
    }

    /// Claims four output vertices per working vertex.
    struct GrowingExtractor;

    impl QuadExtractor for GrowingExtractor {
        fn extract(&self, mesh: &HalfEdgeMesh) -> Option<QuadMesh> {
            FirstQuadExtractor.extract(mesh)
        }

        fn vertex_growth(&self) -> f64 {
            4.0
        }
    }

    type MockRemesher = AutoRemesher<IdentityRemesher, ShapeParameterizer, FirstQuadExtractor>;

    fn mock(options: AutoRemeshOptions) -> MockRemesher {
        AutoRemesher::new(IdentityRemesher, FirstQuadExtractor, options)
    }

    /// Options under which the identity remesher's first attempt is accepted
    /// or the search gives up quickly.
    fn options() -> AutoRemeshOptions {
        AutoRemeshOptions::default()
            .with_target_vertex_count(6)
            .with_search(EdgeLengthSearchOptions::default().with_max_iterations(2))
    }

    fn tetrahedron(offset: Vector3<f64>) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        let vertices = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
            .iter()
            .map(|p| Point3::new(p[0], p[1], p[2]) + offset)
            .collect();
        (vertices, vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]])
    }

    fn octahedron(offset: Vector3<f64>) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        let vertices = [
            [1.0, 0.0, 0.0],
            [-1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, -1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 0.0, -1.0],
        ]
        .iter()
        .map(|p| Point3::new(p[0], p[1], p[2]) + offset)
        .collect();
        let faces = vec![
            [0, 2, 4],
            [2, 1, 4],
            [1, 3, 4],
            [3, 0, 4],
            [2, 0, 5],
            [1, 2, 5],
            [3, 1, 5],
            [0, 3, 5],
        ];
        (vertices, faces)
    }

    fn cube(offset: Vector3<f64>) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        let vertices = (0..8)
            .map(|i| Point3::new((i & 1) as f64, ((i >> 1) & 1) as f64, ((i >> 2) & 1) as f64) + offset)
            .collect();
        let faces = vec![
            [0, 2, 3],
            [0, 3, 1],
            [4, 5, 7],
            [4, 7, 6],
            [0, 1, 5],
            [0, 5, 4],
            [2, 6, 7],
            [2, 7, 3],
            [0, 4, 6],
            [0, 6, 2],
            [1, 3, 7],
            [1, 7, 5],
        ];
        (vertices, faces)
    }

    /// Closed triangular bipyramid (6 faces).
    fn bipyramid(offset: Vector3<f64>) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        let vertices = [[1.0, 0.0, 0.0], [-0.5, 0.87, 0.0], [-0.5, -0.87, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0, -1.0]]
            .iter()
            .map(|p| Point3::new(p[0], p[1], p[2]) + offset)
            .collect();
        let faces = vec![[0, 1, 3], [1, 2, 3], [2, 0, 3], [1, 0, 4], [2, 1, 4], [0, 2, 4]];
        (vertices, faces)
    }

    fn combine(parts: &[(Vec<Point3<f64>>, Vec<[usize; 3]>)]) -> TriangleMesh {
        let mut mesh = TriangleMesh::default();
        for (vertices, triangles) in parts {
            let base = mesh.vertices.len();
            mesh.vertices.extend(vertices.iter().copied());
            mesh.triangles
                .extend(triangles.iter().map(|t| t.map(|i| i + base)));
        }
        mesh
    }

    fn two_triangles(offset: Vector3<f64>) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        let vertices = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]]
            .iter()
            .map(|p| Point3::new(p[0], p[1], p[2]) + offset)
            .collect();
        (vertices, vec![[0, 1, 2], [0, 2, 3]])
    }

    #[test]
    fn test_default_options() {
        let options = AutoRemeshOptions::default();
        assert_eq!(options.sharp_edge_degrees, 60.0);
        assert_eq!(options.target_vertex_count, 7000);
        assert_eq!(options.gradient_size, 170.0);
        assert_eq!(options.max_singularity_count, 320);
        assert_eq!(options.constraint_ratio, (0.55, 1.0));
        assert_eq!(options.ratio_step, 0.01);
        assert_eq!(options.scale, 100.0);
        assert_eq!(options.search.default_edge_length, 3.9);
        assert!(options.parallel);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_invalid_options_rejected() {
        let bad = [
            AutoRemeshOptions::default().with_scale(0.0),
            AutoRemeshOptions::default().with_target_vertex_count(0),
            AutoRemeshOptions::default().with_constraint_ratio(0.8, 0.5),
            AutoRemeshOptions::default().with_constraint_ratio(-0.1, 1.0),
            AutoRemeshOptions::default().with_constraint_ratio(0.5, 1.5),
            AutoRemeshOptions::default().with_ratio_step(0.0),
            AutoRemeshOptions::default().with_ratio_step(1e-12),
            AutoRemeshOptions::default().with_ratio_step(f64::INFINITY),
            AutoRemeshOptions::default().with_sharp_edge_degrees(200.0),
            AutoRemeshOptions::default().with_edge_length(-1.0),
        ];
        for options in bad {
            assert!(
                matches!(options.validate(), Err(MeshError::InvalidParameter { .. })),
                "{:?}",
                options
            );
        }
    }

    #[test]
    fn test_smallest_ratio_step_bounds_candidates() {
        let options = AutoRemeshOptions::default().with_ratio_step(MIN_RATIO_STEP);
        assert!(options.validate().is_ok());
        assert!(budget_candidates((0.0, 1.0), MIN_RATIO_STEP).len() <= 1000);
    }

    #[test]
    fn test_invalid_options_fail_before_work() {
        let input = combine(&[tetrahedron(Vector3::zeros())]);
        let result = mock(options().with_ratio_step(-1.0)).remesh(&input);
        assert!(matches!(result, Err(MeshError::InvalidParameter { name: "ratio_step", .. })));
    }

    #[test]
    fn test_only_tiny_islands_is_empty_input() {
        let input = combine(&[two_triangles(Vector3::zeros())]);
        let result = mock(options()).remesh(&input);
        assert!(matches!(result, Err(MeshError::EmptyInput)));
    }

    #[test]
    fn test_tiny_island_dropped_next_to_valid_one() {
        let input = combine(&[
            tetrahedron(Vector3::zeros()),
            two_triangles(Vector3::new(5.0, 0.0, 0.0)),
        ]);
        let report = mock(options()).remesh_with_report(&input).unwrap();

        assert_eq!(report.discarded_islands, 1);
        assert_eq!(report.islands.len(), 1);
        assert_eq!(report.merged_islands(), 1);
        assert_eq!(report.mesh.num_quads(), 1);
        // Identity remeshing: the tetrahedron comes back in world space
        for out in &report.mesh.vertices {
            assert!(input.vertices[..4].iter().any(|v| (out - v).norm() < 1e-9));
        }
    }

    #[test]
    fn test_least_relaxed_ratio_accepted() {
        let input = combine(&[octahedron(Vector3::zeros())]);
        let report = mock(options()).remesh_with_report(&input).unwrap();
        let island = &report.islands[0];

        assert_eq!(island.stage, IslandStage::Extracted);
        // (1 - lo) * 1000 <= 320 first holds at lo = 0.68
        assert!((island.constraint_ratio.0 - 0.68).abs() < 1e-9);
        assert_eq!(island.singularity_count, Some(320));
    }

    #[test]
    fn test_default_ratio_kept_when_within_budget() {
        let input = combine(&[tetrahedron(Vector3::zeros())]);
        let report = mock(options()).remesh_with_report(&input).unwrap();
        assert_eq!(report.islands[0].constraint_ratio, (0.55, 1.0));
        assert_eq!(report.islands[0].singularity_count, Some(0));
    }

    #[test]
    fn test_unmet_budget_fails_island_but_not_job() {
        let input = combine(&[cube(Vector3::zeros())]);
        let report = mock(options()).remesh_with_report(&input).unwrap();

        assert_eq!(
            report.islands[0].stage,
            IslandStage::Failed(FailureReason::SingularityBudget)
        );
        assert_eq!(report.islands[0].failed_stage, Some(IslandStage::NeedsSearch));
        assert!(report.mesh.is_empty());
    }

    #[test]
    fn test_unbuildable_working_mesh_fails_island() {
        let input = combine(&[tetrahedron(Vector3::zeros())]);
        let remesher = AutoRemesher::<_, ShapeParameterizer, _>::new(DegenerateRemesher, FirstQuadExtractor, options());
        let report = remesher.remesh_with_report(&input).unwrap();
        let island = &report.islands[0];

        assert!(matches!(island.stage, IslandStage::Failed(FailureReason::WorkingMesh(_))));
        assert_eq!(island.failed_stage, Some(IslandStage::Remeshing));
        assert_eq!(island.singularity_count, None);
        assert!(report.mesh.is_empty());
    }

    #[test]
    fn test_extractor_returning_nothing_fails_island() {
        let input = combine(&[tetrahedron(Vector3::zeros())]);
        let remesher = AutoRemesher::<_, ShapeParameterizer, _>::new(IdentityRemesher, NoneExtractor, options());
        let report = remesher.remesh_with_report(&input).unwrap();

        assert_eq!(report.islands[0].stage, IslandStage::Failed(FailureReason::Extraction));
        assert_eq!(report.islands[0].failed_stage, Some(IslandStage::Accepted));
        assert_eq!(report.islands[0].quads, 0);
        assert!(report.mesh.is_empty());
    }

    #[test]
    fn test_extractor_returning_empty_mesh_fails_island() {
        let input = combine(&[
            tetrahedron(Vector3::zeros()),
            octahedron(Vector3::new(5.0, 0.0, 0.0)),
        ]);
        let remesher = AutoRemesher::<_, ShapeParameterizer, _>::new(IdentityRemesher, EmptyExtractor, options());
        let report = remesher.remesh_with_report(&input).unwrap();

        for island in &report.islands {
            assert_eq!(island.stage, IslandStage::Failed(FailureReason::EmptyQuads));
        }
        assert_eq!(report.failed_islands(), 2);
        assert!(report.mesh.is_empty());
    }

    #[test]
    fn test_search_target_scaled_by_vertex_growth() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer = Observer::new(move |c| {
            if let Checkpoint::SearchIteration { vertex_count, .. } = c {
                sink.lock().unwrap().push(*vertex_count);
            }
        });

        // Identity remeshing keeps 6 vertices; a target of 24 over growth 4
        // puts them inside the window at once
        let input = combine(&[octahedron(Vector3::zeros())]);
        let remesher = AutoRemesher::<_, ShapeParameterizer, _>::new(
            IdentityRemesher,
            GrowingExtractor,
            options().with_target_vertex_count(24).sequential(),
        )
        .with_observer(observer);
        let report = remesher.remesh_with_report(&input).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![6]);
        assert_eq!(report.islands[0].search, SearchStats::default());
    }

    #[test]
    fn test_solve_failure_excludes_island() {
        let input = combine(&[
            bipyramid(Vector3::zeros()),
            tetrahedron(Vector3::new(4.0, 0.0, 0.0)),
        ]);
        let report = mock(options()).remesh_with_report(&input).unwrap();

        assert!(matches!(
            report.islands[0].stage,
            IslandStage::Failed(FailureReason::Parameterization(_))
        ));
        assert_eq!(report.islands[0].failed_stage, Some(IslandStage::Accepted));
        assert_eq!(report.islands[1].failed_stage, None);
        assert!(report.islands[1].is_merged());
        assert_eq!(report.failed_islands(), 1);
        assert_eq!(report.mesh.num_quads(), 1);
        assert_eq!(report.mesh.quads[0], [0, 1, 2, 3]);
    }

    #[test]
    fn test_global_offsets_across_islands() {
        let input = combine(&[
            tetrahedron(Vector3::zeros()),
            octahedron(Vector3::new(5.0, 0.0, 0.0)),
            tetrahedron(Vector3::new(10.0, 0.0, 0.0)),
        ]);
        let mesh = mock(options()).remesh(&input).unwrap();

        assert_eq!(mesh.num_vertices(), 12);
        assert_eq!(mesh.quads, vec![[0, 1, 2, 3], [4, 5, 6, 7], [8, 9, 10, 11]]);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let input = combine(&[
            octahedron(Vector3::zeros()),
            tetrahedron(Vector3::new(3.0, 0.0, 0.0)),
            cube(Vector3::new(6.0, 0.0, 0.0)),
        ]);
        let parallel = mock(options()).remesh_with_report(&input).unwrap();
        let sequential = mock(options().sequential()).remesh_with_report(&input).unwrap();

        assert_eq!(parallel.mesh, sequential.mesh);
        assert_eq!(parallel.islands, sequential.islands);
    }

    #[test]
    fn test_observer_sees_every_stage() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer = Observer::new(move |c| sink.lock().unwrap().push(c.clone()));

        let input = combine(&[octahedron(Vector3::zeros())]);
        mock(options().sequential())
            .with_observer(observer)
            .remesh(&input)
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], Checkpoint::IslandsSplit { kept: 1, discarded: 0 });
        assert!(matches!(seen[2], Checkpoint::SearchIteration { island: 0, .. }));
        let stages: Vec<&IslandStage> = seen
            .iter()
            .filter_map(|c| match c {
                Checkpoint::StageReached { island: 0, stage } => Some(stage),
                _ => None,
            })
            .collect();
        assert_eq!(
            stages,
            vec![
                &IslandStage::Remeshing,
                &IslandStage::Parameterizing,
                &IslandStage::HeightLimitComputed,
                &IslandStage::SingularityEvaluated,
                &IslandStage::NeedsSearch,
            ]
        );
        let evaluations = seen
            .iter()
            .filter(|c| matches!(c, Checkpoint::SingularityEvaluated { .. }))
            .count();
        // Default ratio plus every relaxed candidate
        assert_eq!(evaluations, 1 + budget_candidates((0.55, 1.0), 0.01).len());
        assert!(matches!(
            seen.last(),
            Some(Checkpoint::IslandMerged {
                island: 0,
                vertex_offset: 0,
                quads: 1
            })
        ));
    }
}
