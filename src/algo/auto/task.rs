//! Per-island working state.
//!
//! An [`IslandTask`] is the single record each pipeline stage reads and
//! updates for one island. It owns at most one parameterizer, which in turn
//! owns the island's working mesh.

use thiserror::Error;

use crate::algo::islands::Island;
use crate::algo::observer::{Checkpoint, Observer};
use crate::algo::parameterize::{HeightLimit, Parameterizer, ParameterizerParams};
use crate::algo::quad::QuadExtractor;
use crate::algo::remesh::{search_edge_length, IsotropicRemesher};
use crate::error::MeshError;
use crate::mesh::{HalfEdgeMesh, QuadMesh};

use super::AutoRemeshOptions;

/// Why an island was left out of the output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The remeshed island could not be turned into a half-edge mesh.
    #[error("working mesh could not be built: {0}")]
    WorkingMesh(String),

    /// The field solve failed.
    #[error("parameterization failed: {0}")]
    Parameterization(String),

    /// No constraint ratio brought the singularity count within budget.
    #[error("no constraint ratio meets the singularity budget")]
    SingularityBudget,

    /// The extractor returned nothing.
    #[error("quad extraction failed")]
    Extraction,

    /// The extractor returned an empty mesh.
    #[error("quad extraction produced no quads")]
    EmptyQuads,
}

/// Position of an island in the pipeline.
///
/// Stages entered during preparation are reported through
/// [`Checkpoint::StageReached`]. A failed island keeps the stage it had
/// reached in [`IslandReport::failed_stage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IslandStage {
    /// Edge-length search in progress.
    Remeshing,
    /// Working mesh built, parameterizer being created.
    Parameterizing,
    /// Default height limit known.
    HeightLimitComputed,
    /// Count-only solve done at the default ratio.
    SingularityEvaluated,
    /// Within budget at the current ratio.
    Accepted,
    /// Over budget at the default ratio.
    NeedsSearch,
    /// Quads extracted and ready to merge.
    Extracted,
    /// Left out of the output.
    Failed(FailureReason),
}

/// Attempt counts of the edge-length search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Remesh attempts while too sparse.
    pub shrink_iterations: usize,
    /// Remesh attempts while too dense.
    pub grow_iterations: usize,
    /// Bisection attempts.
    pub refine_iterations: usize,
    /// Shrinking stopped at the minimum edge length.
    pub hit_min_edge_length: bool,
}

/// Summary of one island after the pipeline ran.
#[derive(Debug, Clone, PartialEq)]
pub struct IslandReport {
    /// Island index in split order.
    pub island: usize,
    /// Final stage: [`IslandStage::Extracted`] or [`IslandStage::Failed`].
    pub stage: IslandStage,
    /// Stage the island had reached when it failed.
    pub failed_stage: Option<IslandStage>,
    /// Edge length accepted by the search.
    pub edge_length: f64,
    /// Vertex count of the remeshed island.
    pub vertex_count: usize,
    /// Attempt counts of the edge-length search.
    pub search: SearchStats,
    /// Constraint ratio in effect at the end.
    pub constraint_ratio: (f64, f64),
    /// Singularities of the field used for extraction.
    pub singularity_count: Option<usize>,
    /// Quads contributed to the output.
    pub quads: usize,
}

impl IslandReport {
    /// True when the island contributed quads.
    pub fn is_merged(&self) -> bool {
        self.stage == IslandStage::Extracted
    }
}

/// Working state of one island.
pub(crate) struct IslandTask<P> {
    pub island: usize,
    pub stage: IslandStage,
    pub failed_stage: Option<IslandStage>,
    pub edge_length: f64,
    pub vertex_count: usize,
    pub search: SearchStats,
    pub constraint_ratio: (f64, f64),
    pub height_limit: Option<HeightLimit>,
    pub singularity_count: Option<usize>,
    pub parameterizer: Option<P>,
    pub quads: Option<QuadMesh>,
}

impl<P: Parameterizer> IslandTask<P> {
    fn new(island: usize, constraint_ratio: (f64, f64)) -> Self {
        Self {
            island,
            stage: IslandStage::Remeshing,
            failed_stage: None,
            edge_length: 0.0,
            vertex_count: 0,
            search: SearchStats::default(),
            constraint_ratio,
            height_limit: None,
            singularity_count: None,
            parameterizer: None,
            quads: None,
        }
    }

    /// Mark the island failed and release its working mesh.
    pub fn fail(&mut self, reason: FailureReason) {
        log::warn!("island {} dropped during {:?}: {}", self.island, self.stage, reason);
        self.parameterizer = None;
        let reached = std::mem::replace(&mut self.stage, IslandStage::Failed(reason));
        self.failed_stage = Some(reached);
    }

    fn enter(&mut self, stage: IslandStage, observer: &Observer) {
        observer.notify(&Checkpoint::StageReached {
            island: self.island,
            stage: stage.clone(),
        });
        self.stage = stage;
    }

    /// Remesh an island toward `target_vertex_count` and evaluate its
    /// singularity count at the default constraint ratio.
    pub fn prepare<R>(
        island: &Island,
        remesher: &R,
        target_vertex_count: usize,
        options: &AutoRemeshOptions,
        observer: &Observer,
    ) -> Self
    where
        R: IsotropicRemesher + ?Sized,
    {
        let mut task = Self::new(island.index, options.constraint_ratio);
        task.enter(IslandStage::Remeshing, observer);

        let outcome = search_edge_length(
            remesher,
            &island.mesh,
            options.sharp_edge_degrees,
            target_vertex_count,
            options.edge_length,
            &options.search,
            |edge_length, vertex_count| {
                observer.notify(&Checkpoint::SearchIteration {
                    island: island.index,
                    edge_length,
                    vertex_count,
                })
            },
        );
        task.edge_length = outcome.edge_length;
        task.vertex_count = outcome.vertex_count();
        task.search = SearchStats {
            shrink_iterations: outcome.shrink_iterations,
            grow_iterations: outcome.grow_iterations,
            refine_iterations: outcome.refine_iterations,
            hit_min_edge_length: outcome.hit_min_edge_length,
        };
        if outcome.hit_min_edge_length {
            log::debug!(
                "island {}: edge length search stopped at the minimum ({} vertices)",
                island.index,
                task.vertex_count
            );
        }

        let mesh = match HalfEdgeMesh::from_triangles(&outcome.mesh.vertices, &outcome.mesh.triangles) {
            Ok(mesh) => mesh,
            Err(err) => {
                task.fail(FailureReason::WorkingMesh(err.to_string()));
                return task;
            }
        };

        task.enter(IslandStage::Parameterizing, observer);
        let parameterizer = P::new(
            mesh,
            ParameterizerParams {
                gradient_size: island.gradient_size,
            },
        );

        let limit = parameterizer.limit_relative_height(options.constraint_ratio);
        task.height_limit = Some(limit);
        task.enter(IslandStage::HeightLimitComputed, observer);

        let constraints = parameterizer.prepare_constraints(limit);
        let count = match parameterizer.count_singularities(&constraints) {
            Ok(count) => count,
            Err(err) => {
                task.fail(FailureReason::Parameterization(err.to_string()));
                return task;
            }
        };
        task.singularity_count = Some(count);
        task.parameterizer = Some(parameterizer);
        observer.notify(&Checkpoint::SingularityEvaluated {
            island: island.index,
            ratio: options.constraint_ratio,
            singularities: count,
        });
        task.enter(IslandStage::SingularityEvaluated, observer);

        let next = if count <= options.max_singularity_count {
            IslandStage::Accepted
        } else {
            IslandStage::NeedsSearch
        };
        task.enter(next, observer);
        log::debug!(
            "island {}: edge length {:.4}, {} vertices, {} singularities ({:?})",
            island.index,
            task.edge_length,
            task.vertex_count,
            count,
            task.stage
        );
        task
    }

    /// Replace ratio, limit and count together with a searched candidate.
    pub fn accept_candidate(&mut self, ratio: (f64, f64), limit: HeightLimit, count: usize) {
        self.constraint_ratio = ratio;
        self.height_limit = Some(limit);
        self.singularity_count = Some(count);
        self.stage = IslandStage::Accepted;
    }

    /// Full solve at the final height limit, then quad extraction.
    ///
    /// Does nothing unless the island is accepted. The parameterizer is
    /// released afterwards.
    pub fn extract<Q>(&mut self, extractor: &Q)
    where
        Q: QuadExtractor + ?Sized,
    {
        if self.stage != IslandStage::Accepted {
            return;
        }

        let limit = self.height_limit;
        let solved = match (self.parameterizer.as_mut(), limit) {
            (Some(parameterizer), Some(limit)) => {
                let constraints = parameterizer.prepare_constraints(limit);
                parameterizer
                    .solve(&constraints)
                    .map(|count| (count, extractor.extract(parameterizer.mesh())))
            }
            _ => Err(MeshError::ParameterizationFailed("island has no parameterizer".to_string())),
        };
        self.parameterizer = None;

        match solved {
            Err(err) => self.fail(FailureReason::Parameterization(err.to_string())),
            Ok((count, quads)) => {
                self.singularity_count = Some(count);
                match quads {
                    None => self.fail(FailureReason::Extraction),
                    Some(quads) if quads.is_empty() => self.fail(FailureReason::EmptyQuads),
                    Some(quads) => {
                        self.quads = Some(quads);
                        self.stage = IslandStage::Extracted;
                    }
                }
            }
        }
    }

    pub fn report(&self) -> IslandReport {
        IslandReport {
            island: self.island,
            stage: self.stage.clone(),
            failed_stage: self.failed_stage.clone(),
            edge_length: self.edge_length,
            vertex_count: self.vertex_count,
            search: self.search,
            constraint_ratio: self.constraint_ratio,
            singularity_count: self.singularity_count,
            quads: self.quads.as_ref().map_or(0, QuadMesh::num_quads),
        }
    }
}
