//! Remeshing algorithms.
//!
//! The stages of the pipeline, in the order [`auto::AutoRemesher`] runs them:
//!
//! - **Normalization**: move the input into a canonical working scale
//! - **Islands**: split into connected components and drop tiny ones
//! - **Remeshing**: isotropic remeshing and the edge-length search
//! - **Parameterization**: cross-field solve and singularity counting
//! - **Quad extraction**: turn a solved field into quads
//! - **Auto**: the orchestrator, singularity-budget search and merge
//!
//! [`observer`] carries checkpoint callbacks through all of them.

pub mod auto;
pub mod islands;
pub mod normalize;
pub mod observer;
pub mod parameterize;
pub mod quad;
pub mod remesh;
