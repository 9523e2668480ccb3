//! # quadremesh
//!
//! Automatic quad remeshing of triangle surfaces.
//!
//! quadremesh takes an indexed triangle mesh, possibly made of several
//! disconnected parts, and produces a quad mesh whose edges follow the
//! principal directions of the surface. Every connected island is remeshed
//! isotropically to a target resolution, a smooth cross field is solved on it
//! with its singularity count kept within a budget, and quads are extracted
//! from the field. Island results are merged back into one mesh in the
//! input's coordinate frame.
//!
//! ## Features
//!
//! - **Half-edge working mesh**: O(1) adjacency queries with type-safe indices
//! - **Pluggable backends**: remesher, parameterizer and quad extractor are traits
//! - **Parallel per-island stages** on the rayon pool
//! - **File formats**: OBJ, STL, PLY
//!
//! ## Quick Start
//!
//! ```no_run
//! use quadremesh::prelude::*;
//!
//! let input = quadremesh::io::load_triangles("model.obj").unwrap();
//! let options = AutoRemeshOptions::default().with_target_vertex_count(4000);
//!
//! let quads = auto_remesh(&input.vertices, &input.triangles, &options).unwrap();
//! println!("{} quads", quads.num_quads());
//!
//! quadremesh::io::save_quads(&quads, "model_quads.obj").unwrap();
//! ```
//!
//! ## Inspecting Islands
//!
//! [`AutoRemesher::remesh_with_report`](algo::auto::AutoRemesher::remesh_with_report)
//! reports what happened to every island, including those left out:
//!
//! ```no_run
//! use quadremesh::prelude::*;
//!
//! # let input = quadremesh::io::load_triangles("model.obj").unwrap();
//! let remesher = DefaultAutoRemesher::with_defaults(AutoRemeshOptions::default());
//! let report = remesher.remesh_with_report(&input).unwrap();
//! for island in &report.islands {
//!     println!("island {}: {:?}, {} quads", island.island, island.stage, island.quads);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod io;
pub mod mesh;

/// Prelude module for convenient imports.
///
/// ```
/// use quadremesh::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::auto::{
        auto_remesh, AutoRemeshOptions, AutoRemesher, DefaultAutoRemesher, FailureReason, IslandReport,
        IslandStage, RemeshReport,
    };
    pub use crate::algo::observer::{Checkpoint, Observer};
    pub use crate::algo::parameterize::{CrossFieldParameterizer, Parameterizer};
    pub use crate::algo::quad::{PairingQuadExtractor, QuadExtractor};
    pub use crate::algo::remesh::{BotschKobbeltRemesher, IsotropicRemesher};
    pub use crate::error::{MeshError, Result};
    pub use crate::mesh::{FaceId, HalfEdgeId, HalfEdgeMesh, QuadMesh, TriangleMesh, VertexId};
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use nalgebra::Point3;

    #[test]
    fn test_tetrahedron_working_mesh() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, 0.5, 1.0),
        ];
        let faces = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];

        let mesh = HalfEdgeMesh::from_triangles(&vertices, &faces).unwrap();

        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_faces(), 4);
        assert_eq!(mesh.num_halfedges(), 12);
        for v in mesh.vertex_ids() {
            assert!(!mesh.is_boundary_vertex(v));
        }
    }

    #[test]
    fn test_prelude_defaults() {
        let options = AutoRemeshOptions::default();
        assert!(options.validate().is_ok());
        assert!(matches!(
            auto_remesh(&[], &[], &options),
            Err(MeshError::EmptyInput)
        ));
    }
}
