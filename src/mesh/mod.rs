//! Core mesh data structures.
//!
//! Two representations live here:
//!
//! - [`TriangleMesh`] and [`QuadMesh`] are plain indexed meshes used at the crate
//!   boundary and between pipeline stages.
//! - [`HalfEdgeMesh`] is the working mesh of one island. It provides O(1)
//!   adjacency queries and carries the attributes read by parameterization
//!   (normals, relative heights) and the cross field written by it.
//!
//! # Index Types
//!
//! Half-edge mesh elements are identified by type-safe `u32` wrappers:
//! - [`VertexId`] - Identifies a vertex
//! - [`HalfEdgeId`] - Identifies a half-edge
//! - [`FaceId`] - Identifies a face
//!
//! # Construction
//!
//! ```
//! use quadremesh::mesh::HalfEdgeMesh;
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//! ];
//! let faces = vec![[0, 1, 2]];
//!
//! let mesh = HalfEdgeMesh::from_triangles(&vertices, &faces).unwrap();
//! assert_eq!(mesh.num_vertices(), 3);
//! ```

mod attributes;
mod builder;
mod halfedge;
mod index;
mod polygon;

pub use builder::{build_from_triangles, is_watertight, remove_zero_angle_triangles};
pub use halfedge::{Face, HalfEdge, HalfEdgeMesh, Vertex, VertexHalfEdgeIter};
pub use index::{FaceId, HalfEdgeId, VertexId};
pub use polygon::{bounding_box, QuadMesh, TriangleMesh};
