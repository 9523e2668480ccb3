//! Isotropic remeshing.
//!
//! The pipeline consumes remeshing through the [`IsotropicRemesher`] trait: each
//! call takes an island's triangles plus [`IsotropicParams`] and returns a fresh
//! mesh whose edges are close to the requested length. [`search`] drives a
//! remesher until the result lands in a vertex-count window.
//!
//! The default implementation, [`BotschKobbeltRemesher`] (Botsch & Kobbelt,
//! 2004), iteratively applies:
//!
//! 1. **Split** edges longer than 4/3 × target_length
//! 2. **Collapse** edges shorter than 4/5 × target_length
//! 3. **Flip** edges to improve vertex valence
//! 4. **Tangential smoothing** to regularize vertex positions
//!
//! Boundary edges and edges whose dihedral angle exceeds the sharp-edge angle
//! are features: they may be split but are never collapsed or flipped, and
//! their vertices do not move during smoothing.
//!
//! # Example
//!
//! ```
//! use quadremesh::algo::remesh::{BotschKobbeltRemesher, IsotropicParams, IsotropicRemesher};
//! use quadremesh::mesh::TriangleMesh;
//! use nalgebra::Point3;
//!
//! let input = TriangleMesh::new(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(4.0, 0.0, 0.0),
//!         Point3::new(4.0, 4.0, 0.0),
//!         Point3::new(0.0, 4.0, 0.0),
//!     ],
//!     vec![[0, 1, 2], [0, 2, 3]],
//! );
//! let params = IsotropicParams { sharp_edge_degrees: 60.0, target_edge_length: 1.0 };
//! let output = BotschKobbeltRemesher::default().remesh(&input, &params);
//! assert!(output.num_vertices() > input.num_vertices());
//! ```
//!
//! # References
//!
//! - Botsch, M., & Kobbelt, L. (2004). "A remeshing approach to multiresolution modeling."
//!   Symposium on Geometry Processing.

mod isotropic;
pub mod search;

pub use isotropic::BotschKobbeltRemesher;
pub use search::{search_edge_length, EdgeLengthSearch, EdgeLengthSearchOptions};

use std::collections::{HashMap, HashSet};

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use crate::mesh::TriangleMesh;

/// Parameters of a single remeshing run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsotropicParams {
    /// Edges whose face normals differ by more than this angle are kept sharp.
    pub sharp_edge_degrees: f64,
    /// Desired edge length in working-space units.
    pub target_edge_length: f64,
}

/// An isotropic remeshing backend.
///
/// Each call is an independent run on `input`; implementations must not carry
/// state from one call to the next.
pub trait IsotropicRemesher {
    /// Remesh `input` toward uniform edges of `params.target_edge_length`.
    fn remesh(&self, input: &TriangleMesh, params: &IsotropicParams) -> TriangleMesh;
}

// ============================================================================
// Pre-computed Mesh Topology for O(1) Lookups
// ============================================================================

/// Undirected edge key with the smaller index first.
#[inline]
pub(crate) fn edge_key(v0: usize, v1: usize) -> (usize, usize) {
    if v0 < v1 {
        (v0, v1)
    } else {
        (v1, v0)
    }
}

/// Pre-computed mesh topology for efficient remeshing operations.
///
/// Caches edge and vertex relationships, plus the feature classification, to
/// avoid O(n) scans through the face list for each query.
#[derive(Debug, Clone)]
pub struct MeshTopology {
    /// Map from undirected edge to the faces containing it
    pub edge_faces: HashMap<(usize, usize), Vec<usize>>,
    /// Edges with exactly one adjacent face
    pub boundary_edges: HashSet<(usize, usize)>,
    /// Sharp or non-manifold interior edges
    pub sharp_edges: HashSet<(usize, usize)>,
    /// Vertices touching a boundary or sharp edge
    pub fixed_vertices: Vec<bool>,
    /// Vertices touching a boundary edge
    pub boundary_vertices: Vec<bool>,
    /// Neighbors for each vertex
    pub vertex_neighbors: Vec<HashSet<usize>>,
}

impl MeshTopology {
    /// Build topology from a face list.
    pub fn from_faces(vertices: &[Point3<f64>], faces: &[[usize; 3]], sharp_edge_degrees: f64) -> Self {
        let mut edge_faces: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        let mut vertex_neighbors: Vec<HashSet<usize>> = vec![HashSet::new(); vertices.len()];
        for (face_idx, face) in faces.iter().enumerate() {
            for i in 0..3 {
                let v0 = face[i];
                let v1 = face[(i + 1) % 3];
                edge_faces.entry(edge_key(v0, v1)).or_default().push(face_idx);
                vertex_neighbors[v0].insert(v1);
                vertex_neighbors[v1].insert(v0);
            }
        }

        let normals: Vec<Option<Vector3<f64>>> = faces
            .iter()
            .map(|f| face_area_vector(vertices, f).try_normalize(1e-12))
            .collect();
        let cos_limit = sharp_edge_degrees.to_radians().cos();

        let mut boundary_edges = HashSet::new();
        let mut sharp_edges = HashSet::new();
        for (&edge, adjacent) in &edge_faces {
            match adjacent.as_slice() {
                [_] => {
                    boundary_edges.insert(edge);
                }
                [f0, f1] => {
                    if let (Some(n0), Some(n1)) = (normals[*f0], normals[*f1]) {
                        if n0.dot(&n1) < cos_limit {
                            sharp_edges.insert(edge);
                        }
                    }
                }
                _ => {
                    sharp_edges.insert(edge);
                }
            }
        }

        let mut boundary_vertices = vec![false; vertices.len()];
        for &(v0, v1) in &boundary_edges {
            boundary_vertices[v0] = true;
            boundary_vertices[v1] = true;
        }
        let mut fixed_vertices = boundary_vertices.clone();
        for &(v0, v1) in &sharp_edges {
            fixed_vertices[v0] = true;
            fixed_vertices[v1] = true;
        }

        Self {
            edge_faces,
            boundary_edges,
            sharp_edges,
            fixed_vertices,
            boundary_vertices,
            vertex_neighbors,
        }
    }

    /// Check if an edge is on the boundary.
    #[inline]
    pub fn is_boundary_edge(&self, v0: usize, v1: usize) -> bool {
        self.boundary_edges.contains(&edge_key(v0, v1))
    }

    /// Check if an edge is a boundary or sharp edge.
    #[inline]
    pub fn is_feature_edge(&self, v0: usize, v1: usize) -> bool {
        let edge = edge_key(v0, v1);
        self.boundary_edges.contains(&edge) || self.sharp_edges.contains(&edge)
    }

    /// Check if a vertex lies on a feature.
    #[inline]
    pub fn is_fixed_vertex(&self, v: usize) -> bool {
        self.fixed_vertices[v]
    }

    /// Get neighbors of a vertex.
    #[inline]
    pub fn neighbors(&self, v: usize) -> &HashSet<usize> {
        &self.vertex_neighbors[v]
    }

    /// Check if an edge exists.
    #[inline]
    pub fn edge_exists(&self, v0: usize, v1: usize) -> bool {
        self.edge_faces.contains_key(&edge_key(v0, v1))
    }

    /// Get faces adjacent to an edge.
    #[inline]
    pub fn get_edge_faces(&self, v0: usize, v1: usize) -> Option<&Vec<usize>> {
        self.edge_faces.get(&edge_key(v0, v1))
    }
}

#[inline]
fn face_area_vector(vertices: &[Point3<f64>], face: &[usize; 3]) -> Vector3<f64> {
    let p0 = &vertices[face[0]];
    (vertices[face[1]] - p0).cross(&(vertices[face[2]] - p0))
}

/// Average edge length of an indexed triangle mesh.
pub fn average_edge_length(mesh: &TriangleMesh) -> f64 {
    let mut edges = HashSet::new();
    for face in &mesh.triangles {
        for i in 0..3 {
            edges.insert(edge_key(face[i], face[(i + 1) % 3]));
        }
    }
    if edges.is_empty() {
        return 0.0;
    }
    let total: f64 = edges
        .iter()
        .map(|&(v0, v1)| (mesh.vertices[v1] - mesh.vertices[v0]).norm())
        .sum();
    total / edges.len() as f64
}

// ============================================================================
// Shared Helpers - Edge Operations
// ============================================================================

/// Collapse a batch of independent edges.
///
/// Each `(keep, remove, position)` moves `keep` to `position` and redirects
/// `remove` to it. Edges must not share vertices. Faces that become
/// degenerate are dropped.
pub(crate) fn collapse_edges(
    vertices: &mut [Point3<f64>],
    faces: &mut Vec<[usize; 3]>,
    collapses: &[(usize, usize, Point3<f64>)],
) {
    let mut remap: Vec<usize> = (0..vertices.len()).collect();
    for &(keep, remove, position) in collapses {
        vertices[keep] = position;
        remap[remove] = keep;
    }

    for face in faces.iter_mut() {
        for v in face.iter_mut() {
            *v = remap[*v];
        }
    }

    faces.retain(|face| face[0] != face[1] && face[1] != face[2] && face[0] != face[2]);
}

/// Remove unused vertices, duplicate faces, non-manifold edges, and reindex faces.
pub(crate) fn cleanup_mesh(vertices: &[Point3<f64>], faces: &[[usize; 3]]) -> TriangleMesh {
    // Rotate so the smallest index is first (preserves winding)
    let mut unique_faces: Vec<[usize; 3]> = Vec::with_capacity(faces.len());
    let mut seen_faces: HashSet<[usize; 3]> = HashSet::new();
    for &face in faces {
        let min_idx = if face[0] <= face[1] && face[0] <= face[2] {
            0
        } else if face[1] <= face[2] {
            1
        } else {
            2
        };
        let normalized = [face[min_idx], face[(min_idx + 1) % 3], face[(min_idx + 2) % 3]];
        if seen_faces.insert(normalized) {
            unique_faces.push(face);
        }
    }

    // Keep removing until every edge has at most two faces and one face per direction
    loop {
        let mut edge_faces: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        let mut directed_faces: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        for (fi, face) in unique_faces.iter().enumerate() {
            for i in 0..3 {
                let v0 = face[i];
                let v1 = face[(i + 1) % 3];
                edge_faces.entry(edge_key(v0, v1)).or_default().push(fi);
                directed_faces.entry((v0, v1)).or_default().push(fi);
            }
        }

        let mut faces_to_remove: HashSet<usize> = HashSet::new();

        // Keep the first face of each repeated directed edge
        for face_indices in directed_faces.values().filter(|f| f.len() > 1) {
            faces_to_remove.extend(face_indices.iter().skip(1));
        }

        // Keep the two largest faces of each non-manifold edge
        for face_indices in edge_faces.values().filter(|f| f.len() > 2) {
            let mut by_area: Vec<(usize, f64)> = face_indices
                .iter()
                .filter(|fi| !faces_to_remove.contains(fi))
                .map(|&fi| (fi, face_area_vector(vertices, &unique_faces[fi]).norm()))
                .collect();
            by_area.sort_by(|a, b| b.1.total_cmp(&a.1));
            faces_to_remove.extend(by_area.iter().skip(2).map(|&(fi, _)| fi));
        }

        if faces_to_remove.is_empty() {
            break;
        }

        log::trace!("cleanup: removing {} non-manifold faces", faces_to_remove.len());
        unique_faces = unique_faces
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !faces_to_remove.contains(i))
            .map(|(_, f)| f)
            .collect();
    }

    let mut used = vec![false; vertices.len()];
    for &v in unique_faces.iter().flatten() {
        used[v] = true;
    }

    // Surviving vertices keep their relative order
    let mut old_to_new: Vec<usize> = vec![usize::MAX; vertices.len()];
    let mut new_vertices: Vec<Point3<f64>> = Vec::new();
    for (old_idx, _) in used.iter().enumerate().filter(|(_, &u)| u) {
        old_to_new[old_idx] = new_vertices.len();
        new_vertices.push(vertices[old_idx]);
    }

    let new_faces: Vec<[usize; 3]> = unique_faces
        .iter()
        .map(|face| face.map(|v| old_to_new[v]))
        .collect();

    TriangleMesh::new(new_vertices, new_faces)
}

/// Validate a face list for manifold properties.
pub(crate) fn validate_face_list(vertices: &[Point3<f64>], faces: &[[usize; 3]]) -> bool {
    if faces.iter().flatten().any(|&vi| vi >= vertices.len()) {
        return false;
    }

    let mut edge_counts: HashMap<(usize, usize), usize> = HashMap::new();
    let mut directed: HashSet<(usize, usize)> = HashSet::new();
    for face in faces {
        for i in 0..3 {
            let v0 = face[i];
            let v1 = face[(i + 1) % 3];
            *edge_counts.entry(edge_key(v0, v1)).or_insert(0) += 1;
            // Inconsistent winding
            if !directed.insert((v0, v1)) {
                return false;
            }
        }
    }

    edge_counts.values().all(|&c| c <= 2)
}

// ============================================================================
// Shared Helpers - Edge Flipping
// ============================================================================

/// Flip edges to improve vertex valence (operates on face list).
///
/// Uses batch processing: finds all edges that should be flipped, selects
/// independent ones, and flips them all at once before rebuilding topology.
/// Feature edges are never flipped.
pub(crate) fn flip_edges_for_valence_faces(
    vertices: &[Point3<f64>],
    faces: &mut Vec<[usize; 3]>,
    sharp_edge_degrees: f64,
) {
    let max_batches = 50;
    let mut failed_edges: HashSet<(usize, usize)> = HashSet::new();

    for _batch in 0..max_batches {
        let topology = MeshTopology::from_faces(vertices, faces, sharp_edge_degrees);

        let mut candidate_edges: Vec<(usize, usize)> = topology
            .edge_faces
            .keys()
            .copied()
            .filter(|e| !failed_edges.contains(e))
            .filter(|&(v0, v1)| !topology.is_feature_edge(v0, v1))
            .filter(|&(v0, v1)| should_flip_edge(vertices, faces, &topology, v0, v1))
            .collect();

        if candidate_edges.is_empty() {
            break;
        }
        // Hash order is arbitrary; keep runs reproducible
        candidate_edges.sort_unstable();

        // Select independent edges: no two flips touch the same vertex
        let mut used_vertices: HashSet<usize> = HashSet::new();
        let mut edges_to_flip: Vec<(usize, usize)> = Vec::new();
        for (v0, v1) in candidate_edges {
            let Some(quad) = flip_quad(faces, &topology, v0, v1) else {
                continue;
            };
            if quad.iter().all(|v| !used_vertices.contains(v)) {
                used_vertices.extend(quad);
                edges_to_flip.push((v0, v1));
            }
        }

        let saved_faces = faces.clone();
        for &(v0, v1) in &edges_to_flip {
            flip_edge(faces, v0, v1);
        }

        if !validate_face_list(vertices, faces) {
            // Batch failed, revert and try one by one
            *faces = saved_faces;
            for (v0, v1) in edges_to_flip {
                let saved = faces.clone();
                flip_edge(faces, v0, v1);
                if !validate_face_list(vertices, faces) {
                    *faces = saved;
                    failed_edges.insert(edge_key(v0, v1));
                }
            }
        }
    }
}

/// The four vertices involved in flipping an interior edge.
fn flip_quad(faces: &[[usize; 3]], topology: &MeshTopology, v0: usize, v1: usize) -> Option<[usize; 4]> {
    let adjacent = topology.get_edge_faces(v0, v1)?;
    let [f0, f1] = adjacent.as_slice() else {
        return None;
    };
    let opposite = |fi: usize| faces[fi].iter().copied().find(|&v| v != v0 && v != v1);
    Some([v0, v1, opposite(*f0)?, opposite(*f1)?])
}

/// Target valence for a vertex.
#[inline]
fn target_valence(topology: &MeshTopology, v: usize) -> i32 {
    if topology.boundary_vertices[v] {
        4
    } else {
        6
    }
}

/// Check if flipping an edge would improve vertex valences.
fn should_flip_edge(
    vertices: &[Point3<f64>],
    faces: &[[usize; 3]],
    topology: &MeshTopology,
    v0: usize,
    v1: usize,
) -> bool {
    let Some([v0, v1, v2, v3]) = flip_quad(faces, topology, v0, v1) else {
        return false;
    };

    // The new edge must not exist already
    if v2 == v3 || topology.edge_exists(v2, v3) {
        return false;
    }

    let deviation = |v: usize, delta: i32| {
        (topology.neighbors(v).len() as i32 + delta - target_valence(topology, v)).abs()
    };

    let dev_before = deviation(v0, 0) + deviation(v1, 0) + deviation(v2, 0) + deviation(v3, 0);
    // After flip: v0 and v1 lose one neighbor, v2 and v3 gain one
    let dev_after = deviation(v0, -1) + deviation(v1, -1) + deviation(v2, 1) + deviation(v3, 1);

    if !is_convex_quad(&vertices[v0], &vertices[v2], &vertices[v1], &vertices[v3]) {
        return false;
    }

    dev_after < dev_before
}

/// Check if a quad is convex.
pub(crate) fn is_convex_quad(
    p0: &Point3<f64>,
    p1: &Point3<f64>,
    p2: &Point3<f64>,
    p3: &Point3<f64>,
) -> bool {
    let v01 = p1 - p0;
    let v12 = p2 - p1;
    let v23 = p3 - p2;
    let v30 = p0 - p3;

    let n0 = v01.cross(&(-v30));
    let n1 = v12.cross(&(-v01));
    let n2 = v23.cross(&(-v12));
    let n3 = v30.cross(&(-v23));

    n0.dot(&n1) > 0.0 && n1.dot(&n2) > 0.0 && n2.dot(&n3) > 0.0
}

/// Flip an edge in the face list, preserving winding.
///
/// Faces `[c, a, b]` and `[b, a, d]` sharing edge `a-b` become `[c, a, d]`
/// and `[c, d, b]`.
pub(crate) fn flip_edge(faces: &mut [[usize; 3]], v0: usize, v1: usize) -> bool {
    let mut sides: Vec<(usize, usize)> = Vec::with_capacity(2);
    for (idx, face) in faces.iter().enumerate() {
        for i in 0..3 {
            let a = face[i];
            let b = face[(i + 1) % 3];
            if (a == v0 && b == v1) || (a == v1 && b == v0) {
                sides.push((idx, i));
                break;
            }
        }
    }

    let &[(idx0, i0), (idx1, i1)] = sides.as_slice() else {
        return false;
    };

    let a = faces[idx0][i0];
    let b = faces[idx0][(i0 + 1) % 3];
    let c = faces[idx0][(i0 + 2) % 3];
    let d = faces[idx1][(i1 + 2) % 3];
    // Same direction in both faces: inconsistent winding, leave alone
    if faces[idx1][i1] != b {
        return false;
    }

    faces[idx0] = [c, a, d];
    faces[idx1] = [c, d, b];
    true
}

// ============================================================================
// Shared Helpers - Smoothing
// ============================================================================

/// Apply one round of tangential smoothing to regularize vertex positions.
///
/// Vertices flagged in `fixed` keep their position.
pub(crate) fn tangential_smooth(
    vertices: &mut [Point3<f64>],
    faces: &[[usize; 3]],
    topology: &MeshTopology,
    lambda: f64,
    parallel: bool,
) {
    let normals = compute_vertex_normals_from_faces(vertices, faces, parallel);
    let current: &[Point3<f64>] = vertices;

    let compute_position = |idx: usize| -> Point3<f64> {
        let pos = &current[idx];
        let vertex_neighbors = topology.neighbors(idx);
        if topology.is_fixed_vertex(idx) || vertex_neighbors.is_empty() {
            return *pos;
        }

        let mut centroid = Vector3::zeros();
        for &neighbor in vertex_neighbors {
            centroid += current[neighbor].coords;
        }
        centroid /= vertex_neighbors.len() as f64;

        let displacement = centroid - pos.coords;
        let normal = &normals[idx];
        let tangent_displacement = displacement - normal.dot(&displacement) * normal;

        Point3::from(pos.coords + lambda * tangent_displacement)
    };

    let new_positions: Vec<Point3<f64>> = if parallel {
        (0..current.len()).into_par_iter().map(compute_position).collect()
    } else {
        (0..current.len()).map(compute_position).collect()
    };

    vertices.copy_from_slice(&new_positions);
}

/// Compute vertex normals from face data.
pub(crate) fn compute_vertex_normals_from_faces(
    vertices: &[Point3<f64>],
    faces: &[[usize; 3]],
    parallel: bool,
) -> Vec<Vector3<f64>> {
    if parallel {
        // Gather face contributions per vertex
        let mut vertex_faces: Vec<Vec<usize>> = vec![Vec::new(); vertices.len()];
        for (face_idx, face) in faces.iter().enumerate() {
            for &v in face {
                vertex_faces[v].push(face_idx);
            }
        }

        vertex_faces
            .par_iter()
            .map(|adjacent| {
                let normal: Vector3<f64> = adjacent
                    .iter()
                    .map(|&fi| face_area_vector(vertices, &faces[fi]))
                    .sum();
                normal.try_normalize(1e-10).unwrap_or(normal)
            })
            .collect()
    } else {
        // Scatter face normals to vertices
        let mut normals: Vec<Vector3<f64>> = vec![Vector3::zeros(); vertices.len()];
        for face in faces {
            let face_normal = face_area_vector(vertices, face);
            for &v in face {
                normals[v] += face_normal;
            }
        }

        for n in &mut normals {
            if let Some(unit) = n.try_normalize(1e-10) {
                *n = unit;
            }
        }

        normals
    }
}
