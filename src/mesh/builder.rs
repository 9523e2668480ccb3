//! Mesh construction utilities.
//!
//! Builds the working half-edge mesh from an indexed triangle list.
//! Construction also repairs needle triangles and computes the vertex
//! attributes the parameterizer reads.

use std::collections::HashMap;

use nalgebra::Point3;

use super::halfedge::{Face, HalfEdge, HalfEdgeMesh};
use super::index::{FaceId, HalfEdgeId, VertexId};
use crate::error::{MeshError, Result};

/// Corners at or above this angle mark a triangle as degenerate.
const ZERO_ANGLE_DEGREES: f64 = 179.9;

impl HalfEdgeMesh {
    /// Build the working mesh for an island.
    ///
    /// On watertight input, triangles with a corner of at least 179.9 degrees are
    /// removed by flipping the edge opposite that corner. Normals, averaged
    /// normals and relative heights are computed before returning.
    ///
    /// # Example
    /// ```
    /// use quadremesh::mesh::HalfEdgeMesh;
    /// use nalgebra::Point3;
    ///
    /// let vertices = vec![
    ///     Point3::new(0.0, 0.0, 0.0),
    ///     Point3::new(1.0, 0.0, 0.0),
    ///     Point3::new(0.5, 1.0, 0.0),
    /// ];
    /// let mesh = HalfEdgeMesh::from_triangles(&vertices, &[[0, 1, 2]]).unwrap();
    /// assert_eq!(mesh.num_faces(), 1);
    /// ```
    pub fn from_triangles(vertices: &[Point3<f64>], triangles: &[[usize; 3]]) -> Result<Self> {
        let triangles = if is_watertight(triangles) {
            remove_zero_angle_triangles(vertices, triangles)
        } else {
            triangles.to_vec()
        };

        let mut mesh = build_from_triangles(vertices, &triangles)?;
        mesh.update_attributes();
        Ok(mesh)
    }
}

/// Build a half-edge mesh from vertices and triangle faces.
///
/// Fails on out-of-range indices, repeated vertices within a face, and directed
/// edges shared by two faces (inconsistent orientation or non-manifold edges).
pub fn build_from_triangles(
    vertices: &[Point3<f64>],
    faces: &[[usize; 3]],
) -> Result<HalfEdgeMesh> {
    if faces.is_empty() {
        return Err(MeshError::EmptyMesh);
    }

    for (fi, face) in faces.iter().enumerate() {
        for &vi in face {
            if vi >= vertices.len() {
                return Err(MeshError::InvalidVertexIndex { face: fi, vertex: vi });
            }
        }
        if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
            return Err(MeshError::DegenerateFace { face: fi });
        }
    }

    let mut mesh = HalfEdgeMesh::with_capacity(vertices.len(), faces.len());
    for &pos in vertices {
        mesh.add_vertex(pos);
    }

    let mut edge_map: HashMap<(usize, usize), HalfEdgeId> = HashMap::with_capacity(faces.len() * 3);

    for face in faces {
        let base = mesh.num_halfedges();
        let face_id = FaceId::new(mesh.num_faces());
        mesh.faces.push(Face::new(HalfEdgeId::new(base)));

        for j in 0..3 {
            let he = HalfEdge {
                origin: VertexId::new(face[j]),
                twin: HalfEdgeId::invalid(),
                next: HalfEdgeId::new(base + (j + 1) % 3),
                prev: HalfEdgeId::new(base + (j + 2) % 3),
                face: face_id,
            };
            mesh.halfedges.push(he);
            mesh.vertex_mut(VertexId::new(face[j])).halfedge = HalfEdgeId::new(base + j);

            let key = (face[j], face[(j + 1) % 3]);
            if edge_map.insert(key, HalfEdgeId::new(base + j)).is_some() {
                return Err(MeshError::NonManifoldEdge { v0: key.0, v1: key.1 });
            }
        }
    }

    // Sorted so boundary half-edge numbering does not depend on hash order
    let mut directed: Vec<((usize, usize), HalfEdgeId)> = edge_map.iter().map(|(&k, &v)| (k, v)).collect();
    directed.sort_unstable_by_key(|&(_, he)| he);

    for ((v0, v1), he) in directed {
        if let Some(&twin) = edge_map.get(&(v1, v0)) {
            mesh.halfedge_mut(he).twin = twin;
        } else {
            let boundary_he = HalfEdgeId::new(mesh.num_halfedges());
            mesh.halfedges.push(HalfEdge {
                origin: VertexId::new(v1),
                twin: he,
                ..HalfEdge::new()
            });
            mesh.halfedge_mut(he).twin = boundary_he;
        }
    }

    link_boundary_loops(&mut mesh);
    fix_boundary_vertex_halfedges(&mut mesh);

    Ok(mesh)
}

/// Link boundary half-edges into loops.
fn link_boundary_loops(mesh: &mut HalfEdgeMesh) {
    let boundary_hes: Vec<HalfEdgeId> = mesh
        .halfedge_ids()
        .filter(|&he| mesh.is_boundary_halfedge(he))
        .collect();

    let outgoing: HashMap<VertexId, HalfEdgeId> = boundary_hes
        .iter()
        .map(|&he| (mesh.origin(he), he))
        .collect();

    for &he in &boundary_hes {
        // The next boundary half-edge starts where this one ends
        if let Some(&next_he) = outgoing.get(&mesh.dest(he)) {
            mesh.halfedge_mut(he).next = next_he;
            mesh.halfedge_mut(next_he).prev = he;
        }
    }
}

/// Ensure boundary vertices point to a boundary half-edge.
fn fix_boundary_vertex_halfedges(mesh: &mut HalfEdgeMesh) {
    for v in 0..mesh.num_vertices() {
        let vid = VertexId::new(v);
        if let Some(he) = mesh
            .vertex_halfedges(vid)
            .find(|&he| mesh.is_boundary_halfedge(he))
        {
            mesh.vertex_mut(vid).halfedge = he;
        }
    }
}

/// True when every directed edge has its opposite.
pub fn is_watertight(triangles: &[[usize; 3]]) -> bool {
    let directed: std::collections::HashSet<(usize, usize)> = triangles
        .iter()
        .flat_map(|t| (0..3).map(move |j| (t[j], t[(j + 1) % 3])))
        .collect();
    directed.iter().all(|&(a, b)| directed.contains(&(b, a)))
}

/// Flip the edge opposite every corner of at least 179.9 degrees.
///
/// A flip is skipped when the two apexes coincide or are already connected.
pub fn remove_zero_angle_triangles(
    vertices: &[Point3<f64>],
    triangles: &[[usize; 3]],
) -> Vec<[usize; 3]> {
    let mut triangles = triangles.to_vec();
    let mut edge_map: HashMap<(usize, usize), usize> = HashMap::with_capacity(triangles.len() * 3);
    for (ti, t) in triangles.iter().enumerate() {
        for j in 0..3 {
            edge_map.insert((t[j], t[(j + 1) % 3]), ti);
        }
    }

    let corner_degrees = |tri: &[usize; 3], j: usize| -> Option<f64> {
        let p = vertices.get(tri[j])?;
        let a = vertices.get(tri[(j + 1) % 3])? - p;
        let b = vertices.get(tri[(j + 2) % 3])? - p;
        Some(a.angle(&b).to_degrees())
    };

    let mut candidates = Vec::new();
    for (ti, t) in triangles.iter().enumerate() {
        for j in 0..3 {
            if corner_degrees(t, j).is_some_and(|d| d > ZERO_ANGLE_DEGREES) {
                candidates.push((ti, j));
            }
        }
    }

    for (ti, j) in candidates {
        // Earlier flips may have rewritten this triangle
        let t = triangles[ti];
        if !corner_degrees(&t, j).is_some_and(|d| d > ZERO_ANGLE_DEGREES) {
            continue;
        }

        let c = t[j];
        let a = t[(j + 1) % 3];
        let b = t[(j + 2) % 3];
        let Some(&ni) = edge_map.get(&(b, a)) else {
            continue;
        };
        let n = triangles[ni];
        let Some(d) = n.iter().copied().find(|&v| v != a && v != b) else {
            continue;
        };
        if d == c || edge_map.contains_key(&(c, d)) || edge_map.contains_key(&(d, c)) {
            continue;
        }

        for (tri, idx) in [(t, ti), (n, ni)] {
            for k in 0..3 {
                let key = (tri[k], tri[(k + 1) % 3]);
                if edge_map.get(&key) == Some(&idx) {
                    edge_map.remove(&key);
                }
            }
        }

        triangles[ti] = [c, a, d];
        triangles[ni] = [c, d, b];
        for (tri, idx) in [(triangles[ti], ti), (triangles[ni], ni)] {
            for k in 0..3 {
                edge_map.insert((tri[k], tri[(k + 1) % 3]), idx);
            }
        }
    }

    triangles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_triangle() -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
        ];
        (vertices, vec![[0, 1, 2]])
    }

    fn two_triangles() -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, -1.0, 0.0),
        ];
        (vertices, vec![[0, 1, 2], [1, 0, 3]])
    }

    fn tetrahedron() -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        (vertices, vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]])
    }

    #[test]
    fn test_single_triangle() {
        let (vertices, faces) = single_triangle();
        let mesh = build_from_triangles(&vertices, &faces).unwrap();

        assert_eq!(mesh.num_vertices(), 3);
        assert_eq!(mesh.num_faces(), 1);
        // 3 interior half-edges + 3 boundary half-edges
        assert_eq!(mesh.num_halfedges(), 6);
        assert!(mesh.is_valid());
        assert!(mesh.vertex_ids().all(|v| mesh.is_boundary_vertex(v)));
    }

    #[test]
    fn test_two_triangles() {
        let (vertices, faces) = two_triangles();
        let mesh = build_from_triangles(&vertices, &faces).unwrap();

        assert_eq!(mesh.num_faces(), 2);
        // 6 interior half-edges + 4 boundary half-edges
        assert_eq!(mesh.num_halfedges(), 10);
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_closed_mesh_has_no_boundary() {
        let (vertices, faces) = tetrahedron();
        let mesh = build_from_triangles(&vertices, &faces).unwrap();

        assert_eq!(mesh.num_halfedges(), 12);
        assert!(mesh.is_valid());
        assert!(mesh.vertex_ids().all(|v| !mesh.is_boundary_vertex(v)));
        for v in mesh.vertex_ids() {
            let fan = mesh.vertex_halfedges_ccw(v).unwrap();
            assert_eq!(fan.len(), 3);
            assert!(fan.iter().all(|&he| mesh.origin(he) == v));
        }
    }

    #[test]
    fn test_invalid_vertex_index() {
        let vertices = vec![Point3::new(0.0, 0.0, 0.0)];
        let result = build_from_triangles(&vertices, &[[0, 1, 2]]);
        assert!(matches!(result, Err(MeshError::InvalidVertexIndex { .. })));
    }

    #[test]
    fn test_degenerate_face() {
        let (vertices, _) = single_triangle();
        let result = build_from_triangles(&vertices, &[[0, 0, 2]]);
        assert!(matches!(result, Err(MeshError::DegenerateFace { face: 0 })));
    }

    #[test]
    fn test_repeated_directed_edge() {
        let (vertices, _) = two_triangles();
        // Both faces contain the directed edge 0 -> 1
        let result = build_from_triangles(&vertices, &[[0, 1, 2], [0, 1, 3]]);
        assert!(matches!(result, Err(MeshError::NonManifoldEdge { v0: 0, v1: 1 })));
    }

    #[test]
    fn test_watertight() {
        assert!(is_watertight(&tetrahedron().1));
        assert!(!is_watertight(&two_triangles().1));
    }

    #[test]
    fn test_zero_angle_triangle_is_flipped() {
        // Vertex 2 lies on the segment 0-1, so triangle [2, 0, 1] has a 180 degree corner
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, -1.0, 0.0),
        ];
        let triangles = vec![[2, 0, 1], [1, 0, 3]];
        let fixed = remove_zero_angle_triangles(&vertices, &triangles);

        assert_eq!(fixed, vec![[2, 0, 3], [2, 3, 1]]);
    }

    #[test]
    fn test_regular_triangles_untouched() {
        let (vertices, faces) = tetrahedron();
        assert_eq!(remove_zero_angle_triangles(&vertices, &faces), faces);
    }
}
