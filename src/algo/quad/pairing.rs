//! Field-guided triangle pairing.
//!
//! Two adjacent triangles form a good quad when their shared edge runs
//! diagonally to the cross field. Candidate edges are scored by
//! `|sin 2φ|`, with `φ` the angle between edge and field, and matched
//! greedily from the best score down. Unmatched triangles stay triangles;
//! the final split through midpoints turns everything into quads.

use std::cmp::Ordering;

use nalgebra::Vector3;

use crate::algo::remesh::is_convex_quad;
use crate::mesh::{HalfEdgeId, HalfEdgeMesh, QuadMesh};

use super::{split_polygons_to_quads, QuadExtractor};

/// Output vertices per working vertex after pairing and splitting.
///
/// A closed mesh with `V` vertices has about `3V` edges and `2V` faces;
/// with `m` pairs the split adds `3V - m` midpoints and `2V - m` centroids.
/// Field-aligned pairing typically matches most faces.
pub const PAIRED_SPLIT_GROWTH: f64 = 4.5;

/// Default [`QuadExtractor`].
#[derive(Debug, Clone)]
pub struct PairingQuadExtractor {
    /// Pairs scoring below this are not merged. In `[0, 1]`.
    pub min_alignment: f64,
}

impl Default for PairingQuadExtractor {
    fn default() -> Self {
        Self { min_alignment: 0.5 }
    }
}

impl PairingQuadExtractor {
    /// Extractor with the default minimum score of 0.5.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum pairing score.
    pub fn with_min_alignment(mut self, min_alignment: f64) -> Self {
        self.min_alignment = min_alignment;
        self
    }

    /// Polygons after pairing: merged quads first, then leftover triangles.
    pub fn pair_faces(&self, mesh: &HalfEdgeMesh) -> Vec<Vec<usize>> {
        let mut candidates: Vec<(f64, HalfEdgeId)> = mesh
            .halfedge_ids()
            .filter(|&he| he.index() < mesh.twin(he).index() && !mesh.is_boundary_edge(he))
            .filter_map(|he| {
                let score = diagonal_score(mesh, he)?;
                (score >= self.min_alignment).then_some((score, he))
            })
            .collect();
        candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal).then(a.1.cmp(&b.1)));

        let mut matched = vec![false; mesh.num_faces()];
        let mut polygons = Vec::new();

        for (_, he) in candidates {
            let twin = mesh.twin(he);
            let (f, g) = (mesh.face_of(he).index(), mesh.face_of(twin).index());
            if matched[f] || matched[g] {
                continue;
            }
            let Some(quad) = merged_quad(mesh, he) else {
                continue;
            };
            matched[f] = true;
            matched[g] = true;
            polygons.push(quad.to_vec());
        }

        for f in mesh.face_ids() {
            if !matched[f.index()] {
                polygons.push(mesh.face_triangle(f).iter().map(|v| v.index()).collect());
            }
        }

        polygons
    }
}

impl QuadExtractor for PairingQuadExtractor {
    fn extract(&self, mesh: &HalfEdgeMesh) -> Option<QuadMesh> {
        if mesh.num_faces() == 0 || !mesh.is_valid() {
            return None;
        }

        let polygons = self.pair_faces(mesh);
        let paired = polygons.iter().filter(|p| p.len() == 4).count();
        let positions: Vec<_> = mesh.vertex_ids().map(|v| *mesh.position(v)).collect();
        let quads = split_polygons_to_quads(&positions, &polygons);

        log::debug!(
            "quad extraction: {} faces, {} pairs, {} quads",
            mesh.num_faces(),
            paired,
            quads.num_quads()
        );
        Some(quads)
    }

    fn vertex_growth(&self) -> f64 {
        PAIRED_SPLIT_GROWTH
    }
}

/// How diagonal the edge is to the mean field of its two faces.
///
/// `None` when the field vanishes on either side.
fn diagonal_score(mesh: &HalfEdgeMesh, he: HalfEdgeId) -> Option<f64> {
    let f = mesh.face_of(he);
    let g = mesh.face_of(mesh.twin(he));
    let edge = mesh.edge_vector(he).try_normalize(f64::EPSILON)?;

    let score_in = |field: Vector3<f64>, normal: Vector3<f64>| -> Option<f64> {
        let field = field.try_normalize(f64::EPSILON)?;
        let cos = edge.dot(&field);
        let sin = normal.dot(&field.cross(&edge));
        Some((2.0 * sin * cos).abs())
    };

    let sf = score_in(mesh.face(f).field, mesh.face(f).normal)?;
    let sg = score_in(mesh.face(g).field, mesh.face(g).normal)?;
    Some(0.5 * (sf + sg))
}

/// Quad formed by the two faces of `he`, or `None` if it is not convex.
///
/// With `he = u→w` in face `(u, w, x)` and the twin in `(w, u, y)`, the
/// quad is `(u, y, w, x)`, keeping the faces' orientation.
fn merged_quad(mesh: &HalfEdgeMesh, he: HalfEdgeId) -> Option<[usize; 4]> {
    let twin = mesh.twin(he);
    let u = mesh.origin(he);
    let w = mesh.dest(he);
    let x = mesh.origin(mesh.prev(he));
    let y = mesh.origin(mesh.prev(twin));
    if x == y {
        return None;
    }

    let quad = [u, y, w, x];
    let [p0, p1, p2, p3] = quad.map(|v| *mesh.position(v));
    is_convex_quad(&p0, &p1, &p2, &p3).then(|| quad.map(|v| v.index()))
}

#[cfg(test)]
mod tests {
    use nalgebra::Point3;

    use super::*;
    use crate::mesh::FaceId;

    /// Unit square split along the diagonal 0-2.
    fn split_square() -> HalfEdgeMesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        HalfEdgeMesh::from_triangles(&vertices, &[[0, 1, 2], [0, 2, 3]]).unwrap()
    }

    fn set_field(mesh: &mut HalfEdgeMesh, field: Vector3<f64>) {
        for f in 0..mesh.num_faces() {
            mesh.face_mut(FaceId::new(f)).field = field;
        }
    }

    #[test]
    fn test_axis_field_pairs_across_diagonal() {
        let mut mesh = split_square();
        set_field(&mut mesh, Vector3::x());
        let polygons = PairingQuadExtractor::new().pair_faces(&mesh);

        assert_eq!(polygons.len(), 1);
        let mut quad = polygons[0].clone();
        quad.sort_unstable();
        assert_eq!(quad, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_diagonal_field_keeps_triangles() {
        let mut mesh = split_square();
        let diagonal = Vector3::new(1.0, 1.0, 0.0).normalize();
        set_field(&mut mesh, diagonal);
        let polygons = PairingQuadExtractor::new().pair_faces(&mesh);

        assert_eq!(polygons.len(), 2);
        assert!(polygons.iter().all(|p| p.len() == 3));
    }

    #[test]
    fn test_unsolved_field_keeps_triangles() {
        let polygons = PairingQuadExtractor::new().pair_faces(&split_square());
        assert_eq!(polygons.len(), 2);
    }

    #[test]
    fn test_merged_quad_orientation() {
        let mut mesh = split_square();
        set_field(&mut mesh, Vector3::x());
        let polygons = PairingQuadExtractor::new().pair_faces(&mesh);
        let p: Vec<_> = polygons[0].iter().map(|&v| *mesh.position(crate::mesh::VertexId::new(v))).collect();
        // Shoelace area is positive for counter-clockwise order
        let area: f64 = (0..4).map(|i| p[i].x * p[(i + 1) % 4].y - p[(i + 1) % 4].x * p[i].y).sum();
        assert!(area > 0.0);
    }

    #[test]
    fn test_extract_all_quads() {
        let mut mesh = split_square();
        set_field(&mut mesh, Vector3::x());
        let quads = PairingQuadExtractor::new().extract(&mesh).unwrap();

        assert_eq!(quads.num_quads(), 4);
        assert!(quads.validate().is_ok());
    }

    #[test]
    fn test_non_convex_pair_rejected() {
        // Dart: vertex 3 pulled inside the triangle 0-1-2's opposite side
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(1.0, 0.5, 0.0),
        ];
        let mut mesh = HalfEdgeMesh::from_triangles(&vertices, &[[0, 1, 3], [1, 2, 3]]).unwrap();
        set_field(&mut mesh, Vector3::x());
        let polygons = PairingQuadExtractor::new().with_min_alignment(0.0).pair_faces(&mesh);
        assert!(polygons.iter().all(|p| p.len() == 3));
    }
}
