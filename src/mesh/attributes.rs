//! Per-element attributes of the working mesh.
//!
//! Relative height measures how far a vertex neighborhood departs from its
//! tangent plane. It drives the selection of constrained faces during
//! parameterization: flat regions have low relative height.

use nalgebra::Vector3;

use super::halfedge::HalfEdgeMesh;
use super::index::{FaceId, VertexId};

impl HalfEdgeMesh {
    /// Recompute normals, averaged normals and normalized relative heights.
    pub fn update_attributes(&mut self) {
        self.update_face_normals();
        self.update_vertex_normals();
        self.update_average_normals();
        self.update_relative_heights();
        self.normalize_relative_heights();
    }

    /// Recompute unit face normals.
    pub fn update_face_normals(&mut self) {
        for f in 0..self.num_faces() {
            let fid = FaceId::new(f);
            let n = self.face_area_vector(fid);
            self.face_mut(fid).normal = n.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::zeros);
        }
    }

    /// Recompute area-weighted vertex normals.
    pub fn update_vertex_normals(&mut self) {
        let mut normals = vec![Vector3::zeros(); self.num_vertices()];
        for f in self.face_ids() {
            let area_vector = self.face_area_vector(f);
            for v in self.face_triangle(f) {
                normals[v.index()] += area_vector;
            }
        }
        for (vertex, n) in self.vertices.iter_mut().zip(normals) {
            vertex.normal = n.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::zeros);
        }
    }

    /// Average the normals of each vertex's neighbors.
    ///
    /// Falls back to the vertex's own normal when the average vanishes.
    pub fn update_average_normals(&mut self) {
        let averages: Vec<Vector3<f64>> = self
            .vertex_ids()
            .map(|v| {
                let sum: Vector3<f64> = self
                    .vertex_neighbors(v)
                    .map(|n| self.vertex(n).normal)
                    .sum();
                sum.try_normalize(f64::EPSILON)
                    .unwrap_or(self.vertex(v).normal)
            })
            .collect();

        for (vertex, avg) in self.vertices.iter_mut().zip(averages) {
            vertex.average_normal = avg;
        }
    }

    /// Compute raw relative heights over each vertex's two-ring.
    ///
    /// Every neighbor direction is projected onto the averaged normal; the
    /// height is the spread of those projections. Vertices whose two-ring
    /// touches the boundary get `f64::MAX`.
    pub fn update_relative_heights(&mut self) {
        let heights: Vec<f64> = self.vertex_ids().map(|v| self.relative_height_at(v)).collect();
        for (vertex, h) in self.vertices.iter_mut().zip(heights) {
            vertex.relative_height = h;
        }
    }

    fn relative_height_at(&self, v: VertexId) -> f64 {
        if self.is_boundary_vertex(v) {
            return f64::MAX;
        }

        let center = self.position(v);
        let axis = self.vertex(v).average_normal;
        let mut low = 0.0_f64;
        let mut high = 0.0_f64;
        let mut project = |w: VertexId| {
            let dir = (self.position(w) - center).try_normalize(f64::EPSILON);
            let h = dir.map_or(0.0, |d| d.dot(&axis));
            low = low.min(h);
            high = high.max(h);
        };

        for n in self.vertex_neighbors(v) {
            if self.is_boundary_vertex(n) {
                return f64::MAX;
            }
            project(n);
            for nn in self.vertex_neighbors(n).filter(|&nn| nn != v) {
                project(nn);
            }
        }

        high - low
    }

    /// Divide finite relative heights by the largest finite one.
    pub fn normalize_relative_heights(&mut self) {
        let max_height = self
            .vertices
            .iter()
            .filter(|v| v.has_relative_height())
            .map(|v| v.relative_height)
            .fold(0.0_f64, f64::max);
        if max_height <= f64::EPSILON {
            return;
        }
        for vertex in self.vertices.iter_mut().filter(|v| v.has_relative_height()) {
            vertex.relative_height /= max_height;
        }
    }

    /// Vertex IDs sorted by ascending relative height (flattest first).
    pub fn vertices_by_flatness(&self) -> Vec<VertexId> {
        let mut order: Vec<VertexId> = self.vertex_ids().collect();
        order.sort_by(|&a, &b| {
            self.vertex(a)
                .relative_height
                .total_cmp(&self.vertex(b).relative_height)
        });
        order
    }

    /// Mean relative height of a face's corners.
    pub fn face_relative_height(&self, f: FaceId) -> f64 {
        let [a, b, c] = self.face_triangle(f);
        let heights = [a, b, c].map(|v| self.vertex(v).relative_height);
        if heights.iter().any(|&h| h == f64::MAX) {
            return f64::MAX;
        }
        heights.iter().sum::<f64>() / 3.0
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Point3;

    use super::*;

    fn octahedron() -> HalfEdgeMesh {
        let vertices = vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, -1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(0.0, 0.0, -1.0),
        ];
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
        HalfEdgeMesh::from_triangles(&vertices, &faces).unwrap()
    }

    #[test]
    fn test_face_normals_point_outward() {
        let mesh = octahedron();
        for f in mesh.face_ids() {
            let [p0, p1, p2] = mesh.face_positions(f);
            let centroid = (p0.coords + p1.coords + p2.coords) / 3.0;
            assert!(mesh.face(f).normal.dot(&centroid) > 0.0);
            assert!((mesh.face(f).normal.norm() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_symmetric_heights_normalize_to_one() {
        let mesh = octahedron();
        for v in mesh.vertex_ids() {
            assert!(mesh.vertex(v).has_relative_height());
            assert!((mesh.vertex(v).relative_height - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_boundary_vertices_have_no_height() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mesh = HalfEdgeMesh::from_triangles(&vertices, &[[0, 1, 2]]).unwrap();
        assert!(mesh.vertex_ids().all(|v| !mesh.vertex(v).has_relative_height()));
        assert_eq!(mesh.face_relative_height(FaceId::new(0)), f64::MAX);
    }

    #[test]
    fn test_flatness_order_is_ascending() {
        let mut mesh = octahedron();
        mesh.vertex_mut(VertexId::new(3)).relative_height = 0.2;
        mesh.vertex_mut(VertexId::new(5)).relative_height = 0.1;
        let order = mesh.vertices_by_flatness();
        assert_eq!(order[0], VertexId::new(5));
        assert_eq!(order[1], VertexId::new(3));
    }
}
