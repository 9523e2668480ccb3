//! Quad extraction from a parameterized working mesh.
//!
//! An extractor reads the cross field stored on the faces of a
//! [`HalfEdgeMesh`] and produces a [`QuadMesh`] in the same coordinate space.
//! Returning `None` marks the island as failed.

mod pairing;

use std::collections::HashMap;

use nalgebra::{Point3, Vector3};

use crate::mesh::{HalfEdgeMesh, QuadMesh};

pub use pairing::PairingQuadExtractor;

/// Quad extraction backend.
pub trait QuadExtractor {
    /// Extract quads from a mesh whose face field has been solved.
    fn extract(&self, mesh: &HalfEdgeMesh) -> Option<QuadMesh>;

    /// Expected ratio of output vertices to working-mesh vertices.
    ///
    /// The pipeline remeshes islands to `target / vertex_growth()` so the
    /// extracted quads land near the requested vertex count.
    fn vertex_growth(&self) -> f64 {
        1.0
    }
}

/// Working-mesh vertex count that yields about `target` output vertices
/// from an extractor with the given growth.
pub fn remesh_target(target: usize, vertex_growth: f64) -> usize {
    if !(vertex_growth > 0.0 && vertex_growth.is_finite()) {
        return target.max(1);
    }
    ((target as f64 / vertex_growth).round() as usize).max(1)
}

/// Split polygons into quads through edge midpoints and centroids.
///
/// A polygon with `k` corners yields `k` quads. Midpoints are shared between
/// polygons that share an edge, so the output is conforming. Only corner
/// vertices that some polygon references are kept.
pub fn split_polygons_to_quads(vertices: &[Point3<f64>], polygons: &[Vec<usize>]) -> QuadMesh {
    let mut out = QuadMesh::default();
    let mut corner_map: HashMap<usize, usize> = HashMap::new();
    let mut midpoint_map: HashMap<(usize, usize), usize> = HashMap::new();

    for polygon in polygons {
        let k = polygon.len();
        if k < 3 {
            continue;
        }

        let corners: Vec<usize> = polygon
            .iter()
            .map(|&v| {
                *corner_map.entry(v).or_insert_with(|| {
                    out.vertices.push(vertices[v]);
                    out.vertices.len() - 1
                })
            })
            .collect();

        let midpoints: Vec<usize> = (0..k)
            .map(|i| {
                let (a, b) = (polygon[i], polygon[(i + 1) % k]);
                let key = if a < b { (a, b) } else { (b, a) };
                *midpoint_map.entry(key).or_insert_with(|| {
                    out.vertices.push(nalgebra::center(&vertices[a], &vertices[b]));
                    out.vertices.len() - 1
                })
            })
            .collect();

        let sum: Vector3<f64> = polygon.iter().map(|&v| vertices[v].coords).sum();
        out.vertices.push(Point3::from(sum / k as f64));
        let centroid = out.vertices.len() - 1;

        for i in 0..k {
            out.quads
                .push([corners[i], midpoints[i], centroid, midpoints[(i + k - 1) % k]]);
        }
    }

    out
}
