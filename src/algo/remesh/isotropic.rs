//! Isotropic remeshing on face lists.

use std::collections::{HashMap, HashSet};

use nalgebra::Point3;

use crate::mesh::TriangleMesh;

use super::{
    cleanup_mesh, collapse_edges, edge_key, flip_edges_for_valence_faces, tangential_smooth,
    IsotropicParams, IsotropicRemesher, MeshTopology,
};

/// Split/collapse/flip/smooth remesher (Botsch & Kobbelt, 2004).
#[derive(Debug, Clone)]
pub struct BotschKobbeltRemesher {
    /// Number of remeshing iterations.
    pub iterations: usize,

    /// Number of tangential smoothing iterations per remeshing iteration.
    pub smoothing_iterations: usize,

    /// Smoothing factor for tangential relaxation.
    pub smoothing_lambda: f64,

    /// Whether to use parallel execution (default: true).
    pub parallel: bool,
}

impl Default for BotschKobbeltRemesher {
    fn default() -> Self {
        Self {
            iterations: 5,
            smoothing_iterations: 3,
            smoothing_lambda: 0.5,
            parallel: true,
        }
    }
}

impl BotschKobbeltRemesher {
    /// Set the number of remeshing iterations.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the number of smoothing iterations per remeshing iteration.
    pub fn with_smoothing_iterations(mut self, iterations: usize) -> Self {
        self.smoothing_iterations = iterations;
        self
    }

    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Create options for single-threaded execution.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

impl IsotropicRemesher for BotschKobbeltRemesher {
    fn remesh(&self, input: &TriangleMesh, params: &IsotropicParams) -> TriangleMesh {
        let mut mesh = cleanup_mesh(&input.vertices, &input.triangles);
        if self.iterations == 0 || params.target_edge_length <= 0.0 || mesh.is_empty() {
            return mesh;
        }

        let high = params.target_edge_length * 4.0 / 3.0;
        let low = params.target_edge_length * 4.0 / 5.0;
        let sharp = params.sharp_edge_degrees;

        for iter in 0..self.iterations {
            split_long_edges(&mut mesh.vertices, &mut mesh.triangles, high);
            collapse_short_edges(&mut mesh.vertices, &mut mesh.triangles, low, high, sharp);
            mesh = cleanup_mesh(&mesh.vertices, &mesh.triangles);

            flip_edges_for_valence_faces(&mesh.vertices, &mut mesh.triangles, sharp);

            let topology = MeshTopology::from_faces(&mesh.vertices, &mesh.triangles, sharp);
            for _ in 0..self.smoothing_iterations {
                tangential_smooth(
                    &mut mesh.vertices,
                    &mesh.triangles,
                    &topology,
                    self.smoothing_lambda,
                    self.parallel,
                );
            }

            log::trace!(
                "remesh iteration {}: {} vertices, {} faces",
                iter,
                mesh.num_vertices(),
                mesh.num_triangles()
            );
        }

        mesh
    }
}

/// Split all edges longer than the threshold.
///
/// Uses batch processing: collect all long edges, split them simultaneously.
/// Feature edges are split too; their halves stay on the feature.
fn split_long_edges(vertices: &mut Vec<Point3<f64>>, faces: &mut Vec<[usize; 3]>, threshold: f64) {
    let threshold_sq = threshold * threshold;

    // Limit passes to prevent infinite loops on degenerate geometry
    let max_passes = 20;

    for _ in 0..max_passes {
        let mut long_edges: Vec<(usize, usize)> = faces
            .iter()
            .flat_map(|face| (0..3).map(move |i| edge_key(face[i], face[(i + 1) % 3])))
            .filter(|&(v0, v1)| (vertices[v1] - vertices[v0]).norm_squared() > threshold_sq)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        if long_edges.is_empty() {
            break;
        }
        long_edges.sort_unstable();

        let mut edge_midpoints: HashMap<(usize, usize), usize> = HashMap::with_capacity(long_edges.len());
        for (v0, v1) in long_edges {
            let mid = Point3::from((vertices[v0].coords + vertices[v1].coords) * 0.5);
            edge_midpoints.insert((v0, v1), vertices.len());
            vertices.push(mid);
        }

        let mut new_faces: Vec<[usize; 3]> = Vec::with_capacity(faces.len() * 2);
        for &face in faces.iter() {
            let [v0, v1, v2] = face;
            let m01 = edge_midpoints.get(&edge_key(v0, v1)).copied();
            let m12 = edge_midpoints.get(&edge_key(v1, v2)).copied();
            let m20 = edge_midpoints.get(&edge_key(v2, v0)).copied();

            match (m01, m12, m20) {
                (None, None, None) => new_faces.push(face),
                (Some(m), None, None) => {
                    new_faces.push([v0, m, v2]);
                    new_faces.push([m, v1, v2]);
                }
                (None, Some(m), None) => {
                    new_faces.push([v0, v1, m]);
                    new_faces.push([v0, m, v2]);
                }
                (None, None, Some(m)) => {
                    new_faces.push([v0, v1, m]);
                    new_faces.push([m, v1, v2]);
                }
                (Some(m01), Some(m12), None) => {
                    new_faces.push([v0, m01, v2]);
                    new_faces.push([m01, v1, m12]);
                    new_faces.push([m01, m12, v2]);
                }
                (None, Some(m12), Some(m20)) => {
                    new_faces.push([v0, v1, m12]);
                    new_faces.push([v0, m12, m20]);
                    new_faces.push([m12, v2, m20]);
                }
                (Some(m01), None, Some(m20)) => {
                    new_faces.push([v0, m01, m20]);
                    new_faces.push([m01, v1, v2]);
                    new_faces.push([m01, v2, m20]);
                }
                (Some(m01), Some(m12), Some(m20)) => {
                    new_faces.push([v0, m01, m20]);
                    new_faces.push([m01, v1, m12]);
                    new_faces.push([m20, m12, v2]);
                    new_faces.push([m01, m12, m20]);
                }
            }
        }

        *faces = new_faces;
    }
}

/// Collapse all edges shorter than the low threshold.
///
/// Uses batch processing: finds all collapsible edges, selects ones whose
/// one-rings do not overlap, and collapses them all at once before rebuilding
/// topology.
fn collapse_short_edges(
    vertices: &mut [Point3<f64>],
    faces: &mut Vec<[usize; 3]>,
    low_threshold: f64,
    high_threshold: f64,
    sharp_edge_degrees: f64,
) {
    let max_batches = 30;

    for _ in 0..max_batches {
        let topology = MeshTopology::from_faces(vertices, faces, sharp_edge_degrees);
        let vertex_faces = build_vertex_faces(faces, vertices.len());

        let mut candidates: Vec<(usize, usize, Point3<f64>, f64)> = topology
            .edge_faces
            .keys()
            .filter_map(|&(v0, v1)| {
                let length = (vertices[v1] - vertices[v0]).norm();
                if length >= low_threshold {
                    return None;
                }
                plan_collapse(vertices, faces, &topology, &vertex_faces, v0, v1, high_threshold)
                    .map(|(keep, remove, position)| (keep, remove, position, length))
            })
            .collect();

        if candidates.is_empty() {
            break;
        }

        // Shortest first, ties broken by index for reproducible runs
        candidates.sort_by(|a, b| a.3.total_cmp(&b.3).then((a.0, a.1).cmp(&(b.0, b.1))));

        let mut locked: HashSet<usize> = HashSet::new();
        let mut batch: Vec<(usize, usize, Point3<f64>)> = Vec::new();
        for (keep, remove, position, _) in candidates {
            if locked.contains(&keep) || locked.contains(&remove) {
                continue;
            }
            locked.insert(keep);
            locked.insert(remove);
            locked.extend(topology.neighbors(keep));
            locked.extend(topology.neighbors(remove));
            batch.push((keep, remove, position));
        }

        collapse_edges(vertices, faces, &batch);
    }
}

/// Decide whether an edge may collapse and where the merged vertex goes.
///
/// Returns `(keep, remove, position)`.
fn plan_collapse(
    vertices: &[Point3<f64>],
    faces: &[[usize; 3]],
    topology: &MeshTopology,
    vertex_faces: &[Vec<usize>],
    v0: usize,
    v1: usize,
    high_threshold: f64,
) -> Option<(usize, usize, Point3<f64>)> {
    if topology.is_feature_edge(v0, v1) {
        return None;
    }

    // A fixed endpoint stays where it is
    let (keep, remove, position) = match (topology.is_fixed_vertex(v0), topology.is_fixed_vertex(v1)) {
        (true, true) => return None,
        (true, false) => (v0, v1, vertices[v0]),
        (false, true) => (v1, v0, vertices[v1]),
        (false, false) => (v0, v1, nalgebra::center(&vertices[v0], &vertices[v1])),
    };

    // Link condition: an interior edge has exactly two common neighbors
    let neighbors_v0 = topology.neighbors(v0);
    let neighbors_v1 = topology.neighbors(v1);
    if neighbors_v0.intersection(neighbors_v1).count() != 2 {
        return None;
    }

    // Collapsing must not create edges longer than the high threshold
    let too_long = neighbors_v0
        .iter()
        .chain(neighbors_v1.iter())
        .filter(|&&n| n != v0 && n != v1)
        .any(|&n| (vertices[n] - position).norm() > high_threshold);
    if too_long {
        return None;
    }

    // Surviving faces must not fold over
    let folds = vertex_faces[v0]
        .iter()
        .chain(vertex_faces[v1].iter())
        .map(|&fi| faces[fi])
        .filter(|face| !(face.contains(&v0) && face.contains(&v1)))
        .any(|face| {
            let before = triangle_normal(vertices, &face, None);
            let after = triangle_normal(vertices, &face, Some((keep, remove, position)));
            before.dot(&after) <= 0.0
        });
    if folds {
        return None;
    }

    Some((keep, remove, position))
}

fn triangle_normal(
    vertices: &[Point3<f64>],
    face: &[usize; 3],
    moved: Option<(usize, usize, Point3<f64>)>,
) -> nalgebra::Vector3<f64> {
    let p = face.map(|v| match moved {
        Some((keep, remove, position)) if v == keep || v == remove => position,
        _ => vertices[v],
    });
    (p[1] - p[0]).cross(&(p[2] - p[0]))
}

fn build_vertex_faces(faces: &[[usize; 3]], num_vertices: usize) -> Vec<Vec<usize>> {
    let mut vertex_faces = vec![Vec::new(); num_vertices];
    for (fi, face) in faces.iter().enumerate() {
        for &v in face {
            vertex_faces[v].push(fi);
        }
    }
    vertex_faces
}
