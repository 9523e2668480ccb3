//! Connected-component decomposition of triangle soup.
//!
//! Two triangles are adjacent when one contains the directed edge `(a, b)` and
//! the other contains `(b, a)`. Components with fewer than
//! [`MIN_ISLAND_TRIANGLES`] triangles are discarded.

use std::collections::{HashMap, VecDeque};

use nalgebra::Point3;

use super::normalize::Normalization;
use crate::mesh::TriangleMesh;

/// Smallest island that is kept.
pub const MIN_ISLAND_TRIANGLES: usize = 4;

/// Map each directed edge to the triangle that owns it.
///
/// When several triangles share a directed edge, the last one wins.
pub fn build_edge_to_face_map(triangles: &[[usize; 3]]) -> HashMap<(usize, usize), usize> {
    let mut map = HashMap::with_capacity(triangles.len() * 3);
    for (index, t) in triangles.iter().enumerate() {
        for i in 0..3 {
            map.insert((t[i], t[(i + 1) % 3]), index);
        }
    }
    map
}

/// Result of [`split_to_islands`], as lists of input triangle indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IslandSplit {
    /// Components with at least [`MIN_ISLAND_TRIANGLES`] triangles, in seed order.
    pub kept: Vec<Vec<usize>>,
    /// Components that were too small.
    pub discarded: Vec<Vec<usize>>,
}

/// Split triangles into connected components by breadth-first search.
///
/// Seeds are taken in input order, so the output is deterministic.
pub fn split_to_islands(triangles: &[[usize; 3]]) -> IslandSplit {
    let edge_to_face = build_edge_to_face_map(triangles);
    let mut visited = vec![false; triangles.len()];
    let mut queue = VecDeque::new();
    let mut split = IslandSplit::default();

    for seed in 0..triangles.len() {
        if visited[seed] {
            continue;
        }

        let mut component = Vec::new();
        queue.push_back(seed);
        while let Some(index) = queue.pop_front() {
            if visited[index] {
                continue;
            }
            visited[index] = true;
            component.push(index);

            let t = &triangles[index];
            for i in 0..3 {
                if let Some(&opposite) = edge_to_face.get(&(t[(i + 1) % 3], t[i])) {
                    if !visited[opposite] {
                        queue.push_back(opposite);
                    }
                }
            }
        }

        if component.len() < MIN_ISLAND_TRIANGLES {
            split.discarded.push(component);
        } else {
            split.kept.push(component);
        }
    }

    split
}

/// Copy the selected triangles into a mesh with dense local vertex indices.
///
/// Vertices are numbered in order of first use. Indices must be valid for
/// `vertices`.
pub fn compact(triangle_indices: &[usize], triangles: &[[usize; 3]], vertices: &[Point3<f64>]) -> TriangleMesh {
    let mut remap: HashMap<usize, usize> = HashMap::new();
    let mut local_vertices = Vec::new();
    let mut local_triangles = Vec::with_capacity(triangle_indices.len());

    for &ti in triangle_indices {
        let local = triangles[ti].map(|v| {
            *remap.entry(v).or_insert_with(|| {
                local_vertices.push(vertices[v]);
                local_vertices.len() - 1
            })
        });
        local_triangles.push(local);
    }

    TriangleMesh::new(local_vertices, local_triangles)
}

/// A connected component ready for remeshing. Immutable once created.
#[derive(Debug, Clone)]
pub struct Island {
    /// Island position in the split order.
    pub index: usize,
    /// Compacted geometry in working space.
    pub mesh: TriangleMesh,
    /// Gradient size scaled to this island's extent.
    pub gradient_size: f64,
}

impl Island {
    /// Compact every kept component of `split` out of the working-space mesh.
    pub fn collect(
        split: &IslandSplit,
        working: &TriangleMesh,
        normalization: &Normalization,
        global_gradient_size: f64,
    ) -> Vec<Island> {
        split
            .kept
            .iter()
            .enumerate()
            .map(|(index, component)| {
                let mesh = compact(component, &working.triangles, &working.vertices);
                let gradient_size = normalization.island_gradient_size(&mesh.vertices, global_gradient_size);
                Island {
                    index,
                    mesh,
                    gradient_size,
                }
            })
            .collect()
    }
}
