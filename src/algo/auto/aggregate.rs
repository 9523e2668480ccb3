//! Final extraction and merge into one global mesh.

use rayon::prelude::*;

use crate::algo::normalize::Normalization;
use crate::algo::observer::{Checkpoint, Observer};
use crate::algo::parameterize::Parameterizer;
use crate::algo::quad::QuadExtractor;
use crate::mesh::QuadMesh;

use super::task::IslandTask;

/// Solve and extract every accepted island.
pub(crate) fn extract_all<P, Q>(tasks: &mut [IslandTask<P>], extractor: &Q, parallel: bool)
where
    P: Parameterizer,
    Q: QuadExtractor + Sync + ?Sized,
{
    if parallel {
        tasks.par_iter_mut().for_each(|task| task.extract(extractor));
    } else {
        tasks.iter_mut().for_each(|task| task.extract(extractor));
    }
}

/// Append island quad meshes in iteration order.
///
/// Vertices are decoded back to world space. Each island's quad indices are
/// offset by the vertex count recorded before its vertices are appended.
pub fn merge_island_quads<'a, I>(islands: I, normalization: &Normalization, observer: &Observer) -> QuadMesh
where
    I: IntoIterator<Item = (usize, &'a QuadMesh)>,
{
    let mut merged = QuadMesh::default();
    for (island, quads) in islands {
        let vertex_offset = merged.vertices.len();
        merged
            .vertices
            .extend(quads.vertices.iter().map(|v| normalization.decode(v)));
        merged
            .quads
            .extend(quads.quads.iter().map(|q| q.map(|i| i + vertex_offset)));

        observer.notify(&Checkpoint::IslandMerged {
            island,
            vertex_offset,
            quads: quads.num_quads(),
        });
    }
    merged
}
