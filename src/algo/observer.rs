//! Checkpoint reporting for the remeshing pipeline.
//!
//! An [`Observer`] wraps a callback that receives a [`Checkpoint`] each time the
//! pipeline reaches a notable point. Callbacks may be invoked from rayon worker
//! threads, so they must be `Send + Sync`.
//!
//! # Example
//!
//! ```
//! use quadremesh::algo::observer::{Checkpoint, Observer};
//!
//! let observer = Observer::new(|checkpoint| {
//!     if let Checkpoint::IslandsSplit { kept, .. } = checkpoint {
//!         println!("{} islands", kept);
//!     }
//! });
//! observer.notify(&Checkpoint::IslandsSplit { kept: 2, discarded: 1 });
//! ```

use crate::algo::auto::IslandStage;

/// A notable point in the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Checkpoint {
    /// The input has been split into islands.
    IslandsSplit {
        /// Islands with at least four triangles.
        kept: usize,
        /// Islands dropped for being too small.
        discarded: usize,
    },

    /// One remesh attempt of the edge-length search finished.
    SearchIteration {
        /// Island index.
        island: usize,
        /// Edge length used for this attempt.
        edge_length: f64,
        /// Vertex count the attempt produced.
        vertex_count: usize,
    },

    /// An island moved to a new stage while being prepared.
    StageReached {
        /// Island index.
        island: usize,
        /// Stage entered.
        stage: IslandStage,
    },

    /// A singularity count was evaluated for a constraint ratio.
    SingularityEvaluated {
        /// Island index.
        island: usize,
        /// Constraint ratio evaluated.
        ratio: (f64, f64),
        /// Singularities the constraints produce.
        singularities: usize,
    },

    /// An island's quads were appended to the output.
    IslandMerged {
        /// Island index.
        island: usize,
        /// Global index of the island's first vertex.
        vertex_offset: usize,
        /// Number of quads appended.
        quads: usize,
    },
}

/// A checkpoint callback.
pub struct Observer {
    callback: Box<dyn Fn(&Checkpoint) + Send + Sync>,
}

impl Observer {
    /// Create a new observer with the given callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Checkpoint) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Report a checkpoint.
    #[inline]
    pub fn notify(&self, checkpoint: &Checkpoint) {
        (self.callback)(checkpoint);
    }

    /// Create a no-op observer that discards all checkpoints.
    pub fn none() -> Self {
        Self::new(|_| {})
    }
}

impl Default for Observer {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn test_observer_receives_checkpoints() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer = Observer::new(move |c| sink.lock().unwrap().push(c.clone()));

        observer.notify(&Checkpoint::IslandsSplit { kept: 1, discarded: 0 });
        observer.notify(&Checkpoint::IslandMerged {
            island: 0,
            vertex_offset: 0,
            quads: 4,
        });

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], Checkpoint::IslandsSplit { kept: 1, discarded: 0 });
    }

    #[test]
    fn test_none_is_silent() {
        Observer::none().notify(&Checkpoint::IslandsSplit { kept: 0, discarded: 0 });
        assert_eq!(format!("{:?}", Observer::default()), "Observer { .. }");
    }
}
