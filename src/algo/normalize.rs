//! Mapping between world coordinates and the canonical working scale.
//!
//! Every stage after the normalizer works on coordinates centered at the
//! bounding-box center and scaled so that the largest half-extent equals
//! `scale`. This keeps edge-length defaults meaningful for any input size.

use nalgebra::Point3;

use crate::mesh::bounding_box;

/// Default canonical half-extent.
pub const DEFAULT_SCALE: f64 = 100.0;

/// Affine map from world space to working space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    /// Bounding-box center in world space.
    pub origin: Point3<f64>,
    /// Largest half-extent of the bounding box; 1 for degenerate input.
    pub max_length: f64,
    /// Half-extent in working space.
    pub scale: f64,
}

impl Normalization {
    /// Compute the normalization of a point set.
    ///
    /// Empty input or input without extent yields `max_length = 1` so the map
    /// stays finite.
    pub fn from_points(points: &[Point3<f64>], scale: f64) -> Self {
        let (origin, max_length) = center_and_half_extent(points);
        Self {
            origin,
            max_length,
            scale,
        }
    }

    /// Map a world-space point into working space.
    #[inline]
    pub fn encode(&self, p: &Point3<f64>) -> Point3<f64> {
        Point3::from((p - self.origin) * (self.scale / self.max_length))
    }

    /// Map a working-space point back to world space.
    #[inline]
    pub fn decode(&self, p: &Point3<f64>) -> Point3<f64> {
        self.origin + p.coords * self.recover_scale()
    }

    /// Factor that converts working-space lengths to world-space lengths.
    #[inline]
    pub fn recover_scale(&self) -> f64 {
        self.max_length / self.scale
    }

    /// Map every point into working space.
    pub fn encode_all(&self, points: &[Point3<f64>]) -> Vec<Point3<f64>> {
        points.iter().map(|p| self.encode(p)).collect()
    }

    /// Gradient size for an island given its working-space points.
    ///
    /// The global gradient size is scaled by the island's world-space
    /// half-extent relative to the whole input's.
    pub fn island_gradient_size(&self, island_points: &[Point3<f64>], global_gradient_size: f64) -> f64 {
        let (_, local_max_length) = center_and_half_extent(island_points);
        global_gradient_size * (local_max_length * self.recover_scale() / self.max_length)
    }
}

/// Bounding-box center and largest half-extent, with the degenerate fallback.
fn center_and_half_extent(points: &[Point3<f64>]) -> (Point3<f64>, f64) {
    let Some((min, max)) = bounding_box(points) else {
        return (Point3::origin(), 1.0);
    };
    let half = (max - min) * 0.5;
    let max_length = half.max();
    let origin = nalgebra::center(&min, &max);
    if max_length > 0.0 && max_length.is_finite() {
        (origin, max_length)
    } else {
        (origin, 1.0)
    }
}
