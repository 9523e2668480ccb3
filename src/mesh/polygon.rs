//! Plain indexed meshes.
//!
//! [`TriangleMesh`] and [`QuadMesh`] are the shapes data takes at the crate
//! boundary and between pipeline stages. They carry no connectivity beyond
//! their index lists.

use nalgebra::Point3;

use crate::error::{MeshError, Result};

/// An indexed triangle mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    /// Vertex positions.
    pub vertices: Vec<Point3<f64>>,
    /// Triangles as indices into `vertices`.
    pub triangles: Vec<[usize; 3]>,
}

impl TriangleMesh {
    /// Create a triangle mesh from its parts.
    pub fn new(vertices: Vec<Point3<f64>>, triangles: Vec<[usize; 3]>) -> Self {
        Self { vertices, triangles }
    }

    /// Number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles.
    #[inline]
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// True when the mesh has no triangles.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Check that every triangle references existing vertices.
    pub fn validate(&self) -> Result<()> {
        validate_indices(self.vertices.len(), &self.triangles)
    }

    /// Axis-aligned bounding box of the vertices.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        bounding_box(&self.vertices)
    }

    /// Total area of all triangles. Triangles with out-of-range indices are skipped.
    pub fn surface_area(&self) -> f64 {
        self.triangles
            .iter()
            .filter_map(|t| {
                let a = self.vertices.get(t[0])?;
                let b = self.vertices.get(t[1])?;
                let c = self.vertices.get(t[2])?;
                Some(0.5 * (b - a).cross(&(c - a)).norm())
            })
            .sum()
    }
}

/// An indexed quad mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuadMesh {
    /// Vertex positions.
    pub vertices: Vec<Point3<f64>>,
    /// Quads as indices into `vertices`, counter-clockwise.
    pub quads: Vec<[usize; 4]>,
}

impl QuadMesh {
    /// Create a quad mesh from its parts.
    pub fn new(vertices: Vec<Point3<f64>>, quads: Vec<[usize; 4]>) -> Self {
        Self { vertices, quads }
    }

    /// Number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of quads.
    #[inline]
    pub fn num_quads(&self) -> usize {
        self.quads.len()
    }

    /// True when the mesh has no quads.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    /// Check that every quad references existing vertices.
    pub fn validate(&self) -> Result<()> {
        validate_indices(self.vertices.len(), &self.quads)
    }

    /// Axis-aligned bounding box of the vertices.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        bounding_box(&self.vertices)
    }
}

fn validate_indices<const N: usize>(num_vertices: usize, faces: &[[usize; N]]) -> Result<()> {
    for (fi, face) in faces.iter().enumerate() {
        if let Some(&vi) = face.iter().find(|&&vi| vi >= num_vertices) {
            return Err(MeshError::InvalidVertexIndex { face: fi, vertex: vi });
        }
    }
    Ok(())
}

/// Axis-aligned bounding box of a point set.
pub fn bounding_box(points: &[Point3<f64>]) -> Option<(Point3<f64>, Point3<f64>)> {
    let first = points.first()?;
    let mut min = *first;
    let mut max = *first;

    for p in points {
        for i in 0..3 {
            min[i] = min[i].min(p[i]);
            max[i] = max[i].max(p[i]);
        }
    }

    Some((min, max))
}
