//! STL (stereolithography) format support.
//!
//! Both binary and ASCII files are read. Output is always binary; since STL
//! only stores triangles, each quad is written as two triangles split along
//! its first diagonal.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use nalgebra::{Point3, Vector3};

use crate::error::{MeshError, Result};
use crate::mesh::{QuadMesh, TriangleMesh};

/// Load a triangle mesh from an STL file.
///
/// `stl_io` merges coincident corners into shared vertices. Triangles that
/// collapse onto a repeated vertex are dropped.
///
/// # Example
///
/// ```no_run
/// use quadremesh::io::stl;
///
/// let mesh = stl::load("model.stl").unwrap();
/// ```
pub fn load<P: AsRef<Path>>(path: P) -> Result<TriangleMesh> {
    let path = path.as_ref();
    let mut file = File::open(path)?;

    let stl = stl_io::read_stl(&mut file).map_err(|e| MeshError::LoadError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let vertices: Vec<Point3<f64>> = stl
        .vertices
        .iter()
        .map(|v| Point3::new(v[0] as f64, v[1] as f64, v[2] as f64))
        .collect();

    let triangles: Vec<[usize; 3]> = stl
        .faces
        .iter()
        .map(|face| face.vertices)
        .filter(|&[a, b, c]| a != b && b != c && a != c)
        .collect();

    if triangles.is_empty() {
        return Err(MeshError::LoadError {
            path: path.to_path_buf(),
            message: "STL file contains no valid triangles".to_string(),
        });
    }

    Ok(TriangleMesh::new(vertices, triangles))
}

/// Save a quad mesh to a binary STL file.
pub fn save<P: AsRef<Path>>(mesh: &QuadMesh, path: P) -> Result<()> {
    let path = path.as_ref();
    mesh.validate()?;
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    let to_vertex = |p: &Point3<f64>| stl_io::Vertex::new([p.x as f32, p.y as f32, p.z as f32]);

    let triangles: Vec<stl_io::Triangle> = mesh
        .quads
        .iter()
        .flat_map(|&[a, b, c, d]| [[a, b, c], [a, c, d]])
        .map(|[i, j, k]| {
            let (p0, p1, p2) = (&mesh.vertices[i], &mesh.vertices[j], &mesh.vertices[k]);
            let n = (p1 - p0)
                .cross(&(p2 - p0))
                .try_normalize(f64::EPSILON)
                .unwrap_or_else(Vector3::zeros);

            stl_io::Triangle {
                normal: stl_io::Normal::new([n.x as f32, n.y as f32, n.z as f32]),
                vertices: [to_vertex(p0), to_vertex(p1), to_vertex(p2)],
            }
        })
        .collect();

    stl_io::write_stl(&mut writer, triangles.iter()).map_err(|e| MeshError::SaveError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    writer.flush()?;

    Ok(())
}
