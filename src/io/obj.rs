//! Wavefront OBJ format support.
//!
//! Only geometry is read: `v` lines and `f` lines. Face corners may carry
//! texture and normal references (`v/vt/vn`), which are ignored, and may use
//! negative (relative) indices. Polygons are fan-triangulated.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::Point3;

use crate::error::{MeshError, Result};
use crate::mesh::{QuadMesh, TriangleMesh};

/// Load a triangle mesh from an OBJ file.
///
/// # Example
///
/// ```no_run
/// use quadremesh::io::obj;
///
/// let mesh = obj::load("model.obj").unwrap();
/// println!("{} triangles", mesh.num_triangles());
/// ```
pub fn load<P: AsRef<Path>>(path: P) -> Result<TriangleMesh> {
    let path = path.as_ref();
    let file = File::open(path)?;
    read(BufReader::new(file)).map_err(|message| MeshError::LoadError {
        path: path.to_path_buf(),
        message,
    })
}

/// Parse OBJ text. Errors carry the offending line number.
pub fn read<R: BufRead>(reader: R) -> std::result::Result<TriangleMesh, String> {
    let mut mesh = TriangleMesh::default();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| e.to_string())?;
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("v") => {
                let coords: Vec<f64> = tokens
                    .take(3)
                    .map(str::parse)
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| format!("line {}: {}", line_no + 1, e))?;
                let [x, y, z] = coords[..] else {
                    return Err(format!("line {}: vertex needs three coordinates", line_no + 1));
                };
                mesh.vertices.push(Point3::new(x, y, z));
            }
            Some("f") => {
                let corners: Vec<usize> = tokens
                    .map(|token| resolve_index(token, mesh.vertices.len()))
                    .collect::<Option<_>>()
                    .ok_or_else(|| format!("line {}: invalid face index", line_no + 1))?;
                if corners.len() < 3 {
                    return Err(format!("line {}: face needs at least three corners", line_no + 1));
                }
                for i in 1..corners.len() - 1 {
                    mesh.triangles.push([corners[0], corners[i], corners[i + 1]]);
                }
            }
            _ => {}
        }
    }

    if mesh.triangles.is_empty() {
        return Err("OBJ file contains no faces".to_string());
    }
    mesh.validate().map_err(|e| e.to_string())?;
    Ok(mesh)
}

/// Turn an OBJ corner reference into a zero-based vertex index.
fn resolve_index(token: &str, num_vertices: usize) -> Option<usize> {
    let raw: i64 = token.split('/').next()?.parse().ok()?;
    match raw {
        0 => None,
        r if r > 0 => Some(r as usize - 1),
        r => num_vertices.checked_sub(r.unsigned_abs() as usize),
    }
}

/// Save a quad mesh as OBJ.
pub fn save<P: AsRef<Path>>(mesh: &QuadMesh, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write(mesh, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a quad mesh as OBJ text.
pub fn write<W: Write>(mesh: &QuadMesh, writer: &mut W) -> Result<()> {
    writeln!(writer, "# quadremesh: {} vertices, {} quads", mesh.num_vertices(), mesh.num_quads())?;
    for v in &mesh.vertices {
        writeln!(writer, "v {} {} {}", v.x, v.y, v.z)?;
    }
    for q in &mesh.quads {
        writeln!(writer, "f {} {} {} {}", q[0] + 1, q[1] + 1, q[2] + 1, q[3] + 1)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_triangles_and_quads() {
        let text = "\
# comment
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vn 0 0 1
f 1 2 3
f 1/1/1 3/3/1 4/4/1 2//1
";
        let mesh = read(text.as_bytes()).unwrap();
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.triangles, vec![[0, 1, 2], [0, 2, 3], [0, 3, 1]]);
    }

    #[test]
    fn test_negative_indices() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let mesh = read(text.as_bytes()).unwrap();
        assert_eq!(mesh.triangles, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_errors_name_the_line() {
        let err = read("v 0 0 0\nv 1 x 0\n".as_bytes()).unwrap_err();
        assert!(err.starts_with("line 2"), "{}", err);

        let err = read("v 0 0 0\nf 1 0 1\n".as_bytes()).unwrap_err();
        assert!(err.contains("invalid face index"));
    }

    #[test]
    fn test_out_of_range_face_rejected() {
        let err = read("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n".as_bytes()).unwrap_err();
        assert!(err.contains("invalid vertex index"), "{}", err);
    }

    #[test]
    fn test_no_faces_is_an_error() {
        assert!(read("v 0 0 0\n".as_bytes()).is_err());
    }

    #[test]
    fn test_write_uses_one_based_indices() {
        let mesh = QuadMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2, 3]],
        );
        let mut out = Vec::new();
        write(&mesh, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.lines().any(|l| l == "f 1 2 3 4"));
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 4);
    }
}
