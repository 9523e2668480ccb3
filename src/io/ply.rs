//! PLY (Stanford polygon) format support.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::Point3;
use ply_rs::parser::Parser;
use ply_rs::ply::{DefaultElement, Property};

use crate::error::{MeshError, Result};
use crate::mesh::{QuadMesh, TriangleMesh};

/// Load a triangle mesh from a PLY file (ASCII or binary).
///
/// Polygons with more than three corners are fan-triangulated.
///
/// # Example
///
/// ```no_run
/// use quadremesh::io::ply;
///
/// let mesh = ply::load("model.ply").unwrap();
/// ```
pub fn load<P: AsRef<Path>>(path: P) -> Result<TriangleMesh> {
    let path = path.as_ref();
    let load_error = |message: &str| MeshError::LoadError {
        path: path.to_path_buf(),
        message: message.to_string(),
    };

    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let parser = Parser::<DefaultElement>::new();
    let ply = parser
        .read_ply(&mut reader)
        .map_err(|e| load_error(&e.to_string()))?;

    let vertex_element = ply
        .payload
        .get("vertex")
        .ok_or_else(|| load_error("PLY file has no vertex element"))?;

    let vertices = vertex_element
        .iter()
        .map(|vertex| {
            let coord = |name| {
                get_float_property(vertex, name)
                    .ok_or_else(|| load_error(&format!("vertex missing {} coordinate", name)))
            };
            Ok(Point3::new(coord("x")?, coord("y")?, coord("z")?))
        })
        .collect::<Result<Vec<_>>>()?;

    let face_element = ply
        .payload
        .get("face")
        .ok_or_else(|| load_error("PLY file has no face element"))?;

    let mut triangles: Vec<[usize; 3]> = Vec::with_capacity(face_element.len());
    for face in face_element {
        let indices = get_list_property(face, "vertex_indices")
            .or_else(|| get_list_property(face, "vertex_index"))
            .ok_or_else(|| load_error("face missing vertex_indices property"))?;

        for i in 1..indices.len().saturating_sub(1) {
            triangles.push([indices[0], indices[i], indices[i + 1]]);
        }
    }

    if triangles.is_empty() {
        return Err(load_error("PLY file contains no faces"));
    }

    let mesh = TriangleMesh::new(vertices, triangles);
    mesh.validate()?;
    Ok(mesh)
}

fn get_float_property(element: &DefaultElement, name: &str) -> Option<f64> {
    match element.get(name)? {
        Property::Float(v) => Some(*v as f64),
        Property::Double(v) => Some(*v),
        Property::Int(v) => Some(*v as f64),
        Property::UInt(v) => Some(*v as f64),
        Property::Short(v) => Some(*v as f64),
        Property::UShort(v) => Some(*v as f64),
        Property::Char(v) => Some(*v as f64),
        Property::UChar(v) => Some(*v as f64),
        _ => None,
    }
}

fn get_list_property(element: &DefaultElement, name: &str) -> Option<Vec<usize>> {
    match element.get(name)? {
        Property::ListInt(v) => Some(v.iter().map(|&x| x as usize).collect()),
        Property::ListUInt(v) => Some(v.iter().map(|&x| x as usize).collect()),
        Property::ListShort(v) => Some(v.iter().map(|&x| x as usize).collect()),
        Property::ListUShort(v) => Some(v.iter().map(|&x| x as usize).collect()),
        Property::ListChar(v) => Some(v.iter().map(|&x| x as usize).collect()),
        Property::ListUChar(v) => Some(v.iter().map(|&x| x as usize).collect()),
        _ => None,
    }
}

/// Save a quad mesh to an ASCII PLY file.
pub fn save<P: AsRef<Path>>(mesh: &QuadMesh, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write(mesh, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a quad mesh as ASCII PLY.
pub fn write<W: Write>(mesh: &QuadMesh, writer: &mut W) -> Result<()> {
    writeln!(writer, "ply")?;
    writeln!(writer, "format ascii 1.0")?;
    writeln!(writer, "comment Generated by quadremesh")?;
    writeln!(writer, "element vertex {}", mesh.num_vertices())?;
    writeln!(writer, "property double x")?;
    writeln!(writer, "property double y")?;
    writeln!(writer, "property double z")?;
    writeln!(writer, "element face {}", mesh.num_quads())?;
    writeln!(writer, "property list uchar int vertex_indices")?;
    writeln!(writer, "end_header")?;

    for v in &mesh.vertices {
        writeln!(writer, "{} {} {}", v.x, v.y, v.z)?;
    }
    for q in &mesh.quads {
        writeln!(writer, "4 {} {} {} {}", q[0], q[1], q[2], q[3])?;
    }
    Ok(())
}
