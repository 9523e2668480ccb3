//! Mesh file I/O.
//!
//! Triangle meshes are loaded as remeshing input; quad meshes are saved as
//! output.
//!
//! # Supported Formats
//!
//! | Format | Extension | Load | Save | Notes |
//! |--------|-----------|------|------|-------|
//! | Wavefront OBJ | `.obj` | ✓ | ✓ | Polygons are fan-triangulated on load |
//! | STL | `.stl` | ✓ | ✓ | Quads are split into two triangles on save |
//! | PLY | `.ply` | ✓ | ✓ | Saved as ASCII |
//!
//! # Usage
//!
//! ```no_run
//! use quadremesh::io::{load_triangles, save_quads};
//! use quadremesh::prelude::*;
//!
//! let input = load_triangles("model.obj").unwrap();
//! let quads = auto_remesh(&input.vertices, &input.triangles, &AutoRemeshOptions::default()).unwrap();
//! save_quads(&quads, "model_quads.obj").unwrap();
//! ```
//!
//! Format-specific functions are also available:
//!
//! ```no_run
//! use quadremesh::io::ply;
//!
//! let mesh = ply::load("model.ply").unwrap();
//! ```

pub mod obj;
pub mod ply;
pub mod stl;

use std::path::Path;

use crate::error::{MeshError, Result};
use crate::mesh::{QuadMesh, TriangleMesh};

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Wavefront OBJ format.
    Obj,
    /// STL (stereolithography) format.
    Stl,
    /// PLY (Stanford polygon) format.
    Ply,
}

impl Format {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_lowercase().as_str() {
            "obj" => Some(Format::Obj),
            "stl" => Some(Format::Stl),
            "ply" => Some(Format::Ply),
            _ => None,
        }
    }

    /// Detect format from file path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Format> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_extension)
    }
}

fn detect(path: &Path) -> Result<Format> {
    Format::from_path(path).ok_or_else(|| MeshError::UnsupportedFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    })
}

/// Load a triangle mesh with automatic format detection.
///
/// The format is determined by the file extension.
pub fn load_triangles<P: AsRef<Path>>(path: P) -> Result<TriangleMesh> {
    let path = path.as_ref();
    match detect(path)? {
        Format::Obj => obj::load(path),
        Format::Stl => stl::load(path),
        Format::Ply => ply::load(path),
    }
}

/// Save a quad mesh with automatic format detection.
///
/// The format is determined by the file extension.
pub fn save_quads<P: AsRef<Path>>(mesh: &QuadMesh, path: P) -> Result<()> {
    let path = path.as_ref();
    match detect(path)? {
        Format::Obj => obj::save(mesh, path),
        Format::Stl => stl::save(mesh, path),
        Format::Ply => ply::save(mesh, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(Format::from_path("a/b/model.OBJ"), Some(Format::Obj));
        assert_eq!(Format::from_path("model.stl"), Some(Format::Stl));
        assert_eq!(Format::from_path("model.ply"), Some(Format::Ply));
        assert_eq!(Format::from_path("model.gltf"), None);
        assert_eq!(Format::from_path("model"), None);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load_triangles("model.fbx").unwrap_err();
        assert!(matches!(err, MeshError::UnsupportedFormat { ref extension } if extension == "fbx"));

        let err = save_quads(&QuadMesh::default(), "model").unwrap_err();
        assert!(matches!(err, MeshError::UnsupportedFormat { ref extension } if extension == "(none)"));
    }
}
