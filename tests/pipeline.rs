//! End-to-end runs of the default pipeline.

use nalgebra::{Point3, Vector3};
use quadremesh::algo::auto::IslandStage;
use quadremesh::prelude::*;

/// Unit icosphere with one level of subdivision (42 vertices, 80 triangles).
fn icosphere(center: Point3<f64>, radius: f64) -> TriangleMesh {
    let phi = (1.0 + 5.0_f64.sqrt()) / 2.0;
    let mut vertices: Vec<Vector3<f64>> = [
        (-1.0, phi, 0.0),
        (1.0, phi, 0.0),
        (-1.0, -phi, 0.0),
        (1.0, -phi, 0.0),
        (0.0, -1.0, phi),
        (0.0, 1.0, phi),
        (0.0, -1.0, -phi),
        (0.0, 1.0, -phi),
        (phi, 0.0, -1.0),
        (phi, 0.0, 1.0),
        (-phi, 0.0, -1.0),
        (-phi, 0.0, 1.0),
    ]
    .iter()
    .map(|&(x, y, z)| Vector3::new(x, y, z).normalize())
    .collect();

    let base: [[usize; 3]; 20] = [
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    let mut midpoints = std::collections::HashMap::new();
    let mut midpoint = |a: usize, b: usize, vertices: &mut Vec<Vector3<f64>>| {
        *midpoints.entry((a.min(b), a.max(b))).or_insert_with(|| {
            let m = ((vertices[a] + vertices[b]) / 2.0).normalize();
            vertices.push(m);
            vertices.len() - 1
        })
    };

    let mut triangles = Vec::with_capacity(80);
    for [a, b, c] in base {
        let ab = midpoint(a, b, &mut vertices);
        let bc = midpoint(b, c, &mut vertices);
        let ca = midpoint(c, a, &mut vertices);
        triangles.extend([[a, ab, ca], [b, bc, ab], [c, ca, bc], [ab, bc, ca]]);
    }

    let points = vertices.iter().map(|v| center + v * radius).collect();
    TriangleMesh::new(points, triangles)
}

fn small_options() -> AutoRemeshOptions {
    AutoRemeshOptions::default()
        .with_target_vertex_count(300)
        .with_edge_length(45.0)
}

#[test]
fn test_sphere_becomes_quads() {
    let sphere = icosphere(Point3::origin(), 1.0);
    let quads = auto_remesh(&sphere.vertices, &sphere.triangles, &small_options()).unwrap();

    assert!(!quads.is_empty());
    assert!(quads.validate().is_ok());
    for v in &quads.vertices {
        let r = v.coords.norm();
        assert!(r > 0.5 && r < 1.5, "vertex {:?} left the sphere", v);
    }
}

#[test]
fn test_output_vertex_count_tracks_target() {
    let sphere = icosphere(Point3::origin(), 1.0);
    let options = small_options();
    let report = DefaultAutoRemesher::with_defaults(options.clone())
        .remesh_with_report(&sphere)
        .unwrap();

    let target = options.target_vertex_count;
    let output = report.mesh.num_vertices();
    assert!(output <= 2 * target, "{} output vertices for target {}", output, target);
    assert!(output >= target / 4, "{} output vertices for target {}", output, target);
    // The island itself was remeshed well below the target
    assert!(report.islands[0].vertex_count < target);
}

#[test]
fn test_report_tracks_every_island() {
    let a = icosphere(Point3::new(-3.0, 0.0, 0.0), 1.0);
    let b = icosphere(Point3::new(3.0, 0.0, 0.0), 1.0);

    let mut vertices = a.vertices.clone();
    vertices.extend(&b.vertices);
    let offset = a.num_vertices();
    let mut triangles = a.triangles.clone();
    triangles.extend(b.triangles.iter().map(|t| t.map(|i| i + offset)));

    // A lone triangle is too small to keep
    let lone = vertices.len();
    vertices.extend([
        Point3::new(0.0, 5.0, 0.0),
        Point3::new(0.1, 5.0, 0.0),
        Point3::new(0.0, 5.1, 0.0),
    ]);
    triangles.push([lone, lone + 1, lone + 2]);

    let remesher = DefaultAutoRemesher::with_defaults(small_options().with_target_vertex_count(150));
    let report = remesher
        .remesh_with_report(&TriangleMesh::new(vertices, triangles))
        .unwrap();

    assert_eq!(report.discarded_islands, 1);
    assert_eq!(report.islands.len(), 2);
    assert_eq!(report.merged_islands(), 2);
    assert!(report.islands.iter().all(|i| i.stage == IslandStage::Extracted));
    assert_eq!(report.mesh.num_quads(), report.islands.iter().map(|i| i.quads).sum::<usize>());

    // Both spheres are present in world coordinates
    assert!(report.mesh.vertices.iter().any(|v| v.x < -2.0));
    assert!(report.mesh.vertices.iter().any(|v| v.x > 2.0));
    assert!(report.mesh.validate().is_ok());
}

#[test]
fn test_only_tiny_islands_is_empty_input() {
    let vertices = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
    ];
    let triangles = vec![[0, 1, 2], [1, 3, 2]];
    let result = auto_remesh(&vertices, &triangles, &AutoRemeshOptions::default());
    assert!(matches!(result, Err(MeshError::EmptyInput)));
}

#[test]
fn test_invalid_options_rejected_before_work() {
    let sphere = icosphere(Point3::origin(), 1.0);
    let options = AutoRemeshOptions::default().with_constraint_ratio(0.9, 0.1);
    let result = auto_remesh(&sphere.vertices, &sphere.triangles, &options);
    assert!(matches!(result, Err(MeshError::InvalidParameter { name: "constraint_ratio", .. })));
}

#[test]
fn test_file_round_trip() {
    let dir = std::env::temp_dir();
    let input = dir.join(format!("quadremesh_it_{}.obj", std::process::id()));
    let output = dir.join(format!("quadremesh_it_{}.ply", std::process::id()));

    let sphere = icosphere(Point3::new(10.0, 0.0, 0.0), 2.0);
    let mut obj = String::new();
    for v in &sphere.vertices {
        obj.push_str(&format!("v {} {} {}\n", v.x, v.y, v.z));
    }
    for t in &sphere.triangles {
        obj.push_str(&format!("f {} {} {}\n", t[0] + 1, t[1] + 1, t[2] + 1));
    }
    std::fs::write(&input, obj).unwrap();

    let loaded = quadremesh::io::load_triangles(&input).unwrap();
    assert_eq!(loaded.num_triangles(), 80);

    let quads = auto_remesh(&loaded.vertices, &loaded.triangles, &small_options()).unwrap();
    quadremesh::io::save_quads(&quads, &output).unwrap();

    // PLY quads come back fan-triangulated
    let reloaded = quadremesh::io::load_triangles(&output).unwrap();
    assert_eq!(reloaded.num_triangles(), 2 * quads.num_quads());
    assert_eq!(reloaded.num_vertices(), quads.num_vertices());

    let _ = std::fs::remove_file(&input);
    let _ = std::fs::remove_file(&output);
}
