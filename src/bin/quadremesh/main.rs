//! quadremesh CLI - quad remeshing command-line tool.
//!
//! Usage: quadremesh <COMMAND> [OPTIONS] <INPUT> [OUTPUT]
//!
//! Run `quadremesh --help` for available commands. Set `RUST_LOG=debug` for
//! per-island detail.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use clap::{Parser, Subcommand};

use quadremesh::algo::auto::{AutoRemeshOptions, DefaultAutoRemesher, IslandStage};
use quadremesh::algo::islands::split_to_islands;
use quadremesh::algo::observer::{Checkpoint, Observer};
use quadremesh::algo::remesh;
use quadremesh::io;
use quadremesh::mesh::is_watertight;

#[derive(Parser)]
#[command(name = "quadremesh")]
#[command(author, version, about = "Automatic quad remeshing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display triangle mesh information
    Info {
        /// Input mesh file
        input: PathBuf,
    },

    /// Remesh a triangle mesh into quads
    Remesh {
        /// Input triangle mesh (.obj, .stl, .ply)
        input: PathBuf,

        /// Output quad mesh (.obj, .stl, .ply)
        output: PathBuf,

        /// Approximate output vertices per island
        #[arg(short = 'n', long, default_value = "7000")]
        target_vertices: usize,

        /// Global gradient size of the field solve
        #[arg(short, long, default_value = "170")]
        gradient_size: f64,

        /// Dihedral angle in degrees above which edges stay sharp
        #[arg(short, long, default_value = "60")]
        sharp_edge_degrees: f64,

        /// Singularity budget per island
        #[arg(short, long, default_value = "320")]
        max_singularities: usize,

        /// Use single-threaded execution (for benchmarking)
        #[arg(long)]
        sequential: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Info { input } => {
            cmd_info(&input)?;
        }

        Commands::Remesh {
            input,
            output,
            target_vertices,
            gradient_size,
            sharp_edge_degrees,
            max_singularities,
            sequential,
        } => {
            let options = AutoRemeshOptions::default()
                .with_target_vertex_count(target_vertices)
                .with_gradient_size(gradient_size)
                .with_sharp_edge_degrees(sharp_edge_degrees)
                .with_max_singularity_count(max_singularities)
                .with_parallel(!sequential);
            cmd_remesh(&input, &output, options)?;
        }
    }

    Ok(())
}

/// Observer that keeps one status line on stderr up to date.
fn create_observer() -> Observer {
    let merged = AtomicUsize::new(0);

    Observer::new(move |checkpoint| {
        match checkpoint {
            Checkpoint::IslandsSplit { kept, discarded } => {
                eprintln!("Islands: {} kept, {} discarded", kept, discarded);
            }
            Checkpoint::SearchIteration {
                island,
                edge_length,
                vertex_count,
            } => {
                eprint!(
                    "\rIsland {}: edge length {:.4} -> {} vertices        ",
                    island, edge_length, vertex_count
                );
            }
            Checkpoint::SingularityEvaluated { .. } | Checkpoint::StageReached { .. } => return,
            Checkpoint::IslandMerged { island, quads, .. } => {
                let count = merged.fetch_add(1, Ordering::Relaxed) + 1;
                eprint!("\rMerged island {} ({} quads), {} total                ", island, quads, count);
            }
        }
        let _ = std::io::stderr().flush();
    })
}

fn cmd_info(input: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let mesh = io::load_triangles(input)?;

    println!("File: {}", input.display());
    println!("Vertices: {}", mesh.num_vertices());
    println!("Triangles: {}", mesh.num_triangles());

    if let Some((min, max)) = mesh.bounding_box() {
        println!(
            "Bounding box: ({:.3}, {:.3}, {:.3}) to ({:.3}, {:.3}, {:.3})",
            min.x, min.y, min.z, max.x, max.y, max.z
        );
        let diag = max - min;
        println!("Dimensions: {:.3} x {:.3} x {:.3}", diag.x, diag.y, diag.z);
    }

    println!("Average edge length: {:.6}", remesh::average_edge_length(&mesh));

    let split = split_to_islands(&mesh.triangles);
    println!(
        "Islands: {} ({} too small to remesh)",
        split.kept.len() + split.discarded.len(),
        split.discarded.len()
    );

    if is_watertight(&mesh.triangles) {
        println!("Topology: Closed (no boundary)");
    } else {
        println!("Topology: Open");
    }

    Ok(())
}

fn cmd_remesh(
    input: &PathBuf,
    output: &PathBuf,
    options: AutoRemeshOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let mesh = io::load_triangles(input)?;
    println!("Loaded: {} vertices, {} triangles", mesh.num_vertices(), mesh.num_triangles());

    let mode = if options.parallel { "parallel" } else { "sequential" };
    println!(
        "Remeshing (target {} vertices, budget {} singularities, {})...",
        options.target_vertex_count, options.max_singularity_count, mode
    );

    let remesher = DefaultAutoRemesher::with_defaults(options).with_observer(create_observer());

    let start = Instant::now();
    let report = remesher.remesh_with_report(&mesh)?;
    let elapsed = start.elapsed();
    eprintln!();

    for island in &report.islands {
        if let IslandStage::Failed(reason) = &island.stage {
            match &island.failed_stage {
                Some(stage) => println!("  island {} skipped at {:?}: {}", island.island, stage, reason),
                None => println!("  island {} skipped: {}", island.island, reason),
            }
        }
    }
    println!(
        "Result: {} vertices, {} quads from {} of {} islands",
        report.mesh.num_vertices(),
        report.mesh.num_quads(),
        report.merged_islands(),
        report.islands.len()
    );

    io::save_quads(&report.mesh, output)?;
    println!("Saved: {} ({:.2?})", output.display(), elapsed);

    Ok(())
}
