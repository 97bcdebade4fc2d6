/// Example: Load an OFF file and print its derived attributes
///
/// Usage: cargo run --example mesh_info -- path/to/file.off [--angle-weighted]
use std::env;

use offview_core::{read_off, Camera, NormalWeighting};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let mut mesh = match args.get(1) {
        Some(path) => read_off(path)?,
        None => {
            eprintln!("Usage: {} <off-file> [--angle-weighted]", args[0]);
            eprintln!("\nNo OFF file provided, using the built-in cube...");
            offview_terminal::builtin_cube()?
        }
    };

    if args.iter().any(|a| a == "--angle-weighted") {
        mesh.derive_attributes(NormalWeighting::AngleBased);
    }

    let sphere = mesh
        .bounding_sphere()
        .ok_or("mesh has no vertices")?;
    println!("vertices:  {}", mesh.vertex_count());
    println!("triangles: {}", mesh.triangle_count());
    println!(
        "bounding sphere: center ({:.4}, {:.4}, {:.4}), radius {:.4}",
        sphere.center.x, sphere.center.y, sphere.center.z, sphere.radius
    );

    let mut camera = Camera::default();
    camera.frame(&sphere);
    println!(
        "camera: position {:?}, near {:.4}, far {:.4}",
        camera.translation(),
        camera.near(),
        camera.far()
    );

    for (i, ((p, n), uv)) in mesh
        .positions()
        .iter()
        .zip(mesh.normals())
        .zip(mesh.tex_coords())
        .take(8)
        .enumerate()
    {
        println!(
            "v{}: p=({:.3}, {:.3}, {:.3}) n=({:.3}, {:.3}, {:.3}) uv=({:.3}, {:.3})",
            i, p.x, p.y, p.z, n.x, n.y, n.z, uv.x, uv.y
        );
    }

    Ok(())
}
