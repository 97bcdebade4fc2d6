/// offview - interactive terminal viewer for OFF meshes
///
/// Controls:
///   - Left / right / middle mouse drag: rotate / pan / zoom
///   - WASD, E/R: rotate the model
///   - Arrow keys, +/-: pan and zoom
///   - H: help, Q/ESC: quit
use anyhow::{ensure, Context, Result};
use offview_core::read_off;
use offview_terminal::{builtin_cube, Viewer, ViewerConfig};
use structopt::StructOpt;

fn main() -> Result<()> {
    let config = ViewerConfig::from_args();

    if !config.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    } else {
        env_logger::Builder::new()
            .filter(None, log::LevelFilter::Debug)
            .init();
    }

    ensure!(config.fps > 0, "Frame rate must be positive");

    let mesh = match &config.mesh {
        Some(path) => {
            read_off(path).with_context(|| format!("Failed to load mesh {}", path.display()))?
        }
        None => {
            log::info!("No mesh given, showing the built-in cube");
            builtin_cube().context("Failed to parse the built-in cube")?
        }
    };

    let size = crossterm::terminal::size().context("Cannot query the terminal size")?;
    let mut viewer = Viewer::new(mesh, &config, size)?;
    viewer.run().context("Terminal error")?;

    log::info!("Quit");
    Ok(())
}
