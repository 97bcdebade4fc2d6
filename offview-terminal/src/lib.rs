/// Terminal front-end for the offview mesh viewer
use std::io::{self, stdout, Write};
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::{
    cursor,
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        MouseButton, MouseEvent, MouseEventKind,
    },
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal,
};
use nalgebra::{Matrix4, Vector3};
use offview_core::{parse_off, BoundingSphere, Camera, Mesh, NormalWeighting, OffError};

pub mod config;
pub mod navigation;
pub mod renderer;

pub use config::ViewerConfig;
pub use navigation::{DragMode, Navigator};
pub use renderer::{AsciiRenderer, ShadingMode};

/// Mesh shown when no file is given on the command line.
pub const CUBE_OFF: &str = include_str!("../assets/cube.off");

/// Terminal cells are roughly twice as tall as they are wide.
const CELL_ASPECT: u32 = 2;

/// Keyboard rotation step, in radians.
const ROTATE_STEP: f32 = 0.1;
/// Keyboard pan and zoom steps, as a fraction of the mesh radius.
const PAN_STEP: f32 = 0.1;
const ZOOM_STEP: f32 = 0.2;

/// Smallest radius used to frame a mesh, so single points still get a
/// valid clip range.
const MIN_RADIUS: f32 = 1e-3;

const HELP: &[&str] = &[
    "Mouse:",
    "  left drag    rotate model",
    "  right drag   pan camera",
    "  middle drag  zoom",
    "Keyboard:",
    "  WASD / E R   rotate (pitch, yaw, roll)",
    "  arrows       pan",
    "  + / -        zoom",
    "  T            cycle shading",
    "  N            toggle angle-weighted normals",
    "  F            toggle wireframe",
    "  C            reset view",
    "  H            toggle this help",
    "  Q / Esc      quit",
];

/// Parse the built-in cube.
pub fn builtin_cube() -> Result<Mesh, OffError> {
    let mut mesh = Mesh::new();
    parse_off(CUBE_OFF)?.into_mesh(&mut mesh)?;
    Ok(mesh)
}

/// Application context: everything the frame loop reads and mutates.
pub struct Viewer {
    mesh: Mesh,
    camera: Camera,
    navigator: Navigator,
    renderer: AsciiRenderer,
    pivot: Vector3<f32>,
    weighting: NormalWeighting,
    frame_time: Duration,
    show_help: bool,
    running: bool,
    last_frame: Instant,
    frame_count: u32,
    fps: f32,
}

impl Viewer {
    /// Build the viewer for a loaded mesh and a terminal of `size` cells.
    pub fn new(mut mesh: Mesh, config: &ViewerConfig, size: (u16, u16)) -> anyhow::Result<Self> {
        let weighting = config.normal_weighting();
        if weighting != NormalWeighting::Uniform {
            mesh.derive_attributes(weighting);
        }

        let mut renderer = AsciiRenderer::new(size.0 as usize, size.1 as usize);
        renderer.set_shading(config.shading);

        let mut camera = Camera::default();
        camera.set_fov(config.fov);

        let mut viewer = Self {
            mesh,
            camera,
            navigator: Navigator::new(1.0),
            renderer,
            pivot: Vector3::zeros(),
            weighting,
            frame_time: config.frame_time(),
            show_help: false,
            running: true,
            last_frame: Instant::now(),
            frame_count: 0,
            fps: 0.0,
        };
        viewer.resize(size.0, size.1);
        viewer.fit_scene()?;
        viewer.camera.validate().context("Invalid camera setup")?;
        Ok(viewer)
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn renderer(&self) -> &AsciiRenderer {
        &self.renderer
    }

    pub fn weighting(&self) -> NormalWeighting {
        self.weighting
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Center the model on its bounding sphere and put the camera in front
    /// of it.
    pub fn fit_scene(&mut self) -> anyhow::Result<()> {
        let sphere = self
            .mesh
            .bounding_sphere()
            .context("Cannot display a mesh without vertices")?;
        let sphere = BoundingSphere {
            radius: sphere.radius.max(MIN_RADIUS),
            ..sphere
        };

        self.pivot = sphere.center.coords;
        let transform = self.mesh.transform_mut();
        transform.set_translation(self.pivot);
        transform.set_rotation(Vector3::zeros());

        self.camera.frame(&sphere);
        self.navigator.set_scale(sphere.radius);
        log::debug!(
            "Framed mesh: center {:?}, radius {}",
            sphere.center,
            sphere.radius
        );
        Ok(())
    }

    /// Model matrix rotating the mesh about its bounding-sphere center.
    pub fn model_matrix(&self) -> Matrix4<f32> {
        self.mesh.transform().transform_matrix() * Matrix4::new_translation(&-self.pivot)
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.renderer.resize(width as usize, height as usize);
        self.camera.set_viewport(u32::from(width), u32::from(height) * CELL_ASPECT);
    }

    pub fn run(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            stdout(),
            terminal::EnterAlternateScreen,
            EnableMouseCapture,
            cursor::Hide
        )?;

        let result = self.main_loop();

        // Cleanup
        terminal::disable_raw_mode()?;
        execute!(
            stdout(),
            DisableMouseCapture,
            terminal::LeaveAlternateScreen,
            cursor::Show
        )?;

        result
    }

    fn main_loop(&mut self) -> io::Result<()> {
        while self.running {
            let frame_start = Instant::now();

            // Handle input
            while event::poll(Duration::from_millis(0))? {
                let event = event::read()?;
                self.handle_event(event);
            }

            // Render
            self.render()?;

            // Frame timing
            self.frame_count += 1;
            let elapsed = frame_start.elapsed();
            if elapsed < self.frame_time {
                std::thread::sleep(self.frame_time - elapsed);
            }

            // Update FPS counter
            let now = Instant::now();
            if (now - self.last_frame).as_secs() >= 1 {
                self.fps = self.frame_count as f32 / (now - self.last_frame).as_secs_f32();
                self.frame_count = 0;
                self.last_frame = now;
            }
        }

        Ok(())
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) => self.handle_key(key),
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            Event::Resize(width, height) => self.resize(width, height),
            _ => {}
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind == KeyEventKind::Release {
            return;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.running = false;
            }
            KeyCode::Char('w') => self.rotate(Vector3::new(-ROTATE_STEP, 0.0, 0.0)),
            KeyCode::Char('s') => self.rotate(Vector3::new(ROTATE_STEP, 0.0, 0.0)),
            KeyCode::Char('a') => self.rotate(Vector3::new(0.0, -ROTATE_STEP, 0.0)),
            KeyCode::Char('d') => self.rotate(Vector3::new(0.0, ROTATE_STEP, 0.0)),
            KeyCode::Char('e') => self.rotate(Vector3::new(0.0, 0.0, ROTATE_STEP)),
            KeyCode::Char('r') => self.rotate(Vector3::new(0.0, 0.0, -ROTATE_STEP)),
            KeyCode::Left => self.translate_camera(Vector3::new(PAN_STEP, 0.0, 0.0)),
            KeyCode::Right => self.translate_camera(Vector3::new(-PAN_STEP, 0.0, 0.0)),
            KeyCode::Up => self.translate_camera(Vector3::new(0.0, -PAN_STEP, 0.0)),
            KeyCode::Down => self.translate_camera(Vector3::new(0.0, PAN_STEP, 0.0)),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.translate_camera(Vector3::new(0.0, 0.0, -ZOOM_STEP))
            }
            KeyCode::Char('-') => self.translate_camera(Vector3::new(0.0, 0.0, ZOOM_STEP)),
            KeyCode::Char('t') => {
                let shading = self.renderer.shading().next();
                log::debug!("Shading mode: {}", shading);
                self.renderer.set_shading(shading);
            }
            KeyCode::Char('n') => self.toggle_weighting(),
            KeyCode::Char('f') => self.renderer.toggle_wireframe(),
            KeyCode::Char('c') => {
                if let Err(e) = self.fit_scene() {
                    log::warn!("Cannot reset view: {:#}", e);
                }
            }
            KeyCode::Char('h') => self.show_help = !self.show_help,
            _ => {}
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let (x, y) = (mouse.column as f32, mouse.row as f32);
        let viewport = (self.renderer.width() as f32, self.renderer.height() as f32);
        match mouse.kind {
            MouseEventKind::Down(button) => {
                self.navigator
                    .press(drag_mode(button), x, y, &self.camera, self.mesh.transform());
            }
            MouseEventKind::Drag(_) => {
                self.navigator
                    .move_to(x, y, viewport, &mut self.camera, self.mesh.transform_mut());
            }
            MouseEventKind::Up(button) => self.navigator.release(drag_mode(button)),
            MouseEventKind::ScrollUp => self.translate_camera(Vector3::new(0.0, 0.0, -ZOOM_STEP)),
            MouseEventKind::ScrollDown => self.translate_camera(Vector3::new(0.0, 0.0, ZOOM_STEP)),
            _ => {}
        }
    }

    fn rotate(&mut self, delta: Vector3<f32>) {
        let transform = self.mesh.transform_mut();
        let rotation = transform.rotation() + delta;
        transform.set_rotation(rotation);
    }

    /// Move the camera by `offset`, in units of the mesh radius.
    fn translate_camera(&mut self, offset: Vector3<f32>) {
        let translation = self.camera.translation() + self.navigator.scale() * offset;
        self.camera.set_translation(translation);
    }

    fn toggle_weighting(&mut self) {
        self.weighting = match self.weighting {
            NormalWeighting::Uniform => NormalWeighting::AngleBased,
            NormalWeighting::AngleBased => NormalWeighting::Uniform,
        };
        log::debug!("Recomputing normals with {:?} weighting", self.weighting);
        self.mesh.derive_attributes(self.weighting);
    }

    /// Draw one frame into the renderer's buffers.
    pub fn render_frame(&mut self) {
        self.renderer.sync(&mut self.mesh);
        self.renderer.clear();
        let model = self.model_matrix();
        self.renderer.render(&model, &self.camera);
    }

    fn render(&mut self) -> io::Result<()> {
        self.render_frame();

        // Output to terminal
        let mut stdout = stdout();
        queue!(stdout, cursor::MoveTo(0, 0))?;
        self.renderer.draw(&mut stdout)?;

        // Draw UI overlay
        let weighting = match self.weighting {
            NormalWeighting::Uniform => "uniform",
            NormalWeighting::AngleBased => "angle",
        };
        queue!(
            stdout,
            cursor::MoveTo(0, 0),
            SetForegroundColor(Color::Yellow),
            Print(format!(
                "offview | {} vertices, {} triangles | shading: {} | normals: {} | FPS: {:.1} | H=Help Q=Quit",
                self.mesh.vertex_count(),
                self.mesh.triangle_count(),
                self.renderer.shading(),
                weighting,
                self.fps
            ))
        )?;
        if self.show_help {
            for (row, line) in HELP.iter().enumerate() {
                queue!(stdout, cursor::MoveTo(2, row as u16 + 2), Print(line))?;
            }
        }
        queue!(stdout, ResetColor)?;

        stdout.flush()?;
        Ok(())
    }
}

fn drag_mode(button: MouseButton) -> DragMode {
    match button {
        MouseButton::Left => DragMode::Rotate,
        MouseButton::Right => DragMode::Pan,
        MouseButton::Middle => DragMode::Zoom,
    }
}
