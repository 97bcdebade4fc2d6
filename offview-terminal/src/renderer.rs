/// ASCII rasterizer for terminal rendering
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use crossterm::{
    style::{Color, Print, ResetColor, SetForegroundColor},
    QueueableCommand,
};
use nalgebra::{Matrix3, Matrix4, Point2, Point3, Vector3};
use offview_core::{Camera, Mesh, MeshState};

/// Character luminosity ramp for depth/shading (darkest to lightest)
const LUMINOSITY_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Light contribution that does not depend on orientation.
const AMBIENT: f32 = 0.08;

/// Checker squares per unit of texture space.
const CHECKER_FREQUENCY: f32 = 8.0;

/// How surface samples are turned into characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadingMode {
    /// Head-light diffuse shading from the interpolated vertex normals.
    Lambert,
    /// Checkerboard over the planar texture coordinates.
    Checker,
    /// Colour by the dominant view-space normal axis.
    Normals,
}

impl ShadingMode {
    pub fn next(self) -> Self {
        match self {
            ShadingMode::Lambert => ShadingMode::Checker,
            ShadingMode::Checker => ShadingMode::Normals,
            ShadingMode::Normals => ShadingMode::Lambert,
        }
    }
}

impl FromStr for ShadingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lambert" => Ok(ShadingMode::Lambert),
            "checker" | "uv" => Ok(ShadingMode::Checker),
            "normals" => Ok(ShadingMode::Normals),
            other => Err(format!(
                "unknown shading mode {:?} (expected lambert, checker or normals)",
                other
            )),
        }
    }
}

impl fmt::Display for ShadingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShadingMode::Lambert => "lambert",
            ShadingMode::Checker => "checker",
            ShadingMode::Normals => "normals",
        };
        f.write_str(name)
    }
}

/// Renderer-side copy of a mesh snapshot, the terminal equivalent of GPU
/// vertex and index buffers.
#[derive(Debug, Clone)]
pub struct MeshBuffers {
    generation: u64,
    positions: Vec<Point3<f32>>,
    normals: Vec<Vector3<f32>>,
    tex_coords: Vec<Point2<f32>>,
    triangles: Vec<[u32; 3]>,
}

impl MeshBuffers {
    fn upload(mesh: &mut Mesh) -> Self {
        let buffers = Self {
            generation: mesh.generation(),
            positions: mesh.positions().to_vec(),
            normals: mesh.normals().to_vec(),
            tex_coords: mesh.tex_coords().to_vec(),
            triangles: mesh.triangles().to_vec(),
        };
        mesh.mark_uploaded();
        log::debug!(
            "Uploaded mesh generation {}: {} vertices, {} triangles",
            buffers.generation,
            buffers.positions.len(),
            buffers.triangles.len()
        );
        buffers
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

/// A vertex after projection: screen position, NDC depth and the attributes
/// interpolated across triangles.
#[derive(Debug, Clone, Copy)]
struct ScreenVertex {
    x: f32,
    y: f32,
    depth: f32,
    normal: Vector3<f32>,
    uv: Point2<f32>,
}

/// ASCII renderer that converts 3D meshes to terminal characters
pub struct AsciiRenderer {
    width: usize,
    height: usize,
    depth_buffer: Vec<f32>,
    char_buffer: Vec<(char, Color)>,
    buffers: Option<MeshBuffers>,
    projected: Vec<Option<ScreenVertex>>,
    shading: ShadingMode,
    wireframe: bool,
}

impl AsciiRenderer {
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        Self {
            width,
            height,
            depth_buffer: vec![f32::INFINITY; size],
            char_buffer: vec![(' ', Color::Reset); size],
            buffers: None,
            projected: Vec::new(),
            shading: ShadingMode::Lambert,
            wireframe: false,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.depth_buffer = vec![f32::INFINITY; width * height];
        self.char_buffer = vec![(' ', Color::Reset); width * height];
    }

    pub fn shading(&self) -> ShadingMode {
        self.shading
    }

    pub fn set_shading(&mut self, shading: ShadingMode) {
        self.shading = shading;
    }

    pub fn wireframe(&self) -> bool {
        self.wireframe
    }

    pub fn toggle_wireframe(&mut self) {
        self.wireframe = !self.wireframe;
    }

    pub fn buffers(&self) -> Option<&MeshBuffers> {
        self.buffers.as_ref()
    }

    /// Make the renderer's buffers match the mesh. Rebuilds them when the mesh
    /// was cleared, reloaded or re-derived since the last upload, and drops
    /// them when the mesh is empty.
    pub fn sync(&mut self, mesh: &mut Mesh) {
        if mesh.state() == MeshState::Empty {
            self.release();
            return;
        }
        let stale = match &self.buffers {
            Some(buffers) => {
                buffers.generation != mesh.generation() || mesh.state() != MeshState::Uploaded
            }
            None => true,
        };
        if stale {
            self.buffers = Some(MeshBuffers::upload(mesh));
        }
    }

    /// Drop the uploaded buffers.
    pub fn release(&mut self) {
        if let Some(buffers) = self.buffers.take() {
            log::debug!("Released buffers of mesh generation {}", buffers.generation);
        }
        self.projected.clear();
    }

    pub fn clear(&mut self) {
        self.depth_buffer.fill(f32::INFINITY);
        self.char_buffer.fill((' ', Color::Reset));
    }

    /// Rasterize the uploaded buffers with the given model matrix and camera.
    pub fn render(&mut self, model_matrix: &Matrix4<f32>, camera: &Camera) {
        let Some(buffers) = self.buffers.take() else {
            return;
        };

        let model_view = camera.view_matrix() * model_matrix;
        let mvp = camera.projection_matrix() * model_view;
        let linear: Matrix3<f32> = model_view.fixed_view::<3, 3>(0, 0).into_owned();
        let normal_matrix = linear.try_inverse().map(|m| m.transpose()).unwrap_or(linear);

        self.project(&buffers, &mvp, &normal_matrix, camera.near());

        for &[i0, i1, i2] in &buffers.triangles {
            let corners = (
                self.projected[i0 as usize],
                self.projected[i1 as usize],
                self.projected[i2 as usize],
            );
            // Triangles reaching past the near plane are dropped.
            let (Some(v0), Some(v1), Some(v2)) = corners else {
                continue;
            };

            if self.wireframe {
                self.draw_line(&v0, &v1);
                self.draw_line(&v1, &v2);
                self.draw_line(&v2, &v0);
            } else if signed_area(&v0, &v1, &v2) < 0.0 {
                // Screen y grows downward, so front faces have negative area.
                self.rasterize_triangle(&v0, &v1, &v2);
            }
        }

        self.buffers = Some(buffers);
    }

    fn project(
        &mut self,
        buffers: &MeshBuffers,
        mvp: &Matrix4<f32>,
        normal_matrix: &Matrix3<f32>,
        near: f32,
    ) {
        let (width, height) = (self.width as f32, self.height as f32);
        // For a perspective projection clip w is the view-space depth.
        let min_w = near.max(f32::EPSILON);
        self.projected.clear();
        self.projected.extend(buffers.positions.iter().enumerate().map(|(i, p)| {
            let clip = mvp * p.to_homogeneous();
            if clip.w < min_w {
                return None;
            }
            let ndc = clip.xyz() / clip.w;
            let normal = (normal_matrix * buffers.normals[i])
                .try_normalize(f32::EPSILON)
                .unwrap_or_else(Vector3::z);
            Some(ScreenVertex {
                x: (ndc.x + 1.0) * 0.5 * width,
                y: (1.0 - ndc.y) * 0.5 * height,
                depth: ndc.z,
                normal,
                uv: buffers.tex_coords[i],
            })
        }));
    }

    fn rasterize_triangle(&mut self, v0: &ScreenVertex, v1: &ScreenVertex, v2: &ScreenVertex) {
        // Bounding box
        let min_x = v0.x.min(v1.x).min(v2.x).floor() as i32;
        let max_x = v0.x.max(v1.x).max(v2.x).ceil() as i32;
        let min_y = v0.y.min(v1.y).min(v2.y).floor() as i32;
        let max_y = v0.y.max(v1.y).max(v2.y).ceil() as i32;

        // Clip to screen bounds
        let min_x = min_x.max(0);
        let max_x = max_x.min(self.width as i32 - 1);
        let min_y = min_y.max(0);
        let max_y = max_y.min(self.height as i32 - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let px = x as f32 + 0.5;
                let py = y as f32 + 0.5;

                let Some((w0, w1, w2)) =
                    barycentric((v0.x, v0.y), (v1.x, v1.y), (v2.x, v2.y), (px, py))
                else {
                    continue;
                };
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }

                let depth = w0 * v0.depth + w1 * v1.depth + w2 * v2.depth;
                if !(-1.0..=1.0).contains(&depth) {
                    continue;
                }

                let idx = y as usize * self.width + x as usize;
                if depth < self.depth_buffer[idx] {
                    let normal = (v0.normal * w0 + v1.normal * w1 + v2.normal * w2)
                        .try_normalize(f32::EPSILON)
                        .unwrap_or_else(Vector3::z);
                    let uv = Point2::from(v0.uv.coords * w0 + v1.uv.coords * w1 + v2.uv.coords * w2);
                    self.depth_buffer[idx] = depth;
                    self.char_buffer[idx] = self.shade(&normal, &uv);
                }
            }
        }
    }

    fn shade(&self, normal: &Vector3<f32>, uv: &Point2<f32>) -> (char, Color) {
        // The light sits at the camera, shining down -Z in view space.
        let diffuse = normal.z.max(0.0);
        let lambert = AMBIENT + (1.0 - AMBIENT) * diffuse;

        match self.shading {
            ShadingMode::Lambert => {
                let c = ramp(lambert);
                (c, intensity_color(c))
            }
            ShadingMode::Checker => {
                let cell = (uv.x * CHECKER_FREQUENCY).floor() + (uv.y * CHECKER_FREQUENCY).floor();
                let light = cell.rem_euclid(2.0) < 1.0;
                let brightness = if light { lambert } else { lambert * 0.35 };
                let color = if light { Color::White } else { Color::DarkYellow };
                (ramp(brightness), color)
            }
            ShadingMode::Normals => {
                let color = match dominant_axis(normal) {
                    0 => Color::Red,
                    1 => Color::Green,
                    _ => Color::Blue,
                };
                (ramp(lambert), color)
            }
        }
    }

    fn draw_line(&mut self, a: &ScreenVertex, b: &ScreenVertex) {
        let bounds = (self.width as f32, self.height as f32);
        let Some(((ax, ay), (bx, by))) = clip_segment((a.x, a.y), (b.x, b.y), bounds) else {
            return;
        };

        // Clipped to the viewport, so the step count is bounded by its size.
        let steps = (bx - ax).abs().max((by - ay).abs()).ceil().max(1.0) as usize;
        for step in 0..=steps {
            let t = step as f32 / steps as f32;
            let x = ax + (bx - ax) * t;
            let y = ay + (by - ay) * t;
            if x < 0.0 || y < 0.0 {
                continue;
            }
            let (x, y) = (x as usize, y as usize);
            if x < self.width && y < self.height {
                self.char_buffer[y * self.width + x] = ('#', Color::Cyan);
            }
        }
    }

    /// Character at a cell, mostly useful for inspection.
    pub fn cell(&self, x: usize, y: usize) -> Option<char> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.char_buffer.get(y * self.width + x).map(|&(c, _)| c)
    }

    /// Number of cells covered by geometry in the last frame.
    pub fn covered_cells(&self) -> usize {
        self.char_buffer.iter().filter(|&&(c, _)| c != ' ').count()
    }

    pub fn draw<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for y in 0..self.height {
            for x in 0..self.width {
                let (c, color) = self.char_buffer[y * self.width + x];
                writer.queue(SetForegroundColor(color))?;
                writer.queue(Print(c))?;
            }
            if y + 1 < self.height {
                writer.queue(Print("\r\n"))?;
            }
        }
        writer.queue(ResetColor)?;
        Ok(())
    }
}

fn ramp(brightness: f32) -> char {
    let index = (brightness.clamp(0.0, 1.0) * (LUMINOSITY_RAMP.len() - 1) as f32).round() as usize;
    LUMINOSITY_RAMP[index.min(LUMINOSITY_RAMP.len() - 1)]
}

fn intensity_color(c: char) -> Color {
    match c {
        ' ' | '.' | ':' => Color::DarkGrey,
        '-' | '=' => Color::Grey,
        '+' | '*' => Color::White,
        '#' | '%' | '@' => Color::Cyan,
        _ => Color::White,
    }
}

fn dominant_axis(v: &Vector3<f32>) -> usize {
    let a = v.abs();
    if a.x >= a.y && a.x >= a.z {
        0
    } else if a.y >= a.z {
        1
    } else {
        2
    }
}

/// Liang-Barsky clip of the segment `a`-`b` against `[0, width] x [0, height]`.
fn clip_segment(
    a: (f32, f32),
    b: (f32, f32),
    (width, height): (f32, f32),
) -> Option<((f32, f32), (f32, f32))> {
    if ![a.0, a.1, b.0, b.1].iter().all(|v| v.is_finite()) {
        return None;
    }

    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let (mut t0, mut t1) = (0.0f32, 1.0f32);
    for (p, q) in [(-dx, a.0), (dx, width - a.0), (-dy, a.1), (dy, height - a.1)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    Some((
        (a.0 + t0 * dx, a.1 + t0 * dy),
        (a.0 + t1 * dx, a.1 + t1 * dy),
    ))
}

/// Twice the signed screen-space area of a triangle.
fn signed_area(v0: &ScreenVertex, v1: &ScreenVertex, v2: &ScreenVertex) -> f32 {
    (v1.x - v0.x) * (v2.y - v0.y) - (v2.x - v0.x) * (v1.y - v0.y)
}

/// Calculate barycentric coordinates for a point in a triangle
fn barycentric(
    v0: (f32, f32),
    v1: (f32, f32),
    v2: (f32, f32),
    p: (f32, f32),
) -> Option<(f32, f32, f32)> {
    let denom = (v1.1 - v2.1) * (v0.0 - v2.0) + (v2.0 - v1.0) * (v0.1 - v2.1);

    if denom.abs() < 1e-6 {
        return None;
    }

    let w0 = ((v1.1 - v2.1) * (p.0 - v2.0) + (v2.0 - v1.0) * (p.1 - v2.1)) / denom;
    let w1 = ((v2.1 - v0.1) * (p.0 - v2.0) + (v0.0 - v2.0) * (p.1 - v2.1)) / denom;
    let w2 = 1.0 - w0 - w1;

    Some((w0, w1, w2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facing_quad() -> Mesh {
        Mesh::from_triangles(
            vec![
                Point3::new(-1.0, -1.0, 0.0),
                Point3::new(1.0, -1.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(-1.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
        .unwrap()
    }

    fn camera_at(z: f32) -> Camera {
        let mut camera = Camera::new(40, 40);
        camera.set_translation(Vector3::new(0.0, 0.0, z));
        camera.set_far(100.0);
        camera
    }

    #[test]
    fn test_sync_uploads_and_marks_mesh() {
        let mut mesh = facing_quad();
        let mut renderer = AsciiRenderer::new(40, 40);
        renderer.sync(&mut mesh);

        assert_eq!(mesh.state(), MeshState::Uploaded);
        let buffers = renderer.buffers().unwrap();
        assert_eq!(buffers.generation(), mesh.generation());
        assert_eq!(buffers.triangle_count(), 2);
    }

    #[test]
    fn test_sync_releases_after_clear() {
        let mut mesh = facing_quad();
        let mut renderer = AsciiRenderer::new(40, 40);
        renderer.sync(&mut mesh);
        mesh.clear();
        renderer.sync(&mut mesh);
        assert!(renderer.buffers().is_none());
    }

    #[test]
    fn test_front_face_is_drawn() {
        let mut mesh = facing_quad();
        let mut renderer = AsciiRenderer::new(40, 40);
        renderer.sync(&mut mesh);
        renderer.render(&Matrix4::identity(), &camera_at(5.0));

        assert!(renderer.covered_cells() > 0);
        // The quad faces the head light, so its center is fully lit.
        assert_eq!(renderer.cell(20, 20), Some('@'));
    }

    #[test]
    fn test_back_face_is_culled() {
        let mut mesh = facing_quad();
        let mut renderer = AsciiRenderer::new(40, 40);
        renderer.sync(&mut mesh);
        let flipped = Matrix4::new_rotation(Vector3::new(0.0, std::f32::consts::PI, 0.0));
        renderer.render(&flipped, &camera_at(5.0));
        assert_eq!(renderer.covered_cells(), 0);
    }

    #[test]
    fn test_wireframe_draws_behind_faces_too() {
        let mut mesh = facing_quad();
        let mut renderer = AsciiRenderer::new(40, 40);
        renderer.toggle_wireframe();
        renderer.sync(&mut mesh);
        let flipped = Matrix4::new_rotation(Vector3::new(0.0, std::f32::consts::PI, 0.0));
        renderer.render(&flipped, &camera_at(5.0));
        assert!(renderer.covered_cells() > 0);
    }

    #[test]
    fn test_geometry_behind_camera_is_skipped() {
        let mut mesh = facing_quad();
        let mut renderer = AsciiRenderer::new(40, 40);
        renderer.sync(&mut mesh);
        renderer.render(&Matrix4::identity(), &camera_at(-5.0));
        assert_eq!(renderer.covered_cells(), 0);
    }

    #[test]
    fn test_wireframe_skips_vertices_at_the_camera_plane() {
        let mut mesh = Mesh::from_triangles(
            vec![
                Point3::new(-100.0, 0.0, 4.9999995),
                Point3::new(100.0, 0.0, 4.9999995),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
        .unwrap();
        let mut renderer = AsciiRenderer::new(40, 40);
        renderer.toggle_wireframe();
        renderer.sync(&mut mesh);
        renderer.render(&Matrix4::identity(), &camera_at(5.0));
        assert_eq!(renderer.covered_cells(), 0);
    }

    #[test]
    fn test_wireframe_clips_long_edges_to_viewport() {
        let mut mesh = Mesh::from_triangles(
            vec![
                Point3::new(-1.0e6, -1.0, 0.0),
                Point3::new(1.0e6, -1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
        .unwrap();
        let mut renderer = AsciiRenderer::new(40, 40);
        renderer.toggle_wireframe();
        renderer.sync(&mut mesh);
        renderer.render(&Matrix4::identity(), &camera_at(5.0));

        assert!(renderer.covered_cells() > 0);
        assert!(renderer.covered_cells() <= 40 * 40);
    }

    #[test]
    fn test_clip_segment() {
        let ((ax, ay), (bx, by)) = clip_segment((-10.0, 5.0), (50.0, 5.0), (40.0, 40.0)).unwrap();
        assert!(ax.abs() < 1e-4 && (bx - 40.0).abs() < 1e-4);
        assert_eq!((ay, by), (5.0, 5.0));
        assert!(clip_segment((-10.0, -1.0), (50.0, -1.0), (40.0, 40.0)).is_none());
        assert!(clip_segment((0.0, 0.0), (f32::INFINITY, 0.0), (40.0, 40.0)).is_none());
    }

    #[test]
    fn test_cell_out_of_bounds() {
        let renderer = AsciiRenderer::new(4, 3);
        assert_eq!(renderer.cell(3, 2), Some(' '));
        assert_eq!(renderer.cell(4, 0), None);
        assert_eq!(renderer.cell(0, 3), None);
    }

    #[test]
    fn test_shading_mode_parsing() {
        assert_eq!("Lambert".parse::<ShadingMode>(), Ok(ShadingMode::Lambert));
        assert_eq!("uv".parse::<ShadingMode>(), Ok(ShadingMode::Checker));
        assert!("phong".parse::<ShadingMode>().is_err());
        assert_eq!(ShadingMode::Normals.next(), ShadingMode::Lambert);
    }

    #[test]
    fn test_barycentric_degenerate() {
        assert!(barycentric((0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (0.5, 0.5)).is_none());
    }
}
