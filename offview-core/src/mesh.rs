/// Mesh geometry store and derived vertex attributes
use nalgebra::{Point2, Point3, Vector3};

use crate::transform::Transform;

/// Normal assigned to vertices that no non-degenerate triangle touches.
pub const DEFAULT_NORMAL: Vector3<f32> = Vector3::new(0.0, 0.0, 1.0);

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    #[error("Triangle {triangle} references vertex {index}, but the mesh has {vertex_count} vertices")]
    IndexOutOfRange {
        triangle: usize,
        index: u32,
        vertex_count: usize,
    },
}

/// How face normals are weighted when accumulated at a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalWeighting {
    /// Every incident triangle counts the same.
    #[default]
    Uniform,
    /// Each triangle is weighted by its interior angle at the vertex.
    AngleBased,
}

/// Lifecycle of the store's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshState {
    Empty,
    /// Positions and connectivity are present, derived attributes are not.
    Loaded,
    /// Normals and texture coordinates match the current geometry.
    Derived,
    /// A render collaborator has built its buffers from the current snapshot.
    Uploaded,
}

/// Centroid plus maximum distance to it. Not the minimal enclosing sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Point3<f32>,
    pub radius: f32,
}

/// Index-aligned vertex attributes and triangle connectivity.
///
/// Every triangle index is guaranteed to be smaller than the vertex count;
/// connectivity only enters the store through validated constructors.
#[derive(Debug, Clone)]
pub struct Mesh {
    transform: Transform,
    positions: Vec<Point3<f32>>,
    normals: Vec<Vector3<f32>>,
    tex_coords: Vec<Point2<f32>>,
    triangles: Vec<[u32; 3]>,
    state: MeshState,
    generation: u64,
}

impl Mesh {
    pub fn new() -> Self {
        Self {
            transform: Transform::new(),
            positions: Vec::new(),
            normals: Vec::new(),
            tex_coords: Vec::new(),
            triangles: Vec::new(),
            state: MeshState::Empty,
            generation: 0,
        }
    }

    /// Build a mesh from raw geometry, then derive normals (uniform weighting)
    /// and planar texture coordinates.
    pub fn from_triangles(
        positions: Vec<Point3<f32>>,
        triangles: Vec<[u32; 3]>,
    ) -> Result<Self, MeshError> {
        let mut mesh = Self::new();
        mesh.set_geometry(positions, triangles)?;
        mesh.derive_attributes(NormalWeighting::Uniform);
        Ok(mesh)
    }

    /// Replace positions and connectivity. Normals are reset to
    /// [`DEFAULT_NORMAL`] and texture coordinates to the origin until derived.
    ///
    /// On error the store is left untouched.
    pub fn set_geometry(
        &mut self,
        positions: Vec<Point3<f32>>,
        triangles: Vec<[u32; 3]>,
    ) -> Result<(), MeshError> {
        let vertex_count = positions.len();
        for (triangle, indices) in triangles.iter().enumerate() {
            if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(MeshError::IndexOutOfRange {
                    triangle,
                    index,
                    vertex_count,
                });
            }
        }

        self.clear();
        self.normals = vec![DEFAULT_NORMAL; vertex_count];
        self.tex_coords = vec![Point2::origin(); vertex_count];
        self.positions = positions;
        self.triangles = triangles;
        if vertex_count > 0 {
            self.state = MeshState::Loaded;
        }
        Ok(())
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    pub fn positions(&self) -> &[Point3<f32>] {
        &self.positions
    }

    /// Edit positions in place. Derived attributes go stale until recomputed.
    pub fn positions_mut(&mut self) -> &mut [Point3<f32>] {
        if self.state != MeshState::Empty {
            self.state = MeshState::Loaded;
        }
        &mut self.positions
    }

    pub fn normals(&self) -> &[Vector3<f32>] {
        &self.normals
    }

    pub fn tex_coords(&self) -> &[Point2<f32>] {
        &self.tex_coords
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn state(&self) -> MeshState {
        self.state
    }

    /// Incremented every time the store is cleared. Buffers built from an
    /// older generation no longer describe this mesh.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Record that a render collaborator now holds buffers for the current
    /// snapshot. Only meaningful once attributes are derived.
    pub fn mark_uploaded(&mut self) {
        if self.state == MeshState::Derived {
            self.state = MeshState::Uploaded;
        }
    }

    /// Drop all geometry. Collaborator buffers tied to the previous generation
    /// must be released by their owner.
    pub fn clear(&mut self) {
        if self.state == MeshState::Uploaded {
            log::debug!("Releasing render buffers of mesh generation {}", self.generation);
        }
        self.positions.clear();
        self.normals.clear();
        self.tex_coords.clear();
        self.triangles.clear();
        self.state = MeshState::Empty;
        self.generation += 1;
    }

    /// Centroid of the vertices and the largest distance from it.
    /// Returns `None` for an empty store.
    pub fn bounding_sphere(&self) -> Option<BoundingSphere> {
        if self.positions.is_empty() {
            return None;
        }

        let sum = self
            .positions
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords);
        let center = Point3::from(sum / self.positions.len() as f32);

        let radius = self
            .positions
            .iter()
            .map(|p| nalgebra::distance(&center, p))
            .fold(0.0f32, f32::max);

        Some(BoundingSphere { center, radius })
    }

    /// Recompute normals and texture coordinates from the current geometry.
    pub fn derive_attributes(&mut self, weighting: NormalWeighting) {
        self.recompute_normals(weighting);
        self.compute_planar_parameterization();
        if !self.positions.is_empty() {
            self.state = MeshState::Derived;
        }
    }

    /// Per-vertex normals from accumulated face normals.
    ///
    /// Triangles with zero area contribute nothing. Vertices left with a zero
    /// sum get [`DEFAULT_NORMAL`].
    pub fn recompute_normals(&mut self, weighting: NormalWeighting) {
        let mut sums = vec![Vector3::<f32>::zeros(); self.positions.len()];

        for &[i0, i1, i2] in &self.triangles {
            let (i0, i1, i2) = (i0 as usize, i1 as usize, i2 as usize);
            let p0 = self.positions[i0];
            let p1 = self.positions[i1];
            let p2 = self.positions[i2];

            let Some(normal) = (p1 - p0).cross(&(p2 - p0)).try_normalize(f32::EPSILON) else {
                continue;
            };

            let weights = match weighting {
                NormalWeighting::Uniform => [1.0; 3],
                NormalWeighting::AngleBased => [
                    corner_angle(p0, p1, p2),
                    corner_angle(p1, p2, p0),
                    corner_angle(p2, p0, p1),
                ],
            };

            sums[i0] += normal * weights[0];
            sums[i1] += normal * weights[1];
            sums[i2] += normal * weights[2];
        }

        self.normals = sums
            .into_iter()
            .map(|sum| sum.try_normalize(f32::EPSILON).unwrap_or(DEFAULT_NORMAL))
            .collect();
    }

    /// Texture coordinates from an orthographic projection onto the XY plane,
    /// normalized to the bounding rectangle.
    ///
    /// An axis with no extent maps every vertex to 0 on that axis.
    pub fn compute_planar_parameterization(&mut self) {
        let (mut x_min, mut x_max) = (f32::MAX, f32::MIN);
        let (mut y_min, mut y_max) = (f32::MAX, f32::MIN);
        for p in &self.positions {
            x_min = x_min.min(p.x);
            x_max = x_max.max(p.x);
            y_min = y_min.min(p.y);
            y_max = y_max.max(p.y);
        }

        let x_extent = x_max - x_min;
        let y_extent = y_max - y_min;
        let remap = |value: f32, min: f32, extent: f32| {
            if extent > f32::EPSILON {
                (value - min) / extent
            } else {
                0.0
            }
        };

        self.tex_coords = self
            .positions
            .iter()
            .map(|p| Point2::new(remap(p.x, x_min, x_extent), remap(p.y, y_min, y_extent)))
            .collect();
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

/// Interior angle at `corner` between the edges towards `a` and `b`.
fn corner_angle(corner: Point3<f32>, a: Point3<f32>, b: Point3<f32>) -> f32 {
    match ((a - corner).try_normalize(f32::EPSILON), (b - corner).try_normalize(f32::EPSILON)) {
        (Some(u), Some(v)) => u.dot(&v).clamp(-1.0, 1.0).acos(),
        _ => 0.0,
    }
}
