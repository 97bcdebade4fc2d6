/// Camera model and projection utilities
use nalgebra::{Matrix4, Vector3};

use crate::mesh::BoundingSphere;
use crate::transform::Transform;

/// Reasons a set of camera intrinsics cannot produce a valid perspective.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum CameraError {
    #[error("Field of view must lie in (0, 180) degrees, got {0}")]
    InvalidFov(f32),
    #[error("Aspect ratio must be positive, got {0}")]
    InvalidAspect(f32),
    #[error("Clip range must satisfy 0 < near < far, got near={near} far={far}")]
    InvalidClipRange { near: f32, far: f32 },
}

/// A perspective camera.
///
/// The camera owns a [`Transform`] describing where it sits in the world. Its
/// view matrix is the inverse of that pose, so world geometry ends up expressed
/// in camera-local space (looking down -Z, +Y up).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    transform: Transform,
    fov: f32,
    aspect: f32,
    near: f32,
    far: f32,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        let mut camera = Self::default();
        camera.set_viewport(width, height);
        camera
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    pub fn translation(&self) -> Vector3<f32> {
        self.transform.translation()
    }

    pub fn set_translation(&mut self, position: Vector3<f32>) {
        self.transform.set_translation(position);
    }

    pub fn rotation(&self) -> Vector3<f32> {
        self.transform.rotation()
    }

    pub fn set_rotation(&mut self, rotation: Vector3<f32>) {
        self.transform.set_rotation(rotation);
    }

    /// Field of view, in degrees.
    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn set_fov(&mut self, fov: f32) {
        self.fov = fov;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    /// Derive the aspect ratio from a viewport size. A zero height leaves the
    /// current ratio untouched.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn set_near(&mut self, near: f32) {
        self.near = near;
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn set_far(&mut self, far: f32) {
        self.far = far;
    }

    /// Place the camera in front of a bounding sphere (looking down -Z) and fit
    /// the clip range to its size.
    pub fn frame(&mut self, sphere: &BoundingSphere) {
        let radius = sphere.radius;
        self.set_translation(sphere.center.coords + Vector3::new(0.0, 0.0, 3.0 * radius));
        self.near = radius / 100.0;
        self.far = 6.0 * radius;
    }

    /// Check the intrinsics the projection matrix relies on.
    pub fn validate(&self) -> Result<(), CameraError> {
        if !(self.fov > 0.0 && self.fov < 180.0) {
            return Err(CameraError::InvalidFov(self.fov));
        }
        if !(self.aspect > 0.0) {
            return Err(CameraError::InvalidAspect(self.aspect));
        }
        if !(self.near > 0.0 && self.near < self.far) {
            return Err(CameraError::InvalidClipRange {
                near: self.near,
                far: self.far,
            });
        }
        Ok(())
    }

    /// Create the view matrix: the inverse of the camera model matrix.
    pub fn view_matrix(&self) -> Matrix4<f32> {
        self.transform.isometry().inverse().to_homogeneous()
    }

    /// Create the projection matrix from the camera intrinsics.
    ///
    /// Callers must keep the intrinsics valid (see [`Camera::validate`]); the
    /// result is meaningless otherwise.
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        Matrix4::new_perspective(self.aspect, self.fov.to_radians(), self.near, self.far)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            transform: Transform::new(),
            fov: 45.0,
            aspect: 1.0,
            near: 0.1,
            far: 10.0,
        }
    }
}
