/// Rigid-body pose shared by meshes and cameras
use nalgebra::{Isometry3, Matrix4, Translation3, UnitQuaternion, Vector3};

/// Translation plus orientation, with an implicit unit scale.
///
/// The orientation is tracked as a pair of quaternions: the current one and the
/// one it replaced. Interactive callers only ever push new Euler-like rotations;
/// the transform keeps the last known orientation itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    position: Vector3<f32>,
    rotation: Vector3<f32>,
    orientation: UnitQuaternion<f32>,
    previous_orientation: UnitQuaternion<f32>,
}

impl Transform {
    pub fn new() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            previous_orientation: UnitQuaternion::identity(),
        }
    }

    pub fn from_translation(position: Vector3<f32>) -> Self {
        Self {
            position,
            ..Self::new()
        }
    }

    pub fn translation(&self) -> Vector3<f32> {
        self.position
    }

    pub fn set_translation(&mut self, position: Vector3<f32>) {
        self.position = position;
    }

    /// The Euler-like rotation (pitch, yaw, roll in radians) last passed to
    /// [`Transform::set_rotation`], or the Euler angles of the orientation
    /// reached by [`Transform::rotate_by`].
    pub fn rotation(&self) -> Vector3<f32> {
        self.rotation
    }

    /// Replace the orientation with the one described by an accumulated
    /// rotation vector (x = pitch, y = yaw, z = roll, radians).
    pub fn set_rotation(&mut self, rotation: Vector3<f32>) {
        self.rotation = rotation;
        self.previous_orientation = self.orientation;
        self.orientation = UnitQuaternion::from_euler_angles(rotation.x, rotation.y, rotation.z);
    }

    /// Compose a rotation delta onto the current orientation.
    ///
    /// Euler angles do not add, so the stored rotation is re-extracted from
    /// the composed quaternion.
    pub fn rotate_by(&mut self, delta: Vector3<f32>) {
        let delta_q = UnitQuaternion::from_euler_angles(delta.x, delta.y, delta.z);
        self.previous_orientation = self.orientation;
        self.orientation = UnitQuaternion::new_normalize((delta_q * self.orientation).into_inner());
        let (roll, pitch, yaw) = self.orientation.euler_angles();
        self.rotation = Vector3::new(roll, pitch, yaw);
    }

    pub fn orientation(&self) -> UnitQuaternion<f32> {
        self.orientation
    }

    pub fn previous_orientation(&self) -> UnitQuaternion<f32> {
        self.previous_orientation
    }

    /// Rotation that takes the previous orientation to the current one.
    pub fn orientation_delta(&self) -> UnitQuaternion<f32> {
        self.orientation * self.previous_orientation.inverse()
    }

    pub fn isometry(&self) -> Isometry3<f32> {
        Isometry3::from_parts(Translation3::from(self.position), self.orientation)
    }

    /// Model matrix: `translation(position) * rotation(orientation)`.
    pub fn transform_matrix(&self) -> Matrix4<f32> {
        self.isometry().to_homogeneous()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}
