//! offview core library - geometry processing and view pipeline
//!
//! This library provides the rendering-agnostic part of the viewer: OFF
//! parsing, the mesh geometry store with its derived attributes (normals,
//! planar texture coordinates, bounding sphere) and the transform/camera
//! model that produces view and projection matrices.

pub mod camera;
pub mod mesh;
pub mod off;
pub mod transform;

// Re-export commonly used types
pub use camera::{Camera, CameraError};
pub use mesh::{BoundingSphere, Mesh, MeshError, MeshState, NormalWeighting, DEFAULT_NORMAL};
pub use off::{load_off, parse_off, read_off, OffData, OffError};
pub use transform::Transform;
