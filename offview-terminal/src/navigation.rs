/// Mouse-drag navigation (rotate, pan, zoom)
use std::f32::consts::PI;

use nalgebra::Vector3;
use offview_core::{Camera, Transform};

/// What a drag gesture manipulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    /// Turn the model about its pivot.
    Rotate,
    /// Slide the camera in its image plane.
    Pan,
    /// Move the camera along its viewing axis.
    Zoom,
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    mode: DragMode,
    base_x: f32,
    base_y: f32,
    base_translation: Vector3<f32>,
    base_rotation: Vector3<f32>,
}

/// Press / move / release state machine turning pointer motion into
/// transform updates.
///
/// Every move is applied relative to the state captured at press time, so the
/// result only depends on the current pointer position, not on how many move
/// events arrived in between.
#[derive(Debug, Clone)]
pub struct Navigator {
    drag: Option<Drag>,
    scale: f32,
}

impl Navigator {
    /// `scale` converts normalized pointer motion into world units, usually the
    /// mesh bounding-sphere radius.
    pub fn new(scale: f32) -> Self {
        Self { drag: None, scale }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
    }

    pub fn active(&self) -> Option<DragMode> {
        self.drag.map(|drag| drag.mode)
    }

    /// Start a drag. Ignored while another drag is in progress.
    pub fn press(&mut self, mode: DragMode, x: f32, y: f32, camera: &Camera, model: &Transform) {
        if self.drag.is_some() {
            return;
        }
        self.drag = Some(Drag {
            mode,
            base_x: x,
            base_y: y,
            base_translation: camera.translation(),
            base_rotation: model.rotation(),
        });
    }

    /// Apply the pointer position `(x, y)` of the active drag. Offsets are
    /// normalized by the mean viewport dimension.
    pub fn move_to(
        &mut self,
        x: f32,
        y: f32,
        viewport: (f32, f32),
        camera: &mut Camera,
        model: &mut Transform,
    ) {
        let Some(drag) = self.drag else {
            return;
        };

        let normalizer = ((viewport.0 + viewport.1) / 2.0).max(1.0);
        let dx = (drag.base_x - x) / normalizer;
        let dy = (y - drag.base_y) / normalizer;

        match drag.mode {
            DragMode::Rotate => {
                model.set_rotation(drag.base_rotation + Vector3::new(dy * PI, -dx * PI, 0.0));
            }
            DragMode::Pan => {
                camera.set_translation(drag.base_translation + self.scale * Vector3::new(dx, dy, 0.0));
            }
            DragMode::Zoom => {
                camera.set_translation(drag.base_translation + self.scale * Vector3::new(0.0, 0.0, dy));
            }
        }
    }

    /// End the drag started with `mode`.
    pub fn release(&mut self, mode: DragMode) {
        if self.active() == Some(mode) {
            self.drag = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: (f32, f32) = (100.0, 100.0);

    fn setup() -> (Navigator, Camera, Transform) {
        let mut camera = Camera::default();
        camera.set_translation(Vector3::new(0.0, 0.0, 6.0));
        (Navigator::new(2.0), camera, Transform::new())
    }

    #[test]
    fn test_pan_moves_camera_against_pointer() {
        let (mut nav, mut camera, mut model) = setup();
        nav.press(DragMode::Pan, 50.0, 50.0, &camera, &model);
        nav.move_to(75.0, 50.0, VIEWPORT, &mut camera, &mut model);

        // 25 / 100 of the viewport to the right, times a scale of 2.
        assert!((camera.translation() - Vector3::new(-0.5, 0.0, 6.0)).norm() < 1e-6);
        assert_eq!(model, Transform::new());
    }

    #[test]
    fn test_zoom_moves_along_view_axis() {
        let (mut nav, mut camera, mut model) = setup();
        nav.press(DragMode::Zoom, 10.0, 10.0, &camera, &model);
        nav.move_to(10.0, 60.0, VIEWPORT, &mut camera, &mut model);
        assert!((camera.translation() - Vector3::new(0.0, 0.0, 7.0)).norm() < 1e-6);
    }

    #[test]
    fn test_rotate_is_relative_to_press() {
        let (mut nav, mut camera, mut model) = setup();
        nav.press(DragMode::Rotate, 0.0, 0.0, &camera, &model);
        nav.move_to(30.0, 0.0, VIEWPORT, &mut camera, &mut model);
        nav.move_to(50.0, 0.0, VIEWPORT, &mut camera, &mut model);

        let rotation = model.rotation();
        assert!((rotation.y - 0.5 * PI).abs() < 1e-6);
        assert_eq!(rotation.x, 0.0);
        assert_eq!(camera.translation(), Vector3::new(0.0, 0.0, 6.0));
    }

    #[test]
    fn test_rotation_accumulates_across_drags() {
        let (mut nav, mut camera, mut model) = setup();
        for _ in 0..2 {
            nav.press(DragMode::Rotate, 0.0, 0.0, &camera, &model);
            nav.move_to(0.0, 25.0, VIEWPORT, &mut camera, &mut model);
            nav.release(DragMode::Rotate);
        }
        assert!((model.rotation().x - 0.5 * PI).abs() < 1e-6);
    }

    #[test]
    fn test_second_press_is_ignored_while_dragging() {
        let (mut nav, camera, model) = setup();
        nav.press(DragMode::Pan, 0.0, 0.0, &camera, &model);
        nav.press(DragMode::Zoom, 0.0, 0.0, &camera, &model);
        assert_eq!(nav.active(), Some(DragMode::Pan));

        nav.release(DragMode::Zoom);
        assert_eq!(nav.active(), Some(DragMode::Pan));
        nav.release(DragMode::Pan);
        assert_eq!(nav.active(), None);
    }

    #[test]
    fn test_move_without_press_does_nothing() {
        let (mut nav, mut camera, mut model) = setup();
        let before = camera;
        nav.move_to(40.0, 40.0, VIEWPORT, &mut camera, &mut model);
        assert_eq!(camera, before);
    }
}
