use glam::{Vec2, Vec3};
use winit::event::MouseButton;
use winit::keyboard::KeyCode;

use crate::camera::Camera;
use crate::scene::Scene;

/// Radians of orbit per pixel of mouse travel.
const ORBIT_SENSITIVITY: f32 = 0.005;
/// Pan speed per pixel, scaled by the eye-focus distance.
const PAN_SENSITIVITY: f32 = 0.002;
/// Zoom factor applied per scroll line.
const ZOOM_STEP: f32 = 0.1;
/// Floor for the zoom scale so a large scroll can never cross the focus.
const MIN_ZOOM_SCALE: f32 = 0.1;
/// World units moved per key press.
const MOVE_STEP: f32 = 0.25;

/// Translates mouse and keyboard input into camera mutations.
///
/// The frame loop owns the camera and passes it in by reference on each
/// event; the controller only keeps the drag state between events. Every
/// method returning `true` signals that the caller must push the change
/// through `Renderer::update_camera`.
#[derive(Debug, Default)]
pub struct CameraController {
    cursor: Vec2,
    orbiting: bool,
    panning: bool,
}

impl CameraController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_button(&mut self, button: MouseButton, pressed: bool) {
        match button {
            MouseButton::Left => self.orbiting = pressed,
            MouseButton::Right | MouseButton::Middle => self.panning = pressed,
            _ => {}
        }
    }

    /// Tracks the cursor and applies orbit/pan while a button is held.
    pub fn cursor_moved(&mut self, position: Vec2, camera: &mut Camera) -> bool {
        let delta = position - self.cursor;
        self.cursor = position;

        if self.orbiting {
            camera.orbit(Vec2::new(-delta.x, -delta.y) * ORBIT_SENSITIVITY);
            true
        } else if self.panning {
            let distance = (camera.eye - camera.focus).length();
            camera.pan(Vec2::new(-delta.x, delta.y) * distance * PAN_SENSITIVITY);
            true
        } else {
            false
        }
    }

    /// Applies a scroll delta as a zoom, clamped so the scale stays
    /// positive.
    pub fn scroll(&mut self, amount: f32, camera: &mut Camera) -> bool {
        let scale = (1.0 - amount * ZOOM_STEP).max(MIN_ZOOM_SCALE);
        camera.zoom(scale);
        true
    }

    /// Maps movement keys to a world-space offset along the camera axes.
    pub fn key_offset(&self, key: KeyCode, camera: &Camera) -> Option<Vec3> {
        let direction = match key {
            KeyCode::KeyW | KeyCode::ArrowUp => camera.forward,
            KeyCode::KeyS | KeyCode::ArrowDown => -camera.forward,
            KeyCode::KeyA | KeyCode::ArrowLeft => -camera.right,
            KeyCode::KeyD | KeyCode::ArrowRight => camera.right,
            KeyCode::KeyE => camera.up,
            KeyCode::KeyQ => -camera.up,
            _ => return None,
        };
        Some(direction * MOVE_STEP)
    }
}

/// Prints the scene shape the way the CLI reports it.
pub fn print_scene_summary(scene: &Scene) {
    println!(
        "Loaded scene with {} triangles ({} vertices, {} materials, {} lights)",
        scene.triangle_count(),
        scene.vertices.len(),
        scene.materials.len(),
        scene.lights.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::UVec2;

    fn camera() -> Camera {
        Camera::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 5.0), UVec2::new(1280, 720))
    }

    #[test]
    fn cursor_moves_are_ignored_without_a_drag() {
        let mut controller = CameraController::new();
        let mut cam = camera();
        let eye = cam.eye;
        assert!(!controller.cursor_moved(Vec2::new(100.0, 50.0), &mut cam));
        assert_eq!(cam.eye, eye);
    }

    #[test]
    fn left_drag_orbits() {
        let mut controller = CameraController::new();
        let mut cam = camera();
        let eye = cam.eye;
        controller.set_button(MouseButton::Left, true);
        assert!(controller.cursor_moved(Vec2::new(40.0, 0.0), &mut cam));
        assert_ne!(cam.eye, eye);
        // Distance to the focus is preserved by an orbit.
        assert!(((cam.eye - cam.focus).length() - 5.0).abs() < 1e-4);
    }

    #[test]
    fn zoom_scale_is_floored() {
        let mut controller = CameraController::new();
        let mut cam = camera();
        controller.scroll(1000.0, &mut cam);
        let distance = (cam.eye - cam.focus).length();
        assert!((distance - 5.0 * MIN_ZOOM_SCALE).abs() < 1e-4);
    }

    #[test]
    fn movement_keys_follow_the_camera_axes() {
        let controller = CameraController::new();
        let cam = camera();
        let forward = controller.key_offset(KeyCode::KeyW, &cam).unwrap();
        assert!((forward.normalize() - cam.forward).length() < 1e-5);
        assert_eq!(controller.key_offset(KeyCode::KeyZ, &cam), None);
    }
}
