use std::f32::consts::{PI, TAU};

use glam::{Mat3, UVec2, Vec2, Vec3};

/// Orbit camera described by an eye position and a focus point.
///
/// The orthonormal `forward`/`up`/`right` basis is derived from the
/// eye-focus pair by [`Camera::update`], which must run after any mutation
/// and before the axes are consumed. The configuration is degenerate when
/// `eye == focus`; callers are expected to avoid it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub focus: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    pub right: Vec3,
    pub resolution: UVec2,
}

/// Polar clamp keeping the orbit away from the +Y pole.
const MIN_POLAR: f32 = 10.0 * PI / 180.0;
const MAX_POLAR: f32 = 170.0 * PI / 180.0;

impl Camera {
    pub fn new(eye: Vec3, focus: Vec3, resolution: UVec2) -> Self {
        let mut camera = Self {
            eye,
            focus,
            forward: Vec3::ZERO,
            up: Vec3::ZERO,
            right: Vec3::ZERO,
            resolution,
        };
        camera.update();
        camera
    }

    /// Retargets the camera at a new focus point.
    pub fn look_at(&mut self, focus: Vec3) {
        self.focus = focus;
    }

    /// Repositions both the eye and the focus directly. No validation is
    /// performed.
    pub fn look_at_from(&mut self, focus: Vec3, eye: Vec3) {
        self.focus = focus;
        self.eye = eye;
    }

    /// Translates the eye and focus by the same offset, preserving the view
    /// direction and distance.
    pub fn move_by(&mut self, offset: Vec3) {
        self.eye += offset;
        self.focus += offset;
    }

    /// Moves along the current camera plane, `offset.x` along `right` and
    /// `offset.y` along `up`. Uses whatever axes the last `update` produced.
    pub fn pan(&mut self, offset: Vec2) {
        self.move_by(self.right * offset.x + self.up * offset.y);
    }

    /// Rotates the eye about the focus by radian deltas
    /// `[azimuth, polar]`, keeping the distance fixed.
    pub fn orbit(&mut self, euler_angles: Vec2) {
        let offset = self.eye - self.focus;
        let distance = offset.length();
        let out_dir = offset / distance;

        // x = cos(gamma) * sin(theta)
        // y = cos(theta)
        // z = sin(gamma) * sin(theta)
        let mut theta = out_dir.y.clamp(-1.0, 1.0).acos();
        let sin_theta = theta.sin();
        let mut gamma = if sin_theta != 0.0 {
            (out_dir.x / sin_theta).clamp(-1.0, 1.0).acos()
        } else {
            // Eye directly above or below the focus.
            (out_dir.z / out_dir.x).atan()
        };

        if out_dir.z < 0.0 {
            gamma = TAU - gamma;
        }

        theta += euler_angles.y;
        gamma += euler_angles.x;

        theta = theta.clamp(MIN_POLAR, MAX_POLAR);

        let out_dir = Vec3::new(
            gamma.cos() * theta.sin(),
            theta.cos(),
            gamma.sin() * theta.sin(),
        );
        self.eye = self.focus + out_dir * distance;
    }

    /// Rescales the eye's distance from the focus by `scale`. The caller is
    /// responsible for keeping `scale` positive and sane.
    pub fn zoom(&mut self, scale: f32) {
        self.eye = self.focus + (self.eye - self.focus) * scale;
    }

    /// Recomputes the stored axes from the eye-focus pair.
    pub fn update(&mut self) {
        self.forward = (self.focus - self.eye).normalize();
        // World up (0, 1, 0) crossed with forward, written out.
        self.right = Vec3::new(-self.forward.z, 0.0, self.forward.x).normalize();
        self.up = self.right.cross(self.forward).normalize();
    }

    /// Returns the 3x3 basis `[right | up | forward]`.
    pub fn axes(&self) -> Mat3 {
        Mat3::from_cols(self.right, self.up, self.forward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn camera() -> Camera {
        Camera::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 5.0),
            UVec2::new(1280, 720),
        )
    }

    fn assert_close(a: Vec3, b: Vec3) {
        assert!((a - b).length() < 1e-4, "{a} != {b}");
    }

    #[test]
    fn axes_are_orthonormal() {
        let pairs = [
            (Vec3::new(1.0, 2.0, 3.0), Vec3::new(-4.0, 0.5, 2.0)),
            (Vec3::new(0.0, 0.0, -5.0), Vec3::ZERO),
            (Vec3::new(3.0, -1.0, 0.1), Vec3::new(0.0, 1.0, 0.0)),
        ];
        for (eye, focus) in pairs {
            let cam = Camera::new(eye, focus, UVec2::ONE);
            assert!((cam.forward.length() - 1.0).abs() < EPS);
            assert!((cam.up.length() - 1.0).abs() < EPS);
            assert!((cam.right.length() - 1.0).abs() < EPS);
            assert!(cam.forward.dot(cam.up).abs() < EPS);
            assert!(cam.forward.dot(cam.right).abs() < EPS);
            assert!(cam.up.dot(cam.right).abs() < EPS);
        }
    }

    #[test]
    fn orbit_preserves_distance() {
        let mut cam = camera();
        let distance = (cam.eye - cam.focus).length();
        cam.orbit(Vec2::new(0.7, -0.3));
        assert!(((cam.eye - cam.focus).length() - distance).abs() < 1e-4);
    }

    #[test]
    fn orbit_clamps_at_the_pole() {
        let mut cam = camera();
        // Drive well past the upper polar limit, then orbit upward again;
        // the clamp makes the second call a no-op.
        cam.orbit(Vec2::new(0.0, -PI));
        let clamped = cam.eye;
        cam.orbit(Vec2::new(0.0, -1.0));
        assert_close(cam.eye, clamped);
    }

    #[test]
    fn orbit_full_turn_returns_to_start() {
        let mut cam = camera();
        let start = cam.eye;
        cam.orbit(Vec2::new(TAU, 0.0));
        assert_close(cam.eye, start);
    }

    #[test]
    fn zoom_by_one_is_a_no_op() {
        let mut cam = camera();
        let eye = cam.eye;
        cam.zoom(1.0);
        assert_close(cam.eye, eye);
    }

    #[test]
    fn zoom_rescales_distance() {
        let mut cam = camera();
        cam.zoom(2.0);
        assert!(((cam.eye - cam.focus).length() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn pan_round_trips() {
        let mut cam = Camera::new(
            Vec3::new(1.0, 2.0, -3.0),
            Vec3::new(0.0, 0.5, 4.0),
            UVec2::ONE,
        );
        let (eye, focus) = (cam.eye, cam.focus);
        let offset = Vec2::new(0.25, -1.5);
        cam.pan(offset);
        cam.pan(-offset);
        assert_close(cam.eye, eye);
        assert_close(cam.focus, focus);
    }

    #[test]
    fn move_preserves_view_direction() {
        let mut cam = camera();
        let before = cam.focus - cam.eye;
        cam.move_by(Vec3::new(3.0, -2.0, 7.0));
        assert_close(cam.focus - cam.eye, before);
    }

    #[test]
    fn axes_matrix_matches_fields() {
        let cam = camera();
        let axes = cam.axes();
        assert_close(axes.x_axis, cam.right);
        assert_close(axes.y_axis, cam.up);
        assert_close(axes.z_axis, cam.forward);
    }
}
