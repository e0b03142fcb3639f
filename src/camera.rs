// camera.rs — viewing angles and zoom

use glam::{Mat4, Vec2, Vec3};

pub const PITCH_LIMIT_DEG: f32 = 89.0;
pub const FOV_MIN_DEG: f32 = 30.0;
pub const FOV_MAX_DEG: f32 = 120.0;
pub const DEFAULT_FOV_DEG: f32 = 90.0;

/// Degrees of yaw/pitch applied per frame while an arrow key is held.
pub const ROTATE_STEP_DEG: f32 = 3.0;
/// Degrees of field of view per zoom key press.
pub const ZOOM_STEP_DEG: f32 = 5.0;

const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 100.0;

/// Camera at the centre of the projection surface.
///
/// Yaw is unbounded; pitch stays within ±[`PITCH_LIMIT_DEG`] and the vertical
/// field of view within [[`FOV_MIN_DEG`], [`FOV_MAX_DEG`]].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    yaw_deg: f32,
    pitch_deg: f32,
    fov_y_deg: f32,
}

impl CameraState {
    pub fn new() -> Self {
        Self {
            yaw_deg: 0.0,
            pitch_deg: 0.0,
            fov_y_deg: DEFAULT_FOV_DEG,
        }
    }

    pub fn yaw_deg(&self) -> f32 {
        self.yaw_deg
    }

    pub fn pitch_deg(&self) -> f32 {
        self.pitch_deg
    }

    pub fn fov_y_deg(&self) -> f32 {
        self.fov_y_deg
    }

    pub fn rotate(&mut self, d_yaw_deg: f32, d_pitch_deg: f32) {
        if d_yaw_deg.is_finite() {
            self.yaw_deg += d_yaw_deg;
        }
        if d_pitch_deg.is_finite() {
            self.pitch_deg = (self.pitch_deg + d_pitch_deg).clamp(-PITCH_LIMIT_DEG, PITCH_LIMIT_DEG);
        }
    }

    /// Widens (positive) or narrows (negative) the field of view. Returns the new value.
    pub fn zoom(&mut self, delta_deg: f32) -> f32 {
        if delta_deg.is_finite() {
            self.fov_y_deg = (self.fov_y_deg + delta_deg).clamp(FOV_MIN_DEG, FOV_MAX_DEG);
        }
        self.fov_y_deg
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// World-to-view rotation: yaw about Y, then pitch about X, both negated.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_x(-self.pitch_deg.to_radians())
            * Mat4::from_rotation_y(-self.yaw_deg.to_radians())
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_deg.to_radians(), aspect, Z_NEAR, Z_FAR)
    }

    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// Unit camera-space direction through a point in normalized device
    /// coordinates. The camera looks down -Z with +Y up.
    pub fn ray_direction(&self, ndc: Vec2, aspect: f32) -> Vec3 {
        let tan_half = (self.fov_y_deg.to_radians() * 0.5).tan();
        Vec3::new(ndc.x * tan_half * aspect, ndc.y * tan_half, -1.0).normalize()
    }
}

impl Default for CameraState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use glam::Vec4;

    #[test]
    fn pitch_and_fov_are_clamped() {
        let mut cam = CameraState::new();
        for _ in 0..100 {
            cam.rotate(0.0, ROTATE_STEP_DEG);
        }
        assert_eq!(cam.pitch_deg(), PITCH_LIMIT_DEG);
        cam.rotate(0.0, -1000.0);
        assert_eq!(cam.pitch_deg(), -PITCH_LIMIT_DEG);

        for _ in 0..50 {
            cam.zoom(-ZOOM_STEP_DEG);
        }
        assert_eq!(cam.fov_y_deg(), FOV_MIN_DEG);
        for _ in 0..50 {
            cam.zoom(ZOOM_STEP_DEG);
        }
        assert_eq!(cam.fov_y_deg(), FOV_MAX_DEG);
    }

    #[test]
    fn yaw_is_unbounded() {
        let mut cam = CameraState::new();
        cam.rotate(720.0, 0.0);
        assert_eq!(cam.yaw_deg(), 720.0);
    }

    #[test]
    fn non_finite_deltas_are_ignored() {
        let mut cam = CameraState::new();
        cam.rotate(f32::NAN, f32::INFINITY);
        cam.zoom(f32::NAN);
        assert_eq!(cam, CameraState::new());
    }

    #[test]
    fn centre_ray_points_forward() {
        let cam = CameraState::new();
        let dir = cam.ray_direction(Vec2::ZERO, 16.0 / 9.0);
        assert_abs_diff_eq!(dir.z, -1.0);
    }

    #[test]
    fn ray_reprojects_to_its_ndc() {
        let mut cam = CameraState::new();
        cam.zoom(-25.0);
        let aspect = 1.5;
        let ndc = Vec2::new(0.4, -0.7);
        let dir = cam.ray_direction(ndc, aspect);
        let clip = cam.projection_matrix(aspect) * Vec4::new(dir.x, dir.y, dir.z, 1.0);
        assert_abs_diff_eq!(clip.x / clip.w, ndc.x, epsilon = 1e-5);
        assert_abs_diff_eq!(clip.y / clip.w, ndc.y, epsilon = 1e-5);
    }
}
