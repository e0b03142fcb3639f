// projection.rs — projection surfaces: forward parametrisation and ray inversion
//
// Every surface is parametrised by a polar angle θ (latitude, +π/2 at the top)
// and an azimuth φ ∈ [0, 2π). The eye sits at the origin, so inverting a view
// ray never depends on the surface radius.

use std::f32::consts::{FRAC_PI_2, PI, TAU};
use std::fmt;
use std::str::FromStr;

use glam::{Quat, Vec2, Vec3};

use crate::error::UnknownProjectionMode;
use crate::root_find::{bisect, BISECTION_ITERATIONS};

/// Radius used for rendering. Ray inversion is radius-independent.
pub const SURFACE_RADIUS: f32 = 5.0;

/// Below this horizontal component a ray counts as parallel to the vertical axis.
pub const AXIS_EPSILON: f32 = 1e-6;

/// Keeps the morph root search away from the exact poles.
const POLE_MARGIN: f32 = 1e-4;

pub const THETA_MAX_MIN_DEG: f32 = 1.0;
pub const THETA_MAX_MAX_DEG: f32 = 89.9;
pub const DEFAULT_THETA_MAX_DEG: f32 = 80.0;
pub const DEFAULT_SPHERICITY: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProjectionMode {
    /// Full equirectangular sphere, singular at the poles.
    #[default]
    Sphere,
    /// Sphere restricted to the band |θ| ≤ θmax.
    SphereClamp,
    /// Cylinder whose height matches the sphere's pole-to-pole arc length.
    Cylinder,
    /// Per-vertex blend between the cylinder and the sphere.
    Morph,
}

impl ProjectionMode {
    pub const ALL: [ProjectionMode; 4] = [
        ProjectionMode::Sphere,
        ProjectionMode::SphereClamp,
        ProjectionMode::Cylinder,
        ProjectionMode::Morph,
    ];

    /// Next mode in the fixed cycle Sphere → SphereClamp → Cylinder → Morph → Sphere.
    pub fn next(self) -> Self {
        match self {
            ProjectionMode::Sphere => ProjectionMode::SphereClamp,
            ProjectionMode::SphereClamp => ProjectionMode::Cylinder,
            ProjectionMode::Cylinder => ProjectionMode::Morph,
            ProjectionMode::Morph => ProjectionMode::Sphere,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ProjectionMode::Sphere => "sphere",
            ProjectionMode::SphereClamp => "sphere_clamp",
            ProjectionMode::Cylinder => "cylinder",
            ProjectionMode::Morph => "morph",
        }
    }
}

impl fmt::Display for ProjectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProjectionMode {
    type Err = UnknownProjectionMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProjectionMode::ALL
            .into_iter()
            .find(|mode| mode.name() == s)
            .ok_or_else(|| UnknownProjectionMode(s.to_string()))
    }
}

/// Parameters shared by the modes. Both values are kept inside their valid
/// ranges by every constructor and setter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionParams {
    theta_max_rad: f32,
    sphericity: f32,
}

impl ProjectionParams {
    pub fn new(theta_max_deg: f32, sphericity: f32) -> Self {
        let mut params = Self::default();
        params.set_theta_max_deg(theta_max_deg);
        params.set_sphericity(sphericity);
        params
    }

    pub fn theta_max_rad(&self) -> f32 {
        self.theta_max_rad
    }

    pub fn theta_max_deg(&self) -> f32 {
        self.theta_max_rad.to_degrees()
    }

    pub fn sphericity(&self) -> f32 {
        self.sphericity
    }

    pub fn set_theta_max_deg(&mut self, deg: f32) {
        if deg.is_nan() {
            return;
        }
        self.theta_max_rad = deg
            .clamp(THETA_MAX_MIN_DEG, THETA_MAX_MAX_DEG)
            .to_radians();
    }

    pub fn set_sphericity(&mut self, sphericity: f32) {
        if sphericity.is_nan() {
            return;
        }
        self.sphericity = sphericity.clamp(0.0, 1.0);
    }

    /// Adds `delta` to the sphericity, clamped to [0, 1]. Returns the new value.
    pub fn adjust_sphericity(&mut self, delta: f32) -> f32 {
        self.set_sphericity(self.sphericity + delta);
        self.sphericity
    }
}

impl Default for ProjectionParams {
    fn default() -> Self {
        Self {
            theta_max_rad: DEFAULT_THETA_MAX_DEG.to_radians(),
            sphericity: DEFAULT_SPHERICITY,
        }
    }
}

/// A mode with its parameters resolved: the concrete surface being shown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Surface {
    Sphere,
    SphereClamp { theta_max: f32 },
    Cylinder,
    Morph { sphericity: f32 },
}

impl Surface {
    pub fn new(mode: ProjectionMode, params: &ProjectionParams) -> Self {
        match mode {
            ProjectionMode::Sphere => Surface::Sphere,
            ProjectionMode::SphereClamp => Surface::SphereClamp {
                theta_max: params.theta_max_rad(),
            },
            ProjectionMode::Cylinder => Surface::Cylinder,
            ProjectionMode::Morph => Surface::Morph {
                sphericity: params.sphericity(),
            },
        }
    }

    /// Polar-angle interval covered by the surface (and by the texture's `v`).
    pub fn theta_range(&self) -> (f32, f32) {
        match *self {
            Surface::SphereClamp { theta_max } => (-theta_max, theta_max),
            _ => (-FRAC_PI_2, FRAC_PI_2),
        }
    }

    /// Model-space position of the surface point at (θ, φ).
    pub fn position(&self, theta: f32, phi: f32, radius: f32) -> Vec3 {
        let unit = match *self {
            Surface::Sphere | Surface::SphereClamp { .. } => sphere_point(theta, phi),
            Surface::Cylinder => cylinder_point(theta, phi),
            Surface::Morph { sphericity } => cylinder_point(theta, phi)
                .lerp(sphere_point(theta, phi), sphericity),
        };
        unit * radius
    }

    /// Texture coordinate of (θ, φ): `u` follows the azimuth, `v = 0` is the
    /// top of the captured image.
    pub fn tex_coord(&self, theta: f32, phi: f32) -> Vec2 {
        let (lo, hi) = self.theta_range();
        Vec2::new(phi / TAU, 1.0 - (theta - lo) / (hi - lo))
    }

    /// Maps a model-space view direction to the texture coordinate it hits.
    ///
    /// `None` means the ray misses the surface (outside a clamp band, above or
    /// below the cylinder, or parallel to the vertical axis). That is an
    /// ordinary outcome, not an error.
    pub fn invert_direction(&self, dir: Vec3) -> Option<Uv> {
        match *self {
            Surface::Sphere => {
                let theta = dir.y.clamp(-1.0, 1.0).asin();
                Some(Uv::new(azimuth(dir), 1.0 - (theta + FRAC_PI_2) / PI))
            }
            Surface::SphereClamp { theta_max } => {
                let theta = dir.y.clamp(-1.0, 1.0).asin();
                if theta.abs() > theta_max {
                    return None;
                }
                Some(Uv::new(
                    azimuth(dir),
                    1.0 - (theta + theta_max) / (2.0 * theta_max),
                ))
            }
            Surface::Cylinder => {
                let dxz = horizontal_length(dir)?;
                // The ray meets x²+z²=R² at height y = R·dir.y/dxz, and y = R·θ.
                let theta = dir.y / dxz;
                if !(-FRAC_PI_2..=FRAC_PI_2).contains(&theta) {
                    return None;
                }
                Some(Uv::new(azimuth(dir), 1.0 - (theta + FRAC_PI_2) / PI))
            }
            Surface::Morph { sphericity } => {
                let dxz = horizontal_length(dir)?;
                let s = sphericity;
                // In the (r, y) half-plane the surface is r(θ) = (1-s) + s·cosθ,
                // y(θ) = (1-s)·θ + s·sinθ; the ray hits where dir.y·r = dxz·y.
                let residual = |theta: f32| {
                    let r = (1.0 - s) + s * theta.cos();
                    let y = (1.0 - s) * theta + s * theta.sin();
                    dir.y * r - dxz * y
                };
                let theta = bisect(
                    residual,
                    -FRAC_PI_2 + POLE_MARGIN,
                    FRAC_PI_2 - POLE_MARGIN,
                    BISECTION_ITERATIONS,
                )?;
                Some(Uv::new(azimuth(dir), 1.0 - (theta + FRAC_PI_2) / PI))
            }
        }
    }
}

/// Normalized texture coordinate. `u` wraps around the azimuth, `v` does not.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Uv {
    pub u: f32,
    pub v: f32,
}

impl Uv {
    pub fn new(u: f32, v: f32) -> Self {
        Self { u, v }
    }

    /// Integer pixel inside a `width`×`height` frame, clamped to its bounds.
    pub fn to_pixel(self, width: u32, height: u32) -> (u32, u32) {
        (scale_to_pixel(self.u, width), scale_to_pixel(self.v, height))
    }
}

fn scale_to_pixel(t: f32, extent: u32) -> u32 {
    if extent == 0 {
        return 0;
    }
    let px = (t * extent as f32) as i64;
    px.clamp(0, i64::from(extent) - 1) as u32
}

/// Rotates a camera-space direction into model space: pitch about X first,
/// then yaw about Y, undoing the render-time view rotation.
pub fn camera_to_model(yaw_deg: f32, pitch_deg: f32, dir_camera: Vec3) -> Vec3 {
    let rotation = Quat::from_rotation_y(yaw_deg.to_radians())
        * Quat::from_rotation_x(pitch_deg.to_radians());
    (rotation * dir_camera).normalize_or_zero()
}

/// Maps a camera-space view direction to the texture coordinate under it for
/// the given mode, or `None` when the ray does not land on the surface.
pub fn invert(
    mode: ProjectionMode,
    params: &ProjectionParams,
    yaw_deg: f32,
    pitch_deg: f32,
    dir_camera: Vec3,
) -> Option<Uv> {
    let dir = camera_to_model(yaw_deg, pitch_deg, dir_camera);
    if dir == Vec3::ZERO || !dir.is_finite() {
        return None;
    }
    Surface::new(mode, params).invert_direction(dir)
}

fn sphere_point(theta: f32, phi: f32) -> Vec3 {
    let (sin_t, cos_t) = theta.sin_cos();
    let (sin_p, cos_p) = phi.sin_cos();
    Vec3::new(cos_t * cos_p, sin_t, cos_t * sin_p)
}

fn cylinder_point(theta: f32, phi: f32) -> Vec3 {
    let (sin_p, cos_p) = phi.sin_cos();
    Vec3::new(cos_p, theta, sin_p)
}

fn horizontal_length(dir: Vec3) -> Option<f32> {
    let dxz = dir.x.hypot(dir.z);
    (dxz >= AXIS_EPSILON).then_some(dxz)
}

fn azimuth(dir: Vec3) -> f32 {
    let mut phi = dir.z.atan2(dir.x);
    if phi < 0.0 {
        phi += TAU;
    }
    let u = phi / TAU;
    if u >= 1.0 {
        0.0
    } else {
        u
    }
}
