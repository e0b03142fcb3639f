// controls.rs — keyboard-driven view state: held keys steer, presses fire once

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use log::info;
use winit::event::VirtualKeyCode;

use crate::camera::{CameraState, ROTATE_STEP_DEG, ZOOM_STEP_DEG};
use crate::projection::{ProjectionMode, ProjectionParams, Surface};

pub const SPHERICITY_STEP: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    YawLeft,
    YawRight,
    PitchUp,
    PitchDown,
    ZoomIn,
    ZoomOut,
    MoreSpherical,
    LessSpherical,
    CycleMode,
    CenterClick,
}

impl Key {
    pub fn from_keycode(code: VirtualKeyCode) -> Option<Self> {
        Some(match code {
            VirtualKeyCode::Left => Key::YawLeft,
            VirtualKeyCode::Right => Key::YawRight,
            VirtualKeyCode::Up => Key::PitchUp,
            VirtualKeyCode::Down => Key::PitchDown,
            VirtualKeyCode::Q => Key::ZoomIn,
            VirtualKeyCode::E => Key::ZoomOut,
            VirtualKeyCode::W => Key::MoreSpherical,
            VirtualKeyCode::S => Key::LessSpherical,
            VirtualKeyCode::P => Key::CycleMode,
            VirtualKeyCode::Space => Key::CenterClick,
            _ => return None,
        })
    }
}

/// Keys fired once per press.
const EDGE_KEYS: [Key; 6] = [
    Key::CenterClick,
    Key::MoreSpherical,
    Key::LessSpherical,
    Key::ZoomIn,
    Key::ZoomOut,
    Key::CycleMode,
];

/// Keys currently held down, sampled once per frame.
#[derive(Debug, Clone, Default)]
pub struct KeySnapshot {
    held: HashSet<Key>,
}

impl KeySnapshot {
    pub fn press(&mut self, key: Key) {
        self.held.insert(key);
    }

    pub fn release(&mut self, key: Key) {
        self.held.remove(&key);
    }

    pub fn is_down(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    /// Forget every held key, e.g. when the window loses focus.
    pub fn clear(&mut self) {
        self.held.clear();
    }
}

/// Remembers each input's previous-frame state so an input held across
/// frames triggers only on the frame it went down.
#[derive(Debug, Clone)]
pub struct EdgeDetector<K> {
    previous: HashMap<K, bool>,
}

impl<K: Eq + Hash + Copy> EdgeDetector<K> {
    pub fn new() -> Self {
        Self {
            previous: HashMap::new(),
        }
    }

    /// Records `down` for `key` and reports whether it just went down.
    pub fn rising(&mut self, key: K, down: bool) -> bool {
        let was_down = self.previous.insert(key, down).unwrap_or(false);
        down && !was_down
    }
}

impl<K: Eq + Hash + Copy> Default for EdgeDetector<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything that decides what is drawn: camera, active mode and mode parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub camera: CameraState,
    pub mode: ProjectionMode,
    pub params: ProjectionParams,
}

impl ViewState {
    pub fn new(mode: ProjectionMode, params: ProjectionParams) -> Self {
        Self {
            camera: CameraState::new(),
            mode,
            params,
        }
    }

    pub fn surface(&self) -> Surface {
        Surface::new(self.mode, &self.params)
    }

    pub fn set_mode(&mut self, mode: ProjectionMode) {
        self.mode = mode;
        info!("Projection mode switched to: {}", self.describe_mode());
    }

    pub fn cycle_mode(&mut self) {
        self.set_mode(self.mode.next());
    }

    /// Changes the sphericity and switches to the morph surface.
    pub fn adjust_sphericity(&mut self, delta: f32) {
        self.mode = ProjectionMode::Morph;
        let s = self.params.adjust_sphericity(delta);
        info!("Morph sphericity: {s:.1}");
    }

    /// Mode name plus the parameter that shapes it, for logs and the status bar.
    pub fn describe_mode(&self) -> String {
        match self.mode {
            ProjectionMode::SphereClamp => {
                format!("{} (theta max {:.1}°)", self.mode, self.params.theta_max_deg())
            }
            ProjectionMode::Morph => {
                format!("{} (sphericity {:.1})", self.mode, self.params.sphericity())
            }
            mode => mode.to_string(),
        }
    }
}

/// One-shot requests raised by key presses that reach outside the view state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    CenterClick,
}

#[derive(Debug, Default)]
pub struct Controller {
    edges: EdgeDetector<Key>,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one frame of key state to the view.
    pub fn update(&mut self, view: &mut ViewState, keys: &KeySnapshot) -> Vec<ControlAction> {
        let mut d_yaw = 0.0;
        let mut d_pitch = 0.0;
        if keys.is_down(Key::YawLeft) {
            d_yaw += ROTATE_STEP_DEG;
        }
        if keys.is_down(Key::YawRight) {
            d_yaw -= ROTATE_STEP_DEG;
        }
        if keys.is_down(Key::PitchUp) {
            d_pitch += ROTATE_STEP_DEG;
        }
        if keys.is_down(Key::PitchDown) {
            d_pitch -= ROTATE_STEP_DEG;
        }
        view.camera.rotate(d_yaw, d_pitch);

        let mut actions = Vec::new();
        for key in EDGE_KEYS {
            if !self.edges.rising(key, keys.is_down(key)) {
                continue;
            }
            match key {
                Key::CenterClick => actions.push(ControlAction::CenterClick),
                Key::MoreSpherical => view.adjust_sphericity(SPHERICITY_STEP),
                Key::LessSpherical => view.adjust_sphericity(-SPHERICITY_STEP),
                Key::ZoomIn | Key::ZoomOut => {
                    let step = if key == Key::ZoomIn {
                        -ZOOM_STEP_DEG
                    } else {
                        ZOOM_STEP_DEG
                    };
                    let fov = view.camera.zoom(step);
                    info!("FOV: {fov:.0}");
                }
                Key::CycleMode => view.cycle_mode(),
                _ => {}
            }
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> ViewState {
        ViewState::new(ProjectionMode::Sphere, ProjectionParams::default())
    }

    fn held(keys: &[Key]) -> KeySnapshot {
        let mut snapshot = KeySnapshot::default();
        for &k in keys {
            snapshot.press(k);
        }
        snapshot
    }

    #[test]
    fn edge_detector_fires_once_per_press() {
        let mut edges = EdgeDetector::new();
        assert!(edges.rising('a', true));
        assert!(!edges.rising('a', true));
        assert!(!edges.rising('a', false));
        assert!(edges.rising('a', true));
        assert!(!edges.rising('b', false));
    }

    #[test]
    fn held_arrows_rotate_every_frame() {
        let mut controller = Controller::new();
        let mut v = view();
        let keys = held(&[Key::YawLeft, Key::PitchDown]);
        for _ in 0..3 {
            controller.update(&mut v, &keys);
        }
        assert_eq!(v.camera.yaw_deg(), 3.0 * ROTATE_STEP_DEG);
        assert_eq!(v.camera.pitch_deg(), -3.0 * ROTATE_STEP_DEG);
    }

    #[test]
    fn held_zoom_key_fires_once() {
        let mut controller = Controller::new();
        let mut v = view();
        let keys = held(&[Key::ZoomIn]);
        for _ in 0..5 {
            controller.update(&mut v, &keys);
        }
        assert_eq!(v.camera.fov_y_deg(), 85.0);

        controller.update(&mut v, &KeySnapshot::default());
        controller.update(&mut v, &keys);
        assert_eq!(v.camera.fov_y_deg(), 80.0);
    }

    #[test]
    fn sphericity_keys_force_morph() {
        let mut controller = Controller::new();
        let mut v = view();
        controller.update(&mut v, &held(&[Key::LessSpherical]));
        assert_eq!(v.mode, ProjectionMode::Morph);
        assert!((v.params.sphericity() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn cycle_key_walks_the_modes() {
        let mut controller = Controller::new();
        let mut v = view();
        let press = held(&[Key::CycleMode]);
        let release = KeySnapshot::default();
        let mut seen = Vec::new();
        for _ in 0..4 {
            controller.update(&mut v, &press);
            controller.update(&mut v, &release);
            seen.push(v.mode);
        }
        assert_eq!(
            seen,
            vec![
                ProjectionMode::SphereClamp,
                ProjectionMode::Cylinder,
                ProjectionMode::Morph,
                ProjectionMode::Sphere,
            ]
        );
    }

    #[test]
    fn space_requests_a_single_center_click() {
        let mut controller = Controller::new();
        let mut v = view();
        let keys = held(&[Key::CenterClick]);
        assert_eq!(controller.update(&mut v, &keys), vec![ControlAction::CenterClick]);
        assert!(controller.update(&mut v, &keys).is_empty());
    }

    #[test]
    fn keycodes_map_to_bindings() {
        assert_eq!(Key::from_keycode(VirtualKeyCode::P), Some(Key::CycleMode));
        assert_eq!(Key::from_keycode(VirtualKeyCode::Space), Some(Key::CenterClick));
        assert_eq!(Key::from_keycode(VirtualKeyCode::F11), None);
    }
}
