// bridge.rs — turns pointer input on the rendered surface into clicks on the captured window

use glam::{UVec2, Vec2};
use log::info;

use crate::capture::FrameSize;
use crate::controls::ViewState;
use crate::error::InjectError;
use crate::projection::invert;

/// Absolute position on the capture display's root window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesktopPoint {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
}

/// Maps target-local pixels to desktop coordinates.
pub trait CoordinateTranslator {
    fn to_desktop(&self, x: u32, y: u32) -> Result<DesktopPoint, InjectError>;
}

/// Synthesises pointer events on the capture display.
pub trait PointerInjector {
    fn move_pointer(&mut self, to: DesktopPoint) -> Result<(), InjectError>;
    fn set_button(&mut self, button: PointerButton, pressed: bool) -> Result<(), InjectError>;
}

/// The render window as the pointer sees it. Pointer positions arrive in
/// logical units and are scaled to the framebuffer before unprojection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub window_size: Vec2,
    pub framebuffer_size: UVec2,
}

impl Viewport {
    pub fn new(window_size: Vec2, framebuffer_size: UVec2) -> Self {
        Self {
            window_size,
            framebuffer_size,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.framebuffer_size.x as f32 / self.framebuffer_size.y.max(1) as f32
    }

    /// Normalized device coordinates of the pixel centre under `pointer`,
    /// +Y up. `None` for a degenerate (minimised) window.
    pub fn to_ndc(&self, pointer: Vec2) -> Option<Vec2> {
        if self.window_size.cmple(Vec2::ZERO).any()
            || self.framebuffer_size.cmpeq(UVec2::ZERO).any()
        {
            return None;
        }
        let fb = self.framebuffer_size.as_vec2();
        let physical = (pointer * fb / self.window_size).floor();
        let ndc = 2.0 * (physical + 0.5) / fb - 1.0;
        Some(Vec2::new(ndc.x, -ndc.y))
    }
}

/// Target pixel under the pointer for the current view, or `None` when the
/// pointer ray misses the surface.
pub fn pointer_to_target(
    pointer: Vec2,
    viewport: &Viewport,
    view: &ViewState,
    frame: FrameSize,
) -> Option<(u32, u32)> {
    let ndc = viewport.to_ndc(pointer)?;
    let dir = view.camera.ray_direction(ndc, viewport.aspect());
    let uv = invert(
        view.mode,
        &view.params,
        view.camera.yaw_deg(),
        view.camera.pitch_deg(),
        dir,
    )?;
    Some(uv.to_pixel(frame.width, frame.height))
}

/// Forwards a press-drag-release gesture to the target window.
///
/// A button-up is only ever sent for a button-down that was actually
/// injected, so the remote button cannot be left stuck or released twice.
#[derive(Debug, Clone, Default)]
pub struct InputBridge {
    enabled: bool,
    pressed: bool,
    button_down: bool,
    last_position: Option<(u32, u32)>,
}

impl InputBridge {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// True between a local press and its release, hit or not.
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn last_position(&self) -> Option<(u32, u32)> {
        self.last_position
    }

    pub fn pointer_pressed<D>(
        &mut self,
        target: Option<(u32, u32)>,
        desktop: &mut D,
    ) -> Result<(), InjectError>
    where
        D: CoordinateTranslator + PointerInjector,
    {
        if !self.enabled {
            return Ok(());
        }
        self.pressed = true;
        let Some((x, y)) = target else {
            return Ok(());
        };
        self.move_to(x, y, desktop)?;
        desktop.set_button(PointerButton::Primary, true)?;
        self.button_down = true;
        Ok(())
    }

    /// Drags only while pressed; hover motion is not forwarded.
    pub fn pointer_moved<D>(
        &mut self,
        target: Option<(u32, u32)>,
        desktop: &mut D,
    ) -> Result<(), InjectError>
    where
        D: CoordinateTranslator + PointerInjector,
    {
        if !self.enabled || !self.pressed {
            return Ok(());
        }
        match target {
            Some((x, y)) => self.move_to(x, y, desktop),
            None => Ok(()),
        }
    }

    /// Releases at `target`, or at the last forwarded position when the
    /// release happens off the surface.
    pub fn pointer_released<D>(
        &mut self,
        target: Option<(u32, u32)>,
        desktop: &mut D,
    ) -> Result<(), InjectError>
    where
        D: CoordinateTranslator + PointerInjector,
    {
        if !self.enabled {
            return Ok(());
        }
        let was_down = self.button_down;
        self.pressed = false;
        self.button_down = false;
        if !was_down {
            return Ok(());
        }
        let moved = match target {
            Some((x, y)) => self.move_to(x, y, desktop),
            None => Ok(()),
        };
        desktop.set_button(PointerButton::Primary, false)?;
        moved
    }

    /// Full click at the centre of the target, regardless of the pointer
    /// mapping toggle. Returns where it landed on the desktop.
    pub fn click_center<D>(
        &mut self,
        frame: FrameSize,
        desktop: &mut D,
    ) -> Result<DesktopPoint, InjectError>
    where
        D: CoordinateTranslator + PointerInjector,
    {
        let (x, y) = frame.center();
        let point = desktop.to_desktop(x, y)?;
        desktop.move_pointer(point)?;
        desktop.set_button(PointerButton::Primary, true)?;
        desktop.set_button(PointerButton::Primary, false)?;
        info!(
            "Center click at target ({x}, {y}), desktop ({}, {})",
            point.x, point.y
        );
        Ok(point)
    }

    fn move_to<D>(&mut self, x: u32, y: u32, desktop: &mut D) -> Result<(), InjectError>
    where
        D: CoordinateTranslator + PointerInjector,
    {
        let point = desktop.to_desktop(x, y)?;
        desktop.move_pointer(point)?;
        self.last_position = Some((x, y));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Move(i32, i32),
        Button(bool),
    }

    /// Desktop whose target window sits at (100, 200).
    #[derive(Default)]
    struct Desktop {
        events: Vec<Event>,
    }

    impl CoordinateTranslator for Desktop {
        fn to_desktop(&self, x: u32, y: u32) -> Result<DesktopPoint, InjectError> {
            Ok(DesktopPoint {
                x: x as i32 + 100,
                y: y as i32 + 200,
            })
        }
    }

    impl PointerInjector for Desktop {
        fn move_pointer(&mut self, to: DesktopPoint) -> Result<(), InjectError> {
            self.events.push(Event::Move(to.x, to.y));
            Ok(())
        }
        fn set_button(&mut self, _: PointerButton, pressed: bool) -> Result<(), InjectError> {
            self.events.push(Event::Button(pressed));
            Ok(())
        }
    }

    #[test]
    fn viewport_centre_maps_near_origin() {
        let viewport = Viewport::new(Vec2::new(640.0, 360.0), UVec2::new(1280, 720));
        let ndc = viewport.to_ndc(Vec2::new(320.0, 180.0)).unwrap();
        assert_abs_diff_eq!(ndc.x, 1.0 / 1280.0, epsilon = 1e-6);
        assert_abs_diff_eq!(ndc.y, -1.0 / 720.0, epsilon = 1e-6);
        assert_abs_diff_eq!(viewport.aspect(), 16.0 / 9.0);
    }

    #[test]
    fn viewport_top_left_is_up_left() {
        let viewport = Viewport::new(Vec2::new(100.0, 100.0), UVec2::new(100, 100));
        let ndc = viewport.to_ndc(Vec2::ZERO).unwrap();
        assert!(ndc.x < -0.9 && ndc.y > 0.9);
    }

    #[test]
    fn minimised_viewport_has_no_ndc() {
        let viewport = Viewport::new(Vec2::ZERO, UVec2::ZERO);
        assert_eq!(viewport.to_ndc(Vec2::new(1.0, 1.0)), None);
    }

    #[test]
    fn press_drag_release_is_forwarded() {
        let mut bridge = InputBridge::new(true);
        let mut desktop = Desktop::default();
        bridge.pointer_pressed(Some((1, 2)), &mut desktop).unwrap();
        bridge.pointer_moved(Some((3, 4)), &mut desktop).unwrap();
        bridge.pointer_released(Some((5, 6)), &mut desktop).unwrap();
        assert_eq!(
            desktop.events,
            vec![
                Event::Move(101, 202),
                Event::Button(true),
                Event::Move(103, 204),
                Event::Move(105, 206),
                Event::Button(false),
            ]
        );
        assert!(!bridge.is_pressed());
    }

    #[test]
    fn hover_is_not_forwarded() {
        let mut bridge = InputBridge::new(true);
        let mut desktop = Desktop::default();
        bridge.pointer_moved(Some((3, 4)), &mut desktop).unwrap();
        assert!(desktop.events.is_empty());
    }

    #[test]
    fn missed_press_never_sends_button_up() {
        let mut bridge = InputBridge::new(true);
        let mut desktop = Desktop::default();
        bridge.pointer_pressed(None, &mut desktop).unwrap();
        assert!(bridge.is_pressed());
        bridge.pointer_released(Some((1, 1)), &mut desktop).unwrap();
        assert!(desktop.events.is_empty());
    }

    #[test]
    fn release_off_surface_lands_at_last_position() {
        let mut bridge = InputBridge::new(true);
        let mut desktop = Desktop::default();
        bridge.pointer_pressed(Some((7, 8)), &mut desktop).unwrap();
        bridge.pointer_moved(None, &mut desktop).unwrap();
        bridge.pointer_released(None, &mut desktop).unwrap();
        assert_eq!(
            desktop.events,
            vec![Event::Move(107, 208), Event::Button(true), Event::Button(false)]
        );
        assert_eq!(bridge.last_position(), Some((7, 8)));
    }

    #[test]
    fn disabled_bridge_is_silent() {
        let mut bridge = InputBridge::new(false);
        let mut desktop = Desktop::default();
        bridge.pointer_pressed(Some((1, 1)), &mut desktop).unwrap();
        bridge.pointer_released(Some((1, 1)), &mut desktop).unwrap();
        assert!(desktop.events.is_empty());
    }

    #[test]
    fn center_click_ignores_the_toggle() {
        let mut bridge = InputBridge::new(false);
        let mut desktop = Desktop::default();
        let point = bridge
            .click_center(FrameSize::new(800, 600), &mut desktop)
            .unwrap();
        assert_eq!(point, DesktopPoint { x: 500, y: 500 });
        assert_eq!(
            desktop.events,
            vec![Event::Move(500, 500), Event::Button(true), Event::Button(false)]
        );
    }
}
