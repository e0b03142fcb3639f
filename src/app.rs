// app.rs — per-frame orchestration, independent of the window and the GPU

use std::time::Instant;

use glam::Vec2;
use log::{info, warn};

use crate::bridge::{pointer_to_target, CoordinateTranslator, InputBridge, PointerInjector, Viewport};
use crate::capture::{CaptureBackend, CaptureSource, FrameTexture, RefreshOutcome};
use crate::config::Settings;
use crate::controls::{ControlAction, Controller, KeySnapshot, ViewState};
use crate::error::InjectError;
use crate::mesh::{generate_mesh, SurfaceMesh};
use crate::projection::{Surface, SURFACE_RADIUS};

/// Polar bands of the rendered surface.
pub const SURFACE_RINGS: usize = 64;
/// Azimuthal divisions of the rendered surface.
pub const SURFACE_SECTORS: usize = 128;

/// What changed in a frame that the renderer has to pick up.
#[derive(Debug)]
pub struct FrameUpdate {
    /// New geometry, only when the active surface changed.
    pub mesh: Option<SurfaceMesh>,
    pub capture: RefreshOutcome,
}

pub struct RenderLoop<B> {
    view: ViewState,
    controller: Controller,
    bridge: InputBridge,
    capture: CaptureSource<B>,
    meshed: Option<Surface>,
}

impl<B> RenderLoop<B>
where
    B: CaptureBackend + CoordinateTranslator + PointerInjector,
{
    pub fn new(settings: &Settings, capture: CaptureSource<B>) -> Self {
        let view = ViewState::new(settings.mode, settings.params);
        info!("Projection mode: {}", view.describe_mode());
        if settings.pointer_mapping {
            info!("Pointer mapping enabled");
        } else {
            info!("Pointer mapping disabled");
        }
        Self {
            view,
            controller: Controller::new(),
            bridge: InputBridge::new(settings.pointer_mapping),
            capture,
            meshed: None,
        }
    }

    /// One frame: apply keys, refresh the capture, and rebuild the mesh if the
    /// surface changed. The first step always yields a mesh.
    pub fn step(
        &mut self,
        keys: &KeySnapshot,
        now: Instant,
        texture: &mut impl FrameTexture,
    ) -> FrameUpdate {
        for action in self.controller.update(&mut self.view, keys) {
            match action {
                ControlAction::CenterClick => self.click_center(),
            }
        }

        let capture = self.capture.refresh_at(now, texture);

        let surface = self.view.surface();
        let mesh = if self.meshed != Some(surface) {
            self.meshed = Some(surface);
            Some(generate_mesh(
                &surface,
                SURFACE_RADIUS,
                SURFACE_RINGS,
                SURFACE_SECTORS,
            ))
        } else {
            None
        };

        FrameUpdate { mesh, capture }
    }

    pub fn pointer_pressed(&mut self, pointer: Vec2, viewport: &Viewport) {
        let target = self.target_under(pointer, viewport);
        let result = self.bridge.pointer_pressed(target, self.capture.backend_mut());
        report("press", result);
    }

    pub fn pointer_moved(&mut self, pointer: Vec2, viewport: &Viewport) {
        if !self.bridge.is_pressed() {
            return;
        }
        let target = self.target_under(pointer, viewport);
        let result = self.bridge.pointer_moved(target, self.capture.backend_mut());
        report("drag", result);
    }

    pub fn pointer_released(&mut self, pointer: Vec2, viewport: &Viewport) {
        let target = self.target_under(pointer, viewport);
        let result = self.bridge.pointer_released(target, self.capture.backend_mut());
        report("release", result);
    }

    /// Ends a held gesture without a surface position, e.g. when the release
    /// lands on the HUD or the window loses focus.
    pub fn cancel_pointer(&mut self) {
        if !self.bridge.is_pressed() {
            return;
        }
        let result = self.bridge.pointer_released(None, self.capture.backend_mut());
        report("release", result);
    }

    fn click_center(&mut self) {
        let size = self.capture.size();
        if let Err(err) = self.bridge.click_center(size, self.capture.backend_mut()) {
            warn!("Center click failed: {err}");
        }
    }

    fn target_under(&self, pointer: Vec2, viewport: &Viewport) -> Option<(u32, u32)> {
        if !self.bridge.is_enabled() {
            return None;
        }
        pointer_to_target(pointer, viewport, &self.view, self.capture.size())
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewState {
        &mut self.view
    }

    pub fn capture(&self) -> &CaptureSource<B> {
        &self.capture
    }

    pub fn bridge(&self) -> &InputBridge {
        &self.bridge
    }
}

fn report(gesture: &str, result: Result<(), InjectError>) {
    if let Err(err) = result {
        warn!("Pointer {gesture} not forwarded: {err}");
    }
}
