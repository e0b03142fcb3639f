//! In-memory stand-ins for the X display and the GPU texture.

#![allow(dead_code)]

use std::time::Instant;

use spherical_monitor::bridge::{CoordinateTranslator, DesktopPoint, PointerButton, PointerInjector};
use spherical_monitor::capture::{
    CaptureBackend, CaptureFrame, FrameSize, FrameTexture, PixelLayout, SurfaceGeometry,
};
use spherical_monitor::error::{CaptureError, InjectError};
use spherical_monitor::target::{TargetHandle, WindowTree};

pub const ROOT: TargetHandle = TargetHandle(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Move(i32, i32),
    Button(bool),
}

/// A display with one root window and a flat list of titled top-level windows.
/// The selected target sits at `origin` on the desktop.
#[derive(Debug)]
pub struct FakeBackend {
    pub size: FrameSize,
    pub viewable: bool,
    pub layout: PixelLayout,
    pub geometry_fails: bool,
    pub capture_fails: bool,
    pub captures: usize,
    pub selected: Option<TargetHandle>,
    pub windows: Vec<(u32, String)>,
    pub origin: (i32, i32),
    pub events: Vec<PointerEvent>,
}

impl FakeBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: FrameSize::new(width, height),
            viewable: true,
            layout: PixelLayout::Rgba32,
            geometry_fails: false,
            capture_fails: false,
            captures: 0,
            selected: None,
            windows: Vec::new(),
            origin: (0, 0),
            events: Vec::new(),
        }
    }

    pub fn with_window(mut self, id: u32, title: &str) -> Self {
        self.windows.push((id, title.to_string()));
        self
    }
}

impl WindowTree for FakeBackend {
    fn root(&self) -> TargetHandle {
        ROOT
    }

    fn children(&self, window: TargetHandle) -> Vec<TargetHandle> {
        if window == ROOT {
            self.windows.iter().map(|(id, _)| TargetHandle(*id)).collect()
        } else {
            Vec::new()
        }
    }

    fn title(&self, window: TargetHandle) -> Option<String> {
        self.windows
            .iter()
            .find(|(id, _)| *id == window.0)
            .map(|(_, title)| title.clone())
    }
}

impl CaptureBackend for FakeBackend {
    fn select_target(&mut self, target: TargetHandle) {
        self.selected = Some(target);
    }

    fn geometry(&mut self) -> Result<SurfaceGeometry, CaptureError> {
        if self.geometry_fails {
            return Err(CaptureError::request("GetGeometry", "no such window"));
        }
        Ok(SurfaceGeometry {
            size: self.size,
            viewable: self.viewable,
        })
    }

    fn capture(&mut self, size: FrameSize) -> Result<CaptureFrame, CaptureError> {
        self.captures += 1;
        if self.capture_fails {
            return Err(CaptureError::request("GetImage", "BadMatch"));
        }
        let bpp = self.layout.bytes_per_pixel();
        let fill = self.captures as u8;
        let buffer = vec![fill; size.width as usize * size.height as usize * bpp];
        CaptureFrame::new(size, self.layout, size.width as usize * bpp, buffer, Instant::now())
    }
}

impl CoordinateTranslator for FakeBackend {
    fn to_desktop(&self, x: u32, y: u32) -> Result<DesktopPoint, InjectError> {
        Ok(DesktopPoint {
            x: self.origin.0 + x as i32,
            y: self.origin.1 + y as i32,
        })
    }
}

impl PointerInjector for FakeBackend {
    fn move_pointer(&mut self, to: DesktopPoint) -> Result<(), InjectError> {
        self.events.push(PointerEvent::Move(to.x, to.y));
        Ok(())
    }

    fn set_button(&mut self, _button: PointerButton, pressed: bool) -> Result<(), InjectError> {
        self.events.push(PointerEvent::Button(pressed));
        Ok(())
    }
}

/// Records what the capture source asks of the GPU texture.
#[derive(Debug)]
pub struct FakeTexture {
    pub max: u32,
    pub allocations: Vec<(FrameSize, PixelLayout)>,
    pub uploads: Vec<CaptureFrame>,
}

impl FakeTexture {
    pub fn new(max: u32) -> Self {
        Self {
            max,
            allocations: Vec::new(),
            uploads: Vec::new(),
        }
    }

    pub fn last_upload(&self) -> &CaptureFrame {
        self.uploads.last().expect("nothing uploaded")
    }
}

impl FrameTexture for FakeTexture {
    fn max_dimension(&self) -> u32 {
        self.max
    }

    fn allocate(&mut self, size: FrameSize, layout: PixelLayout) {
        self.allocations.push((size, layout));
    }

    fn upload(&mut self, frame: &CaptureFrame) {
        self.uploads.push(frame.clone());
    }
}
