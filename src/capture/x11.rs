// capture/x11.rs — X11 capture backend: window tree, GetImage and XTEST injection

use std::time::Instant;

use log::info;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    Atom, AtomEnum, ConnectionExt as _, ImageFormat, MapState, Window, BUTTON_PRESS_EVENT,
    BUTTON_RELEASE_EVENT, MOTION_NOTIFY_EVENT,
};
use x11rb::protocol::xtest::ConnectionExt as _;
use x11rb::rust_connection::RustConnection;
use x11rb::CURRENT_TIME;

use super::{CaptureBackend, CaptureFrame, FrameSize, PixelLayout, SurfaceGeometry};
use crate::bridge::{CoordinateTranslator, DesktopPoint, PointerButton, PointerInjector};
use crate::error::{CaptureError, InjectError};
use crate::target::{TargetHandle, WindowTree};

pub struct X11Backend {
    conn: RustConnection,
    root: Window,
    target: Window,
    net_wm_name: Option<Atom>,
}

impl X11Backend {
    /// Opens `display` (or `$DISPLAY` when `None`). The target starts out as
    /// the root window until [`CaptureBackend::select_target`] is called.
    pub fn connect(display: Option<&str>) -> Result<Self, CaptureError> {
        let display_name = display.unwrap_or("$DISPLAY").to_string();
        let (conn, screen_num) = x11rb::connect(display).map_err(|err| CaptureError::Connect {
            display: display_name.clone(),
            source: Box::new(err),
        })?;
        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .ok_or_else(|| CaptureError::Connect {
                display: display_name,
                source: format!("screen {screen_num} does not exist").into(),
            })?;

        if let Some(name) = display {
            info!("Capturing from X display: {name}");
        }

        let net_wm_name = conn
            .intern_atom(false, b"_NET_WM_NAME")
            .ok()
            .and_then(|cookie| cookie.reply().ok())
            .map(|reply| reply.atom);

        Ok(Self {
            conn,
            root,
            target: root,
            net_wm_name,
        })
    }

    fn bits_per_pixel(&self, depth: u8) -> Option<u8> {
        self.conn
            .setup()
            .pixmap_formats
            .iter()
            .find(|format| format.depth == depth)
            .map(|format| format.bits_per_pixel)
    }

    fn property_text(&self, window: Window, property: Atom) -> Option<String> {
        let reply = self
            .conn
            .get_property(false, window, property, AtomEnum::ANY, 0, u32::MAX)
            .ok()?
            .reply()
            .ok()?;
        if reply.value.is_empty() {
            return None;
        }
        Some(String::from_utf8_lossy(&reply.value).into_owned())
    }

    fn fake_input(&self, kind: u8, detail: u8, x: i16, y: i16) -> Result<(), InjectError> {
        self.conn
            .xtest_fake_input(kind, detail, CURRENT_TIME, self.root, x, y, 0)
            .map_err(|err| InjectError::Inject(Box::new(err)))?;
        self.conn
            .flush()
            .map_err(|err| InjectError::Inject(Box::new(err)))
    }
}

impl WindowTree for X11Backend {
    fn root(&self) -> TargetHandle {
        TargetHandle(self.root)
    }

    fn children(&self, window: TargetHandle) -> Vec<TargetHandle> {
        self.conn
            .query_tree(window.0)
            .ok()
            .and_then(|cookie| cookie.reply().ok())
            .map(|reply| reply.children.into_iter().map(TargetHandle).collect())
            .unwrap_or_default()
    }

    fn title(&self, window: TargetHandle) -> Option<String> {
        self.property_text(window.0, AtomEnum::WM_NAME.into())
            .or_else(|| {
                self.net_wm_name
                    .and_then(|atom| self.property_text(window.0, atom))
            })
    }
}

impl CaptureBackend for X11Backend {
    fn select_target(&mut self, target: TargetHandle) {
        self.target = target.0;
    }

    fn geometry(&mut self) -> Result<SurfaceGeometry, CaptureError> {
        let geometry = self
            .conn
            .get_geometry(self.target)
            .map_err(|err| CaptureError::request("GetGeometry", err))?
            .reply()
            .map_err(|err| CaptureError::request("GetGeometry", err))?;
        let attributes = self
            .conn
            .get_window_attributes(self.target)
            .map_err(|err| CaptureError::request("GetWindowAttributes", err))?
            .reply()
            .map_err(|err| CaptureError::request("GetWindowAttributes", err))?;

        Ok(SurfaceGeometry {
            size: FrameSize::new(geometry.width.into(), geometry.height.into()),
            viewable: attributes.map_state == MapState::VIEWABLE,
        })
    }

    fn capture(&mut self, size: FrameSize) -> Result<CaptureFrame, CaptureError> {
        let width = u16::try_from(size.width).unwrap_or(u16::MAX);
        let height = u16::try_from(size.height).unwrap_or(u16::MAX);
        let image = self
            .conn
            .get_image(ImageFormat::Z_PIXMAP, self.target, 0, 0, width, height, !0)
            .map_err(|err| CaptureError::request("GetImage", err))?
            .reply()
            .map_err(|err| CaptureError::request("GetImage", err))?;

        let bits_per_pixel = self.bits_per_pixel(image.depth).unwrap_or(image.depth);
        let layout = PixelLayout::from_bits_per_pixel(bits_per_pixel)
            .ok_or(CaptureError::UnsupportedFormat { bits_per_pixel })?;
        let stride = image.data.len() / usize::from(height.max(1));

        CaptureFrame::new(
            FrameSize::new(width.into(), height.into()),
            layout,
            stride,
            image.data,
            Instant::now(),
        )
    }
}

impl CoordinateTranslator for X11Backend {
    fn to_desktop(&self, x: u32, y: u32) -> Result<DesktopPoint, InjectError> {
        let reply = self
            .conn
            .translate_coordinates(
                self.target,
                self.root,
                saturate_i16(x.into()),
                saturate_i16(y.into()),
            )
            .ok()
            .and_then(|cookie| cookie.reply().ok())
            .ok_or(InjectError::Translate { x, y })?;
        Ok(DesktopPoint {
            x: reply.dst_x.into(),
            y: reply.dst_y.into(),
        })
    }
}

impl PointerInjector for X11Backend {
    fn move_pointer(&mut self, to: DesktopPoint) -> Result<(), InjectError> {
        self.fake_input(
            MOTION_NOTIFY_EVENT,
            0,
            saturate_i16(to.x.into()),
            saturate_i16(to.y.into()),
        )
    }

    fn set_button(&mut self, button: PointerButton, pressed: bool) -> Result<(), InjectError> {
        let kind = if pressed {
            BUTTON_PRESS_EVENT
        } else {
            BUTTON_RELEASE_EVENT
        };
        let detail = match button {
            PointerButton::Primary => 1,
        };
        self.fake_input(kind, detail, 0, 0)
    }
}

fn saturate_i16(v: i64) -> i16 {
    v.clamp(i16::MIN.into(), i16::MAX.into()) as i16
}
