// capture/mod.rs — keeps a GPU texture in step with the captured surface
//
// The capture backend and the texture are both behind traits: the backend is
// the windowing system (X11 in production), the texture is owned by the
// renderer. `CaptureSource` owns the policy between them: sizing, layout
// detection, rate limiting and what to show when capturing fails.

pub mod x11;

use std::borrow::Cow;
use std::fmt;
use std::time::{Duration, Instant};

use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use log::{debug, info, warn};

use crate::error::CaptureError;
use crate::target::{resolve_target, ResolvedTarget, TargetHandle, TargetSpec, WindowTree};

/// Used when the surface size cannot be queried at startup.
pub const DEFAULT_FRAME_SIZE: FrameSize = FrameSize {
    width: 1024,
    height: 768,
};

/// Repeated capture failures are logged at most once per window.
pub const FAILURE_LOG_WINDOW: Duration = Duration::from_secs(2);

const CHECKER_BLOCK: u32 = 64;
const CHECKER_LIGHT: u8 = 200;
const CHECKER_DARK: u8 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Clamps each side to `max`. The flag reports whether anything was cut.
    pub fn clamped_to(self, max: u32) -> (FrameSize, bool) {
        let clamped = FrameSize::new(self.width.min(max), self.height.min(max));
        (clamped, clamped != self)
    }

    /// Geometric centre, in frame-local pixels.
    pub fn center(&self) -> (u32, u32) {
        (self.width / 2, self.height / 2)
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Byte layout of captured pixels. Channel order is the backend's native one
/// (BGR(A) on X11); only the pixel width matters here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelLayout {
    Rgb24,
    #[default]
    Rgba32,
}

impl PixelLayout {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelLayout::Rgb24 => 3,
            PixelLayout::Rgba32 => 4,
        }
    }

    pub fn from_bits_per_pixel(bits: u8) -> Option<Self> {
        match bits {
            24 => Some(PixelLayout::Rgb24),
            32 => Some(PixelLayout::Rgba32),
            _ => None,
        }
    }
}

/// One captured image. Rows are `stride` bytes apart and may carry padding.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureFrame {
    pub size: FrameSize,
    pub layout: PixelLayout,
    pub stride: usize,
    pub buffer: Vec<u8>,
    pub captured_at: Instant,
}

impl CaptureFrame {
    pub fn new(
        size: FrameSize,
        layout: PixelLayout,
        stride: usize,
        buffer: Vec<u8>,
        captured_at: Instant,
    ) -> Result<Self, CaptureError> {
        let row_bytes = size.width as usize * layout.bytes_per_pixel();
        let needed = match size.height {
            0 => 0,
            h => stride * (h as usize - 1) + row_bytes,
        };
        if stride < row_bytes || buffer.len() < needed {
            return Err(CaptureError::ShortBuffer {
                len: buffer.len(),
                rows: size.height,
                stride,
            });
        }
        Ok(Self {
            size,
            layout,
            stride,
            buffer,
            captured_at,
        })
    }

    /// Grey checkerboard in `layout`, shown until the first capture lands so
    /// that a failing capture never looks like a black desktop.
    pub fn checkerboard(size: FrameSize, layout: PixelLayout, captured_at: Instant) -> Self {
        let shade = |x: u32, y: u32| {
            if (((x / CHECKER_BLOCK) % 2) ^ ((y / CHECKER_BLOCK) % 2)) == 1 {
                CHECKER_LIGHT
            } else {
                CHECKER_DARK
            }
        };
        let buffer = match layout {
            PixelLayout::Rgb24 => RgbImage::from_fn(size.width, size.height, |x, y| {
                let v = shade(x, y);
                Rgb([v, v, v])
            })
            .into_raw(),
            PixelLayout::Rgba32 => RgbaImage::from_fn(size.width, size.height, |x, y| {
                let v = shade(x, y);
                Rgba([v, v, v, 255])
            })
            .into_raw(),
        };
        Self {
            size,
            layout,
            stride: size.width as usize * layout.bytes_per_pixel(),
            buffer,
            captured_at,
        }
    }

    /// Tightly packed four-byte pixels in the capture's channel order, with
    /// opaque alpha added for three-byte layouts.
    pub fn to_rgba32(&self) -> Cow<'_, [u8]> {
        let (w, h) = (self.size.width, self.size.height);
        let bpp = self.layout.bytes_per_pixel();
        let row_bytes = w as usize * bpp;
        let at = |x: u32, y: u32| y as usize * self.stride + x as usize * bpp;

        match self.layout {
            PixelLayout::Rgba32 if self.stride == row_bytes => {
                Cow::Borrowed(&self.buffer[..row_bytes * h as usize])
            }
            PixelLayout::Rgba32 => {
                let img = RgbaImage::from_fn(w, h, |x, y| {
                    let i = at(x, y);
                    Rgba([
                        self.buffer[i],
                        self.buffer[i + 1],
                        self.buffer[i + 2],
                        self.buffer[i + 3],
                    ])
                });
                Cow::Owned(img.into_raw())
            }
            PixelLayout::Rgb24 => {
                let img = RgbImage::from_fn(w, h, |x, y| {
                    let i = at(x, y);
                    Rgb([self.buffer[i], self.buffer[i + 1], self.buffer[i + 2]])
                });
                Cow::Owned(DynamicImage::ImageRgb8(img).into_rgba8().into_raw())
            }
        }
    }
}

/// GPU-side texture mirroring the latest frame.
pub trait FrameTexture {
    /// Largest width or height the texture can take.
    fn max_dimension(&self) -> u32;
    /// (Re)creates the texture. Contents are undefined until the next upload.
    fn allocate(&mut self, size: FrameSize, layout: PixelLayout);
    /// Writes a frame into the current texture without reallocating it.
    fn upload(&mut self, frame: &CaptureFrame);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceGeometry {
    pub size: FrameSize,
    /// False while the surface is unmapped or minimised.
    pub viewable: bool,
}

/// The windowing system the pixels come from.
pub trait CaptureBackend: WindowTree {
    fn select_target(&mut self, target: TargetHandle);
    fn geometry(&mut self) -> Result<SurfaceGeometry, CaptureError>;
    /// Grabs the `size` region at the target's origin. `captured_at` is stamped
    /// by the caller.
    fn capture(&mut self, size: FrameSize) -> Result<CaptureFrame, CaptureError>;
}

/// Time-based throttle: admits at most one event per `min_interval`, never blocks.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Option<Duration>,
    last: Option<Instant>,
}

impl RateLimiter {
    /// `fps == 0` disables throttling.
    pub fn from_fps(fps: u32) -> Self {
        Self {
            min_interval: (fps > 0).then(|| Duration::from_millis(1000 / u64::from(fps))),
            last: None,
        }
    }

    pub fn min_interval(&self) -> Option<Duration> {
        self.min_interval
    }

    pub fn admit(&mut self, now: Instant) -> bool {
        let Some(interval) = self.min_interval else {
            return true;
        };
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < interval {
                return false;
            }
        }
        self.last = Some(now);
        true
    }
}

/// Lets a repeating message through at most once per window.
#[derive(Debug, Clone)]
pub struct LogThrottle {
    window: Duration,
    last: Option<Instant>,
}

impl LogThrottle {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn allow(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) <= self.window => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    /// Nothing captured yet; the checkerboard is showing.
    Placeholder,
    Live,
    /// The last attempt failed; the previous frame is still showing.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Throttled,
    Captured,
    Failed,
}

/// Snapshot for the status bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSummary {
    pub size: FrameSize,
    pub status: CaptureStatus,
    pub cropped: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CaptureSettings {
    pub target: TargetSpec,
    /// Capture rate limit; 0 captures on every frame.
    pub capture_fps: u32,
}

pub struct CaptureSource<B> {
    backend: B,
    target: ResolvedTarget,
    size: FrameSize,
    layout: PixelLayout,
    max_dimension: u32,
    cropped: bool,
    frame: Option<CaptureFrame>,
    limiter: RateLimiter,
    failure_log: LogThrottle,
    status: CaptureStatus,
    logged_first_capture: bool,
}

impl<B: CaptureBackend> CaptureSource<B> {
    /// Resolves the target, sizes and seeds the texture.
    ///
    /// Never fails: an unreadable size falls back to [`DEFAULT_FRAME_SIZE`], an
    /// oversized surface is cropped to the texture limit, and a failed probe
    /// keeps the default layout.
    pub fn initialize(
        mut backend: B,
        settings: &CaptureSettings,
        texture: &mut impl FrameTexture,
    ) -> Self {
        let target = resolve_target(&settings.target, &backend);
        backend.select_target(target.handle);

        let reported = match backend.geometry() {
            Ok(geometry) if !geometry.size.is_empty() => geometry.size,
            Ok(_) => {
                warn!("Surface reports an empty size, using default {DEFAULT_FRAME_SIZE}");
                DEFAULT_FRAME_SIZE
            }
            Err(err) => {
                warn!("Surface size query failed ({err}), using default {DEFAULT_FRAME_SIZE}");
                DEFAULT_FRAME_SIZE
            }
        };

        let max_dimension = texture.max_dimension();
        let (size, cropped) = reported.clamped_to(max_dimension);
        if cropped {
            warn!(
                "Capture size {reported} exceeds the maximum texture size {max_dimension}; \
                 capturing {size} and cropping the rest"
            );
        }

        let limiter = RateLimiter::from_fps(settings.capture_fps);
        match limiter.min_interval() {
            Some(_) => info!("Capture window size: {size} (CAPTURE_FPS={})", settings.capture_fps),
            None => info!("Capture window size: {size}"),
        }

        let layout = match backend.capture(size) {
            Ok(probe) => probe.layout,
            Err(err) => {
                debug!("Probe capture failed ({err}), assuming {:?}", PixelLayout::default());
                PixelLayout::default()
            }
        };

        texture.allocate(size, layout);
        texture.upload(&CaptureFrame::checkerboard(size, layout, Instant::now()));

        Self {
            backend,
            target,
            size,
            layout,
            max_dimension,
            cropped,
            frame: None,
            limiter,
            failure_log: LogThrottle::new(FAILURE_LOG_WINDOW),
            status: CaptureStatus::Placeholder,
            logged_first_capture: false,
        }
    }

    pub fn refresh(&mut self, texture: &mut impl FrameTexture) -> RefreshOutcome {
        self.refresh_at(Instant::now(), texture)
    }

    /// One capture step at time `now`: throttle, follow resizes, capture, upload.
    pub fn refresh_at(&mut self, now: Instant, texture: &mut impl FrameTexture) -> RefreshOutcome {
        if !self.limiter.admit(now) {
            return RefreshOutcome::Throttled;
        }

        self.follow_resize(now, texture);

        let size = self.size;
        let result = self.backend.capture(size).and_then(|frame| {
            if frame.size == size {
                Ok(frame)
            } else {
                Err(CaptureError::SizeMismatch {
                    width: size.width,
                    height: size.height,
                    got_width: frame.size.width,
                    got_height: frame.size.height,
                })
            }
        });

        let mut frame = match result {
            Ok(frame) => frame,
            Err(err) => {
                if self.failure_log.allow(now) {
                    warn!("Capture failed: {err}");
                }
                if self.status == CaptureStatus::Live {
                    self.status = CaptureStatus::Stale;
                }
                return RefreshOutcome::Failed;
            }
        };

        if !self.logged_first_capture {
            info!(
                "First successful capture ({} bits per pixel)",
                frame.layout.bytes_per_pixel() * 8
            );
            self.logged_first_capture = true;
        }

        if frame.layout != self.layout {
            info!("Pixel layout changed: {:?} -> {:?}", self.layout, frame.layout);
            self.layout = frame.layout;
            texture.allocate(self.size, self.layout);
        }

        frame.captured_at = now;
        texture.upload(&frame);
        self.frame = Some(frame);
        self.status = CaptureStatus::Live;
        RefreshOutcome::Captured
    }

    fn follow_resize(&mut self, now: Instant, texture: &mut impl FrameTexture) {
        let geometry = match self.backend.geometry() {
            Ok(geometry) => geometry,
            Err(err) => {
                debug!("Surface size query failed: {err}");
                return;
            }
        };
        if !geometry.viewable || geometry.size.is_empty() {
            return;
        }

        let (size, cropped) = geometry.size.clamped_to(self.max_dimension);
        if size == self.size {
            return;
        }
        info!("Window size changed: {size}");
        if cropped && !self.cropped {
            warn!(
                "Capture size {} exceeds the maximum texture size {}; cropping",
                geometry.size, self.max_dimension
            );
        }
        self.size = size;
        self.cropped = cropped;
        texture.allocate(size, self.layout);
        texture.upload(&CaptureFrame::checkerboard(size, self.layout, now));
        self.status = CaptureStatus::Placeholder;
    }

    pub fn size(&self) -> FrameSize {
        self.size
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn status(&self) -> CaptureStatus {
        self.status
    }

    pub fn is_cropped(&self) -> bool {
        self.cropped
    }

    pub fn target(&self) -> ResolvedTarget {
        self.target
    }

    /// Latest accepted frame, if any capture has succeeded.
    pub fn frame(&self) -> Option<&CaptureFrame> {
        self.frame.as_ref()
    }

    pub fn summary(&self) -> CaptureSummary {
        CaptureSummary {
            size: self.size,
            status: self.status,
            cropped: self.cropped,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkerboard_alternates_in_64px_blocks() {
        let frame = CaptureFrame::checkerboard(FrameSize::new(130, 70), PixelLayout::Rgba32, Instant::now());
        let px = |x: usize, y: usize| frame.buffer[(y * 130 + x) * 4];
        assert_eq!(px(0, 0), CHECKER_DARK);
        assert_eq!(px(64, 0), CHECKER_LIGHT);
        assert_eq!(px(0, 64), CHECKER_LIGHT);
        assert_eq!(px(64, 64), CHECKER_DARK);
        assert_eq!(px(128, 0), CHECKER_DARK);
        assert_eq!(frame.buffer[3], 255);
    }

    #[test]
    fn checkerboard_matches_layout_width() {
        let frame = CaptureFrame::checkerboard(FrameSize::new(10, 4), PixelLayout::Rgb24, Instant::now());
        assert_eq!(frame.buffer.len(), 10 * 4 * 3);
        assert_eq!(frame.stride, 30);
    }

    #[test]
    fn rgb24_expands_with_opaque_alpha_and_drops_padding() {
        // 2x2 pixels, rows padded to 8 bytes.
        let buffer = vec![
            1, 2, 3, 4, 5, 6, 0, 0, //
            7, 8, 9, 10, 11, 12, 0, 0,
        ];
        let frame = CaptureFrame::new(FrameSize::new(2, 2), PixelLayout::Rgb24, 8, buffer, Instant::now())
            .unwrap();
        assert_eq!(
            frame.to_rgba32().as_ref(),
            &[1, 2, 3, 255, 4, 5, 6, 255, 7, 8, 9, 255, 10, 11, 12, 255]
        );
    }

    #[test]
    fn packed_rgba32_is_borrowed() {
        let buffer: Vec<u8> = (0..16).collect();
        let frame = CaptureFrame::new(FrameSize::new(2, 2), PixelLayout::Rgba32, 8, buffer.clone(), Instant::now())
            .unwrap();
        assert!(matches!(frame.to_rgba32(), Cow::Borrowed(_)));
        assert_eq!(frame.to_rgba32().as_ref(), buffer.as_slice());
    }

    #[test]
    fn short_buffers_are_rejected() {
        let result = CaptureFrame::new(FrameSize::new(4, 4), PixelLayout::Rgba32, 16, vec![0; 60], Instant::now());
        assert!(matches!(result, Err(CaptureError::ShortBuffer { .. })));
    }

    #[test]
    fn rate_limiter_spaces_admissions() {
        let t0 = Instant::now();
        let mut limiter = RateLimiter::from_fps(10);
        assert!(limiter.admit(t0));
        assert!(!limiter.admit(t0 + Duration::from_millis(50)));
        assert!(!limiter.admit(t0 + Duration::from_millis(99)));
        assert!(limiter.admit(t0 + Duration::from_millis(100)));
    }

    #[test]
    fn zero_fps_is_unthrottled() {
        let t0 = Instant::now();
        let mut limiter = RateLimiter::from_fps(0);
        assert!(limiter.admit(t0));
        assert!(limiter.admit(t0));
    }

    #[test]
    fn log_throttle_suppresses_within_window() {
        let t0 = Instant::now();
        let mut throttle = LogThrottle::new(FAILURE_LOG_WINDOW);
        assert!(throttle.allow(t0));
        assert!(!throttle.allow(t0 + Duration::from_secs(1)));
        assert!(!throttle.allow(t0 + Duration::from_secs(2)));
        assert!(throttle.allow(t0 + Duration::from_millis(2001)));
    }

    #[test]
    fn frame_size_clamping_reports_crop() {
        assert_eq!(FrameSize::new(100, 50).clamped_to(64), (FrameSize::new(64, 50), true));
        assert_eq!(FrameSize::new(10, 10).clamped_to(64), (FrameSize::new(10, 10), false));
        assert_eq!(FrameSize::new(101, 51).center(), (50, 25));
    }
}
