// error.rs — error types shared by the capture, target and input modules

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// The capture display could not be opened. Fatal at startup.
    #[error("failed to connect to capture display {display}")]
    Connect {
        display: String,
        #[source]
        source: BoxError,
    },
    #[error("{what} request failed")]
    Request {
        what: &'static str,
        #[source]
        source: BoxError,
    },
    #[error("unsupported pixel format ({bits_per_pixel} bits per pixel)")]
    UnsupportedFormat { bits_per_pixel: u8 },
    #[error("capture returned {got_width}x{got_height}, expected {width}x{height}")]
    SizeMismatch {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },
    #[error("capture buffer too short: {len} bytes for {rows} rows of stride {stride}")]
    ShortBuffer { len: usize, rows: u32, stride: usize },
}

impl CaptureError {
    pub fn request(what: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Request {
            what,
            source: source.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum InjectError {
    #[error("cannot translate surface point ({x}, {y}) to desktop coordinates")]
    Translate { x: u32, y: u32 },
    #[error("pointer injection failed")]
    Inject(#[source] BoxError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown projection mode '{0}'")]
pub struct UnknownProjectionMode(pub String);
