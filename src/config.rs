// config.rs — command line and environment options

use std::fmt;
use std::num::ParseIntError;

use clap::Parser;

use crate::capture::CaptureSettings;
use crate::projection::{
    ProjectionMode, ProjectionParams, DEFAULT_SPHERICITY, DEFAULT_THETA_MAX_DEG,
};
use crate::target::TargetSpec;

/// Raw options. Every flag can also come from the environment; the flag wins.
/// Values stay strings here so that a bad one degrades to a warning instead
/// of refusing to start.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about = "Live desktop capture on a sphere, cylinder or morph surface")]
pub struct Cli {
    /// sphere, sphere_clamp, cylinder or morph
    #[arg(long, env = "PROJECTION_MODE")]
    pub projection_mode: Option<String>,
    /// Half-angle of the sphere_clamp band, in degrees (1 to 89.9)
    #[arg(long, env = "SPHERE_THETA_MAX_DEG")]
    pub theta_max_deg: Option<String>,
    /// Initial morph factor: 0 is a cylinder, 1 a sphere
    #[arg(long, env = "SPHERICITY")]
    pub sphericity: Option<String>,
    /// Capture rate limit in frames per second; 0 captures every frame
    #[arg(long, env = "CAPTURE_FPS")]
    pub capture_fps: Option<String>,
    /// Window to capture, decimal or 0x-prefixed hex
    #[arg(long, env = "TARGET_WINDOW_ID")]
    pub target_window_id: Option<String>,
    /// Capture the first window whose title contains this text
    #[arg(long, env = "TARGET_WINDOW_NAME")]
    pub target_window_name: Option<String>,
    /// Forward mouse clicks on the surface to the captured window (0/false/off/no to disable)
    #[arg(long, env = "SPHERE_MOUSE")]
    pub sphere_mouse: Option<String>,
    /// X display to capture from; defaults to $DISPLAY
    #[arg(long, env = "CAPTURE_DISPLAY")]
    pub capture_display: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub mode: ProjectionMode,
    pub params: ProjectionParams,
    pub capture_fps: u32,
    pub target: TargetSpec,
    pub pointer_mapping: bool,
    pub capture_display: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: ProjectionMode::default(),
            params: ProjectionParams::default(),
            capture_fps: 0,
            target: TargetSpec::default(),
            pointer_mapping: true,
            capture_display: None,
        }
    }
}

/// An option value that could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub option: &'static str,
    pub value: String,
    pub fallback: String,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unknown {}='{}', using '{}'",
            self.option, self.value, self.fallback
        )
    }
}

impl Settings {
    /// Turns raw options into settings. Never fails; unusable values fall
    /// back to their defaults and are reported as warnings.
    pub fn resolve(cli: &Cli) -> (Settings, Vec<ConfigWarning>) {
        let mut warnings = Vec::new();
        let mut warn = |option: &'static str, value: &str, fallback: String| {
            warnings.push(ConfigWarning {
                option,
                value: value.to_string(),
                fallback,
            });
        };

        let mode = match present(&cli.projection_mode) {
            None => ProjectionMode::default(),
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn("PROJECTION_MODE", raw, ProjectionMode::default().to_string());
                ProjectionMode::default()
            }),
        };

        let theta_max_deg = parse_or(&cli.theta_max_deg, DEFAULT_THETA_MAX_DEG)
            .unwrap_or_else(|raw| {
                warn("SPHERE_THETA_MAX_DEG", raw, DEFAULT_THETA_MAX_DEG.to_string());
                DEFAULT_THETA_MAX_DEG
            });
        let sphericity = parse_or(&cli.sphericity, DEFAULT_SPHERICITY).unwrap_or_else(|raw| {
            warn("SPHERICITY", raw, DEFAULT_SPHERICITY.to_string());
            DEFAULT_SPHERICITY
        });

        let capture_fps = parse_or(&cli.capture_fps, 0i64)
            .unwrap_or_else(|raw| {
                warn("CAPTURE_FPS", raw, "0".to_string());
                0
            })
            .clamp(0, i64::from(u32::MAX)) as u32;

        let window_id = present(&cli.target_window_id).and_then(|raw| match parse_window_id(raw) {
            Ok(id) => (id != 0).then_some(id),
            Err(_) => {
                warn("TARGET_WINDOW_ID", raw, "none".to_string());
                None
            }
        });

        let pointer_mapping = match present(&cli.sphere_mouse) {
            None => true,
            Some(raw) => parse_switch(raw).unwrap_or_else(|| {
                warn("SPHERE_MOUSE", raw, "1".to_string());
                true
            }),
        };

        let settings = Settings {
            mode,
            params: ProjectionParams::new(theta_max_deg, sphericity),
            capture_fps,
            target: TargetSpec {
                window_id,
                title_filter: present(&cli.target_window_name).map(str::to_string),
            },
            pointer_mapping,
            capture_display: present(&cli.capture_display).map(str::to_string),
        };
        (settings, warnings)
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            target: self.target.clone(),
            capture_fps: self.capture_fps,
        }
    }
}

/// Empty values count as absent.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// `Ok(default)` when absent, `Err(raw)` when present but unparseable.
fn parse_or<'a, T: std::str::FromStr>(value: &'a Option<String>, default: T) -> Result<T, &'a str> {
    match present(value) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| raw),
    }
}

/// Decimal or `0x` hex.
fn parse_window_id(raw: &str) -> Result<u32, ParseIntError> {
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => raw.parse(),
    }
}

fn parse_switch(raw: &str) -> Option<bool> {
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n != 0);
    }
    match raw.to_ascii_lowercase().as_str() {
        "false" | "off" | "no" => Some(false),
        "true" | "on" | "yes" => Some(true),
        _ => None,
    }
}
