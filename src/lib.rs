//! Live desktop capture projected onto a sphere, cylinder or morph surface,
//! with pointer input mapped back onto the captured window.

pub mod app;
pub mod bridge;
pub mod camera;
pub mod capture;
pub mod config;
pub mod controls;
pub mod error;
pub mod mesh;
pub mod projection;
pub mod renderer;
pub mod root_find;
pub mod target;
