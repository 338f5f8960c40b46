//! System tray surface.
//!
//! The tray runs on its own thread and talks to the rest of the program only
//! through the [`StopSignal`]: Quit raises it, nothing flows back.

use image::{Rgba, RgbaImage};
use thiserror::Error;

use crate::lifecycle::StopSignal;

mod menu;

pub use menu::MenuState;

// Windows gets a real notification-area icon
#[cfg(target_os = "windows")]
mod windows;
#[cfg(target_os = "windows")]
pub type PlatformTray = windows::WindowsTray;

// Everything else runs headless; Ctrl-C / SIGTERM still stop it
#[cfg(not(target_os = "windows"))]
mod headless;
#[cfg(not(target_os = "windows"))]
pub type PlatformTray = headless::HeadlessTray;

#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
pub const ICON_SIZE: u32 = 32;

#[derive(Debug, Error)]
pub enum TrayError {
    #[error("failed to build tray icon: {0}")]
    Build(String),

    #[error("failed to spawn tray thread: {0}")]
    Thread(#[from] std::io::Error),

    #[error("tray thread exited before reporting readiness")]
    Vanished,
}

pub trait Tray {
    /// Begin the tray's own run loop. Quit raises `stop`.
    fn start(&mut self, stop: StopSignal) -> Result<(), TrayError>;

    /// Tear the tray down. Safe to call more than once or without `start`.
    fn stop(&mut self);
}

#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
/// Tray icon: a filled disc with a play triangle knocked out of it
pub fn icon_rgba(size: u32) -> RgbaImage {
    let fill = Rgba([88, 101, 242, 255]);
    let clear = Rgba([0, 0, 0, 0]);

    let s = size as f32;
    let (cx, cy) = (s / 2.0, s / 2.0);
    let radius = s / 2.0 - 0.5;

    // Triangle pointing right, centred slightly right of the disc centre
    let left = s * 0.38;
    let right = s * 0.70;
    let half_height = s * 0.18;

    RgbaImage::from_fn(size, size, |x, y| {
        let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
        let inside_disc = (px - cx).powi(2) + (py - cy).powi(2) <= radius * radius;
        if !inside_disc {
            return clear;
        }

        let in_triangle = px >= left && px <= right && {
            let reach = half_height * (right - px) / (right - left);
            (py - cy).abs() <= reach
        };
        if in_triangle {
            clear
        } else {
            fill
        }
    })
}
