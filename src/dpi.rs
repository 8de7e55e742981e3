//! DPI adjustment of resolved rectangles
//!
//! Converts a logical rectangle into physical pixels per the entry's DPI
//! mode. Scale factors within 1% of identity are treated as 1.0 so a
//! standard-DPI setup never sees rounding noise.

use crate::config::DpiMode;
use crate::geometry::Rect;
use crate::platform::{WindowHandle, WindowSystem};

const BASE_DPI: f64 = 96.0;
const IDENTITY_BAND: f64 = 0.01;

/// Scale `rect` for the DPI the target window renders at.
pub fn adjust_for_dpi(
    windows: &dyn WindowSystem,
    rect: Rect,
    handle: WindowHandle,
    mode: DpiMode,
) -> Rect {
    let dpi = match mode {
        DpiMode::Logical => return rect,
        DpiMode::Auto => match windows.window_dpi(handle) {
            Some(dpi) => dpi,
            None => return rect,
        },
        DpiMode::Physical => windows
            .window_dpi(handle)
            .unwrap_or_else(|| windows.system_dpi()),
    };
    let scale = dpi as f64 / BASE_DPI;
    if (scale - 1.0).abs() < IDENTITY_BAND {
        return rect;
    }
    // Each component rounds independently.
    Rect::new(
        (rect.x as f64 * scale).round() as i32,
        (rect.y as f64 * scale).round() as i32,
        (rect.width as f64 * scale).round() as i32,
        (rect.height as f64 * scale).round() as i32,
    )
}
