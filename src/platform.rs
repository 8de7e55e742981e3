//! OS capability interface consumed by the core
//!
//! The resolution/targeting/recording logic never talks to the OS directly;
//! it goes through these traits. The real backend lives in `x11.rs`, tests
//! use the mocks at the bottom of this file.

use std::time::Duration;

use crate::config::{SwpFlag, ZOrder};
use crate::errors::Result;
use crate::geometry::{Rect, WorkArea};

pub type WindowHandle = u64;

/// One display with its usable region.
#[derive(Debug, Clone)]
pub struct Monitor {
    pub index: usize,
    /// Stable device identifier (output name on X11, e.g. "DP-1").
    pub device: String,
    pub work_area: WorkArea,
}

/// A process as seen by the process capability.
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    /// Monotonic-comparable start stamp; newer processes have larger values.
    pub start_time: u64,
    pub main_window: Option<WindowHandle>,
}

/// A targeted window: process identity plus a currently-visible handle.
/// Recomputed on every apply attempt, never cached across retries.
#[derive(Debug, Clone)]
pub struct WindowTarget {
    pub handle: WindowHandle,
    pub pid: u32,
    pub process_name: String,
    pub start_time: u64,
}

/// What to start when `ensureRunning` finds no instance.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub path: String,
    pub args: Option<String>,
    pub working_dir: Option<String>,
    pub elevated: bool,
}

/// Window-manipulation primitives.
pub trait WindowSystem {
    fn enumerate_top_level(&self) -> anyhow::Result<Vec<WindowHandle>>;
    fn is_visible(&self, handle: WindowHandle) -> bool;
    fn is_minimized(&self, handle: WindowHandle) -> bool;
    fn title(&self, handle: WindowHandle) -> String;
    fn rect(&self, handle: WindowHandle) -> Option<Rect>;
    fn owning_pid(&self, handle: WindowHandle) -> Option<u32>;
    fn restore(&self, handle: WindowHandle) -> Result<()>;
    fn move_window(&self, handle: WindowHandle, rect: Rect) -> Result<()>;
    fn set_window_pos(
        &self,
        handle: WindowHandle,
        insert_after: ZOrder,
        rect: Rect,
        flags: &[SwpFlag],
    ) -> Result<()>;
    /// DPI the window itself renders at, where the OS exposes one.
    fn window_dpi(&self, handle: WindowHandle) -> Option<u32>;
    fn system_dpi(&self) -> u32;
    fn monitors(&self) -> anyhow::Result<Vec<Monitor>>;
}

/// Process enumeration and launch primitives.
pub trait ProcessSystem {
    fn find_by_name(&self, name: &str) -> Vec<ProcessInfo>;
    fn name_of_pid(&self, pid: u32) -> Option<String>;
    fn is_running(&self, name: &str) -> bool;
    fn launch(&self, spec: &LaunchSpec) -> Result<()>;
}

/// Injectable sleep so retry loops are testable without real delays.
pub trait Clock {
    fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Case-insensitive process-name comparison. A trailing `.exe` on either
/// side is ignored so configs recorded on Windows keep matching here.
pub fn names_equal(a: &str, b: &str) -> bool {
    let strip = |s: &str| {
        let lower = s.to_ascii_lowercase();
        lower
            .strip_suffix(".exe")
            .map(str::to_string)
            .unwrap_or(lower)
    };
    strip(a) == strip(b)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_equal_ignores_case_and_exe_suffix() {
        assert!(names_equal("Chrome", "chrome"));
        assert!(names_equal("chrome.exe", "chrome"));
        assert!(names_equal("CHROME.EXE", "Chrome"));
        assert!(!names_equal("chrome", "chromium"));
    }
}
