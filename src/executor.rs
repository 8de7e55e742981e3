//! Move executor: put a targeted window at its resolved rectangle
//!
//! Restores a minimized window first, then positions it with either the
//! plain move primitive (implicitly raises) or the extended call with an
//! explicit flag set and z-order token. Dry-run reports without touching
//! the OS. A failed call is fatal for the entry only.

use tracing::{debug, info};

use crate::config::{LayoutEntry, default_swp_flags};
use crate::errors::Result;
use crate::geometry::Rect;
use crate::platform::{WindowHandle, WindowSystem};

pub fn apply_rect(
    windows: &dyn WindowSystem,
    handle: WindowHandle,
    rect: Rect,
    entry: &LayoutEntry,
    dry_run: bool,
) -> Result<()> {
    let process = entry.process_name.as_deref().unwrap_or_default();
    if dry_run {
        info!(
            process = %process,
            handle,
            x = rect.x,
            y = rect.y,
            width = rect.width,
            height = rect.height,
            "dry-run: would move window"
        );
        return Ok(());
    }

    if windows.is_minimized(handle) {
        debug!(process = %process, handle, "restoring minimized window");
        windows.restore(handle)?;
    }

    if entry.use_set_window_pos.unwrap_or(false) {
        let flags = entry
            .set_window_pos_flags
            .clone()
            .unwrap_or_else(default_swp_flags);
        let z_order = entry.z_order.unwrap_or_default();
        windows.set_window_pos(handle, z_order, rect, &flags)?;
    } else {
        windows.move_window(handle, rect)?;
    }
    info!(
        process = %process,
        handle,
        x = rect.x,
        y = rect.y,
        width = rect.width,
        height = rect.height,
        "moved window"
    );
    Ok(())
}
