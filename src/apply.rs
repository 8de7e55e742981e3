//! Apply run: config selection -> targeting -> geometry -> DPI -> move
//!
//! Each entry runs inside a recoverable boundary: merge errors, geometry
//! errors, launch failures and OS call failures are logged and the run
//! moves on. Only failures before entry iteration begins (unreadable
//! config, unknown requested bundle, no monitors) abort the run.

use std::time::Duration;

use anyhow::bail;
use tracing::{info, warn};

use crate::config::{Config, LayoutEntry, resolve_entry};
use crate::dpi::adjust_for_dpi;
use crate::errors::Result;
use crate::executor::apply_rect;
use crate::geometry::compute_rect;
use crate::platform::{Clock, Monitor, ProcessSystem, WindowSystem};
use crate::recorder::owning_monitor;
use crate::target::{ensure_running, retry_budget, wait_for_window};

#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Apply only this named bundle.
    pub bundle: Option<String>,
    /// Resolve and report rectangles without touching any window.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub applied: usize,
    pub skipped: usize,
}

pub fn apply_config(
    config: &Config,
    options: &ApplyOptions,
    windows: &dyn WindowSystem,
    processes: &dyn ProcessSystem,
    clock: &dyn Clock,
) -> anyhow::Result<ApplyOutcome> {
    let selection = config.select_entries(options.bundle.as_deref())?;
    let monitors = windows.monitors()?;
    if monitors.is_empty() {
        bail!("no monitors reported by the window system");
    }
    info!(
        entries = selection.entries.len(),
        monitors = monitors.len(),
        dry_run = options.dry_run,
        "applying layout"
    );

    let mut outcome = ApplyOutcome::default();
    for (index, raw) in selection.entries.iter().enumerate() {
        let label = raw.process_name.as_deref().unwrap_or("<unnamed>");
        match apply_entry(
            raw,
            &selection.defaults,
            &monitors,
            windows,
            processes,
            clock,
            options.dry_run,
        ) {
            Ok(true) => outcome.applied += 1,
            Ok(false) => {
                warn!(entry = index, process = %label, "no window found within retry budget, skipping");
                outcome.skipped += 1;
            }
            Err(e) => {
                warn!(entry = index, process = %label, error = %e, "entry failed, continuing");
                outcome.skipped += 1;
            }
        }
    }
    info!(
        applied = outcome.applied,
        skipped = outcome.skipped,
        "apply run finished"
    );
    Ok(outcome)
}

/// Run the full pipeline for one entry. Ok(false) means the targeting
/// budget ran out, which is a skip rather than an error.
fn apply_entry(
    raw: &LayoutEntry,
    defaults: &LayoutEntry,
    monitors: &[Monitor],
    windows: &dyn WindowSystem,
    processes: &dyn ProcessSystem,
    clock: &dyn Clock,
    dry_run: bool,
) -> Result<bool> {
    let entry = resolve_entry(raw, defaults)?;
    let process_name = entry.process_name.clone().unwrap_or_default();
    let budget = retry_budget(&entry)?;

    if let Some(wait) = entry.wait_for_seconds {
        if wait > 0.0 {
            clock.sleep(Duration::from_secs_f64(wait));
        }
    }
    ensure_running(processes, clock, &entry)?;

    let Some(target) = wait_for_window(
        windows,
        processes,
        clock,
        &process_name,
        entry.window_title_pattern.as_deref(),
        budget,
    ) else {
        return Ok(false);
    };

    let monitor = select_monitor(monitors, &entry, windows, target.handle);
    let work_area = monitor.work_area.padded(entry.pad.unwrap_or(0));
    let rect = compute_rect(&entry, &work_area)?;
    let rect = adjust_for_dpi(windows, rect, target.handle, entry.dpi_mode.unwrap_or_default());
    apply_rect(windows, target.handle, rect, &entry, dry_run)?;
    Ok(true)
}

/// `monitorIndex` if valid, else the monitor currently owning the window,
/// else the first monitor.
fn select_monitor<'a>(
    monitors: &'a [Monitor],
    entry: &LayoutEntry,
    windows: &dyn WindowSystem,
    handle: u64,
) -> &'a Monitor {
    if let Some(index) = entry.monitor_index {
        if let Some(monitor) = monitors.get(index) {
            return monitor;
        }
        warn!(index, available = monitors.len(), "monitorIndex out of range, using window's monitor");
    }
    match windows.rect(handle) {
        Some(rect) => owning_monitor(monitors, &rect),
        None => &monitors[0],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Rect, WorkArea};
    use crate::platform::ProcessInfo;
    use crate::platform::mock::{MockClock, MockProcessSystem, MockWindow, MockWindowSystem};

    fn process(pid: u32, name: &str, window: Option<u64>) -> ProcessInfo {
        ProcessInfo {
            pid,
            name: name.to_string(),
            start_time: pid as u64,
            main_window: window,
        }
    }

    fn fixture() -> (MockWindowSystem, MockProcessSystem, MockClock) {
        let windows = MockWindowSystem::new(vec![
            MockWindow::new(1, "editor", Rect::new(0, 0, 800, 600)),
            MockWindow::new(2, "browser", Rect::new(100, 100, 800, 600)),
        ]);
        let processes = MockProcessSystem {
            processes: vec![
                process(100, "code", Some(1)),
                process(101, "chrome", Some(2)),
            ],
            ..MockProcessSystem::default()
        };
        (windows, processes, MockClock::default())
    }

    #[test]
    fn test_apply_moves_each_entry() {
        let (windows, processes, clock) = fixture();
        let config: Config = serde_json::from_str(
            r#"[
                {"processName": "code", "preset": "LeftHalf"},
                {"processName": "chrome", "preset": "RightHalf"}
            ]"#,
        )
        .unwrap();
        let outcome =
            apply_config(&config, &ApplyOptions::default(), &windows, &processes, &clock).unwrap();
        assert_eq!(outcome, ApplyOutcome { applied: 2, skipped: 0 });
        let moves = windows.moves.borrow();
        assert_eq!(moves[0], (1, Rect::new(0, 0, 960, 1080)));
        assert_eq!(moves[1], (2, Rect::new(960, 0, 960, 1080)));
    }

    #[test]
    fn test_bad_entry_skipped_rest_applied() {
        let (windows, processes, clock) = fixture();
        let config: Config = serde_json::from_str(
            r#"[
                {"anchor": "Left"},
                {"processName": "code", "grid": "oops", "cell": "1,1"},
                {"processName": "chrome", "preset": "RightHalf"}
            ]"#,
        )
        .unwrap();
        let outcome =
            apply_config(&config, &ApplyOptions::default(), &windows, &processes, &clock).unwrap();
        assert_eq!(outcome, ApplyOutcome { applied: 1, skipped: 2 });
        assert_eq!(windows.moves.borrow().len(), 1);
    }

    #[test]
    fn test_targeting_timeout_is_a_skip_not_an_error() {
        let (windows, processes, clock) = fixture();
        let config: Config = serde_json::from_str(
            r#"[{"processName": "ghost", "retryCount": 2, "retryDelaySeconds": 0.5}]"#,
        )
        .unwrap();
        let outcome =
            apply_config(&config, &ApplyOptions::default(), &windows, &processes, &clock).unwrap();
        assert_eq!(outcome, ApplyOutcome { applied: 0, skipped: 1 });
        // 3 attempts, 2 sleeps of the configured delay.
        assert_eq!(clock.sleeps.borrow().len(), 2);
        assert_eq!(clock.sleeps.borrow()[0], Duration::from_millis(500));
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let (windows, processes, clock) = fixture();
        let config: Config =
            serde_json::from_str(r#"[{"processName": "code", "preset": "Maximized"}]"#).unwrap();
        let options = ApplyOptions {
            dry_run: true,
            ..ApplyOptions::default()
        };
        let outcome = apply_config(&config, &options, &windows, &processes, &clock).unwrap();
        assert_eq!(outcome.applied, 1);
        assert!(windows.moves.borrow().is_empty());
        assert!(windows.positioned.borrow().is_empty());
    }

    #[test]
    fn test_unknown_requested_bundle_aborts() {
        let (windows, processes, clock) = fixture();
        let config: Config = serde_json::from_str(r#"[{"processName": "code"}]"#).unwrap();
        let options = ApplyOptions {
            bundle: Some("work".to_string()),
            ..ApplyOptions::default()
        };
        assert!(apply_config(&config, &options, &windows, &processes, &clock).is_err());
        assert!(windows.moves.borrow().is_empty());
    }

    #[test]
    fn test_bundle_defaults_flow_into_entries() {
        let (mut windows, processes, clock) = fixture();
        windows.monitor_list.push(Monitor {
            index: 1,
            device: "HDMI-1".to_string(),
            work_area: WorkArea::new(1920, 0, 3840, 1080),
        });
        let config: Config = serde_json::from_str(
            r#"{
                "bundleDefaults": {"monitorIndex": 1, "pad": 10},
                "bundles": {"work": [{"processName": "code", "preset": "LeftHalf"}]},
                "applyBundles": ["work"]
            }"#,
        )
        .unwrap();
        let outcome =
            apply_config(&config, &ApplyOptions::default(), &windows, &processes, &clock).unwrap();
        assert_eq!(outcome.applied, 1);
        let moves = windows.moves.borrow();
        // Padded second-monitor work area (1930..3830, 10..1070), left half.
        assert_eq!(moves[0], (1, Rect::new(1930, 10, 950, 1060)));
    }

    #[test]
    fn test_out_of_range_monitor_index_falls_back_to_window_monitor() {
        let (windows, processes, clock) = fixture();
        let config: Config = serde_json::from_str(
            r#"[{"processName": "code", "monitorIndex": 9, "preset": "TopHalf"}]"#,
        )
        .unwrap();
        let outcome =
            apply_config(&config, &ApplyOptions::default(), &windows, &processes, &clock).unwrap();
        assert_eq!(outcome.applied, 1);
        assert_eq!(windows.moves.borrow()[0].1, Rect::new(0, 0, 1920, 540));
    }
}
