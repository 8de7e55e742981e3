//! Window targeting: find (or wait for) the right window for a process
//!
//! Each attempt enumerates processes fresh, filters to visible main windows
//! matching the optional title pattern, and prefers the most recently
//! started instance. Attempts are bounded; running out of budget is a skip
//! for the caller, not an error. Sleeps go through the injected `Clock`.

use std::time::Duration;

use tracing::{debug, info};

use crate::config::LayoutEntry;
use crate::errors::{Error, Result};
use crate::platform::{Clock, LaunchSpec, ProcessSystem, WindowSystem, WindowTarget};

pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_RETRY_DELAY_SECONDS: f64 = 1.0;

/// Bounded wait: total attempt count and the delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryBudget {
    pub attempts: u32,
    pub delay: Duration,
}

/// Derive the retry budget for an entry.
///
/// `launchTimeoutSeconds` expresses the budget as a time span and overrides
/// `retryCount` as ceil(timeout / delay). Combining it with a zero retry
/// delay is rejected rather than guessed at.
pub fn retry_budget(entry: &LayoutEntry) -> Result<RetryBudget> {
    let delay_secs = entry
        .retry_delay_seconds
        .unwrap_or(DEFAULT_RETRY_DELAY_SECONDS)
        .max(0.0);
    let retries = match entry.launch_timeout_seconds {
        Some(timeout) if delay_secs > 0.0 => (timeout / delay_secs).ceil() as u32,
        Some(_) => {
            return Err(Error::Config(
                "launchTimeoutSeconds requires retryDelaySeconds > 0".to_string(),
            ));
        }
        None => entry.retry_count.unwrap_or(DEFAULT_RETRY_COUNT),
    };
    Ok(RetryBudget {
        attempts: retries + 1,
        delay: Duration::from_secs_f64(delay_secs),
    })
}

/// Search for a visible top-level window owned by `process_name`.
///
/// Returns None once the budget is exhausted; the caller logs and skips.
pub fn wait_for_window(
    windows: &dyn WindowSystem,
    processes: &dyn ProcessSystem,
    clock: &dyn Clock,
    process_name: &str,
    title_pattern: Option<&str>,
    budget: RetryBudget,
) -> Option<WindowTarget> {
    for attempt in 1..=budget.attempts {
        if let Some(target) = find_window(windows, processes, process_name, title_pattern) {
            info!(
                process = %process_name,
                handle = target.handle,
                pid = target.pid,
                attempt,
                "targeted window"
            );
            return Some(target);
        }
        debug!(process = %process_name, attempt, of = budget.attempts, "window not visible yet");
        if attempt < budget.attempts {
            clock.sleep(budget.delay);
        }
    }
    None
}

/// One search pass. Candidates are ordered by process start time, most
/// recent first, so a freshly launched instance beats a stale one.
fn find_window(
    windows: &dyn WindowSystem,
    processes: &dyn ProcessSystem,
    process_name: &str,
    title_pattern: Option<&str>,
) -> Option<WindowTarget> {
    let mut candidates: Vec<_> = processes
        .find_by_name(process_name)
        .into_iter()
        .filter_map(|info| info.main_window.map(|handle| (info, handle)))
        .filter(|(_, handle)| match title_pattern {
            Some(pattern) => windows
                .title(*handle)
                .to_lowercase()
                .contains(&pattern.to_lowercase()),
            None => true,
        })
        .filter(|(_, handle)| windows.is_visible(*handle))
        .collect();
    candidates.sort_by(|a, b| b.0.start_time.cmp(&a.0.start_time));
    candidates.into_iter().next().map(|(info, handle)| WindowTarget {
        handle,
        pid: info.pid,
        process_name: info.name,
        start_time: info.start_time,
    })
}

/// Start the entry's process if `ensureRunning` is set and no instance is
/// up, then honor the post-launch pause. Environment variables in the
/// launch path/args/cwd are expanded.
pub fn ensure_running(
    processes: &dyn ProcessSystem,
    clock: &dyn Clock,
    entry: &LayoutEntry,
) -> Result<()> {
    if !entry.ensure_running.unwrap_or(false) {
        return Ok(());
    }
    let name = entry.process_name.as_deref().unwrap_or_default();
    if processes.is_running(name) {
        debug!(process = %name, "already running, no launch needed");
        return Ok(());
    }
    let path = entry
        .launch_path
        .as_deref()
        .ok_or_else(|| Error::Config(format!("ensureRunning set for '{name}' without launchPath")))?;
    let spec = LaunchSpec {
        path: expand(path)?,
        args: entry.launch_args.as_deref().map(expand).transpose()?,
        working_dir: entry.launch_working_dir.as_deref().map(expand).transpose()?,
        elevated: entry.launch_as_user.unwrap_or(false),
    };
    info!(process = %name, path = %spec.path, "launching");
    processes.launch(&spec)?;
    if let Some(delay) = entry.post_launch_delay_seconds {
        if delay > 0.0 {
            clock.sleep(Duration::from_secs_f64(delay));
        }
    }
    Ok(())
}

fn expand(raw: &str) -> Result<String> {
    shellexpand::env(raw)
        .map(|expanded| expanded.into_owned())
        .map_err(|e| Error::Launch(format!("cannot expand '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::platform::ProcessInfo;
    use crate::platform::mock::{MockClock, MockProcessSystem, MockWindow, MockWindowSystem};

    fn process(pid: u32, name: &str, start_time: u64, window: Option<u64>) -> ProcessInfo {
        ProcessInfo {
            pid,
            name: name.to_string(),
            start_time,
            main_window: window,
        }
    }

    fn entry_with(name: &str) -> LayoutEntry {
        LayoutEntry {
            process_name: Some(name.to_string()),
            ..LayoutEntry::default()
        }
    }

    #[test]
    fn test_budget_defaults() {
        let budget = retry_budget(&entry_with("a")).unwrap();
        assert_eq!(budget.attempts, DEFAULT_RETRY_COUNT + 1);
        assert_eq!(budget.delay, Duration::from_secs(1));
    }

    #[test]
    fn test_budget_launch_timeout_overrides_retry_count() {
        let mut entry = entry_with("a");
        entry.retry_count = Some(99);
        entry.retry_delay_seconds = Some(2.0);
        entry.launch_timeout_seconds = Some(5.0);
        let budget = retry_budget(&entry).unwrap();
        // ceil(5/2) = 3 retries, 4 attempts total.
        assert_eq!(budget.attempts, 4);
    }

    #[test]
    fn test_budget_timeout_with_zero_delay_is_config_error() {
        let mut entry = entry_with("a");
        entry.retry_delay_seconds = Some(0.0);
        entry.launch_timeout_seconds = Some(5.0);
        assert!(matches!(retry_budget(&entry), Err(Error::Config(_))));
    }

    #[test]
    fn test_window_never_visible_makes_exactly_four_attempts() {
        let windows = MockWindowSystem::new(vec![]);
        let processes = MockProcessSystem::default();
        let clock = MockClock::default();
        let budget = RetryBudget {
            attempts: 4,
            delay: Duration::from_secs(1),
        };
        let target = wait_for_window(&windows, &processes, &clock, "ghost", None, budget);
        assert!(target.is_none());
        assert_eq!(processes.queries.get(), 4);
        // No sleep after the final attempt.
        assert_eq!(clock.sleeps.borrow().len(), 3);
    }

    #[test]
    fn test_found_on_first_attempt_does_not_sleep() {
        let windows =
            MockWindowSystem::new(vec![MockWindow::new(7, "editor", Rect::new(0, 0, 800, 600))]);
        let processes = MockProcessSystem {
            processes: vec![process(42, "code", 10, Some(7))],
            ..MockProcessSystem::default()
        };
        let clock = MockClock::default();
        let budget = retry_budget(&entry_with("code")).unwrap();
        let target = wait_for_window(&windows, &processes, &clock, "code", None, budget).unwrap();
        assert_eq!(target.handle, 7);
        assert_eq!(processes.queries.get(), 1);
        assert!(clock.sleeps.borrow().is_empty());
    }

    #[test]
    fn test_most_recent_instance_wins() {
        let windows = MockWindowSystem::new(vec![
            MockWindow::new(1, "old", Rect::new(0, 0, 100, 100)),
            MockWindow::new(2, "new", Rect::new(0, 0, 100, 100)),
        ]);
        let processes = MockProcessSystem {
            processes: vec![
                process(10, "app", 100, Some(1)),
                process(11, "app", 200, Some(2)),
            ],
            ..MockProcessSystem::default()
        };
        let clock = MockClock::default();
        let budget = retry_budget(&entry_with("app")).unwrap();
        let target = wait_for_window(&windows, &processes, &clock, "app", None, budget).unwrap();
        assert_eq!(target.handle, 2);
        assert_eq!(target.pid, 11);
    }

    #[test]
    fn test_title_pattern_filters_candidates() {
        let windows = MockWindowSystem::new(vec![
            MockWindow::new(1, "project — Editor", Rect::new(0, 0, 100, 100)),
            MockWindow::new(2, "Scratch", Rect::new(0, 0, 100, 100)),
        ]);
        let processes = MockProcessSystem {
            processes: vec![
                process(10, "app", 200, Some(2)),
                process(11, "app", 100, Some(1)),
            ],
            ..MockProcessSystem::default()
        };
        let clock = MockClock::default();
        let budget = retry_budget(&entry_with("app")).unwrap();
        let target =
            wait_for_window(&windows, &processes, &clock, "app", Some("editor"), budget).unwrap();
        assert_eq!(target.handle, 1);
    }

    #[test]
    fn test_invisible_window_is_not_a_candidate() {
        let mut window = MockWindow::new(1, "app", Rect::new(0, 0, 100, 100));
        window.visible = false;
        let windows = MockWindowSystem::new(vec![window]);
        let processes = MockProcessSystem {
            processes: vec![process(10, "app", 100, Some(1))],
            ..MockProcessSystem::default()
        };
        let clock = MockClock::default();
        let budget = RetryBudget {
            attempts: 2,
            delay: Duration::from_millis(10),
        };
        assert!(wait_for_window(&windows, &processes, &clock, "app", None, budget).is_none());
    }

    #[test]
    fn test_ensure_running_launches_when_absent() {
        let processes = MockProcessSystem::default();
        let clock = MockClock::default();
        let mut entry = entry_with("slack");
        entry.ensure_running = Some(true);
        entry.launch_path = Some("/usr/bin/slack".to_string());
        entry.post_launch_delay_seconds = Some(2.0);
        ensure_running(&processes, &clock, &entry).unwrap();
        assert_eq!(processes.launched.borrow().len(), 1);
        assert_eq!(clock.sleeps.borrow().as_slice(), [Duration::from_secs(2)]);
    }

    #[test]
    fn test_ensure_running_skips_when_already_up() {
        let processes = MockProcessSystem {
            processes: vec![process(10, "slack", 100, None)],
            ..MockProcessSystem::default()
        };
        let clock = MockClock::default();
        let mut entry = entry_with("slack");
        entry.ensure_running = Some(true);
        entry.launch_path = Some("/usr/bin/slack".to_string());
        ensure_running(&processes, &clock, &entry).unwrap();
        assert!(processes.launched.borrow().is_empty());
    }

    #[test]
    fn test_ensure_running_without_path_is_config_error() {
        let processes = MockProcessSystem::default();
        let clock = MockClock::default();
        let mut entry = entry_with("slack");
        entry.ensure_running = Some(true);
        assert!(matches!(
            ensure_running(&processes, &clock, &entry),
            Err(Error::Config(_))
        ));
    }
}
