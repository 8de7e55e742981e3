//! Recording: turn a live window enumeration into a stable entry list
//!
//! Enumerates every top-level window, filters down to the ones worth
//! persisting, rewrites coordinates relative to each window's owning
//! monitor, and sorts deterministically so repeated recordings diff
//! cleanly. Deduplication collapses each group to its largest member.

use std::collections::HashMap;

use anyhow::{Context, bail};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::Rect;
use crate::platform::{Monitor, ProcessSystem, WindowSystem, names_equal};

/// Grouping key for deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DedupKey {
    Process,
    ProcessTitle,
    Monitor,
    ProcessMonitor,
    ProcessTitleMonitor,
}

/// Which monitor identity feeds the dedup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum MonitorKey {
    #[default]
    Index,
    Device,
}

/// One recorded window. `x`/`y` are relative to the owning monitor's
/// work-area origin. `area` only ranks dedup candidates and is never
/// serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedEntry {
    pub process_name: String,
    pub title: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub monitor_index: usize,
    pub monitor_device: String,
    #[serde(skip)]
    pub area: i64,
}

/// Filters applied while recording.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    /// Keep only these process names (empty = keep all).
    pub include: Vec<String>,
    /// Drop these process names.
    pub exclude: Vec<String>,
    pub include_minimized: bool,
}

/// Enumerate, filter and order the current window arrangement.
pub fn record(
    windows: &dyn WindowSystem,
    processes: &dyn ProcessSystem,
    filter: &RecordFilter,
) -> anyhow::Result<Vec<RecordedEntry>> {
    let monitors = windows.monitors().context("cannot enumerate monitors")?;
    if monitors.is_empty() {
        bail!("no monitors reported by the window system");
    }

    let mut entries = Vec::new();
    for handle in windows.enumerate_top_level()? {
        if !windows.is_visible(handle) {
            continue;
        }
        let title = windows.title(handle);
        if title.is_empty() {
            continue;
        }
        let Some(pid) = windows.owning_pid(handle) else {
            debug!(handle, "no owning process, skipping");
            continue;
        };
        let Some(process_name) = processes.name_of_pid(pid) else {
            debug!(handle, pid, "owning process not resolvable, skipping");
            continue;
        };
        if !filter.include.is_empty()
            && !filter.include.iter().any(|n| names_equal(n, &process_name))
        {
            continue;
        }
        if filter.exclude.iter().any(|n| names_equal(n, &process_name)) {
            continue;
        }
        let Some(rect) = windows.rect(handle) else {
            continue;
        };
        if rect.width <= 0 || rect.height <= 0 {
            continue;
        }
        if !filter.include_minimized && windows.is_minimized(handle) {
            continue;
        }

        let monitor = owning_monitor(&monitors, &rect);
        entries.push(RecordedEntry {
            process_name,
            title,
            x: rect.x - monitor.work_area.left,
            y: rect.y - monitor.work_area.top,
            width: rect.width,
            height: rect.height,
            monitor_index: monitor.index,
            monitor_device: monitor.device.clone(),
            area: rect.area(),
        });
    }

    sort_entries(&mut entries);
    Ok(entries)
}

/// The monitor whose work area contains the window's center, else the
/// first monitor.
pub(crate) fn owning_monitor<'a>(monitors: &'a [Monitor], rect: &Rect) -> &'a Monitor {
    let (cx, cy) = rect.center();
    monitors
        .iter()
        .find(|m| m.work_area.contains_point(cx, cy))
        .unwrap_or(&monitors[0])
}

/// Deterministic output order: (monitor index, lowercased process, title),
/// independent of enumeration order.
pub fn sort_entries(entries: &mut [RecordedEntry]) {
    entries.sort_by(|a, b| {
        (a.monitor_index, a.process_name.to_lowercase(), &a.title)
            .cmp(&(b.monitor_index, b.process_name.to_lowercase(), &b.title))
    });
}

/// Collapse each dedup group to its largest-area member.
///
/// Ties on area keep whichever entry sorts first in the output order, so
/// the result never depends on enumeration order. Idempotent.
pub fn dedup_entries(
    mut entries: Vec<RecordedEntry>,
    key: DedupKey,
    monitor_key: MonitorKey,
) -> Vec<RecordedEntry> {
    sort_entries(&mut entries);

    let mut best: HashMap<String, RecordedEntry> = HashMap::new();
    for entry in entries {
        let group = group_key(&entry, key, monitor_key);
        match best.get(&group) {
            Some(existing) if existing.area >= entry.area => {}
            _ => {
                best.insert(group, entry);
            }
        }
    }

    let mut survivors: Vec<_> = best.into_values().collect();
    sort_entries(&mut survivors);
    survivors
}

fn group_key(entry: &RecordedEntry, key: DedupKey, monitor_key: MonitorKey) -> String {
    let process = entry.process_name.to_lowercase();
    let monitor = match monitor_key {
        MonitorKey::Index => entry.monitor_index.to_string(),
        MonitorKey::Device => entry.monitor_device.clone(),
    };
    match key {
        DedupKey::Process => process,
        DedupKey::ProcessTitle => format!("{process}\u{1f}{}", entry.title),
        DedupKey::Monitor => monitor,
        DedupKey::ProcessMonitor => format!("{process}\u{1f}{monitor}"),
        DedupKey::ProcessTitleMonitor => {
            format!("{process}\u{1f}{}\u{1f}{monitor}", entry.title)
        }
    }
}
