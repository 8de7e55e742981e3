//! Layout configuration model
//!
//! A config file is either a flat JSON array of entries or an object with
//! `entries`, `bundles`, `applyBundles` and `bundleDefaults`. Every entry
//! field is optional at parse time; precedence (bundle defaults under
//! explicit entry fields, preset filling the remaining holes) is resolved
//! once per entry before geometry runs.

use std::collections::HashMap;

use anyhow::bail;
use serde::Deserialize;
use tracing::warn;

use crate::errors::{Error, Result};

/// Policy for scaling a logical rectangle to physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DpiMode {
    /// Use the rectangle as-is.
    #[default]
    Logical,
    /// Scale by the target window's own DPI when the OS reports one.
    Auto,
    /// Scale by the window's DPI, falling back to the system DPI.
    Physical,
}

/// Z-order placement token for the extended positioning call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ZOrder {
    #[default]
    Top,
    Bottom,
    TopMost,
    NoTopMost,
}

/// Flags for the extended positioning call, validated at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SwpFlag {
    NoZOrder,
    NoActivate,
    NoSize,
    NoMove,
    NoRedraw,
    ShowWindow,
    AsyncWindowPos,
}

/// Default flag set: reposition without raising or focusing the window.
pub fn default_swp_flags() -> Vec<SwpFlag> {
    vec![SwpFlag::NoZOrder, SwpFlag::NoActivate]
}

/// One window placement rule. Every field is optional so the same type
/// doubles as bundle defaults and preset fragments; `processName` must be
/// present after merging.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutEntry {
    pub process_name: Option<String>,
    pub monitor_index: Option<usize>,
    pub pad: Option<i32>,

    // Grid strategy
    pub grid: Option<String>,
    pub cell: Option<String>,
    pub row_span: Option<u32>,
    pub col_span: Option<u32>,
    pub gutter: Option<i32>,
    pub outer_gutter: Option<i32>,

    // Anchor strategy
    pub anchor: Option<String>,

    // Explicit/percent strategy
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub x_pct: Option<f64>,
    pub y_pct: Option<f64>,
    pub width_pct: Option<f64>,
    pub height_pct: Option<f64>,

    pub preset: Option<String>,
    pub dpi_mode: Option<DpiMode>,

    // Positioning primitive selection
    pub use_set_window_pos: Option<bool>,
    pub set_window_pos_flags: Option<Vec<SwpFlag>>,
    pub z_order: Option<ZOrder>,

    // Targeting
    pub window_title_pattern: Option<String>,
    pub wait_for_seconds: Option<f64>,
    pub retry_count: Option<u32>,
    pub retry_delay_seconds: Option<f64>,
    pub launch_timeout_seconds: Option<f64>,

    // Launch integration
    pub ensure_running: Option<bool>,
    pub launch_path: Option<String>,
    pub launch_args: Option<String>,
    pub launch_working_dir: Option<String>,
    pub launch_as_user: Option<bool>,
    pub post_launch_delay_seconds: Option<f64>,
}

impl LayoutEntry {
    /// Overlay this entry on top of `base`: fields set here win, unset
    /// fields fall through to the base.
    pub fn merge_under(mut self, base: &LayoutEntry) -> LayoutEntry {
        macro_rules! inherit {
            ($($field:ident),+ $(,)?) => {
                $(if self.$field.is_none() {
                    self.$field = base.$field.clone();
                })+
            };
        }
        inherit!(
            process_name,
            monitor_index,
            pad,
            grid,
            cell,
            row_span,
            col_span,
            gutter,
            outer_gutter,
            anchor,
            x,
            y,
            width,
            height,
            x_pct,
            y_pct,
            width_pct,
            height_pct,
            preset,
            dpi_mode,
            use_set_window_pos,
            set_window_pos_flags,
            z_order,
            window_title_pattern,
            wait_for_seconds,
            retry_count,
            retry_delay_seconds,
            launch_timeout_seconds,
            ensure_running,
            launch_path,
            launch_args,
            launch_working_dir,
            launch_as_user,
            post_launch_delay_seconds,
        );
        self
    }
}

/// Fields contributed by a named preset. Closed, case-insensitive set;
/// preset values are defaults the entry may override.
fn preset_fields(name: &str) -> Result<LayoutEntry> {
    let (anchor, width_pct, height_pct) = match name.to_ascii_lowercase().as_str() {
        "lefthalf" => ("Left", 50.0, 100.0),
        "righthalf" => ("Right", 50.0, 100.0),
        "tophalf" => ("Top", 100.0, 50.0),
        "bottomhalf" => ("Bottom", 100.0, 50.0),
        "topleftquarter" => ("TopLeft", 50.0, 50.0),
        "toprightquarter" => ("TopRight", 50.0, 50.0),
        "bottomleftquarter" => ("BottomLeft", 50.0, 50.0),
        "bottomrightquarter" => ("BottomRight", 50.0, 50.0),
        "center" => ("Center", 50.0, 50.0),
        "maximized" => ("TopLeft", 100.0, 100.0),
        _ => return Err(Error::Config(format!("unknown preset '{name}'"))),
    };
    Ok(LayoutEntry {
        anchor: Some(anchor.to_string()),
        width_pct: Some(width_pct),
        height_pct: Some(height_pct),
        ..LayoutEntry::default()
    })
}

/// Merge bundle defaults, explicit entry fields and the named preset into
/// one fully-specified entry. Precedence: defaults < entry; the preset only
/// fills keys still unset after that.
pub fn resolve_entry(raw: &LayoutEntry, defaults: &LayoutEntry) -> Result<LayoutEntry> {
    let mut merged = raw.clone().merge_under(defaults);
    if let Some(preset) = merged.preset.clone() {
        merged = merged.merge_under(&preset_fields(&preset)?);
    }
    if merged.process_name.is_none() {
        return Err(Error::Config("entry has no processName after merge".to_string()));
    }
    Ok(merged)
}

/// Object-shaped config with bundles.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupedConfig {
    pub entries: Vec<LayoutEntry>,
    pub bundles: HashMap<String, Vec<LayoutEntry>>,
    pub apply_bundles: Vec<String>,
    pub bundle_defaults: Option<LayoutEntry>,
}

/// A config file: flat array of entries, or grouped object. Detection is
/// structural — an array can never be mistaken for the object form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Config {
    Flat(Vec<LayoutEntry>),
    Grouped(GroupedConfig),
}

/// Raw entries selected for one apply run plus the defaults they merge under.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub defaults: LayoutEntry,
    pub entries: Vec<LayoutEntry>,
}

impl Config {
    /// Pick the entries for this run.
    ///
    /// With a requested bundle name only that bundle is applied (missing
    /// bundle aborts the run). Otherwise `applyBundles` in order (missing
    /// names warn and are skipped) followed by the top-level `entries`.
    /// A flat config is one implicit group with no defaults.
    pub fn select_entries(&self, bundle: Option<&str>) -> anyhow::Result<Selection> {
        match self {
            Config::Flat(entries) => {
                if let Some(name) = bundle {
                    bail!("bundle '{name}' requested but config has no bundles");
                }
                Ok(Selection {
                    defaults: LayoutEntry::default(),
                    entries: entries.clone(),
                })
            }
            Config::Grouped(grouped) => {
                let defaults = grouped.bundle_defaults.clone().unwrap_or_default();
                let mut entries = Vec::new();
                if let Some(name) = bundle {
                    match grouped.bundles.get(name) {
                        Some(bundle_entries) => entries.extend(bundle_entries.iter().cloned()),
                        None => bail!("bundle '{name}' not found in config"),
                    }
                } else {
                    for name in &grouped.apply_bundles {
                        match grouped.bundles.get(name) {
                            Some(bundle_entries) => entries.extend(bundle_entries.iter().cloned()),
                            None => warn!(bundle = %name, "applyBundles names a missing bundle, skipping"),
                        }
                    }
                    entries.extend(grouped.entries.iter().cloned());
                }
                Ok(Selection { defaults, entries })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_wins_over_defaults() {
        let raw = LayoutEntry {
            process_name: Some("code".to_string()),
            monitor_index: Some(1),
            ..LayoutEntry::default()
        };
        let defaults = LayoutEntry {
            monitor_index: Some(0),
            pad: Some(8),
            ..LayoutEntry::default()
        };
        let resolved = resolve_entry(&raw, &defaults).unwrap();
        assert_eq!(resolved.monitor_index, Some(1));
        assert_eq!(resolved.pad, Some(8));
    }

    #[test]
    fn test_preset_fills_unset_keys_only() {
        let raw = LayoutEntry {
            process_name: Some("chrome".to_string()),
            preset: Some("LeftHalf".to_string()),
            width_pct: Some(30.0),
            ..LayoutEntry::default()
        };
        let resolved = resolve_entry(&raw, &LayoutEntry::default()).unwrap();
        // Explicit widthPct beats the preset's 50; preset supplies the rest.
        assert_eq!(resolved.width_pct, Some(30.0));
        assert_eq!(resolved.height_pct, Some(100.0));
        assert_eq!(resolved.anchor.as_deref(), Some("Left"));
    }

    #[test]
    fn test_preset_from_bundle_defaults() {
        let raw = LayoutEntry {
            process_name: Some("term".to_string()),
            ..LayoutEntry::default()
        };
        let defaults = LayoutEntry {
            preset: Some("BottomHalf".to_string()),
            ..LayoutEntry::default()
        };
        let resolved = resolve_entry(&raw, &defaults).unwrap();
        assert_eq!(resolved.anchor.as_deref(), Some("Bottom"));
    }

    #[test]
    fn test_unknown_preset_is_config_error() {
        let raw = LayoutEntry {
            process_name: Some("a".to_string()),
            preset: Some("DiagonalThird".to_string()),
            ..LayoutEntry::default()
        };
        assert!(matches!(
            resolve_entry(&raw, &LayoutEntry::default()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_missing_process_name_is_config_error() {
        let raw = LayoutEntry {
            anchor: Some("Left".to_string()),
            ..LayoutEntry::default()
        };
        assert!(matches!(
            resolve_entry(&raw, &LayoutEntry::default()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_flat_config_detection() {
        let config: Config =
            serde_json::from_str(r#"[{"processName": "code", "anchor": "Left"}]"#).unwrap();
        let selection = config.select_entries(None).unwrap();
        assert_eq!(selection.entries.len(), 1);
        assert_eq!(selection.entries[0].process_name.as_deref(), Some("code"));
    }

    #[test]
    fn test_grouped_config_bundle_order() {
        let config: Config = serde_json::from_str(
            r#"{
                "bundleDefaults": {"monitorIndex": 0},
                "bundles": {
                    "work": [{"processName": "code"}],
                    "chat": [{"processName": "slack"}]
                },
                "applyBundles": ["work", "missing", "chat"],
                "entries": [{"processName": "spotify"}]
            }"#,
        )
        .unwrap();
        let selection = config.select_entries(None).unwrap();
        let names: Vec<_> = selection
            .entries
            .iter()
            .map(|e| e.process_name.as_deref().unwrap())
            .collect();
        assert_eq!(names, ["code", "slack", "spotify"]);
        assert_eq!(selection.defaults.monitor_index, Some(0));
    }

    #[test]
    fn test_requested_bundle_selects_only_that_bundle() {
        let config: Config = serde_json::from_str(
            r#"{
                "bundles": {"work": [{"processName": "code"}]},
                "entries": [{"processName": "spotify"}]
            }"#,
        )
        .unwrap();
        let selection = config.select_entries(Some("work")).unwrap();
        assert_eq!(selection.entries.len(), 1);
        assert!(config.select_entries(Some("nope")).is_err());
    }

    #[test]
    fn test_flat_config_rejects_bundle_request() {
        let config: Config = serde_json::from_str(r#"[{"processName": "a"}]"#).unwrap();
        assert!(config.select_entries(Some("work")).is_err());
    }

    #[test]
    fn test_enum_fields_parse() {
        let entry: LayoutEntry = serde_json::from_str(
            r#"{
                "processName": "code",
                "dpiMode": "physical",
                "zOrder": "topMost",
                "setWindowPosFlags": ["noActivate", "noZOrder"]
            }"#,
        )
        .unwrap();
        assert_eq!(entry.dpi_mode, Some(DpiMode::Physical));
        assert_eq!(entry.z_order, Some(ZOrder::TopMost));
        assert_eq!(
            entry.set_window_pos_flags,
            Some(vec![SwpFlag::NoActivate, SwpFlag::NoZOrder])
        );
    }
}
