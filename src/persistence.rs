//! Config file loading and recorded-output writing
//!
//! Configs are read once per run. Recorded entries are written back in one
//! of three modes: overwrite (with a timestamped backup of the previous
//! file), append to an existing flat list or `entries` array, or
//! insert/replace a named bundle. A CSV mirror of the JSON output is
//! available for spreadsheet diffing.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::config::Config;
use crate::recorder::RecordedEntry;

/// Where the config lives when no path is given.
pub fn default_config_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("winplace");
    path.push("layout.json");
    path
}

pub fn load_config(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config from {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse config from {}", path.display()))
}

/// How recorded entries land in the destination file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the file, keeping a timestamped `.bak` copy of what was there.
    Overwrite,
    /// Extend an existing flat list or `entries` array.
    Append,
    /// Insert/replace this named bundle and register it in `applyBundles`.
    Bundle(String),
}

pub fn write_recorded(path: &Path, entries: &[RecordedEntry], mode: &WriteMode) -> Result<()> {
    let recorded = serde_json::to_value(entries).context("failed to serialize entries")?;
    let output = match mode {
        WriteMode::Overwrite => {
            back_up_existing(path)?;
            recorded
        }
        WriteMode::Append => appended(path, recorded)?,
        WriteMode::Bundle(name) => with_bundle(path, name, recorded)?,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut text = serde_json::to_string_pretty(&output)?;
    text.push('\n');
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), entries = entries.len(), "wrote recorded layout");
    Ok(())
}

fn back_up_existing(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let backup = PathBuf::from(format!("{}.{stamp}.bak", path.display()));
    fs::copy(path, &backup)
        .with_context(|| format!("failed to back up {} to {}", path.display(), backup.display()))?;
    info!(backup = %backup.display(), "backed up previous layout file");
    Ok(())
}

fn read_existing(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value = serde_json::from_str(&contents)
        .with_context(|| format!("existing file {} is not valid JSON", path.display()))?;
    Ok(Some(value))
}

fn appended(path: &Path, recorded: Value) -> Result<Value> {
    let new_items = as_array(recorded);
    match read_existing(path)? {
        None => Ok(Value::Array(new_items)),
        Some(Value::Array(mut existing)) => {
            existing.extend(new_items);
            Ok(Value::Array(existing))
        }
        Some(Value::Object(mut existing)) => {
            let entries = existing
                .entry("entries")
                .or_insert_with(|| Value::Array(Vec::new()));
            match entries {
                Value::Array(list) => list.extend(new_items),
                _ => bail!("'entries' in {} is not an array", path.display()),
            }
            Ok(Value::Object(existing))
        }
        Some(_) => bail!("{} is neither a list nor a config object", path.display()),
    }
}

fn with_bundle(path: &Path, name: &str, recorded: Value) -> Result<Value> {
    let mut root = match read_existing(path)? {
        None => serde_json::Map::new(),
        Some(Value::Object(existing)) => existing,
        Some(Value::Array(existing)) => {
            // Promote a flat file to the object form, keeping its entries.
            warn!(path = %path.display(), "promoting flat layout file to bundle form");
            let mut map = serde_json::Map::new();
            map.insert("entries".to_string(), Value::Array(existing));
            map
        }
        Some(_) => bail!("{} is neither a list nor a config object", path.display()),
    };

    let bundles = root
        .entry("bundles")
        .or_insert_with(|| json!({}));
    match bundles {
        Value::Object(map) => {
            map.insert(name.to_string(), recorded);
        }
        _ => bail!("'bundles' in {} is not an object", path.display()),
    }

    let apply = root
        .entry("applyBundles")
        .or_insert_with(|| json!([]));
    match apply {
        Value::Array(list) => {
            if !list.iter().any(|v| v.as_str() == Some(name)) {
                list.push(Value::String(name.to_string()));
            }
        }
        _ => bail!("'applyBundles' in {} is not an array", path.display()),
    }

    Ok(Value::Object(root))
}

fn as_array(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}

/// CSV mirror with a fixed column set.
pub fn write_csv(path: &Path, entries: &[RecordedEntry]) -> Result<()> {
    let mut out = String::from("processname,title,x,y,width,height,monitor_index,monitor_device\n");
    for e in entries {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            csv_field(&e.process_name),
            csv_field(&e.title),
            e.x,
            e.y,
            e.width,
            e.height,
            e.monitor_index,
            csv_field(&e.monitor_device),
        ));
    }
    fs::write(path, out).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), entries = entries.len(), "wrote CSV mirror");
    Ok(())
}

fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}
