#![forbid(unsafe_code)]

mod apply;
mod config;
mod dpi;
mod errors;
mod executor;
mod geometry;
mod persistence;
mod platform;
mod recorder;
mod target;
mod x11;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{Level as TraceLevel, info};
use tracing_subscriber::FmtSubscriber;

use apply::{ApplyOptions, apply_config};
use persistence::{WriteMode, default_config_path, load_config, write_csv, write_recorded};
use platform::SystemClock;
use recorder::{DedupKey, MonitorKey, RecordFilter, dedup_entries, record};
use x11::X11Platform;

#[derive(Parser)]
#[command(name = "winplace", version, about = "Record and restore window layouts")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Apply a layout config to the current session
    Apply {
        /// Layout config path (default: ~/.config/winplace/layout.json)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Apply only this named bundle
        #[arg(long)]
        bundle: Option<String>,
        /// Resolve and log target rectangles without moving anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Record the current window arrangement into a layout file
    Record {
        /// Output path (default: ~/.config/winplace/layout.json)
        #[arg(long)]
        path: Option<PathBuf>,
        /// Also write a CSV mirror of the recorded entries
        #[arg(long)]
        csv_path: Option<PathBuf>,
        /// Record only these process names (repeatable)
        #[arg(long = "process")]
        processes: Vec<String>,
        /// Skip these process names (repeatable)
        #[arg(long = "exclude-process")]
        exclude_processes: Vec<String>,
        /// Extend the existing file instead of replacing it
        #[arg(long, conflicts_with = "bundle_name")]
        append: bool,
        /// Record minimized windows too
        #[arg(long)]
        include_minimized: bool,
        /// Record into this named bundle instead of the flat list
        #[arg(long)]
        bundle_name: Option<String>,
        /// Collapse duplicate entries, keeping the largest per group
        #[arg(long)]
        dedup: bool,
        /// Grouping key for --dedup
        #[arg(long, value_enum, default_value = "process")]
        dedup_by: DedupKey,
        /// Monitor identity used by monitor-based dedup keys
        #[arg(long, value_enum, default_value = "index")]
        dedup_monitor_by: MonitorKey,
    },
}

fn main() -> Result<()> {
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let platform = X11Platform::connect()?;

    match cli.command {
        Cmd::Apply { config, bundle, dry_run } => {
            let path = config.unwrap_or_else(default_config_path);
            info!(path = %path.display(), "loading layout config");
            let config = load_config(&path)?;
            let options = ApplyOptions { bundle, dry_run };
            apply_config(&config, &options, &platform, &platform, &SystemClock)?;
        }
        Cmd::Record {
            path,
            csv_path,
            processes,
            exclude_processes,
            append,
            include_minimized,
            bundle_name,
            dedup,
            dedup_by,
            dedup_monitor_by,
        } => {
            let filter = RecordFilter {
                include: processes,
                exclude: exclude_processes,
                include_minimized,
            };
            let mut entries = record(&platform, &platform, &filter)?;
            if dedup {
                entries = dedup_entries(entries, dedup_by, dedup_monitor_by);
            }
            info!(entries = entries.len(), "recorded window arrangement");

            let mode = match bundle_name {
                Some(name) => WriteMode::Bundle(name),
                None if append => WriteMode::Append,
                None => WriteMode::Overwrite,
            };
            let path = path.unwrap_or_else(default_config_path);
            write_recorded(&path, &entries, &mode)?;
            if let Some(csv) = csv_path {
                write_csv(&csv, &entries)?;
            }
        }
    }
    Ok(())
}
