//! `nanoship status`: what is sitting in the staging area.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use nanoship_core::{config, SampleName};
use nanoship_sync::{inspect, StagingInventory};

/// Arguments for `nanoship status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Local staging root passed to `watch`/`once`.
    pub staging_dir: PathBuf,

    /// Sample whose staging directory to list.
    pub sample: String,

    /// Config file, for a non-default archive layout.
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let config = config::load(self.config.as_deref()).context("failed to load config")?;
        let sample = SampleName::from(self.sample.as_str());
        let inventory = inspect(&self.staging_dir, &sample, &config.layout)
            .with_context(|| format!("failed to inspect {}", self.staging_dir.display()))?;

        if self.json {
            print_json(&sample, &inventory)?;
        } else {
            print_table(&sample, &inventory, Utc::now());
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct StatusJson<'a> {
    sample: &'a str,
    archive_count: usize,
    total_bytes: u64,
    #[serde(flatten)]
    inventory: &'a StagingInventory,
}

#[derive(Tabled)]
struct ArchiveRow {
    #[tabled(rename = "archive")]
    name: String,
    #[tabled(rename = "size")]
    size: String,
    #[tabled(rename = "modified")]
    modified: String,
}

#[derive(Tabled)]
struct OrphanRow {
    #[tabled(rename = "slot")]
    name: String,
    #[tabled(rename = "raw files")]
    raw_files: usize,
    #[tabled(rename = "partial archive")]
    partial_archive: String,
}

fn print_json(sample: &SampleName, inventory: &StagingInventory) -> Result<()> {
    let payload = StatusJson {
        sample: &sample.0,
        archive_count: inventory.archives.len(),
        total_bytes: inventory.total_bytes(),
        inventory,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_table(sample: &SampleName, inventory: &StagingInventory, now: DateTime<Utc>) {
    println!(
        "nanoship v{} | sample {} | {} archives | {} | {} orphaned slots",
        env!("CARGO_PKG_VERSION"),
        sample.to_string().bold(),
        inventory.archives.len(),
        format_bytes(inventory.total_bytes()),
        inventory.orphans.len(),
    );

    if inventory.archives.is_empty() && inventory.orphans.is_empty() {
        println!("Nothing staged.");
        return;
    }

    if !inventory.archives.is_empty() {
        let rows: Vec<ArchiveRow> = inventory
            .archives
            .iter()
            .map(|entry| ArchiveRow {
                name: file_name(&entry.path),
                size: format_bytes(entry.bytes),
                modified: entry
                    .modified
                    .map(|at| format_age(now, at))
                    .unwrap_or_else(|| "unknown".to_string()),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    if !inventory.orphans.is_empty() {
        println!("{}", "Orphaned staging slots".red().bold());
        let rows: Vec<OrphanRow> = inventory
            .orphans
            .iter()
            .map(|slot| OrphanRow {
                name: file_name(&slot.path),
                raw_files: slot.raw_files,
                partial_archive: if slot.partial_archive { "yes" } else { "no" }.to_string(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        println!(
            "Move the raw files back into their read directory (or pack the slot by hand), \
             then remove the slot and any partial archive."
        );
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn format_age(now: DateTime<Utc>, at: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds().max(0);
    match secs {
        0..=59 => format!("{secs}s ago"),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}
