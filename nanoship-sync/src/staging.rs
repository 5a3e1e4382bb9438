//! Staging slots and the local archive area.
//!
//! ```text
//! <staging_root>/<sample>/
//!   <run>_<chunk>_<n>/        slot: exists only while one batch is being packed
//!   <run>_<chunk>_<n>.tar     archive: kept after transfer
//! ```
//!
//! A slot directory that survives a cycle is an orphan: its archive step
//! failed or was interrupted. Orphans are reported by [`inspect`] and left
//! for the operator.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use nanoship_core::{Layout, ReadBatch, SampleName};
use serde::Serialize;

use crate::error::{io_err, SyncError};
use crate::readiness::raw_files;

/// `<staging_root>/<sample>`
pub fn sample_dir(staging_root: &Path, sample: &SampleName) -> PathBuf {
    staging_root.join(&sample.0)
}

/// `<staging_root>/<sample>/<run>_<chunk>_<n>`. Pure; touches nothing.
pub fn slot_candidate(staging_root: &Path, batch: &ReadBatch, n: u32) -> PathBuf {
    sample_dir(staging_root, &batch.sample).join(format!("{}_{}_{n}", batch.run, batch.chunk()))
}

/// Reserve the lowest-numbered free slot for `batch` and create it.
///
/// A candidate is free when neither the directory nor its archive exists.
/// Creating the directory is the claim; if another writer wins the race
/// for a candidate, probing continues with the next suffix.
pub fn allocate_slot(
    staging_root: &Path,
    batch: &ReadBatch,
    layout: &Layout,
) -> Result<PathBuf, SyncError> {
    let parent = sample_dir(staging_root, &batch.sample);
    fs::create_dir_all(&parent).map_err(|e| io_err(&parent, e))?;

    let mut n = 0u32;
    loop {
        let candidate = slot_candidate(staging_root, batch, n);
        n += 1;
        if candidate.exists() || layout.archive_path_for(&candidate).exists() {
            continue;
        }
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(io_err(&candidate, err)),
        }
    }
}

/// Archive files for `sample`, sorted by name. Empty if nothing is staged yet.
pub fn list_archives(
    staging_root: &Path,
    sample: &SampleName,
    layout: &Layout,
) -> Result<Vec<PathBuf>, SyncError> {
    let dir = sample_dir(staging_root, sample);
    let mut archives: Vec<PathBuf> = read_entries(&dir)?
        .into_iter()
        .filter(|path| path.is_file() && layout.is_archive_file(path))
        .collect();
    archives.sort();
    Ok(archives)
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// One archive in the local staging area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveEntry {
    pub path: PathBuf,
    pub bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// A slot directory left behind by a failed or interrupted archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanSlot {
    pub path: PathBuf,
    /// Raw files stranded in the slot.
    pub raw_files: usize,
    /// True if a partial archive with the slot's name also exists.
    pub partial_archive: bool,
}

/// Snapshot of `<staging_root>/<sample>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StagingInventory {
    pub archives: Vec<ArchiveEntry>,
    pub orphans: Vec<OrphanSlot>,
}

impl StagingInventory {
    pub fn total_bytes(&self) -> u64 {
        self.archives.iter().map(|a| a.bytes).sum()
    }
}

/// Read-only inventory of archives and orphaned slots for `sample`.
pub fn inspect(
    staging_root: &Path,
    sample: &SampleName,
    layout: &Layout,
) -> Result<StagingInventory, SyncError> {
    let dir = sample_dir(staging_root, sample);
    let mut entries = read_entries(&dir)?;
    entries.sort();

    let mut inventory = StagingInventory::default();
    for path in entries {
        if path.is_dir() {
            inventory.orphans.push(OrphanSlot {
                raw_files: raw_files(&path, layout)?.len(),
                partial_archive: layout.archive_path_for(&path).exists(),
                path,
            });
        } else if path.is_file() && layout.is_archive_file(&path) {
            let meta = fs::metadata(&path).map_err(|e| io_err(&path, e))?;
            inventory.archives.push(ArchiveEntry {
                bytes: meta.len(),
                modified: meta.modified().ok().map(DateTime::<Utc>::from),
                path,
            });
        }
    }
    Ok(inventory)
}

fn read_entries(dir: &Path) -> Result<Vec<PathBuf>, SyncError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(io_err(dir, err)),
    };
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        paths.push(entry.path());
    }
    Ok(paths)
}
