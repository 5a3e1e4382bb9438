//! Move-then-pack archiving of one batch.
//!
//! ## `archive_batch` protocol
//!
//! 1. Rename every raw file from the batch directory into the slot.
//! 2. `tar` the slot into `<slot>.tar`.
//! 3. Remove the slot.
//!
//! Step 1 is atomic per file only. If any step fails, the files already
//! moved stay in the slot; the source directory no longer has them. A
//! slot that failed before receiving any file is removed again.

use std::fs;
use std::path::{Path, PathBuf};

use nanoship_core::{Layout, ReadBatch};

use crate::command::{ensure_success, CommandRunner, CommandSpec};
use crate::error::{io_err, SyncError};
use crate::readiness::raw_files;

/// `tar -cf <archive> -C <slot> .`
///
/// `COPYFILE_DISABLE=1` keeps macOS tar from adding a `._name` sidecar
/// holding extended attributes for every file.
pub fn pack_command(slot: &Path, archive: &Path) -> CommandSpec {
    CommandSpec::new("tar")
        .env("COPYFILE_DISABLE", "1")
        .arg("-cf")
        .arg(archive)
        .arg("-C")
        .arg(slot)
        .arg(".")
}

/// Archive `batch` through the freshly allocated `slot`.
///
/// Returns the path of the produced archive. On failure an empty slot is
/// removed; a slot holding moved files is kept for manual recovery.
pub fn archive_batch(
    runner: &dyn CommandRunner,
    slot: &Path,
    batch: &ReadBatch,
    layout: &Layout,
) -> Result<PathBuf, SyncError> {
    let result = move_and_pack(runner, slot, batch, layout);
    if result.is_err() {
        // Only succeeds on an empty directory.
        let _ = fs::remove_dir(slot);
    }
    result
}

fn move_and_pack(
    runner: &dyn CommandRunner,
    slot: &Path,
    batch: &ReadBatch,
    layout: &Layout,
) -> Result<PathBuf, SyncError> {
    // Step 1: move.
    let files = raw_files(&batch.read_dir, layout)?;
    tracing::info!(
        "moving {} files from {} to {}",
        files.len(),
        batch.read_dir.display(),
        slot.display()
    );
    for file in &files {
        let Some(name) = file.file_name() else {
            continue;
        };
        fs::rename(file, slot.join(name)).map_err(|e| io_err(file, e))?;
    }

    // Step 2: pack.
    let archive = layout.archive_path_for(slot);
    let command = pack_command(slot, &archive);
    tracing::info!("{command}");
    ensure_success(&command, runner.run(&command))?;
    if !archive.is_file() {
        return Err(SyncError::MissingArchive { path: archive });
    }

    // Step 3: drop the slot.
    fs::remove_dir_all(slot).map_err(|e| io_err(slot, e))?;

    tracing::info!("archived: {}", archive.display());
    Ok(archive)
}
