//! Batch discovery over the instrument's output tree.
//!
//! ```text
//! <data_dir>/<experiment>/<sample>/<run>/<pass_marker>/<chunk>/*.<raw_extension>
//!            *                     *                   └── one ReadBatch each
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use nanoship_core::{Layout, ReadBatch, RunName, SampleName};

/// Lazily enumerate every chunk directory for `sample` under `data_dir`.
///
/// Read-only. Missing or unreadable directories contribute nothing, so a
/// data directory that does not exist yet simply yields no batches. The
/// order follows the filesystem; callers sort for determinism.
pub fn discover_batches<'a>(
    data_dir: &'a Path,
    sample: &'a SampleName,
    layout: &'a Layout,
) -> impl Iterator<Item = ReadBatch> + 'a {
    subdirs(data_dir)
        .map(move |experiment| experiment.join(&sample.0))
        .filter(|sample_dir| sample_dir.is_dir())
        .flat_map(|sample_dir| subdirs(&sample_dir))
        .filter_map(move |run_dir| {
            let pass_dir = run_dir.join(&layout.pass_marker);
            if !pass_dir.is_dir() {
                return None;
            }
            let run = run_dir.file_name()?.to_string_lossy().into_owned();
            Some((RunName::from(run), pass_dir))
        })
        .flat_map(move |(run, pass_dir)| {
            subdirs(&pass_dir)
                .map(move |chunk_dir| ReadBatch::new(sample.clone(), run.clone(), chunk_dir))
        })
}

/// Immediate subdirectories of `dir` (symlinks to directories included).
fn subdirs(dir: &Path) -> impl Iterator<Item = PathBuf> {
    fs::read_dir(dir)
        .into_iter()
        .flatten()
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
}
