//! Domain types for the nanoship pipeline.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// The sample (run) name given to the acquisition software.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SampleName(pub String);

impl fmt::Display for SampleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SampleName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SampleName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// One acquisition run directory beneath a sample, e.g. `20180124_2338_FAH1234_abcd`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunName(pub String);

impl fmt::Display for RunName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RunName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RunName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Read batches
// ---------------------------------------------------------------------------

/// One directory's worth of raw instrument output awaiting archiving.
///
/// Field order is significant: the derived ordering sorts by sample, then
/// run, then source directory, which gives every cycle a reproducible
/// processing order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReadBatch {
    pub sample: SampleName,
    pub run: RunName,
    /// Directory holding the raw files of one acquisition chunk.
    pub read_dir: PathBuf,
}

impl ReadBatch {
    pub fn new(sample: SampleName, run: RunName, read_dir: impl Into<PathBuf>) -> Self {
        Self {
            sample,
            run,
            read_dir: read_dir.into(),
        }
    }

    /// Last path segment of the source directory (`"0"`, `"1"`, …).
    pub fn chunk(&self) -> String {
        self.read_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl fmt::Display for ReadBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.sample, self.run, self.read_dir.display())
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Naming conventions of the instrument output and the archive area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    /// Directory under each run that holds passed reads.
    pub pass_marker: String,
    /// Extension (without dot) of the raw files that get archived.
    pub raw_extension: String,
    /// Extension (without dot) of the produced archives.
    pub archive_extension: String,
    /// Sub-directory of the remote sample directory receiving archives.
    pub data_kind: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            pass_marker: "fast5_pass".to_string(),
            raw_extension: "fast5".to_string(),
            archive_extension: "tar".to_string(),
            data_kind: "fast5".to_string(),
        }
    }
}

impl Layout {
    /// `<dir>.<archive_extension>`, a sibling of `dir`.
    pub fn archive_path_for(&self, dir: &Path) -> PathBuf {
        let mut name = dir.as_os_str().to_os_string();
        name.push(".");
        name.push(&self.archive_extension);
        PathBuf::from(name)
    }

    pub fn is_raw_file(&self, path: &Path) -> bool {
        has_extension(path, &self.raw_extension)
    }

    pub fn is_archive_file(&self, path: &Path) -> bool {
        has_extension(path, &self.archive_extension)
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == ext)
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Remote target
// ---------------------------------------------------------------------------

/// Where archives are shipped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTarget {
    pub host: String,
    pub user: String,
    /// Base directory on the remote host; samples live beneath it.
    pub dir: PathBuf,
}

impl RemoteTarget {
    /// `user@host`, as understood by ssh and rsync.
    pub fn login(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// `<dir>/<sample>/<data_kind>` on the remote host.
    pub fn sample_dir(&self, sample: &SampleName, layout: &Layout) -> PathBuf {
        self.dir.join(&sample.0).join(&layout.data_kind)
    }
}

impl fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.login(), self.dir.display())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
