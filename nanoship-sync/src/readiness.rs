//! Per-batch archive readiness.
//!
//! Decision table, first match wins:
//!
//! | raw files              | probe    | verdict      |
//! |------------------------|----------|--------------|
//! | 0                      | -        | `Empty`      |
//! | `>= threshold`         | -        | `Full`       |
//! | `1..threshold`         | active   | `Acquiring`  |
//! | `1..threshold`         | inactive | `Flush`      |
//!
//! The probe is only consulted for the last two rows.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use nanoship_core::{Layout, ReadBatch};
use nanoship_detector::ActivityProbe;
use serde::Serialize;

use crate::error::{io_err, SyncError};

/// Outcome of evaluating one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Readiness {
    /// Nothing to archive.
    Empty,
    /// Enough files to archive regardless of acquisition state.
    Full { count: usize },
    /// Acquisition is still running; wait for more files.
    Acquiring { count: usize },
    /// Acquisition appears finished; flush the remainder.
    Flush { count: usize },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Full { .. } | Readiness::Flush { .. })
    }

    pub fn count(&self) -> usize {
        match self {
            Readiness::Empty => 0,
            Readiness::Full { count }
            | Readiness::Acquiring { count }
            | Readiness::Flush { count } => *count,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Readiness::Empty => "empty",
            Readiness::Full { .. } => "full",
            Readiness::Acquiring { .. } => "acquiring",
            Readiness::Flush { .. } => "flush",
        }
    }
}

/// Threshold-plus-activity readiness rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    threshold: usize,
}

impl ReadinessPolicy {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Apply the decision table to a file count.
    pub fn decide(&self, count: usize, probe: &dyn ActivityProbe) -> Readiness {
        if count == 0 {
            return Readiness::Empty;
        }
        if count >= self.threshold {
            return Readiness::Full { count };
        }
        if probe.is_active() {
            return Readiness::Acquiring { count };
        }
        Readiness::Flush { count }
    }

    /// Count the batch's raw files and decide.
    pub fn evaluate(
        &self,
        batch: &ReadBatch,
        layout: &Layout,
        probe: &dyn ActivityProbe,
    ) -> Result<Readiness, SyncError> {
        let count = raw_files(&batch.read_dir, layout)?.len();
        Ok(self.decide(count, probe))
    }
}

/// Regular files directly inside `dir` carrying the raw extension, sorted.
///
/// A directory that has vanished counts as empty.
pub fn raw_files(dir: &Path, layout: &Layout) -> Result<Vec<PathBuf>, SyncError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(io_err(dir, err)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        if path.is_file() && layout.is_raw_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nanoship_detector::StaticProbe;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Counts how often it was asked.
    struct CountingProbe {
        active: bool,
        asked: AtomicUsize,
    }

    impl ActivityProbe for CountingProbe {
        fn is_active(&self) -> bool {
            self.asked.fetch_add(1, Ordering::SeqCst);
            self.active
        }
    }

    #[rstest]
    #[case(0, false, Readiness::Empty)]
    #[case(0, true, Readiness::Empty)]
    #[case(1000, true, Readiness::Full { count: 1000 })]
    #[case(1500, false, Readiness::Full { count: 1500 })]
    #[case(999, true, Readiness::Acquiring { count: 999 })]
    #[case(1, true, Readiness::Acquiring { count: 1 })]
    #[case(999, false, Readiness::Flush { count: 999 })]
    #[case(1, false, Readiness::Flush { count: 1 })]
    fn decision_table(#[case] count: usize, #[case] active: bool, #[case] expected: Readiness) {
        let policy = ReadinessPolicy::new(1000);
        let verdict = policy.decide(count, &StaticProbe::new(active));
        assert_eq!(verdict, expected);
        assert_eq!(verdict.count(), count);
    }

    #[test]
    fn probe_is_not_consulted_when_count_decides() {
        let policy = ReadinessPolicy::new(1000);
        let probe = CountingProbe {
            active: true,
            asked: AtomicUsize::new(0),
        };
        policy.decide(0, &probe);
        policy.decide(5000, &probe);
        assert_eq!(probe.asked.load(Ordering::SeqCst), 0);
        policy.decide(10, &probe);
        assert_eq!(probe.asked.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn raw_files_counts_only_matching_regular_files() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        for name in ["a.fast5", "b.fast5", "c.fast5.tmp", "notes.txt"] {
            fs::write(dir.join(name), b"x").unwrap();
        }
        fs::create_dir(dir.join("nested.fast5")).unwrap();

        let files = raw_files(dir, &Layout::default()).unwrap();
        assert_eq!(files, vec![dir.join("a.fast5"), dir.join("b.fast5")]);
    }

    #[test]
    fn vanished_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        let files = raw_files(&tmp.path().join("gone"), &Layout::default()).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn verdict_serializes_with_its_count() {
        let json = serde_json::to_value(Readiness::Acquiring { count: 12 }).unwrap();
        assert_eq!(json, serde_json::json!({ "verdict": "acquiring", "count": 12 }));
        let json = serde_json::to_value(Readiness::Empty).unwrap();
        assert_eq!(json, serde_json::json!({ "verdict": "empty" }));
    }
}
