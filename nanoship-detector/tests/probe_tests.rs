//! Activity probe tests for `nanoship-detector`.
//!
//! Each `#[case]` gets isolated state; lock-file cases use their own `TempDir`.

use std::fs;

use nanoship_core::ActivityConfig;
use nanoship_detector::{
    command_line_matches, probe_from_config, ActivityProbe, AnyProbe, LockFileProbe, StaticProbe,
};
use rstest::rstest;
use tempfile::TempDir;

fn default_markers() -> Vec<String> {
    ActivityConfig::default().process_markers
}

// ---------------------------------------------------------------------------
// Command-line matching
// ---------------------------------------------------------------------------

#[rstest]
#[case(
    "/opt/ont/minknow/bin/MinKNOW --experiment run_1 --state sequencing",
    true
)]
#[case("MinKNOW experiment sequencing", true)]
#[case("/opt/ont/minknow/bin/MinKNOW --idle", false)]
#[case("MinKNOW experiment", false)]
#[case("minknow experiment sequencing", false)]
#[case("", false)]
fn default_markers_require_all_substrings(#[case] line: &str, #[case] expected: bool) {
    assert_eq!(command_line_matches(line, &default_markers()), expected);
}

#[test]
fn empty_marker_set_never_matches() {
    assert!(!command_line_matches("anything at all", &[]));
}

// ---------------------------------------------------------------------------
// Lock file
// ---------------------------------------------------------------------------

#[test]
fn lock_file_probe_tracks_file_presence() {
    let dir = TempDir::new().expect("tempdir");
    let lock = dir.path().join("acquisition.lock");
    let probe = LockFileProbe::new(&lock);

    assert!(!probe.is_active(), "no lock file yet");
    fs::write(&lock, b"").expect("create lock");
    assert!(probe.is_active(), "lock file present");
    fs::remove_file(&lock).expect("remove lock");
    assert!(!probe.is_active(), "lock file removed");
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

#[rstest]
#[case(false, false, false)]
#[case(true, false, true)]
#[case(false, true, true)]
#[case(true, true, true)]
fn any_probe_is_logical_or(#[case] a: bool, #[case] b: bool, #[case] expected: bool) {
    let probe = AnyProbe::new()
        .with(StaticProbe::new(a))
        .with(StaticProbe::new(b));
    assert_eq!(probe.is_active(), expected);
}

#[test]
fn config_probe_includes_lock_file_when_configured() {
    let dir = TempDir::new().expect("tempdir");
    let lock = dir.path().join("acquisition.lock");
    fs::write(&lock, b"").expect("create lock");

    let config = ActivityConfig {
        process_markers: Vec::new(),
        lock_file: Some(lock),
    };
    let probe = probe_from_config(&config);
    assert_eq!(probe.len(), 1);
    assert!(probe.is_active());
}

#[test]
fn config_probe_without_inputs_is_inactive() {
    let config = ActivityConfig {
        process_markers: Vec::new(),
        lock_file: None,
    };
    let probe = probe_from_config(&config);
    assert!(probe.is_empty());
    assert!(!probe.is_active());
}

#[test]
fn config_probe_scans_processes_with_default_markers() {
    let probe = probe_from_config(&ActivityConfig::default());
    assert_eq!(probe.len(), 1);
    // The test host is not running a sequencer; the scan itself must not panic.
    let _ = probe.is_active();
}
