use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use nanoship_core::{Layout, PipelineConfig, RemoteTarget, SampleName};
use nanoship_detector::StaticProbe;
use nanoship_sync::{
    inspect, readiness::raw_files, run_cycle, staging::list_archives, sync_archives,
    BatchOutcome, FakeRunner, PipelineContext, SystemRunner,
};
use tempfile::TempDir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn remote() -> RemoteTarget {
    RemoteTarget {
        host: "dtn.example.org".to_string(),
        user: "alice".to_string(),
        dir: PathBuf::from("/groups/lab/raw"),
    }
}

/// `<root>/data/<experiment>/RunA/run1/fast5_pass/<chunk>` holding `count` reads.
fn write_chunk(root: &Path, chunk: &str, count: usize) -> PathBuf {
    let dir = root
        .join("data")
        .join("20240101_1200_RunA")
        .join("RunA")
        .join("run1")
        .join("fast5_pass")
        .join(chunk);
    fs::create_dir_all(&dir).expect("create chunk dir");
    for i in 0..count {
        fs::write(dir.join(format!("read_{chunk}_{i}.fast5")), b"signal").expect("write read");
    }
    dir
}

fn context(root: &Path, remote: Option<RemoteTarget>) -> PipelineContext {
    PipelineContext::new(
        root.join("data"),
        SampleName::from("RunA"),
        root.join("staging"),
        &PipelineConfig::default(),
        remote,
    )
}

fn staged_names(root: &Path) -> Vec<String> {
    list_archives(
        &root.join("staging"),
        &SampleName::from("RunA"),
        &Layout::default(),
    )
    .expect("list archives")
    .iter()
    .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
    .collect()
}

#[test]
fn full_and_partial_batches_archive_in_one_cycle_when_idle() {
    init_logging();
    let root = TempDir::new().expect("root");
    let small = write_chunk(root.path(), "0", 500);
    let large = write_chunk(root.path(), "1", 1200);
    let ctx = context(root.path(), Some(remote()));
    let runner = FakeRunner::new();

    let report = run_cycle(&ctx, &runner, &StaticProbe::new(false));

    assert_eq!(report.discovered, 2);
    assert_eq!(report.archived_count(), 2);
    assert_eq!(staged_names(root.path()), vec!["run1_0_0.tar", "run1_1_0.tar"]);
    for dir in [&small, &large] {
        assert!(raw_files(dir, &ctx.layout).unwrap().is_empty(), "{dir:?} not emptied");
    }
    assert_eq!(report.transferred_count(), 2);
    assert_eq!(runner.calls_to("rsync").len(), 2);
}

#[test]
fn only_full_batch_archives_while_acquiring() {
    let root = TempDir::new().expect("root");
    write_chunk(root.path(), "0", 500);
    write_chunk(root.path(), "1", 1200);
    let ctx = context(root.path(), None);
    let runner = FakeRunner::new();

    let report = run_cycle(&ctx, &runner, &StaticProbe::new(true));

    assert_eq!(report.archived_count(), 1);
    assert_eq!(report.skipped_count(), 1);
    assert_eq!(staged_names(root.path()), vec!["run1_1_0.tar"]);
    assert!(report.transfer.is_none(), "local-only run must not transfer");
}

#[test]
fn skipped_batch_is_archived_exactly_once_after_acquisition_stops() {
    let root = TempDir::new().expect("root");
    let chunk = write_chunk(root.path(), "0", 200);
    let ctx = context(root.path(), Some(remote()));
    let runner = FakeRunner::new();
    let probe = StaticProbe::new(true);

    let first = run_cycle(&ctx, &runner, &probe);
    assert_eq!(first.batches[0].outcome, BatchOutcome::Skipped);
    assert!(staged_names(root.path()).is_empty());
    assert_eq!(raw_files(&chunk, &ctx.layout).unwrap().len(), 200);

    probe.set(false);
    let second = run_cycle(&ctx, &runner, &probe);
    assert_eq!(second.archived_count(), 1);
    assert_eq!(staged_names(root.path()), vec!["run1_0_0.tar"]);

    let third = run_cycle(&ctx, &runner, &probe);
    assert_eq!(third.archived_count(), 0);
    assert_eq!(third.discovered, 1, "emptied chunk dir is still discovered");
    assert_eq!(staged_names(root.path()), vec!["run1_0_0.tar"]);
    assert_eq!(runner.calls_to("tar").len(), 1);
}

#[test]
fn transfer_twice_without_new_archives_is_harmless() {
    let root = TempDir::new().expect("root");
    write_chunk(root.path(), "0", 3);
    let ctx = context(root.path(), None);
    let runner = FakeRunner::new();
    assert!(run_cycle(&ctx, &runner, &StaticProbe::new(false)).is_success());

    let sample = SampleName::from("RunA");
    let staging = root.path().join("staging");
    let first = sync_archives(&runner, &remote(), &staging, &sample, &ctx.layout).expect("first");
    let second =
        sync_archives(&runner, &remote(), &staging, &sample, &ctx.layout).expect("second");

    assert_eq!(first, second);
    assert_eq!(second.remote_dir, PathBuf::from("/groups/lab/raw/RunA/fast5"));
}

#[test]
fn pack_failure_strands_one_batch_and_the_rest_continue() {
    let root = TempDir::new().expect("root");
    write_chunk(root.path(), "0", 5);
    write_chunk(root.path(), "1", 5);
    let ctx = context(root.path(), Some(remote()));
    let runner = FakeRunner::new();
    runner.fail("tar");

    let report = run_cycle(&ctx, &runner, &StaticProbe::new(false));
    assert_eq!(report.failed_count(), 2);
    assert!(!report.is_success());
    assert!(
        report.failures().all(|err| err.contains("staging slot")),
        "failures name their slot"
    );
    assert_eq!(runner.calls_to("tar").len(), 2, "second batch still tried");
    assert_eq!(runner.calls_to("ssh").len(), 1, "transfer still runs");

    runner.recover("tar");
    let report = run_cycle(&ctx, &runner, &StaticProbe::new(false));
    assert!(report.is_success());
    assert_eq!(report.archived_count(), 0, "stranded files are not rediscovered");

    let inventory = inspect(&root.path().join("staging"), &SampleName::from("RunA"), &ctx.layout)
        .expect("inspect");
    assert_eq!(inventory.orphans.len(), 2);
    assert!(inventory.orphans.iter().all(|slot| slot.raw_files == 5));
}

#[test]
fn repeatedly_failing_batch_does_not_block_healthy_batches_or_transfer() {
    init_logging();
    let root = TempDir::new().expect("root");
    let sample_staging = root.path().join("staging").join("RunA");
    fs::create_dir_all(&sample_staging).expect("staging");
    fs::write(sample_staging.join("run0_0_0.tar"), b"earlier").expect("pre-staged archive");
    let ctx = context(root.path(), Some(remote()));
    let runner = FakeRunner::new();
    // Every pack of chunk 0 fails, whatever its slot suffix.
    runner.fail_matching("run1_0_");

    for cycle in 0..3 {
        // The instrument keeps writing into both chunks.
        write_chunk(root.path(), "0", 2 + cycle);
        let healthy = write_chunk(root.path(), &format!("{}", cycle + 1), 3);

        let report = run_cycle(&ctx, &runner, &StaticProbe::new(false));

        assert_eq!(report.failed_count(), 1, "cycle {cycle}");
        assert!(!report.is_success());
        assert!(
            raw_files(&healthy, &ctx.layout).unwrap().is_empty(),
            "cycle {cycle}: healthy batch archived"
        );
        assert!(report.transfer_error.is_none());
        assert_eq!(report.transferred_count(), 2 + cycle, "cycle {cycle}");
    }

    assert_eq!(runner.calls_to("ssh").len(), 3);
    let shipped: Vec<String> = runner
        .calls_to("rsync")
        .iter()
        .map(|call| call.to_string())
        .collect();
    assert!(shipped.iter().any(|call| call.contains("run0_0_0.tar")));
    assert!(shipped.iter().any(|call| call.contains("run1_3_0.tar")));
}

#[test]
fn transfer_failure_keeps_archives_for_next_cycle() {
    let root = TempDir::new().expect("root");
    write_chunk(root.path(), "0", 2);
    let ctx = context(root.path(), Some(remote()));
    let runner = FakeRunner::new();
    runner.fail("rsync");

    let report = run_cycle(&ctx, &runner, &StaticProbe::new(false));
    assert_eq!(report.archived_count(), 1);
    let err = report.transfer_error.as_deref().expect("transfer error");
    assert!(err.contains("rsync"), "got: {err}");
    assert_eq!(staged_names(root.path()), vec!["run1_0_0.tar"]);

    runner.recover("rsync");
    let report = run_cycle(&ctx, &runner, &StaticProbe::new(false));
    assert!(report.is_success());
    assert_eq!(report.archived_count(), 0);
    assert_eq!(report.transferred_count(), 1);
}

fn tar_available() -> bool {
    Command::new("tar")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

#[test]
fn real_tar_packs_moved_reads() {
    if !tar_available() {
        eprintln!("tar not available; skipping");
        return;
    }
    let root = TempDir::new().expect("root");
    write_chunk(root.path(), "4", 3);
    let ctx = context(root.path(), None);

    let report = run_cycle(&ctx, &SystemRunner, &StaticProbe::new(false));
    let archive = report.archives().next().expect("one archive").to_path_buf();

    let listing = Command::new("tar")
        .arg("-tf")
        .arg(&archive)
        .output()
        .expect("list archive");
    assert!(listing.status.success());
    let listing = String::from_utf8_lossy(&listing.stdout);
    for i in 0..3 {
        assert!(
            listing.contains(&format!("read_4_{i}.fast5")),
            "missing read_4_{i}.fast5 in {listing}"
        );
    }
    assert!(!listing.contains("._"), "sidecar files leaked: {listing}");
}
