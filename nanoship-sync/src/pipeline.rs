//! One discover → decide → archive → transfer cycle.
//!
//! This is the unit of work the daemon repeats on every tick and that
//! `nanoship once` runs a single time.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use nanoship_core::{Layout, PipelineConfig, ReadBatch, RemoteTarget, SampleName};
use nanoship_detector::ActivityProbe;

use crate::archiver::archive_batch;
use crate::command::CommandRunner;
use crate::discovery::discover_batches;
use crate::error::SyncError;
use crate::readiness::{Readiness, ReadinessPolicy};
use crate::staging::allocate_slot;
use crate::transfer::{sync_archives, TransferReport};

/// Everything a cycle needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub data_dir: PathBuf,
    pub sample: SampleName,
    pub staging_dir: PathBuf,
    pub layout: Layout,
    pub policy: ReadinessPolicy,
    /// `None` runs local-only: archives are produced but not shipped.
    pub remote: Option<RemoteTarget>,
    /// Decide and report, but move nothing and ship nothing.
    pub dry_run: bool,
}

impl PipelineContext {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        sample: SampleName,
        staging_dir: impl Into<PathBuf>,
        config: &PipelineConfig,
        remote: Option<RemoteTarget>,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            sample,
            staging_dir: staging_dir.into(),
            layout: config.layout.clone(),
            policy: ReadinessPolicy::new(config.batch_threshold),
            remote,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// What happened to one discovered batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Archived into `archive`.
    Archived { archive: PathBuf },
    /// `--dry-run`: the batch *would* have been archived.
    WouldArchive,
    /// Not ready this cycle.
    Skipped,
    /// Evaluating or archiving failed; retried next cycle.
    Failed { error: String },
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub batch: ReadBatch,
    /// `None` when readiness could not be evaluated.
    pub readiness: Option<Readiness>,
    pub outcome: BatchOutcome,
}

/// Summary of one cycle, including its failures.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub discovered: usize,
    pub batches: Vec<BatchReport>,
    /// `None` when transfer did not run (dry run or local-only) or failed.
    pub transfer: Option<TransferReport>,
    pub transfer_error: Option<String>,
    pub duration: Duration,
}

impl CycleReport {
    pub fn archives(&self) -> impl Iterator<Item = &Path> {
        self.batches.iter().filter_map(|report| match &report.outcome {
            BatchOutcome::Archived { archive } => Some(archive.as_path()),
            _ => None,
        })
    }

    pub fn archived_count(&self) -> usize {
        self.archives().count()
    }

    pub fn skipped_count(&self) -> usize {
        self.batches
            .iter()
            .filter(|report| report.outcome == BatchOutcome::Skipped)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    /// Error messages of failed batches, in processing order.
    pub fn failures(&self) -> impl Iterator<Item = &str> {
        self.batches.iter().filter_map(|report| match &report.outcome {
            BatchOutcome::Failed { error } => Some(error.as_str()),
            _ => None,
        })
    }

    pub fn transferred_count(&self) -> usize {
        self.transfer
            .as_ref()
            .map(|transfer| transfer.archives.len())
            .unwrap_or(0)
    }

    /// No batch failed and the transfer (if any) went through.
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0 && self.transfer_error.is_none()
    }
}

/// Run one cycle.
///
/// Batches are processed in sorted order. A failing batch is recorded and
/// the cycle moves on to the next one; the transfer step runs regardless,
/// so archives staged earlier keep shipping.
pub fn run_cycle(
    ctx: &PipelineContext,
    runner: &dyn CommandRunner,
    probe: &dyn ActivityProbe,
) -> CycleReport {
    let started = Instant::now();

    let mut batches: Vec<ReadBatch> =
        discover_batches(&ctx.data_dir, &ctx.sample, &ctx.layout).collect();
    batches.sort();
    let discovered = batches.len();

    let mut reports = Vec::with_capacity(discovered);
    for batch in batches {
        let report = match ctx.policy.evaluate(&batch, &ctx.layout, probe) {
            Ok(readiness) => {
                tracing::debug!("{batch}: {} ({} files)", readiness.label(), readiness.count());
                let outcome = process_batch(ctx, runner, &batch, &readiness);
                BatchReport {
                    batch,
                    readiness: Some(readiness),
                    outcome,
                }
            }
            Err(err) => BatchReport {
                outcome: failed(&batch, &err),
                batch,
                readiness: None,
            },
        };
        reports.push(report);
    }

    let (transfer, transfer_error) = match (&ctx.remote, ctx.dry_run) {
        (Some(remote), false) => {
            match sync_archives(runner, remote, &ctx.staging_dir, &ctx.sample, &ctx.layout) {
                Ok(report) => (Some(report), None),
                Err(err) => {
                    tracing::error!("transfer failed: {err}");
                    (None, Some(err.to_string()))
                }
            }
        }
        _ => (None, None),
    };

    CycleReport {
        discovered,
        batches: reports,
        transfer,
        transfer_error,
        duration: started.elapsed(),
    }
}

fn process_batch(
    ctx: &PipelineContext,
    runner: &dyn CommandRunner,
    batch: &ReadBatch,
    readiness: &Readiness,
) -> BatchOutcome {
    if !readiness.is_ready() {
        return BatchOutcome::Skipped;
    }
    if ctx.dry_run {
        tracing::info!(
            "[dry-run] would archive {} ({} files)",
            batch.read_dir.display(),
            readiness.count()
        );
        return BatchOutcome::WouldArchive;
    }

    let slot = match allocate_slot(&ctx.staging_dir, batch, &ctx.layout) {
        Ok(slot) => slot,
        Err(err) => return failed(batch, &err),
    };
    tracing::info!("staging directory: {}", slot.display());
    match archive_batch(runner, &slot, batch, &ctx.layout) {
        Ok(archive) => BatchOutcome::Archived { archive },
        Err(source) => failed(
            batch,
            &SyncError::Archive {
                read_dir: batch.read_dir.clone(),
                slot,
                source: Box::new(source),
            },
        ),
    }
}

fn failed(batch: &ReadBatch, err: &SyncError) -> BatchOutcome {
    tracing::error!("{batch}: {err}");
    BatchOutcome::Failed {
        error: err.to_string(),
    }
}
