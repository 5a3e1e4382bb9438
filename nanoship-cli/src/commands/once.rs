//! `nanoship once`: a single cycle, then exit.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use nanoship_daemon::{init_tracing, LogConfig, Scheduler};
use nanoship_detector::probe_from_config;
use nanoship_sync::{BatchOutcome, CycleReport, SystemRunner};

use super::pipeline::PipelineArgs;

/// Arguments for `nanoship once`.
#[derive(Args, Debug)]
pub struct OnceArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Print the cycle report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl OnceArgs {
    pub fn run(self) -> Result<()> {
        init_tracing(&LogConfig::from(&self.pipeline.log));
        let config = self.pipeline.load_config()?;
        let ctx = self.pipeline.context(&config)?;
        let probe = probe_from_config(&config.activity);
        let scheduler =
            Scheduler::from_config(ctx, &config, Arc::new(SystemRunner), Arc::new(probe))
                .context("failed to set up scheduler")?;

        let report = scheduler.run_once();
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report_json(&report))
                    .context("failed to serialize cycle report")?
            );
        } else {
            print_report(&report, self.pipeline.dry_run);
        }

        if !report.is_success() {
            bail!(
                "cycle finished with {} failed batches{}",
                report.failed_count(),
                if report.transfer_error.is_some() {
                    " and a failed transfer"
                } else {
                    ""
                }
            );
        }
        Ok(())
    }
}

fn report_json(report: &CycleReport) -> serde_json::Value {
    let batches: Vec<_> = report
        .batches
        .iter()
        .map(|b| {
            serde_json::json!({
                "read_dir": b.batch.read_dir.display().to_string(),
                "run": b.batch.run.to_string(),
                "chunk": b.batch.chunk(),
                "readiness": b.readiness,
                "outcome": outcome_key(&b.outcome),
                "archive": match &b.outcome {
                    BatchOutcome::Archived { archive } => Some(archive.display().to_string()),
                    _ => None,
                },
                "error": match &b.outcome {
                    BatchOutcome::Failed { error } => Some(error.as_str()),
                    _ => None,
                },
            })
        })
        .collect();
    serde_json::json!({
        "discovered": report.discovered,
        "archived": report.archived_count(),
        "skipped": report.skipped_count(),
        "failed": report.failed_count(),
        "transferred": report.transferred_count(),
        "duration_ms": report.duration.as_millis() as u64,
        "batches": batches,
        "transfer": report.transfer,
        "transfer_error": report.transfer_error,
    })
}

fn outcome_key(outcome: &BatchOutcome) -> &'static str {
    match outcome {
        BatchOutcome::Archived { .. } => "archived",
        BatchOutcome::WouldArchive => "would_archive",
        BatchOutcome::Skipped => "skipped",
        BatchOutcome::Failed { .. } => "failed",
    }
}

fn print_report(report: &CycleReport, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    if report.discovered == 0 {
        println!("{prefix}no read directories found");
        return;
    }

    for b in &report.batches {
        let mark = match &b.outcome {
            BatchOutcome::Archived { .. } => "✓".green().bold(),
            BatchOutcome::WouldArchive => "~".yellow().bold(),
            BatchOutcome::Skipped => "·".bright_black(),
            BatchOutcome::Failed { .. } => "✗".red().bold(),
        };
        let detail = match &b.outcome {
            BatchOutcome::Archived { archive } => format!(" → {}", archive.display()),
            BatchOutcome::Failed { error } => format!(": {error}"),
            _ => String::new(),
        };
        let verdict = match &b.readiness {
            Some(readiness) => format!("{}, {} files", readiness.label(), readiness.count()),
            None => "unreadable".to_string(),
        };
        println!(
            "{prefix}{mark} {} [{verdict}]{detail}",
            b.batch.read_dir.display()
        );
    }

    println!(
        "{prefix}{} discovered, {} archived, {} skipped, {} failed, {} transferred",
        report.discovered,
        report.archived_count(),
        report.skipped_count(),
        report.failed_count(),
        report.transferred_count(),
    );
    if let Some(error) = &report.transfer_error {
        println!("{prefix}{} transfer failed: {error}", "✗".red().bold());
    }
}
