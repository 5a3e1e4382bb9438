use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;

use nanoship_core::PipelineConfig;
use nanoship_detector::ActivityProbe;
use nanoship_sync::{run_cycle, CommandRunner, CycleReport, PipelineContext};

use crate::error::{io_err, DaemonError};
use crate::logging::{init_tracing, LogConfig};

/// Counters returned when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub failed: u64,
}

/// A pipeline plus its collaborators and cadence.
#[derive(Clone)]
pub struct Scheduler {
    ctx: Arc<PipelineContext>,
    interval: Duration,
    runner: Arc<dyn CommandRunner>,
    probe: Arc<dyn ActivityProbe>,
}

impl Scheduler {
    pub fn new(
        ctx: PipelineContext,
        interval: Duration,
        runner: Arc<dyn CommandRunner>,
        probe: Arc<dyn ActivityProbe>,
    ) -> Self {
        Self {
            ctx: Arc::new(ctx),
            interval,
            runner,
            probe,
        }
    }

    /// Like [`Scheduler::new`], with the interval taken from `config`.
    pub fn from_config(
        ctx: PipelineContext,
        config: &PipelineConfig,
        runner: Arc<dyn CommandRunner>,
        probe: Arc<dyn ActivityProbe>,
    ) -> Result<Self, DaemonError> {
        Ok(Self::new(ctx, config.poll_interval()?, runner, probe))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    /// Run one cycle on the current thread and log its outcome.
    pub fn run_once(&self) -> CycleReport {
        let report = run_cycle(&self.ctx, self.runner.as_ref(), self.probe.as_ref());
        log_cycle(&self.ctx, &report);
        report
    }
}

/// Time left until `last_tick + interval`; zero if already past.
///
/// The first tick (`last_tick == None`) is due immediately.
pub fn next_wait(last_tick: Option<Instant>, now: Instant, interval: Duration) -> Duration {
    match last_tick {
        None => Duration::ZERO,
        Some(last) => interval.saturating_sub(now.saturating_duration_since(last)),
    }
}

/// Start the scheduler and block the current thread until Ctrl-C.
pub fn start_blocking(scheduler: Scheduler, log: &LogConfig) -> Result<RunSummary, DaemonError> {
    init_tracing(log);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;

    runtime.block_on(run_until_signal(scheduler, tokio::signal::ctrl_c()))
}

/// Run the scheduler until `signal` resolves.
///
/// If listening for the signal fails, the loop is stopped and the failure
/// is returned as [`DaemonError::Signal`] rather than leaving a loop that
/// cannot be interrupted.
pub async fn run_until_signal<S>(
    scheduler: Scheduler,
    signal: S,
) -> Result<RunSummary, DaemonError>
where
    S: Future<Output = io::Result<()>> + Send + 'static,
{
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(4);

    let mut signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            match signal.await {
                Ok(()) => {
                    tracing::info!("received ctrl-c, stopping after the current cycle");
                    let _ = shutdown.send(());
                    Ok(())
                }
                Err(err) => {
                    tracing::error!(error = %err, "cannot listen for ctrl-c");
                    Err(DaemonError::Signal(err.to_string()))
                }
            }
        })
    };

    let scheduled = run(scheduler, shutdown_rx);
    tokio::pin!(scheduled);

    tokio::select! {
        summary = &mut scheduled => {
            signal_handle.abort();
            summary
        }
        signal_result = &mut signal_handle => {
            match signal_result {
                Ok(Ok(())) => scheduled.await,
                Ok(Err(err)) => Err(err),
                Err(join) => Err(DaemonError::Signal(join.to_string())),
            }
        }
    }
}

/// Run cycles at a fixed cadence until a message arrives on `shutdown_rx`
/// (or its sender is dropped).
///
/// A shutdown that arrives mid-cycle takes effect once the cycle finishes.
/// Cycle failures are logged and counted; they never end the loop.
pub async fn run(
    scheduler: Scheduler,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<RunSummary, DaemonError> {
    tracing::info!(
        sample = %scheduler.ctx.sample,
        data_dir = %scheduler.ctx.data_dir.display(),
        staging_dir = %scheduler.ctx.staging_dir.display(),
        interval_ms = scheduler.interval.as_millis() as u64,
        dry_run = scheduler.ctx.dry_run,
        transfer = scheduler.ctx.remote.is_some(),
        "scheduler started",
    );

    let mut summary = RunSummary::default();
    let mut last_tick: Option<Instant> = None;

    loop {
        let wait = next_wait(last_tick, Instant::now(), scheduler.interval);
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        let tick = Instant::now();
        last_tick = Some(tick);
        summary.cycles += 1;
        tracing::debug!(cycle = summary.cycles, "tick");

        let worker = scheduler.clone();
        match tokio::task::spawn_blocking(move || worker.run_once()).await {
            Ok(report) if report.is_success() => {}
            Ok(_) => summary.failed += 1,
            Err(err) => {
                summary.failed += 1;
                tracing::error!(error = %err, "cycle task aborted");
            }
        }
    }

    tracing::info!(
        cycles = summary.cycles,
        failed = summary.failed,
        "scheduler stopped"
    );
    Ok(summary)
}

fn log_cycle(ctx: &PipelineContext, report: &CycleReport) {
    if report.is_success() {
        tracing::info!(
            discovered = report.discovered,
            archived = report.archived_count(),
            skipped = report.skipped_count(),
            transferred = report.transferred_count(),
            duration_ms = report.duration.as_millis() as u64,
            "cycle completed",
        );
    } else {
        tracing::error!(
            discovered = report.discovered,
            archived = report.archived_count(),
            failed = report.failed_count(),
            transfer_error = report.transfer_error.as_deref().unwrap_or("none"),
            "cycle finished with failures; retrying on the next tick",
        );
    }
    if report.discovered == 0 {
        tracing::warn!(
            sample = %ctx.sample,
            data_dir = %ctx.data_dir.display(),
            "no read directories found; check the sample name and data directory",
        );
    }
}
