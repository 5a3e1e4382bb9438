//! `nanoship watch`: poll until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use nanoship_daemon::{start_blocking, LogConfig, Scheduler};
use nanoship_detector::probe_from_config;
use nanoship_sync::SystemRunner;

use super::pipeline::PipelineArgs;

/// Arguments for `nanoship watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        let config = self.pipeline.load_config()?;
        let ctx = self.pipeline.context(&config)?;
        let probe = probe_from_config(&config.activity);
        let scheduler =
            Scheduler::from_config(ctx, &config, Arc::new(SystemRunner), Arc::new(probe))
                .context("failed to set up scheduler")?;

        let summary = start_blocking(scheduler, &LogConfig::from(&self.pipeline.log))
            .context("scheduler exited with error")?;
        println!(
            "stopped after {} cycles ({} failed)",
            summary.cycles, summary.failed
        );
        Ok(())
    }
}
