//! Arguments shared by `nanoship watch` and `nanoship once`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use nanoship_core::{config, PipelineConfig, SampleName};
use nanoship_daemon::LogConfig;
use nanoship_sync::PipelineContext;

#[derive(Args, Debug)]
pub struct PipelineArgs {
    /// Instrument output root, scanned as `<data-dir>/*/<sample>/*/fast5_pass/*`.
    pub data_dir: PathBuf,

    /// Sample name as it appears under the data directory.
    pub sample: String,

    /// Local staging root; archives are kept in `<staging-dir>/<sample>`.
    pub staging_dir: PathBuf,

    /// Config file (default: `<config_dir>/nanoship/config.yaml`).
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Seconds between cycle starts.
    #[arg(long, value_name = "SECS")]
    pub poll_interval: Option<f64>,

    /// Archive a batch at this many files even while the sequencer runs.
    #[arg(long, value_name = "FILES")]
    pub batch_threshold: Option<usize>,

    /// Remote host receiving the archives.
    #[arg(long)]
    pub remote_host: Option<String>,

    /// Login on the remote host (default: current user).
    #[arg(long)]
    pub remote_user: Option<String>,

    /// Base directory on the remote host.
    #[arg(long)]
    pub remote_dir: Option<PathBuf>,

    /// Treat acquisition as running while this file exists.
    #[arg(long, value_name = "FILE")]
    pub lock_file: Option<PathBuf>,

    /// Report what would be archived without moving or sending anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Archive locally but skip the transfer step.
    #[arg(long)]
    pub no_transfer: bool,

    #[command(flatten)]
    pub log: LogArgs,
}

#[derive(Args, Debug)]
pub struct LogArgs {
    /// Log filter when RUST_LOG is unset (e.g. `debug`, `nanoship_sync=debug`).
    #[arg(long, default_value = "info", value_name = "FILTER")]
    pub log_level: String,

    /// Write logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,
}

impl From<&LogArgs> for LogConfig {
    fn from(args: &LogArgs) -> Self {
        LogConfig {
            level: args.log_level.clone(),
            json: args.log_json,
        }
    }
}

impl PipelineArgs {
    /// Config file values with command-line overrides applied.
    pub fn load_config(&self) -> Result<PipelineConfig> {
        let mut config = config::load(self.config.as_deref()).context("failed to load config")?;

        if let Some(secs) = self.poll_interval {
            config.poll_interval_secs = secs;
        }
        if let Some(threshold) = self.batch_threshold {
            config.batch_threshold = threshold;
        }
        if let Some(host) = &self.remote_host {
            config.remote.host = Some(host.clone());
        }
        if let Some(user) = &self.remote_user {
            config.remote.user = Some(user.clone());
        }
        if let Some(dir) = &self.remote_dir {
            config.remote.dir = Some(dir.clone());
        }
        if let Some(lock_file) = &self.lock_file {
            config.activity.lock_file = Some(lock_file.clone());
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    /// Build the cycle context. Fails when a transfer is due but the remote
    /// target is incomplete.
    pub fn context(&self, config: &PipelineConfig) -> Result<PipelineContext> {
        let remote = if self.no_transfer {
            None
        } else {
            match config.remote_target() {
                Ok(target) => Some(target),
                // Dry runs never transfer, so an unset remote is fine.
                Err(_) if self.dry_run => None,
                Err(err) => {
                    return Err(err)
                        .context("no remote target; use --no-transfer to archive locally");
                }
            }
        };

        Ok(PipelineContext::new(
            &self.data_dir,
            SampleName::from(self.sample.as_str()),
            &self.staging_dir,
            config,
            remote,
        )
        .dry_run(self.dry_run))
    }
}
