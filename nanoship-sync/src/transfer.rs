//! Shipping staged archives to the remote host.
//!
//! Every call rescans all archives of the sample instead of tracking what
//! was already sent: rsync makes a repeat of a finished file a cheap no-op
//! and resumes a partial one, so a failed cycle is retried by the next.

use std::path::{Path, PathBuf};

use nanoship_core::{Layout, RemoteTarget, SampleName};
use serde::Serialize;

use crate::command::{ensure_success, CommandRunner, CommandSpec};
use crate::error::SyncError;
use crate::staging::list_archives;

/// What one transfer step pushed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    /// `<remote.dir>/<sample>/<data_kind>` on the remote host.
    pub remote_dir: PathBuf,
    pub archives: Vec<PathBuf>,
}

/// `ssh <user>@<host> mkdir -p <remote_dir>`
pub fn mkdir_command(remote: &RemoteTarget, remote_dir: &Path) -> CommandSpec {
    CommandSpec::new("ssh")
        .arg(remote.login())
        .arg("mkdir")
        .arg("-p")
        .arg(remote_dir)
}

/// `rsync -aP <archive> <user>@<host>:<remote_dir>`
pub fn rsync_command(remote: &RemoteTarget, archive: &Path, remote_dir: &Path) -> CommandSpec {
    CommandSpec::new("rsync")
        .arg("-aP")
        .arg(archive)
        .arg(format!("{}:{}", remote.login(), remote_dir.display()))
}

/// Ensure the remote sample directory exists, then rsync every staged archive.
///
/// Stops at the first failing command.
pub fn sync_archives(
    runner: &dyn CommandRunner,
    remote: &RemoteTarget,
    staging_root: &Path,
    sample: &SampleName,
    layout: &Layout,
) -> Result<TransferReport, SyncError> {
    let remote_dir = remote.sample_dir(sample, layout);
    tracing::info!("copying to {}:{}", remote.login(), remote_dir.display());

    let mkdir = mkdir_command(remote, &remote_dir);
    tracing::info!("{mkdir}");
    ensure_success(&mkdir, runner.run(&mkdir))?;

    let archives = list_archives(staging_root, sample, layout)?;
    for archive in &archives {
        let rsync = rsync_command(remote, archive, &remote_dir);
        tracing::info!("{rsync}");
        ensure_success(&rsync, runner.run(&rsync))?;
    }

    tracing::info!("transfer done: {} archives", archives.len());
    Ok(TransferReport {
        remote_dir,
        archives,
    })
}
