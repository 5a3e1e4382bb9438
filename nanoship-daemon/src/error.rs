use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the scheduler runtime.
///
/// Cycle failures are not here: they are logged and retried on the next
/// tick. These errors stop the daemon.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] nanoship_core::ConfigError),

    #[error("signal handler failed: {0}")]
    Signal(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
