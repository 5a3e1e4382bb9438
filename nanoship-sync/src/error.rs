//! Error types for nanoship-sync.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from a pipeline cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An external command ran (or failed to start) and did not succeed.
    #[error("command failed ({status}): {command}{detail}")]
    Command {
        command: String,
        status: String,
        detail: String,
    },

    /// The packing command reported success but produced no archive.
    #[error("archive missing after packing: {path}")]
    MissingArchive { path: PathBuf },

    /// Archiving one batch failed; files may be stranded in `slot`.
    #[error("archiving {read_dir} failed (staging slot {slot}): {source}")]
    Archive {
        read_dir: PathBuf,
        slot: PathBuf,
        #[source]
        source: Box<SyncError>,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
