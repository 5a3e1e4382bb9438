//! Error types for nanoship-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from loading or resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, annotated with the file involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, with file path and serde_yaml's line context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An explicitly requested config file does not exist.
    #[error("config not found at {path}")]
    NotFound { path: PathBuf },

    /// A value required for the requested mode is missing.
    #[error("missing setting '{setting}': {hint}")]
    Missing {
        setting: &'static str,
        hint: &'static str,
    },

    /// A value is present but unusable.
    #[error("invalid setting '{setting}': {message}")]
    Invalid {
        setting: &'static str,
        message: String,
    },
}
