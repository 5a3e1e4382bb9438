//! Domain types, pipeline configuration, and errors shared by every nanoship crate.
//!
//! - [`types`]: newtypes, [`ReadBatch`], [`Layout`], [`RemoteTarget`]
//! - [`config`]: [`PipelineConfig`] loading from YAML
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{ActivityConfig, PipelineConfig, RemoteConfig};
pub use error::ConfigError;
pub use types::{Layout, ReadBatch, RemoteTarget, RunName, SampleName};
