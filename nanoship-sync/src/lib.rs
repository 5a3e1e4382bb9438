//! # nanoship-sync
//!
//! The archive pipeline: discover read batches, decide readiness, move each
//! ready batch into a staging slot, pack it, and ship staged archives.
//!
//! Call [`run_cycle`] to do all of it once. External tools run through a
//! [`CommandRunner`] so tests can substitute [`FakeRunner`].

pub mod archiver;
pub mod command;
pub mod discovery;
pub mod error;
pub mod pipeline;
pub mod readiness;
pub mod staging;
pub mod transfer;

pub use command::{CommandOutput, CommandRunner, CommandSpec, FakeRunner, SystemRunner};
pub use discovery::discover_batches;
pub use error::SyncError;
pub use pipeline::{run_cycle, BatchOutcome, BatchReport, CycleReport, PipelineContext};
pub use readiness::{Readiness, ReadinessPolicy};
pub use staging::{allocate_slot, inspect, StagingInventory};
pub use transfer::{sync_archives, TransferReport};
