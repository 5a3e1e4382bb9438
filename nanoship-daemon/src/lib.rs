//! Polling scheduler: one pipeline cycle per tick until shutdown.

mod error;
pub mod logging;
mod runtime;

pub use error::DaemonError;
pub use logging::{init_tracing, LogConfig};
pub use runtime::{next_wait, run, run_until_signal, start_blocking, RunSummary, Scheduler};
