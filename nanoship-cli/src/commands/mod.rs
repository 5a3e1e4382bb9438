pub mod once;
pub mod pipeline;
pub mod status;
pub mod watch;
