//! Process-wide log subscriber, configured once at startup.
//!
//! Library crates log through the `log` facade; the subscriber's default
//! `tracing-log` bridge forwards those records here as well.

use tracing_subscriber::{fmt, EnvFilter};

/// How the daemon writes its log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset (e.g. `info`, `nanoship_sync=debug`).
    pub level: String,
    /// Emit one JSON object per line instead of human-readable text.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LogConfig {
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global subscriber, writing to stderr. A second call is a no-op.
pub fn init_tracing(config: &LogConfig) {
    let builder = fmt()
        .with_env_filter(config.filter())
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_level_falls_back_to_info() {
        let config = LogConfig {
            level: "[not a directive".to_string(),
            json: false,
        };
        // Must not panic.
        let _ = config.filter();
    }
}
