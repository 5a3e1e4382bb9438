//! Acquisition-activity detection for `nanoship-detector`.
//!
//! [`ActivityProbe::is_active`] estimates whether the instrument is still
//! writing data for the current run. It is a heuristic: there is no error
//! case, and absence of evidence is reported as "not active".
//!
//! Probes, in the order [`probe_from_config`] combines them:
//! - [`ProcessTableProbe`]: a process whose command line carries every marker
//! - [`LockFileProbe`]: a file that exists for the duration of acquisition
//!
//! [`StaticProbe`] is a settable stand-in, used by tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nanoship_core::ActivityConfig;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System, UpdateKind};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Answers whether the acquisition instrument is actively writing right now.
pub trait ActivityProbe: Send + Sync {
    fn is_active(&self) -> bool;
}

impl<P: ActivityProbe + ?Sized> ActivityProbe for Box<P> {
    fn is_active(&self) -> bool {
        (**self).is_active()
    }
}

impl<P: ActivityProbe + ?Sized> ActivityProbe for Arc<P> {
    fn is_active(&self) -> bool {
        (**self).is_active()
    }
}

impl<P: ActivityProbe + ?Sized> ActivityProbe for &P {
    fn is_active(&self) -> bool {
        (**self).is_active()
    }
}

// ---------------------------------------------------------------------------
// Process table
// ---------------------------------------------------------------------------

/// Scans the host process table for the acquisition-control software.
#[derive(Debug, Clone)]
pub struct ProcessTableProbe {
    markers: Vec<String>,
}

impl ProcessTableProbe {
    pub fn new(markers: Vec<String>) -> Self {
        Self { markers }
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }
}

impl ActivityProbe for ProcessTableProbe {
    fn is_active(&self) -> bool {
        if self.markers.is_empty() {
            return false;
        }

        let mut system = System::new_with_specifics(RefreshKind::nothing());
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always),
        );

        let found = system.processes().values().any(|process| {
            let line = process_line(process);
            command_line_matches(&line, &self.markers)
        });
        tracing::debug!("process probe: active={found}");
        found
    }
}

/// Full command line of `process`, or its name when the command line is
/// not readable (other users' processes on some platforms).
fn process_line(process: &sysinfo::Process) -> String {
    let cmd = process.cmd();
    if cmd.is_empty() {
        return process.name().to_string_lossy().into_owned();
    }
    cmd.iter()
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// True if `line` contains every marker as a substring.
///
/// An empty marker set never matches.
pub fn command_line_matches(line: &str, markers: &[String]) -> bool {
    !markers.is_empty() && markers.iter().all(|marker| line.contains(marker.as_str()))
}

// ---------------------------------------------------------------------------
// Lock file
// ---------------------------------------------------------------------------

/// Active while a file exists at `path`.
#[derive(Debug, Clone)]
pub struct LockFileProbe {
    path: PathBuf,
}

impl LockFileProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ActivityProbe for LockFileProbe {
    fn is_active(&self) -> bool {
        self.path.exists()
    }
}

// ---------------------------------------------------------------------------
// Static
// ---------------------------------------------------------------------------

/// A probe that reports whatever it was last told.
#[derive(Debug, Default)]
pub struct StaticProbe {
    active: AtomicBool,
}

impl StaticProbe {
    pub fn new(active: bool) -> Self {
        Self {
            active: AtomicBool::new(active),
        }
    }

    pub fn set(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}

impl ActivityProbe for StaticProbe {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// Active if any inner probe is active. Short-circuits in order.
#[derive(Default)]
pub struct AnyProbe {
    probes: Vec<Box<dyn ActivityProbe>>,
}

impl AnyProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, probe: impl ActivityProbe + 'static) -> Self {
        self.probes.push(Box::new(probe));
        self
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

impl ActivityProbe for AnyProbe {
    fn is_active(&self) -> bool {
        self.probes.iter().any(|probe| probe.is_active())
    }
}

/// Build the probe described by `config`: a lock-file check (if configured)
/// followed by the process-table scan.
pub fn probe_from_config(config: &ActivityConfig) -> AnyProbe {
    let mut probe = AnyProbe::new();
    if let Some(lock_file) = &config.lock_file {
        probe = probe.with(LockFileProbe::new(lock_file.clone()));
    }
    if !config.process_markers.is_empty() {
        probe = probe.with(ProcessTableProbe::new(config.process_markers.clone()));
    }
    probe
}
