//! External command execution.
//!
//! Every external tool (packing, remote mkdir, remote sync) goes through
//! [`CommandRunner`]. Runners never fail: a non-zero exit or a program that
//! cannot be spawned is reported in [`CommandOutput`], and callers turn an
//! unsuccessful output into a [`SyncError::Command`] with [`ensure_success`].

use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Mutex;

use crate::error::SyncError;

// ---------------------------------------------------------------------------
// Command description
// ---------------------------------------------------------------------------

/// A program invocation: no shell, arguments passed verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<OsString>,
    pub envs: Vec<(OsString, OsString)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.envs {
            write!(f, "{}={} ", key.to_string_lossy(), value.to_string_lossy())?;
        }
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Structured result of one command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub success: bool,
    /// Exit code; `None` if killed by a signal or never started.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            code: Some(0),
            ..Self::default()
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stderr: stderr.into(),
            ..Self::default()
        }
    }

    /// The program could not be started at all.
    pub fn not_started(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            code: None,
            stderr: reason.into(),
            ..Self::default()
        }
    }
}

/// Turn an unsuccessful [`CommandOutput`] into [`SyncError::Command`].
pub fn ensure_success(
    command: &CommandSpec,
    output: CommandOutput,
) -> Result<CommandOutput, SyncError> {
    if output.success {
        return Ok(output);
    }
    let status = match output.code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code".to_string(),
    };
    let stderr = output.stderr.trim();
    let detail = if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    };
    Err(SyncError::Command {
        command: command.to_string(),
        status,
        detail,
    })
}

// ---------------------------------------------------------------------------
// Runners
// ---------------------------------------------------------------------------

/// Executes [`CommandSpec`]s. Blocking; no timeout.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &CommandSpec) -> CommandOutput;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, command: &CommandSpec) -> CommandOutput {
        (**self).run(command)
    }
}

/// Runs commands as real child processes, capturing their output.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &CommandSpec) -> CommandOutput {
        let output = Command::new(&command.program)
            .args(&command.args)
            .envs(command.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .output();

        match output {
            Ok(output) => CommandOutput {
                success: output.status.success(),
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
            Err(err) => CommandOutput::not_started(format!("{}: {err}", command.program)),
        }
    }
}

/// In-memory runner: records every command, fails programs on request, and
/// stands in for `tar` by creating the file named after `-cf`.
#[derive(Debug, Default)]
pub struct FakeRunner {
    calls: Mutex<Vec<CommandSpec>>,
    failing: Mutex<HashSet<String>>,
    failing_text: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later invocation of `program` exit with code 1.
    pub fn fail(&self, program: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(program.to_string());
        }
    }

    /// Fail every later command whose rendered text contains `needle`.
    pub fn fail_matching(&self, needle: &str) {
        if let Ok(mut failing) = self.failing_text.lock() {
            failing.push(needle.to_string());
        }
    }

    /// Undo [`FakeRunner::fail`].
    pub fn recover(&self, program: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.remove(program);
        }
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Recorded invocations of `program`.
    pub fn calls_to(&self, program: &str) -> Vec<CommandSpec> {
        self.calls()
            .into_iter()
            .filter(|call| call.program == program)
            .collect()
    }

    fn is_failing(&self, command: &CommandSpec) -> bool {
        let by_program = self
            .failing
            .lock()
            .map(|failing| failing.contains(&command.program))
            .unwrap_or(false);
        if by_program {
            return true;
        }
        let rendered = command.to_string();
        self.failing_text
            .lock()
            .map(|needles| needles.iter().any(|needle| rendered.contains(needle.as_str())))
            .unwrap_or(false)
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, command: &CommandSpec) -> CommandOutput {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command.clone());
        }

        if self.is_failing(command) {
            return CommandOutput::failed(1, format!("{}: injected failure", command.program));
        }

        if command.program == "tar" {
            let target = command
                .args
                .iter()
                .position(|arg| arg == "-cf")
                .and_then(|i| command.args.get(i + 1))
                .map(PathBuf::from);
            if let Some(target) = target {
                if let Err(err) = std::fs::write(&target, b"fake archive") {
                    return CommandOutput::failed(2, err.to_string());
                }
            }
        }

        CommandOutput::succeeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_env_program_and_args() {
        let spec = CommandSpec::new("tar")
            .env("COPYFILE_DISABLE", "1")
            .arg("-cf")
            .arg("/s/a.tar")
            .arg("-C")
            .arg("/s/a")
            .arg(".");
        assert_eq!(
            spec.to_string(),
            "COPYFILE_DISABLE=1 tar -cf /s/a.tar -C /s/a ."
        );
    }

    #[test]
    fn ensure_success_passes_successful_output_through() {
        let spec = CommandSpec::new("true");
        let output = ensure_success(&spec, CommandOutput::succeeded()).expect("ok");
        assert!(output.success);
    }

    #[test]
    fn ensure_success_reports_code_and_stderr() {
        let spec = CommandSpec::new("rsync").arg("-aP");
        let err = ensure_success(&spec, CommandOutput::failed(23, "partial transfer\n"))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("exit code 23"), "got: {msg}");
        assert!(msg.contains("rsync -aP"), "got: {msg}");
        assert!(msg.contains("partial transfer"), "got: {msg}");
    }

    #[test]
    fn system_runner_reports_missing_program_without_panicking() {
        let output = SystemRunner.run(&CommandSpec::new("nanoship-no-such-program-xyz"));
        assert!(!output.success);
        assert!(output.code.is_none());
        assert!(!output.stderr.is_empty());
    }

    #[test]
    fn fake_runner_records_and_injects_failures() {
        let runner = FakeRunner::new();
        assert!(runner.run(&CommandSpec::new("ssh")).success);
        runner.fail("ssh");
        assert!(!runner.run(&CommandSpec::new("ssh")).success);
        runner.recover("ssh");
        assert!(runner.run(&CommandSpec::new("ssh")).success);
        assert_eq!(runner.calls_to("ssh").len(), 3);
    }

    #[test]
    fn fake_runner_fails_only_matching_commands() {
        let runner = FakeRunner::new();
        runner.fail_matching("run1_0_");
        assert!(!runner.run(&CommandSpec::new("tar").arg("-cf").arg("/s/run1_0_0.tar")).success);
        assert!(runner.run(&CommandSpec::new("tar").arg("-cf").arg("/s/run1_1_0.tar")).success);
    }
}
