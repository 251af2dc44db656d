//! Bounded subprocess execution.
//!
//! # Design
//! - Children are spawned with `kill_on_drop`, so abandoning the wait (timeout or
//!   request cancellation) terminates the process.
//! - Stdin is closed; stdout and stderr are captured in full.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use folio_jobs::{TransformError, TransformResult};
use tokio::process::Command;
use tracing::{debug, warn};

const STDERR_TAIL: usize = 512;

/// Captured result of a successful command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Raw standard output.
    pub stdout: Vec<u8>,
    /// Standard error, lossily decoded.
    pub stderr: String,
}

/// Runs one external program with a time budget.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: PathBuf,
}

impl CommandRunner {
    /// Wrap the program at `program` (a bare name is resolved through `PATH`).
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Program this runner invokes.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run the program with `args` in `working_dir`, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// - [`TransformError::Timeout`] when the budget is exhausted; the child is killed.
    /// - [`TransformError::Failed`] when the program is missing or exits unsuccessfully.
    pub async fn run<I, S>(
        &self,
        operation: &'static str,
        args: I,
        working_dir: Option<&Path>,
        timeout: Duration,
    ) -> TransformResult<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = working_dir {
            command.current_dir(dir);
        }

        let started = Instant::now();
        let child = command
            .spawn()
            .map_err(|err| self.spawn_error(operation, &err))?;
        let Ok(waited) = tokio::time::timeout(timeout, child.wait_with_output()).await else {
            warn!(
                operation,
                program = %self.program.display(),
                timeout_secs = timeout.as_secs(),
                "external tool timed out; process killed"
            );
            return Err(TransformError::Timeout { operation, timeout });
        };
        let output = waited.map_err(|err| {
            TransformError::failed(operation, format!("{} did not complete: {err}", self.name()))
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!(
            operation,
            program = %self.program.display(),
            status = %output.status,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "external tool finished"
        );
        if !output.status.success() {
            return Err(TransformError::failed(
                operation,
                format!("{} failed ({}): {}", self.name(), output.status, tail(&stderr)),
            ));
        }
        Ok(CommandOutput {
            stdout: output.stdout,
            stderr,
        })
    }

    fn name(&self) -> String {
        self.program.file_name().map_or_else(
            || self.program.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        )
    }

    fn spawn_error(&self, operation: &'static str, err: &io::Error) -> TransformError {
        if err.kind() == io::ErrorKind::NotFound {
            TransformError::failed(
                operation,
                format!("{} is not installed or not on PATH", self.name()),
            )
        } else {
            TransformError::failed(operation, format!("cannot start {}: {err}", self.name()))
        }
    }
}

fn tail(stderr: &str) -> &str {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_TAIL {
        return trimmed;
    }
    let mut start = trimmed.len() - STDERR_TAIL;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    &trimmed[start..]
}
