//! Type-safe external step execution.
//!
//! Every external tool the provisioning core touches (`lsblk`, `mount`,
//! `disko`, `zpool`, ...) is described by a struct implementing [`ToolArgs`]
//! and executed through a [`CommandRunner`]. This is the ONLY sanctioned way
//! to spawn a tool, so that:
//!
//! - Arguments are typed, not assembled from strings at call sites
//! - Secret stdin payloads are redacted in every log line
//! - Output is always captured for diagnostics
//! - Children run in their own process group and die with the installer
//!
//! # Architecture Rule
//!
//! Production code uses [`SystemRunner`] (optionally wrapped in
//! [`DryRunRunner`]). Tests substitute a scripted runner.

use std::fmt;
use std::io::Write;
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use crate::error::{Result, TuinixError};
use crate::process_guard::{ChildRegistry, CommandProcessGroup};
use crate::secret::{Secret, REDACTED};

/// Trait for typed tool arguments.
///
/// Implementors define the mapping between Rust struct fields and the tool's
/// command line. The struct definition IS the contract.
///
/// # Invariants
///
/// - `to_cli_args()` never contains a secret; secrets go through
///   `stdin_payload()` as [`StdinPayload::Secret`].
/// - `is_destructive()` is true for anything that changes disk or pool state.
pub trait ToolArgs {
    /// Program name resolved through `PATH` (e.g. `"lsblk"`).
    fn program(&self) -> &'static str;

    /// Arguments exactly as the tool expects them.
    fn to_cli_args(&self) -> Vec<String>;

    /// Data written to the tool's stdin, if any.
    fn stdin_payload(&self) -> Option<StdinPayload> {
        None
    }

    /// Whether the tool changes disk state. Dry-run skips these.
    fn is_destructive(&self) -> bool {
        false
    }
}

/// Data piped into a tool's standard input.
#[derive(Clone, PartialEq, Eq)]
pub enum StdinPayload {
    /// Non-sensitive input, may be logged.
    Plain(String),
    /// Passphrase or password; never logged, never on the command line.
    Secret(Secret),
}

impl StdinPayload {
    fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Plain(s) => s.as_bytes(),
            Self::Secret(s) => s.expose().as_bytes(),
        }
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, Self::Secret(_))
    }
}

impl fmt::Debug for StdinPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(s) => f.debug_tuple("Plain").field(s).finish(),
            Self::Secret(_) => f.debug_tuple("Secret").field(&REDACTED).finish(),
        }
    }
}

/// A fully described invocation of one external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub program: &'static str,
    pub args: Vec<String>,
    pub stdin: Option<StdinPayload>,
    pub destructive: bool,
}

impl Step {
    /// Build a step from typed tool arguments.
    pub fn from_args<T: ToolArgs + ?Sized>(args: &T) -> Self {
        Self {
            program: args.program(),
            args: args.to_cli_args(),
            stdin: args.stdin_payload(),
            destructive: args.is_destructive(),
        }
    }

    /// Command line as a single string, for logs.
    pub fn command_line(&self) -> String {
        let mut line = self.program.to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command_line())?;
        match &self.stdin {
            Some(StdinPayload::Secret(_)) => write!(f, " < {}", REDACTED),
            Some(StdinPayload::Plain(s)) => write!(f, " < ({} bytes)", s.len()),
            None => Ok(()),
        }
    }
}

/// Output from a tool execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepOutput {
    /// Standard output from the tool.
    pub stdout: String,
    /// Standard error from the tool.
    pub stderr: String,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
    /// Whether the tool exited successfully (exit code 0).
    pub success: bool,
}

impl StepOutput {
    /// A successful run with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
            success: true,
        }
    }

    /// A failed run with the given exit code and stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(exit_code),
            success: false,
        }
    }

    /// Check if the tool succeeded and return a wrapped error if not.
    pub fn ensure_success(self, operation: &str, target: &str) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(TuinixError::StepFailed {
                operation: operation.to_string(),
                target: target.to_string(),
                exit_code: self.exit_code,
                stderr: self.stderr,
            })
        }
    }
}

/// Executes steps. `Err` means the tool could not be run at all; a tool
/// that ran and failed is `Ok` with `success == false`.
pub trait CommandRunner {
    fn run(&self, step: &Step) -> std::io::Result<StepOutput>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, step: &Step) -> std::io::Result<StepOutput> {
        (**self).run(step)
    }
}

/// Run typed arguments through a runner, mapping spawn failures to
/// [`TuinixError::Spawn`] with the operation and target attached.
pub fn run_tool<R, T>(runner: &R, args: &T, target: &str) -> Result<StepOutput>
where
    R: CommandRunner + ?Sized,
    T: ToolArgs + ?Sized,
{
    let step = Step::from_args(args);
    runner.run(&step).map_err(|source| TuinixError::Spawn {
        operation: step.program.to_string(),
        target: target.to_string(),
        source,
    })
}

/// Runs real processes.
///
/// # Death Pact Compliance
///
/// - Spawns the tool in a new process group via `.in_new_process_group()`
/// - Registers the child PID with `ChildRegistry::global()`
/// - Ensures cleanup if the installer exits
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, step: &Step) -> std::io::Result<StepOutput> {
        info!("run: {}", step);

        let mut cmd = Command::new(step.program);
        cmd.args(&step.args)
            .stdin(if step.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .in_new_process_group();

        let mut child = cmd.spawn()?;
        let pid = child.id();
        if let Ok(mut guard) = ChildRegistry::global().lock() {
            guard.register(pid);
        }

        // Dropping the handle closes the pipe so the tool sees EOF
        if let (Some(payload), Some(mut stdin)) = (&step.stdin, child.stdin.take()) {
            if let Err(e) = stdin.write_all(payload.as_bytes()) {
                warn!("{}: failed to write stdin: {}", step.program, e);
            }
        }

        let output = child.wait_with_output();

        if let Ok(mut guard) = ChildRegistry::global().lock() {
            guard.unregister(pid);
        }
        let output = output?;

        let result = StepOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
            success: output.status.success(),
        };

        if result.success {
            debug!("{} exited successfully", step.program);
        } else {
            debug!(
                "{} failed with exit code {}",
                step.program,
                result.exit_code.unwrap_or(-1)
            );
        }

        Ok(result)
    }
}

/// Dry-run wrapper: destructive steps are logged and skipped, read-only
/// queries still execute so the preview is realistic.
#[derive(Debug, Clone)]
pub struct DryRunRunner<R> {
    inner: R,
}

impl<R> DryRunRunner<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: CommandRunner> CommandRunner for DryRunRunner<R> {
    fn run(&self, step: &Step) -> std::io::Result<StepOutput> {
        if step.destructive {
            info!("[dry-run] would run: {}", step);
            return Ok(StepOutput::ok(""));
        }
        self.inner.run(step)
    }
}
