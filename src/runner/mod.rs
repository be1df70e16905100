//! External command execution
//!
//! Builds shell out to git, docker, pipenv and component build entry points. The
//! [CommandRunner] trait is the seam between that process plumbing and the rest of
//! the library:
//!
//! - [shell::ShellRunner]: runs commands through the system shell, streaming output
//!   live while buffering it for later inspection
//! - [mock::MockRunner]: records commands and replays scripted results for tests

pub mod mock;
pub mod shell;

pub use mock::MockRunner;
pub use shell::ShellRunner;

use crate::error::{BuildError, Result};
use crate::exit::exit_process;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, warn};

/// Exit code reported for commands terminated by a signal or a timeout
pub const TERMINATED_EXIT_CODE: i32 = -1;

/// A shell command line and how to run it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub command: String,
    pub cwd: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub log_stdout: bool,
    pub log_stderr: bool,
    pub exit_on_error: bool,
}

impl CommandSpec {
    /// Command with live logging enabled that terminates the process on failure
    pub fn new(command: impl Into<String>) -> Self {
        CommandSpec {
            command: command.into(),
            cwd: None,
            timeout: None,
            log_stdout: true,
            log_stderr: true,
            exit_on_error: true,
        }
    }

    /// Run inside `dir` instead of the current working directory
    pub fn in_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Do not echo the child's stdout
    pub fn quiet_stdout(mut self) -> Self {
        self.log_stdout = false;
        self
    }

    /// Do not echo the child's stderr
    pub fn quiet_stderr(mut self) -> Self {
        self.log_stderr = false;
        self
    }

    pub fn exit_on_error(mut self, exit_on_error: bool) -> Self {
        self.exit_on_error = exit_on_error;
        self
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Error describing a failed command, including its captured stderr
    pub fn to_error(&self) -> BuildError {
        let reason = if self.timed_out {
            "timed out".to_string()
        } else {
            format!("exit code {}", self.exit_code)
        };
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            BuildError::command(&self.command, reason)
        } else {
            BuildError::command(&self.command, format!("{}: {}", reason, stderr))
        }
    }

    /// Convert a failed run into an error
    pub fn into_result(self) -> Result<CommandOutput> {
        if self.success() {
            Ok(self)
        } else {
            Err(self.to_error())
        }
    }
}

/// Executes external commands
pub trait CommandRunner {
    /// Run the command and wait for it to finish.
    ///
    /// A non-zero exit status is reported through [CommandOutput], not as an error;
    /// errors mean the command could not be started or observed.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Run the command and honour [CommandSpec::exit_on_error].
    ///
    /// When the command fails and `exit_on_error` is set the process terminates
    /// with the child's exit code (or 1 when the child was terminated).
    fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let output = match self.run(spec) {
            Ok(output) => output,
            Err(e) if spec.exit_on_error => {
                error!("Exception during command run: {}", e);
                exit_process(1)
            }
            Err(e) => return Err(e),
        };

        if !output.success() {
            let stderr = output.stderr.trim();
            if !stderr.is_empty() {
                warn!("`{}` failed: {}", output.command, stderr);
            }
            if spec.exit_on_error {
                error!("{}", output.to_error());
                let code = if output.timed_out || output.exit_code <= 0 {
                    1
                } else {
                    output.exit_code
                };
                exit_process(code);
            }
        }

        Ok(output)
    }
}

/// Check whether `command` exists on the `PATH` and is executable
pub fn command_exists(command: &str, silent: bool) -> bool {
    let exists = which::which(command).is_ok();
    if !exists && !silent {
        warn!(
            "The command {} does not exist on the system or is not executable. Make sure to install {}.",
            command, command
        );
    }
    exists
}

/// Fail unless `command` exists
pub fn require_command(command: &str) -> Result<()> {
    if command_exists(command, false) {
        Ok(())
    } else {
        Err(BuildError::command(command, "command not found"))
    }
}
