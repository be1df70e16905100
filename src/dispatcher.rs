//! Recursive component builds
//!
//! A parent build runs each component's own build entry point inside the
//! component directory, passing its sanitized arguments on. Components under a
//! skip path are not built; the first failing component aborts the build.

use crate::boundary::BuildWarning;
use crate::error::{BuildError, Result};
use crate::exit::{exit_with, ExitCode};
use crate::runner::{CommandRunner, CommandSpec, TERMINATED_EXIT_CODE};
use crate::sanitizer::SanitizedArgs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

/// Command starting a component build, run inside the component directory
pub const DEFAULT_ENTRY_POINT: &str = "python -u build.py";

/// What happened to a single component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Built,
    Skipped { skip_path: String },
}

/// Runs component builds through a [`CommandRunner`]
pub struct Dispatcher<'a> {
    runner: &'a dyn CommandRunner,
    entry_point: String,
    timeout: Option<Duration>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Dispatcher {
            runner,
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            timeout: None,
        }
    }

    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = entry_point.into();
        self
    }

    /// Limit each component build to `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Command line running the entry point with `args`
    pub fn build_command(&self, args: &SanitizedArgs) -> String {
        let flags = args.to_command_line();
        if flags.is_empty() {
            self.entry_point.clone()
        } else {
            format!("{} {}", self.entry_point, flags)
        }
    }

    /// Build the component at `path` unless it lies under a skip path
    pub fn build(&self, path: impl AsRef<Path>, args: &SanitizedArgs) -> Result<BuildOutcome> {
        let path = path.as_ref();
        if let Some(skip_path) = skip_reason(path, args.skip_paths()) {
            info!(
                "{}",
                BuildWarning::ComponentSkipped {
                    path: path.display().to_string(),
                    skip_path: skip_path.to_string(),
                }
            );
            return Ok(BuildOutcome::Skipped {
                skip_path: skip_path.to_string(),
            });
        }

        let command = self.build_command(args);
        info!("Building {} with: {}", path.display(), command);

        let mut spec = CommandSpec::new(command).in_dir(path).exit_on_error(false);
        if let Some(timeout) = self.timeout {
            spec = spec.timeout(timeout);
        }

        let output = self.runner.run(&spec).map_err(|e| {
            error!("Could not run the build of {}: {}", path.display(), e);
            e
        })?;
        if output.success() {
            return Ok(BuildOutcome::Built);
        }

        let code = if output.timed_out {
            TERMINATED_EXIT_CODE
        } else {
            output.exit_code
        };
        let err = BuildError::ComponentFailed {
            path: path.display().to_string(),
            code,
        };
        error!("{}", err);
        Err(err)
    }

    /// Build components in order, stopping at the first failure
    pub fn build_all<I, P>(&self, paths: I, args: &SanitizedArgs) -> Result<Vec<BuildOutcome>>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        paths
            .into_iter()
            .map(|path| self.build(path, args))
            .collect()
    }

    /// Build the component, terminating the process when it fails.
    ///
    /// Every failure is logged by [`build`](Self::build) before the exit.
    pub fn build_or_exit(&self, path: impl AsRef<Path>, args: &SanitizedArgs) -> BuildOutcome {
        match self.build(path, args) {
            Ok(outcome) => outcome,
            Err(_) => exit_with(ExitCode::General),
        }
    }
}

/// Whether `path` equals or lies under one of `skip_paths`
pub fn is_path_skipped<S: AsRef<str>>(path: impl AsRef<Path>, skip_paths: &[S]) -> bool {
    skip_reason(path.as_ref(), skip_paths).is_some()
}

fn skip_reason<'s, S: AsRef<str>>(path: &Path, skip_paths: &'s [S]) -> Option<&'s str> {
    let path = resolve(path);
    skip_paths
        .iter()
        .map(|s| s.as_ref())
        .filter(|s| !s.is_empty())
        .find(|skip_path| path.starts_with(resolve(Path::new(skip_path))))
}

/// Canonical form of `path`; paths that do not exist are made absolute lexically
fn resolve(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
