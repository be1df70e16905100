use crate::exit::ExitCode;
use crate::resolver::ResolveError;
use thiserror::Error;

/// Unified error type for universal-build operations
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Version(#[from] ResolveError),

    #[error("Invalid argument combination: {}", .0.join("; "))]
    InvalidArguments(Vec<String>),

    #[error("Argument parsing error: {0}")]
    Arguments(String),

    #[error("Command `{command}` failed: {reason}")]
    Command { command: String, reason: String },

    #[error("Failed to build component {path}. Code: {code}")]
    ComponentFailed { path: String, code: i32 },

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results in universal-build
pub type Result<T> = std::result::Result<T, BuildError>;

impl BuildError {
    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        BuildError::Config(msg.into())
    }

    /// Create an argument parsing error with context
    pub fn arguments(msg: impl Into<String>) -> Self {
        BuildError::Arguments(msg.into())
    }

    /// Create a command error with context
    pub fn command(command: impl Into<String>, reason: impl Into<String>) -> Self {
        BuildError::Command {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Process exit code this error terminates a build entry point with
    pub fn exit_code(&self) -> ExitCode {
        match self {
            BuildError::Version(e) => e.exit_code(),
            BuildError::InvalidArguments(_) | BuildError::Arguments(_) => {
                ExitCode::InvalidArguments
            }
            _ => ExitCode::General,
        }
    }
}
