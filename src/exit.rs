//! Process exit codes and orderly termination

use std::fmt;
use std::io::Write;
use std::sync::Mutex;

/// Exit codes reported by build entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    General,
    InvalidVersion,
    NoVersionFound,
    VersionIsRequired,
    DevVersionRequired,
    DevVersionNotMatchesBranch,
    InvalidArguments,
}

impl ExitCode {
    /// Numeric process exit status
    pub fn code(&self) -> i32 {
        match self {
            ExitCode::General => 1,
            ExitCode::InvalidVersion => 2,
            ExitCode::NoVersionFound => 3,
            ExitCode::VersionIsRequired => 4,
            ExitCode::DevVersionRequired => 5,
            ExitCode::DevVersionNotMatchesBranch => 6,
            ExitCode::InvalidArguments => 7,
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

type CleanupHook = Box<dyn FnOnce() + Send>;

static CLEANUP_HOOKS: Mutex<Vec<CleanupHook>> = Mutex::new(Vec::new());

/// Register a hook that runs right before `exit_process` terminates the process.
///
/// Hooks run in reverse registration order.
pub fn register_cleanup<F>(hook: F)
where
    F: FnOnce() + Send + 'static,
{
    if let Ok(mut hooks) = CLEANUP_HOOKS.lock() {
        hooks.push(Box::new(hook));
    }
}

fn run_cleanup_hooks() {
    let hooks = match CLEANUP_HOOKS.lock() {
        Ok(mut hooks) => std::mem::take(&mut *hooks),
        Err(_) => return,
    };
    for hook in hooks.into_iter().rev() {
        hook();
    }
}

/// Terminate the process with `code`.
///
/// Cleanup hooks run first, then stdout and stderr are flushed so no pending
/// log output is lost.
pub fn exit_process(code: i32) -> ! {
    run_cleanup_hooks();
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();
    std::process::exit(code)
}

/// Shorthand for `exit_process(code.code())`
pub fn exit_with(code: ExitCode) -> ! {
    exit_process(code.code())
}
