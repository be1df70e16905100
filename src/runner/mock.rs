use crate::error::{BuildError, Result};
use crate::runner::{CommandOutput, CommandRunner, CommandSpec};
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct Response {
    pattern: String,
    exit_code: i32,
    stdout: String,
}

/// Mock runner recording every command without executing anything.
///
/// Commands succeed with empty output unless a scripted response's pattern is
/// contained in the command line; the first matching response wins.
#[derive(Debug, Default)]
pub struct MockRunner {
    responses: Vec<Response>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the result of commands containing `pattern`
    pub fn with_response(mut self, pattern: impl Into<String>, exit_code: i32, stdout: impl Into<String>) -> Self {
        self.responses.push(Response {
            pattern: pattern.into(),
            exit_code,
            stdout: stdout.into(),
        });
        self
    }

    /// Commands run so far, in order
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Command lines run so far, in order
    pub fn commands(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.command).collect()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls
            .lock()
            .map_err(|_| BuildError::command(&spec.command, "mock call log poisoned"))?
            .push(spec.clone());

        let response = self
            .responses
            .iter()
            .find(|r| spec.command.contains(&r.pattern));

        Ok(CommandOutput {
            command: spec.command.clone(),
            exit_code: response.map(|r| r.exit_code).unwrap_or(0),
            stdout: response.map(|r| r.stdout.clone()).unwrap_or_default(),
            stderr: String::new(),
            timed_out: false,
        })
    }
}
