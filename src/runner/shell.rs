use crate::error::{BuildError, Result};
use crate::runner::{CommandOutput, CommandRunner, CommandSpec, TERMINATED_EXIT_CODE};
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long output readers may take to drain after a timed-out command was killed
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Runs commands through the system shell
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl ShellRunner {
    pub fn new() -> Self {
        ShellRunner
    }

    fn shell_command(command: &str) -> Command {
        #[cfg(windows)]
        {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        }
        #[cfg(not(windows))]
        {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        }
    }
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Echo `pipe` line by line while collecting its full text
fn stream_lines<R>(pipe: R, echo: bool, stream: Stream) -> JoinHandle<String>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut collected = String::new();
        let mut line = Vec::new();

        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&line);
                    if echo {
                        let trimmed = text.trim_end_matches(['\n', '\r']);
                        match stream {
                            Stream::Stdout => {
                                let mut out = std::io::stdout().lock();
                                let _ = writeln!(out, "{}", trimmed);
                                let _ = out.flush();
                            }
                            Stream::Stderr => {
                                let _ = writeln!(std::io::stderr().lock(), "{}", trimmed);
                            }
                        }
                    }
                    collected.push_str(&text);
                }
            }
        }

        collected
    })
}

/// Run the command in its own process group so a timeout can stop everything it started
#[cfg(unix)]
fn isolate_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn isolate_process_group(_cmd: &mut Command) {}

/// Kill the child and every process in its group
#[cfg(unix)]
fn terminate(child: &mut Child) -> std::io::Result<()> {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        return child.kill();
    };
    // SAFETY: killpg takes no pointers; the group id is the child's pid
    let result = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if result != 0 {
        child.kill()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) -> std::io::Result<()> {
    child.kill()
}

/// Collect a reader's output. With a `grace` period the reader is abandoned when it
/// does not finish in time (a detached grandchild may still hold the pipe).
fn join_reader(reader: JoinHandle<String>, grace: Option<Duration>) -> String {
    if let Some(grace) = grace {
        let deadline = Instant::now() + grace;
        while !reader.is_finished() {
            if Instant::now() >= deadline {
                warn!("Output of the terminated command is still open, not waiting for it");
                return String::new();
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
    reader.join().unwrap_or_default()
}

/// Wait for the child, killing its process group once `timeout` expires
fn wait_with_timeout(child: &mut Child, timeout: Option<Duration>) -> std::io::Result<(Option<ExitStatus>, bool)> {
    let Some(timeout) = timeout else {
        return Ok((Some(child.wait()?), false));
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((Some(status), false));
        }
        if Instant::now() >= deadline {
            terminate(child)?;
            let _ = child.wait();
            return Ok((None, true));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        match &spec.cwd {
            Some(dir) => info!("Executing: {} (in {})", spec.command, dir.display()),
            None => info!("Executing: {}", spec.command),
        }

        let mut cmd = Self::shell_command(&spec.command);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        // Without a timeout the command stays in the foreground group and receives Ctrl-C
        if spec.timeout.is_some() {
            isolate_process_group(&mut cmd);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| BuildError::command(&spec.command, format!("failed to start: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BuildError::command(&spec.command, "stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BuildError::command(&spec.command, "stderr not captured"))?;

        let stdout_reader = stream_lines(stdout, spec.log_stdout, Stream::Stdout);
        let stderr_reader = stream_lines(stderr, spec.log_stderr, Stream::Stderr);

        let (status, timed_out) = wait_with_timeout(&mut child, spec.timeout)?;
        if timed_out {
            warn!(
                "`{}` did not finish within {:?} and was terminated",
                spec.command, spec.timeout
            );
        }

        let grace = timed_out.then_some(DRAIN_GRACE);
        let stdout = join_reader(stdout_reader, grace);
        let stderr = join_reader(stderr_reader, grace);

        Ok(CommandOutput {
            command: spec.command.clone(),
            exit_code: status
                .and_then(|s| s.code())
                .unwrap_or(TERMINATED_EXIT_CODE),
            stdout,
            stderr,
            timed_out,
        })
    }
}
