#![forbid(unsafe_code)]
#![warn(clippy::all)]

use log::{debug, trace, warn};
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const DRAIN_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum RunError {
    #[error("{program} not installed")]
    NotFound { program: String },
    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },
    #[error("failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub stdout_tail: String,
    /// Start of stderr, where checkers put their first diagnostic.
    pub stderr_head: String,
    pub stderr_tail: String,
}

impl ProcessOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external checkers. Tests substitute a scripted implementation.
pub trait ProcessRunner {
    fn run(
        &self,
        command: &[String],
        cwd: &Path,
        timeout: Duration,
    ) -> Result<ProcessOutput, RunError>;
}

/// Spawns real child processes.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    stdout_tail_chars: usize,
    stderr_tail_chars: usize,
}

impl SystemRunner {
    pub fn new(stdout_tail_chars: usize, stderr_tail_chars: usize) -> Self {
        SystemRunner {
            stdout_tail_chars,
            stderr_tail_chars,
        }
    }
}

impl ProcessRunner for SystemRunner {
    fn run(
        &self,
        command: &[String],
        cwd: &Path,
        timeout: Duration,
    ) -> Result<ProcessOutput, RunError> {
        let Some((program, args)) = command.split_first() else {
            return Err(RunError::NotFound {
                program: String::new(),
            });
        };

        let resolved = which::which(program).map_err(|_| RunError::NotFound {
            program: program.clone(),
        })?;
        debug!("Running {} {:?} in {}", resolved.display(), args, cwd.display());

        let io_err = |source| RunError::Io {
            program: program.clone(),
            source,
        };

        let mut child = Command::new(&resolved)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(io_err)?;

        let (tx, rx) = mpsc::channel();
        spawn_drain(child.stdout.take(), Stream::Stdout, tx.clone());
        spawn_drain(child.stderr.take(), Stream::Stderr, tx);

        let status = match wait_with_deadline(&mut child, timeout).map_err(io_err)? {
            Some(status) => status,
            None => {
                warn!("{} exceeded {:?}, killing it", program, timeout);
                if let Err(e) = child.kill() {
                    debug!("Kill failed for {}: {}", program, e);
                }
                let _ = child.wait();
                return Err(RunError::Timeout {
                    program: program.clone(),
                    timeout,
                });
            }
        };

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        for _ in 0..2 {
            match rx.recv_timeout(DRAIN_GRACE) {
                Ok((Stream::Stdout, bytes)) => stdout = bytes,
                Ok((Stream::Stderr, bytes)) => stderr = bytes,
                Err(_) => {
                    debug!("Output of {} not fully drained", program);
                    break;
                }
            }
        }

        let stderr = String::from_utf8_lossy(&stderr);
        Ok(ProcessOutput {
            exit_code: status.code(),
            stdout_tail: tail_chars(&String::from_utf8_lossy(&stdout), self.stdout_tail_chars),
            stderr_head: head_chars(&stderr, self.stderr_tail_chars),
            stderr_tail: tail_chars(&stderr, self.stderr_tail_chars),
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

fn spawn_drain<R>(pipe: Option<R>, stream: Stream, tx: mpsc::Sender<(Stream, Vec<u8>)>)
where
    R: Read + Send + 'static,
{
    let Some(mut pipe) = pipe else {
        let _ = tx.send((stream, Vec::new()));
        return;
    };
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut buf) {
            trace!("Pipe read for {:?} ended early: {}", stream, e);
        }
        let _ = tx.send((stream, buf));
    });
}

/// Poll until the child exits or the deadline passes. `None` means timeout.
fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> io::Result<Option<std::process::ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Keep the last `max` characters.
pub fn tail_chars(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        s.to_string()
    } else {
        s.chars().skip(count - max).collect()
    }
}

/// Keep the first `max` characters.
pub fn head_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cmd(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tail_chars() {
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("ab", 3), "ab");
        assert_eq!(tail_chars("héllo", 4), "éllo");
    }

    #[test]
    fn test_head_chars() {
        assert_eq!(head_chars("abcdef", 3), "abc");
        assert_eq!(head_chars("ab", 3), "ab");
        assert_eq!(head_chars("héllo", 2), "hé");
    }

    #[test]
    fn test_missing_program_is_not_found() {
        let runner = SystemRunner::new(100, 100);
        let result = runner.run(
            &cmd(&["hook-guards-no-such-binary-xyz"]),
            Path::new("."),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(RunError::NotFound { .. })));
    }

    #[test]
    fn test_empty_command_is_not_found() {
        let runner = SystemRunner::new(100, 100);
        let result = runner.run(&[], Path::new("."), Duration::from_secs(1));
        assert!(matches!(result, Err(RunError::NotFound { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_output_tails() -> anyhow::Result<()> {
        let runner = SystemRunner::new(3, 100);
        let output = runner.run(
            &cmd(&["sh", "-c", "printf hello; printf oops >&2; exit 3"]),
            Path::new("."),
            Duration::from_secs(10),
        )?;
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.succeeded());
        assert_eq!(output.stdout_tail, "llo");
        assert_eq!(output.stderr_tail, "oops");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_stderr_head_keeps_first_lines() -> anyhow::Result<()> {
        let runner = SystemRunner::new(100, 12);
        let output = runner.run(
            &cmd(&["sh", "-c", "printf 'first line\\nsecond line\\nlast' >&2; exit 1"]),
            Path::new("."),
            Duration::from_secs(10),
        )?;
        assert_eq!(output.stderr_head, "first line\ns");
        assert_eq!(output.stderr_tail, "nd line\nlast");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_child() {
        let runner = SystemRunner::new(100, 100);
        let started = Instant::now();
        let result = runner.run(
            &cmd(&["sleep", "5"]),
            Path::new("."),
            Duration::from_millis(200),
        );
        assert!(matches!(result, Err(RunError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
