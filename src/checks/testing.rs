#![forbid(unsafe_code)]
#![warn(clippy::all)]

use crate::guard::GuardKind;
use crate::hook_io::Invocation;
use crate::runner::{ProcessOutput, ProcessRunner, RunError};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::time::Duration;

type Script = Box<dyn Fn(&[String]) -> Result<ProcessOutput, RunError>>;

/// Scripted runner that records every command it is asked to run.
pub struct FakeRunner {
    calls: RefCell<Vec<(Vec<String>, PathBuf)>>,
    script: Script,
}

impl FakeRunner {
    pub fn new(script: impl Fn(&[String]) -> Result<ProcessOutput, RunError> + 'static) -> Self {
        FakeRunner {
            calls: RefCell::new(Vec::new()),
            script: Box::new(script),
        }
    }

    pub fn exiting(code: i32, stdout: &str, stderr: &str) -> Self {
        let output = output(code, stdout, stderr);
        Self::new(move |_| Ok(output.clone()))
    }

    pub fn commands(&self) -> Vec<Vec<String>> {
        self.calls.borrow().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn dirs(&self) -> Vec<PathBuf> {
        self.calls.borrow().iter().map(|(_, d)| d.clone()).collect()
    }
}

impl ProcessRunner for FakeRunner {
    fn run(
        &self,
        command: &[String],
        cwd: &Path,
        _timeout: Duration,
    ) -> Result<ProcessOutput, RunError> {
        self.calls
            .borrow_mut()
            .push((command.to_vec(), cwd.to_path_buf()));
        (self.script)(command)
    }
}

pub fn output(code: i32, stdout: &str, stderr: &str) -> ProcessOutput {
    ProcessOutput {
        exit_code: Some(code),
        stdout_tail: stdout.to_string(),
        stderr_head: stderr.to_string(),
        stderr_tail: stderr.to_string(),
    }
}

pub fn invocation(kind: GuardKind, raw: serde_json::Value) -> Invocation {
    Invocation::parse(kind, &raw.to_string())
}
