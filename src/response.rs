#![forbid(unsafe_code)]
#![warn(clippy::all)]

use crate::catalog::GuardProfile;
use crate::decision::{Decision, Outcome};
use crate::guard::{GuardKind, Shape};
use anyhow::{Context, Result};
use log::warn;
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::{self, Write};

pub const EXIT_PROCEED: i32 = 0;
pub const EXIT_BLOCK: i32 = 2;

/// What the process hands back to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub exit_code: i32,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl Response {
    pub fn proceed() -> Self {
        Response {
            exit_code: EXIT_PROCEED,
            stdout: None,
            stderr: None,
        }
    }

    pub fn write(&self) -> Result<()> {
        if let Some(out) = &self.stdout {
            io::stdout()
                .write_all(out.as_bytes())
                .context("Failed to write to stdout")?;
        }
        if let Some(err) = &self.stderr {
            let mut stderr = io::stderr();
            writeln!(stderr, "{}", err).context("Failed to write to stderr")?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct Verdict<'a> {
    decision: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct RewriteOutput<'a> {
    #[serde(rename = "hookSpecificOutput")]
    hook_specific_output: RewriteSpecificOutput<'a>,
}

#[derive(Debug, Serialize)]
struct RewriteSpecificOutput<'a> {
    #[serde(rename = "hookEventName")]
    hook_event_name: &'a str,
    #[serde(rename = "modifiedToolInput")]
    modified_tool_input: &'a Map<String, Value>,
}

/// Serialize a decision in the shape the guard's host hook expects.
pub fn emit(
    decision: &Decision,
    kind: GuardKind,
    profile: &GuardProfile,
    file_name: Option<&str>,
) -> Response {
    match kind.capabilities().shape {
        Shape::ExitStatus => exit_status(decision, kind, profile, file_name),
        Shape::Structured => structured(decision),
        Shape::Rewrite => match (&decision.outcome, &decision.modified_parameters) {
            (Outcome::Rewrite, Some(params)) => rewrite(kind, params),
            _ => exit_status(decision, kind, profile, file_name),
        },
    }
}

fn exit_status(
    decision: &Decision,
    kind: GuardKind,
    profile: &GuardProfile,
    file_name: Option<&str>,
) -> Response {
    if decision.messages.is_empty() {
        return Response::proceed();
    }

    let block = decision.is_block();
    let (heading, hints) = if block {
        let heading = profile
            .block_heading
            .clone()
            .unwrap_or_else(|| format!("🛑 {} guard: action blocked", kind));
        (heading, &profile.block_hints)
    } else {
        let heading = profile
            .warn_heading
            .clone()
            .unwrap_or_else(|| format!("⚠️  {} guard", kind));
        (heading, &profile.warn_hints)
    };

    Response {
        exit_code: if block { EXIT_BLOCK } else { EXIT_PROCEED },
        stdout: None,
        stderr: Some(render_block(&heading, file_name, &decision.messages, hints)),
    }
}

fn render_block(
    heading: &str,
    file_name: Option<&str>,
    messages: &[String],
    hints: &[String],
) -> String {
    let mut lines = vec![String::new(), heading.to_string()];
    if let Some(name) = file_name {
        lines.push(format!("   File: {}", name));
    }
    lines.push(String::new());
    lines.extend(messages.iter().map(|m| format!("   {}", m)));
    if !hints.is_empty() {
        lines.push(String::new());
        lines.extend(hints.iter().map(|h| format!("   {}", h)));
    }
    lines.push(String::new());
    lines.join("\n")
}

fn structured(decision: &Decision) -> Response {
    let verdict = if decision.is_block() {
        Verdict {
            decision: "deny",
            message: Some(decision.messages.join("\n")),
        }
    } else if decision.approved {
        Verdict {
            decision: "allow",
            message: None,
        }
    } else {
        return Response::proceed();
    };

    stdout_json(&verdict)
}

fn rewrite(kind: GuardKind, params: &Map<String, Value>) -> Response {
    let output = RewriteOutput {
        hook_specific_output: RewriteSpecificOutput {
            hook_event_name: kind.event().name(),
            modified_tool_input: params,
        },
    };
    stdout_json(&output)
}

fn stdout_json<T: Serialize>(payload: &T) -> Response {
    match serde_json::to_string(payload) {
        Ok(json) => Response {
            exit_code: EXIT_PROCEED,
            stdout: Some(json),
            stderr: None,
        },
        Err(e) => {
            warn!("Failed to serialize hook output: {}", e);
            Response::proceed()
        }
    }
}
