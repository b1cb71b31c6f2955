#![forbid(unsafe_code)]
#![warn(clippy::all)]

use crate::hook_io::{HookEvent, Tool};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every guard the binary can run. One engine serves all of them; the kind
/// selects rule sets, checks and the response shape.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum GuardKind {
    Migrations,
    Secrets,
    Imports,
    Routes,
    Rls,
    Permissions,
    WebSearch,
    Format,
    DependencyAudit,
    Verify,
    Perf,
    CommandLog,
}

/// How a decision is handed back to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Exit status plus diagnostics on stderr.
    ExitStatus,
    /// `{"decision": ...}` on stdout.
    Structured,
    /// `hookSpecificOutput.modifiedToolInput` on stdout.
    Rewrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub blocking: bool,
    pub rewrite: bool,
    pub shape: Shape,
}

impl GuardKind {
    pub const ALL: [GuardKind; 12] = [
        GuardKind::Migrations,
        GuardKind::Secrets,
        GuardKind::Imports,
        GuardKind::Routes,
        GuardKind::Rls,
        GuardKind::Permissions,
        GuardKind::WebSearch,
        GuardKind::Format,
        GuardKind::DependencyAudit,
        GuardKind::Verify,
        GuardKind::Perf,
        GuardKind::CommandLog,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            GuardKind::Migrations => "migrations",
            GuardKind::Secrets => "secrets",
            GuardKind::Imports => "imports",
            GuardKind::Routes => "routes",
            GuardKind::Rls => "rls",
            GuardKind::Permissions => "permissions",
            GuardKind::WebSearch => "web-search",
            GuardKind::Format => "format",
            GuardKind::DependencyAudit => "dependency-audit",
            GuardKind::Verify => "verify",
            GuardKind::Perf => "perf",
            GuardKind::CommandLog => "command-log",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// The host event this guard is registered for.
    pub fn event(&self) -> HookEvent {
        match self {
            GuardKind::Permissions => HookEvent::PermissionRequest,
            GuardKind::Format | GuardKind::DependencyAudit | GuardKind::Perf => {
                HookEvent::PostToolUse
            }
            GuardKind::Verify => HookEvent::Stop,
            _ => HookEvent::PreToolUse,
        }
    }

    pub fn accepts_event(&self, event: HookEvent) -> bool {
        match self {
            GuardKind::Verify => matches!(event, HookEvent::Stop | HookEvent::SubagentStop),
            _ => event == self.event(),
        }
    }

    /// Whether the guard looks at actions of this tool at all.
    pub fn accepts_tool(&self, tool: Option<&Tool>) -> bool {
        match self {
            GuardKind::Verify => true,
            GuardKind::Permissions | GuardKind::CommandLog => tool.is_some(),
            GuardKind::WebSearch => matches!(tool, Some(Tool::WebSearch)),
            GuardKind::Perf => tool.is_some_and(|t| *t == Tool::Bash || t.is_file_edit()),
            _ => tool.is_some_and(Tool::is_file_edit),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        let blocking = matches!(
            self,
            GuardKind::Migrations
                | GuardKind::Secrets
                | GuardKind::Imports
                | GuardKind::Routes
                | GuardKind::Permissions
                | GuardKind::Perf
        );
        let shape = match self {
            GuardKind::Permissions => Shape::Structured,
            GuardKind::WebSearch => Shape::Rewrite,
            _ => Shape::ExitStatus,
        };
        Capabilities {
            blocking,
            rewrite: shape == Shape::Rewrite,
            shape,
        }
    }
}

impl fmt::Display for GuardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
