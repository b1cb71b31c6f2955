#![forbid(unsafe_code)]
#![warn(clippy::all)]

use crate::catalog::PermissionTables;
use crate::decision::{Decision, decide};
use crate::engine::{Engine, Evaluation};
use crate::hook_io::{Invocation, Tool};
use log::debug;

/// Deny dangerous shell commands, explicitly approve known-safe actions and
/// stay silent otherwise.
pub fn evaluate(engine: &Engine<'_>, inv: &Invocation) -> Evaluation {
    let tables = &engine.catalog().permissions;
    let tool_name = inv.tool_name().unwrap_or("");

    if tables.safe_tools.iter().any(|t| t == tool_name) {
        debug!("Approving safe tool {}", tool_name);
        return Evaluation {
            in_scope: true,
            findings: Vec::new(),
            decision: Decision::allow().approve(),
        };
    }

    if inv.tool != Some(Tool::Bash) {
        return Evaluation {
            in_scope: true,
            findings: Vec::new(),
            decision: Decision::allow(),
        };
    }

    let findings = engine.match_rule_sets(inv).unwrap_or_default();
    let decision = decide(&findings, inv.kind.capabilities());
    if decision.is_block() {
        return Evaluation {
            in_scope: true,
            findings,
            decision,
        };
    }

    let command = inv.params.command.as_deref().unwrap_or("");
    let decision = if is_safe_command(tables, command) {
        debug!("Approving read-only command");
        decision.approve()
    } else {
        decision
    };

    Evaluation {
        in_scope: true,
        findings,
        decision,
    }
}

/// A safe prefix, and nothing chained, piped, substituted or redirected
/// after it.
fn is_safe_command(tables: &PermissionTables, command: &str) -> bool {
    let command = command.trim();
    if command.is_empty() {
        return false;
    }
    if tables
        .chain_operators
        .iter()
        .any(|op| command.contains(op.as_str()))
    {
        debug!("Command contains a chain operator, not auto-approving");
        return false;
    }
    tables
        .safe_bash_prefixes
        .iter()
        .any(|prefix| command.starts_with(prefix.as_str()) || command == prefix.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auditing::NullSink;
    use crate::catalog::Catalog;
    use crate::checks::testing::{FakeRunner, invocation};
    use crate::config::Budgets;
    use crate::decision::Outcome;
    use crate::guard::GuardKind;
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn run(tool: &str, command: &str) -> Result<Evaluation> {
        let catalog = Catalog::builtin()?;
        let budgets = Budgets::default();
        let runner = FakeRunner::exiting(0, "", "");
        let engine = Engine::new(&catalog, &budgets, &runner, &NullSink);
        let inv = invocation(
            GuardKind::Permissions,
            json!({
                "hook_event_name": "PermissionRequest",
                "tool_name": tool,
                "tool_input": {"command": command}
            }),
        );
        Ok(engine.evaluate(&inv))
    }

    #[test]
    fn test_safe_tool_approved() -> Result<()> {
        let evaluation = run("Read", "")?;
        assert!(evaluation.decision.approved);
        assert_eq!(evaluation.decision.outcome, Outcome::Allow);
        Ok(())
    }

    #[test]
    fn test_safe_command_approved() -> Result<()> {
        assert!(run("Bash", "git status")?.decision.approved);
        assert!(run("Bash", "  ls -la src")?.decision.approved);
        assert!(run("Bash", "pwd")?.decision.approved);
        Ok(())
    }

    #[test]
    fn test_chained_command_not_approved() -> Result<()> {
        for command in [
            "git status && rm -rf build",
            "cat a.txt | sh",
            "echo $(whoami)",
            "echo hi > out.txt",
            "ls; touch x",
        ] {
            let evaluation = run("Bash", command)?;
            assert!(!evaluation.decision.approved, "approved {:?}", command);
        }
        Ok(())
    }

    #[test]
    fn test_dangerous_command_denied() -> Result<()> {
        let evaluation = run("Bash", "sudo rm -rf /var")?;
        assert_eq!(evaluation.decision.outcome, Outcome::Block);
        assert_eq!(evaluation.decision.messages[0], "🚫 Dangerous: sudo rm");
        assert!(!evaluation.decision.approved);
        Ok(())
    }

    #[test]
    fn test_delete_with_where_on_next_line_allowed() -> Result<()> {
        let split = run("Bash", "psql -c \"DELETE FROM users\nWHERE id = 5\"")?;
        assert_eq!(split.decision.outcome, Outcome::Allow);
        assert!(split.findings.is_empty());

        let bare = run("Bash", "psql -c \"DELETE FROM users\"")?;
        assert_eq!(bare.decision.outcome, Outcome::Block);
        assert_eq!(
            bare.decision.messages,
            vec!["🚫 Dangerous: DELETE without WHERE clause".to_string()]
        );
        Ok(())
    }

    #[test]
    fn test_rm_rf_root_only_matches_root() -> Result<()> {
        let root = run("Bash", "rm -rf / ")?;
        assert_eq!(root.decision.outcome, Outcome::Block);

        let tmp = run("Bash", "rm -rf /tmp/build")?;
        assert_eq!(tmp.decision.outcome, Outcome::Allow);
        assert!(!tmp.decision.approved);
        Ok(())
    }

    #[test]
    fn test_unknown_tool_is_silent() -> Result<()> {
        let evaluation = run("Write", "")?;
        assert_eq!(evaluation.decision, Decision::allow());
        Ok(())
    }
}
