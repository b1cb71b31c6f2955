#![forbid(unsafe_code)]
#![warn(clippy::all)]

use crate::auditing::{AuditRecord, AuditSink};
use crate::catalog::{Catalog, RuleSet};
use crate::checks;
use crate::config::Budgets;
use crate::decision::{Decision, Finding, decide};
use crate::guard::GuardKind;
use crate::hook_io::Invocation;
use crate::matcher::Matcher;
use crate::response::{Response, emit};
use crate::runner::ProcessRunner;
use chrono::{Datelike, Local, Utc};
use log::{debug, trace};
use std::path::PathBuf;

/// Result of evaluating one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// False when the guard had nothing to look at (wrong event, tool or
    /// path). Out-of-scope evaluations are not audited.
    pub in_scope: bool,
    pub findings: Vec<Finding>,
    pub decision: Decision,
}

impl Evaluation {
    pub fn out_of_scope() -> Self {
        Evaluation {
            in_scope: false,
            findings: Vec::new(),
            decision: Decision::allow(),
        }
    }

    pub fn audit_record(&self, inv: &Invocation) -> AuditRecord {
        AuditRecord {
            timestamp: Utc::now(),
            guard: inv.kind,
            session_id: inv.session_id.clone(),
            tool: inv.tool_name().map(str::to_string),
            summary: inv.summary(),
            findings: self.findings.clone(),
            outcome: self.decision.outcome,
        }
    }
}

/// The single evaluation pipeline shared by every guard kind.
pub struct Engine<'a> {
    catalog: &'a Catalog,
    budgets: &'a Budgets,
    runner: &'a dyn ProcessRunner,
    sink: &'a dyn AuditSink,
    matcher: Matcher,
    year: i32,
}

impl<'a> Engine<'a> {
    pub fn new(
        catalog: &'a Catalog,
        budgets: &'a Budgets,
        runner: &'a dyn ProcessRunner,
        sink: &'a dyn AuditSink,
    ) -> Self {
        Engine {
            catalog,
            budgets,
            runner,
            sink,
            matcher: Matcher::from_budgets(budgets),
            year: Local::now().year(),
        }
    }

    /// Pin the year used for search query enrichment.
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = year;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        self.catalog
    }

    pub fn budgets(&self) -> &Budgets {
        self.budgets
    }

    pub fn runner(&self) -> &dyn ProcessRunner {
        self.runner
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Evaluate without recording anything.
    pub fn evaluate(&self, inv: &Invocation) -> Evaluation {
        let kind = inv.kind;
        if inv.is_noop() {
            trace!("No-op invocation for {}", kind);
            return Evaluation::out_of_scope();
        }
        if !kind.accepts_event(inv.event) {
            debug!("{} ignores {} events", kind, inv.event.name());
            return Evaluation::out_of_scope();
        }
        if !kind.accepts_tool(inv.tool.as_ref()) {
            debug!("{} ignores tool {:?}", kind, inv.tool_name());
            return Evaluation::out_of_scope();
        }

        let caps = kind.capabilities();
        let found = match kind {
            GuardKind::Migrations => checks::migrations::check(self, inv),
            GuardKind::Secrets => self.match_rule_sets(inv),
            GuardKind::Imports => checks::imports::check(self, inv),
            GuardKind::Routes => checks::routes::check(self, inv),
            GuardKind::Rls => checks::rls::check(self, inv),
            GuardKind::Permissions => {
                return checks::permissions::evaluate(self, inv);
            }
            GuardKind::WebSearch => {
                return checks::web_search::evaluate(self, inv);
            }
            GuardKind::Format => checks::format::check(self, inv),
            GuardKind::DependencyAudit => checks::deps::check(self, inv),
            GuardKind::Verify => checks::verify::check(self, inv),
            GuardKind::Perf => checks::perf::check(self, inv),
            GuardKind::CommandLog => Some(Vec::new()),
        };

        match found {
            Some(findings) => {
                let decision = decide(&findings, caps);
                debug!(
                    "{}: {} finding(s), outcome {:?}",
                    kind,
                    findings.len(),
                    decision.outcome
                );
                Evaluation {
                    in_scope: true,
                    findings,
                    decision,
                }
            }
            None => Evaluation::out_of_scope(),
        }
    }

    /// Evaluate and record the result in the audit sink.
    pub fn run(&self, inv: &Invocation) -> Evaluation {
        let evaluation = self.evaluate(inv);
        if evaluation.in_scope {
            self.sink.record(&evaluation.audit_record(inv));
        }
        evaluation
    }

    pub fn respond(&self, inv: &Invocation, evaluation: &Evaluation) -> Response {
        emit(
            &evaluation.decision,
            inv.kind,
            self.catalog.profile(inv.kind),
            inv.file_name(),
        )
    }

    /// Run every rule set of the guard that accepts the invocation. `None`
    /// when no rule set does.
    pub fn match_rule_sets(&self, inv: &Invocation) -> Option<Vec<Finding>> {
        let path = inv.params.file_path.as_deref();
        let sets: Vec<&RuleSet> = self
            .catalog
            .rule_sets_for(inv.kind)
            .into_iter()
            .filter(|set| set.applies_to_tool(inv.tool_name()) && set.scope.accepts(path))
            .collect();

        if sets.is_empty() {
            return None;
        }
        Some(
            sets.into_iter()
                .flat_map(|set| self.matcher.evaluate(inv, set))
                .collect(),
        )
    }

    /// Resolve a possibly relative path against the invocation's cwd.
    pub fn resolve(&self, inv: &Invocation, path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        if path.is_absolute() || inv.cwd.is_empty() {
            path
        } else {
            PathBuf::from(&inv.cwd).join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auditing::NullSink;
    use crate::decision::Outcome;
    use crate::runner::{ProcessOutput, RunError};
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use std::time::Duration;

    struct NoRunner;

    impl ProcessRunner for NoRunner {
        fn run(
            &self,
            command: &[String],
            _cwd: &Path,
            _timeout: Duration,
        ) -> Result<ProcessOutput, RunError> {
            Err(RunError::NotFound {
                program: command.first().cloned().unwrap_or_default(),
            })
        }
    }

    fn evaluate(kind: GuardKind, raw: &serde_json::Value) -> Result<Evaluation> {
        let catalog = Catalog::builtin()?;
        let budgets = Budgets::default();
        let engine = Engine::new(&catalog, &budgets, &NoRunner, &NullSink);
        Ok(engine.evaluate(&Invocation::parse(kind, &raw.to_string())))
    }

    #[test]
    fn test_wrong_event_is_out_of_scope() -> Result<()> {
        let raw = serde_json::json!({
            "hook_event_name": "PostToolUse",
            "tool_name": "Write",
            "tool_input": {"file_path": "migrations/0001_x.sql", "content": "DROP TABLE a;"}
        });
        let evaluation = evaluate(GuardKind::Migrations, &raw)?;
        assert_eq!(evaluation, Evaluation::out_of_scope());
        Ok(())
    }

    #[test]
    fn test_secrets_block() -> Result<()> {
        let raw = serde_json::json!({
            "hook_event_name": "PreToolUse",
            "tool_name": "Write",
            "tool_input": {"file_path": "src/pay.ts", "content": "const k = 'sk_live_abc123';"}
        });
        let evaluation = evaluate(GuardKind::Secrets, &raw)?;
        assert_eq!(evaluation.decision.outcome, Outcome::Block);
        assert_eq!(evaluation.findings[0].rule_id, "secret.stripe-live-key");
        Ok(())
    }

    #[test]
    fn test_secrets_skip_example_files() -> Result<()> {
        let raw = serde_json::json!({
            "hook_event_name": "PreToolUse",
            "tool_name": "Write",
            "tool_input": {"file_path": ".env.example", "content": "KEY=sk_live_abc123"}
        });
        let evaluation = evaluate(GuardKind::Secrets, &raw)?;
        assert!(!evaluation.in_scope);
        assert_eq!(evaluation.decision.outcome, Outcome::Allow);
        Ok(())
    }

    #[test]
    fn test_command_log_always_allows() -> Result<()> {
        let raw = serde_json::json!({
            "hook_event_name": "PreToolUse",
            "tool_name": "Bash",
            "tool_input": {"command": "rm -rf /"}
        });
        let evaluation = evaluate(GuardKind::CommandLog, &raw)?;
        assert!(evaluation.in_scope);
        assert_eq!(evaluation.decision, Decision::allow());
        Ok(())
    }

    #[test]
    fn test_resolve_relative_to_cwd() -> Result<()> {
        let catalog = Catalog::builtin()?;
        let budgets = Budgets::default();
        let engine = Engine::new(&catalog, &budgets, &NoRunner, &NullSink);
        let mut inv = Invocation::noop(GuardKind::Perf);
        inv.cwd = "/repo".to_string();

        assert_eq!(engine.resolve(&inv, "src/a.ts"), PathBuf::from("/repo/src/a.ts"));
        assert_eq!(engine.resolve(&inv, "/abs/a.ts"), PathBuf::from("/abs/a.ts"));
        Ok(())
    }
}
