#![forbid(unsafe_code)]
#![warn(clippy::all)]

use crate::catalog::Severity;
use crate::guard::Capabilities;
use serde::Serialize;
use serde_json::{Map, Value};

/// A single rule match (or check result) surfaced during evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub snippets: Vec<String>,
    pub match_count: usize,
}

impl Finding {
    /// A finding produced by a check rather than a pattern match.
    pub fn note(rule_id: &str, severity: Severity, message: impl Into<String>) -> Self {
        Finding {
            rule_id: rule_id.to_string(),
            severity,
            message: message.into(),
            snippets: Vec::new(),
            match_count: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Allow,
    WarnAllow,
    Block,
    Rewrite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub outcome: Outcome,
    /// Errors first, then warnings, then info.
    pub messages: Vec<String>,
    pub modified_parameters: Option<Map<String, Value>>,
    /// Explicit approval, only meaningful for the structured shape.
    pub approved: bool,
}

impl Decision {
    pub fn allow() -> Self {
        Decision {
            outcome: Outcome::Allow,
            messages: Vec::new(),
            modified_parameters: None,
            approved: false,
        }
    }

    pub fn rewrite(modified_parameters: Map<String, Value>) -> Self {
        Decision {
            outcome: Outcome::Rewrite,
            messages: Vec::new(),
            modified_parameters: Some(modified_parameters),
            approved: false,
        }
    }

    pub fn approve(mut self) -> Self {
        self.approved = true;
        self
    }

    pub fn is_block(&self) -> bool {
        self.outcome == Outcome::Block
    }
}

/// Aggregate findings into a decision.
///
/// Only an error-severity finding on a blocking-capable guard blocks. A
/// rewrite-capable guard never blocks; its rewrite comes from
/// [`Decision::rewrite`], not from findings.
pub fn decide(findings: &[Finding], caps: Capabilities) -> Decision {
    if findings.is_empty() {
        return Decision::allow();
    }

    let mut ordered: Vec<&Finding> = findings.iter().collect();
    // Stable, so catalog order holds within a severity.
    ordered.sort_by(|a, b| b.severity.cmp(&a.severity));
    let messages = ordered.iter().map(|f| f.message.clone()).collect();

    let has_error = findings.iter().any(|f| f.severity == Severity::Error);
    let outcome = if has_error && caps.blocking && !caps.rewrite {
        Outcome::Block
    } else {
        Outcome::WarnAllow
    };

    Decision {
        outcome,
        messages,
        modified_parameters: None,
        approved: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::GuardKind;
    use pretty_assertions::assert_eq;

    fn finding(id: &str, severity: Severity) -> Finding {
        Finding::note(id, severity, id)
    }

    #[test]
    fn test_no_findings_allows() {
        let decision = decide(&[], GuardKind::Migrations.capabilities());
        assert_eq!(decision, Decision::allow());
    }

    #[test]
    fn test_error_blocks_only_when_blocking() {
        let findings = vec![finding("e", Severity::Error)];

        let blocking = decide(&findings, GuardKind::Migrations.capabilities());
        assert_eq!(blocking.outcome, Outcome::Block);
        assert_eq!(blocking.messages, vec!["e"]);

        let warn_only = decide(&findings, GuardKind::Rls.capabilities());
        assert_eq!(warn_only.outcome, Outcome::WarnAllow);

        let rewrite = decide(&findings, GuardKind::WebSearch.capabilities());
        assert_eq!(rewrite.outcome, Outcome::WarnAllow);
    }

    #[test]
    fn test_warnings_never_block() {
        let findings = vec![finding("w", Severity::Warn), finding("i", Severity::Info)];
        let decision = decide(&findings, GuardKind::Secrets.capabilities());
        assert_eq!(decision.outcome, Outcome::WarnAllow);
    }

    #[test]
    fn test_messages_ordered_by_severity() {
        let findings = vec![
            finding("info-1", Severity::Info),
            finding("warn-1", Severity::Warn),
            finding("error-1", Severity::Error),
            finding("warn-2", Severity::Warn),
            finding("error-2", Severity::Error),
            finding("info-2", Severity::Info),
        ];
        let decision = decide(&findings, GuardKind::Migrations.capabilities());
        assert_eq!(
            decision.messages,
            vec!["error-1", "error-2", "warn-1", "warn-2", "info-1", "info-2"]
        );
    }

    #[test]
    fn test_outcome_serializes_snake_case() -> anyhow::Result<()> {
        assert_eq!(serde_json::to_string(&Outcome::WarnAllow)?, "\"warn_allow\"");
        Ok(())
    }
}
