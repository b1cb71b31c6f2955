#![forbid(unsafe_code)]
#![warn(clippy::all)]

use crate::catalog::{Field, Rule, RuleSet};
use crate::config::Budgets;
use crate::decision::Finding;
use crate::hook_io::Invocation;
use log::{debug, trace};

const REDACTED: &str = "[redacted]";

/// Applies rule sets to invocation payloads.
#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    max_matches: usize,
    snippet_chars: usize,
}

impl Matcher {
    pub fn new(max_matches: usize, snippet_chars: usize) -> Self {
        Matcher {
            max_matches,
            snippet_chars,
        }
    }

    pub fn from_budgets(budgets: &Budgets) -> Self {
        Self::new(budgets.max_matches_per_rule, budgets.snippet_chars)
    }

    /// Findings for one rule set, in catalog order.
    ///
    /// A set whose tool list or path scope rejects the invocation yields
    /// nothing without searching.
    pub fn evaluate(&self, inv: &Invocation, set: &RuleSet) -> Vec<Finding> {
        if !set.applies_to_tool(inv.tool_name()) {
            trace!("Rule set {} skipped - tool mismatch", set.name);
            return Vec::new();
        }
        let path = inv.params.file_path.as_deref();
        if !set.scope.accepts(path) {
            trace!("Rule set {} skipped - path out of scope: {:?}", set.name, path);
            return Vec::new();
        }

        trace!("Evaluating {} rules from {}", set.rules.len(), set.name);
        set.rules
            .iter()
            .filter_map(|rule| {
                let text = inv.params.field(rule.field)?;
                self.check_rule(set, rule, path, text)
            })
            .collect()
    }

    /// Like `evaluate`, but against text the caller already holds (for
    /// example a file read from disk). Tool and scope checks are skipped.
    pub fn evaluate_text(&self, set: &RuleSet, path: Option<&str>, text: &str) -> Vec<Finding> {
        set.rules
            .iter()
            .filter(|rule| rule.field == Field::Content)
            .filter_map(|rule| self.check_rule(set, rule, path, text))
            .collect()
    }

    fn check_rule(
        &self,
        set: &RuleSet,
        rule: &Rule,
        path: Option<&str>,
        text: &str,
    ) -> Option<Finding> {
        if let Some(path_pattern) = &rule.path_pattern
            && !path.is_some_and(|p| path_pattern.is_match(p))
        {
            trace!("Rule {} skipped - path pattern mismatch", rule.id);
            return None;
        }

        let mut count = 0;
        let mut snippets = Vec::new();
        for m in rule.pattern.find_iter(text) {
            if let Some(exclude) = &rule.exclude {
                let rest = text[m.end()..].lines().next().unwrap_or("");
                if exclude.is_match(rest) {
                    trace!("Rule {} match at {} excluded", rule.id, m.start());
                    continue;
                }
            }
            count += 1;
            if snippets.len() < self.max_matches {
                snippets.push(self.snippet(set, m.as_str()));
            }
        }

        if count == 0 {
            return None;
        }

        let first = snippets.first().map(String::as_str).unwrap_or("");
        let message = rule
            .message
            .replace("{match}", first)
            .replace("{count}", &count.to_string());

        debug!("Rule {} matched {} time(s)", rule.id, count);
        Some(Finding {
            rule_id: rule.id.clone(),
            severity: rule.severity,
            message,
            snippets,
            match_count: count,
        })
    }

    fn snippet(&self, set: &RuleSet, matched: &str) -> String {
        if set.redact {
            return REDACTED.to_string();
        }
        let flat = matched.split_whitespace().collect::<Vec<_>>().join(" ");
        if flat.chars().count() <= self.snippet_chars {
            flat
        } else {
            let cut: String = flat.chars().take(self.snippet_chars).collect();
            format!("{}…", cut)
        }
    }
}
