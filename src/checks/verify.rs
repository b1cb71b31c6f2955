#![forbid(unsafe_code)]
#![warn(clippy::all)]

use crate::catalog::{Severity, VerifyCheck, VerifyTables};
use crate::decision::Finding;
use crate::engine::Engine;
use crate::hook_io::Invocation;
use crate::runner::{ProcessOutput, RunError};
use log::debug;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SUMMARY_CHARS: usize = 80;

/// Type-check the project when the agent stops. Reports, never blocks.
pub fn check(engine: &Engine<'_>, inv: &Invocation) -> Option<Vec<Finding>> {
    let tables = &engine.catalog().verify;
    let start = if inv.cwd.is_empty() {
        env::current_dir().ok()?
    } else {
        PathBuf::from(&inv.cwd)
    };
    let root = find_project_root(tables, &start, dirs::home_dir().as_deref())?;
    debug!("Verifying project at {}", root.display());

    let checks = detect_checks(tables, &root);
    if checks.is_empty() {
        return None;
    }

    let mut findings = Vec::new();
    for check in checks {
        let result = engine
            .runner()
            .run(&check.command, &root, Duration::from_secs(check.timeout_secs));
        if check.optional && matches!(result, Err(RunError::NotFound { .. })) {
            debug!("{} not available, skipping", check.name);
            continue;
        }
        findings.push(report(check, result));
    }

    if findings.is_empty() {
        return None;
    }
    findings.push(summary(&findings));
    Some(findings)
}

fn summary(findings: &[Finding]) -> Finding {
    if findings.iter().all(|f| f.severity == Severity::Info) {
        Finding::note("verify.summary", Severity::Info, "✨ All checks passed!")
    } else {
        Finding::note(
            "verify.summary",
            Severity::Warn,
            "⚠️  Some checks failed - review before committing",
        )
    }
}

/// Nearest directory at or above `start` holding a project marker. The
/// walk stops at `home`.
pub fn find_project_root(tables: &VerifyTables, start: &Path, home: Option<&Path>) -> Option<PathBuf> {
    for dir in start.ancestors() {
        if tables
            .project_markers
            .iter()
            .any(|marker| dir.join(marker).exists())
        {
            return Some(dir.to_path_buf());
        }
        if home.is_some_and(|home| dir == home) {
            break;
        }
    }
    None
}

fn detect_checks<'t>(tables: &'t VerifyTables, root: &Path) -> Vec<&'t VerifyCheck> {
    tables
        .checks
        .iter()
        .filter(|check| check.markers.iter().any(|marker| root.join(marker).exists()))
        .collect()
}

fn report(check: &VerifyCheck, result: Result<ProcessOutput, RunError>) -> Finding {
    let id = format!("verify.{}", slug(&check.name));
    match result {
        Ok(output) if output.succeeded() => {
            Finding::note(&id, Severity::Info, format!("✅ {}: passed", check.name))
        }
        Ok(output) => {
            let first_line: String = output
                .stderr_head
                .trim()
                .lines()
                .next()
                .unwrap_or("")
                .chars()
                .take(SUMMARY_CHARS)
                .collect();
            let detail = if first_line.is_empty() {
                let code = output
                    .exit_code
                    .map_or_else(|| "?".to_string(), |c| c.to_string());
                format!("failed (exit {})", code)
            } else {
                first_line
            };
            Finding::note(&id, Severity::Warn, format!("❌ {}: {}", check.name, detail))
        }
        Err(RunError::NotFound { .. }) => Finding::note(
            &id,
            Severity::Warn,
            format!("❌ {}: Command not found", check.name),
        ),
        Err(RunError::Timeout { timeout, .. }) => Finding::note(
            &id,
            Severity::Warn,
            format!("❌ {}: Timeout after {}s", check.name, timeout.as_secs()),
        ),
        Err(e) => Finding::note(&id, Severity::Warn, format!("❌ {}: {}", check.name, e)),
    }
}

fn slug(name: &str) -> String {
    let mut slug = String::new();
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}
