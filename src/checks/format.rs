#![forbid(unsafe_code)]
#![warn(clippy::all)]

use crate::catalog::Severity;
use crate::decision::Finding;
use crate::engine::Engine;
use crate::hook_io::Invocation;
use crate::runner::{ProcessOutput, RunError};
use log::debug;
use std::path::Path;

const STDERR_HEAD_CHARS: usize = 100;

/// Run the matching formatter over a file the agent just wrote.
pub fn check(engine: &Engine<'_>, inv: &Invocation) -> Option<Vec<Finding>> {
    if !inv.prior_succeeded() {
        debug!("Prior action failed, not formatting");
        return None;
    }
    let raw_path = inv.params.file_path.as_deref()?;
    let tables = &engine.catalog().format;

    if tables
        .skip_fragments
        .iter()
        .any(|fragment| raw_path.contains(fragment.as_str()))
    {
        debug!("Skipped (excluded path): {}", raw_path);
        return None;
    }
    let formatter = tables.formatter_for(raw_path)?;

    let path = engine.resolve(inv, raw_path);
    if !path.is_file() {
        debug!("{} does not exist, nothing to format", path.display());
        return None;
    }
    let name = display_name(&path);
    let dir = path.parent().unwrap_or(Path::new("."));

    let mut command = formatter.command.clone();
    command.push(path.to_string_lossy().into_owned());

    let finding = match engine
        .runner()
        .run(&command, dir, engine.budgets().formatter_timeout())
    {
        Ok(output) if output.succeeded() => Some(Finding::note(
            "format.formatted",
            Severity::Info,
            format!("✨ Formatted with {}: {}", formatter.name, name),
        )),
        Ok(output) if mentions_error(&output) => {
            let head: String = output.stderr_head.chars().take(STDERR_HEAD_CHARS).collect();
            Some(Finding::note(
                "format.failed",
                Severity::Warn,
                format!("⚠️  {} warning for {}: {}", formatter.name, name, head.trim_end()),
            ))
        }
        // Minor formatter complaints are not worth surfacing.
        Ok(_) => None,
        Err(RunError::NotFound { .. }) => Some(Finding::note(
            "format.not-installed",
            Severity::Warn,
            format!(
                "⚠️  {} not installed, skipping format for {}",
                formatter.name, name
            ),
        )),
        Err(RunError::Timeout { .. }) => Some(Finding::note(
            "format.timeout",
            Severity::Warn,
            format!("⚠️  {} timeout for {}", formatter.name, name),
        )),
        Err(e) => Some(Finding::note(
            "format.error",
            Severity::Warn,
            format!("⚠️  Error formatting {}: {}", name, e),
        )),
    };

    Some(finding.into_iter().collect())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn mentions_error(output: &ProcessOutput) -> bool {
    [&output.stderr_head, &output.stderr_tail]
        .iter()
        .any(|text| text.to_lowercase().contains("error"))
}
