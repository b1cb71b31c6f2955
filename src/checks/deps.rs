#![forbid(unsafe_code)]
#![warn(clippy::all)]

use crate::catalog::Severity;
use crate::decision::Finding;
use crate::engine::Engine;
use crate::hook_io::Invocation;
use crate::runner::RunError;
use log::{debug, info};
use std::path::Path;

/// Run a security audit when a dependency manifest changes.
pub fn check(engine: &Engine<'_>, inv: &Invocation) -> Option<Vec<Finding>> {
    let raw_path = inv.params.file_path.as_deref()?;
    let name = inv.file_name()?;
    let audit = engine
        .catalog()
        .dependency_audits
        .iter()
        .find(|audit| audit.manifest == name)?;

    info!("Dependency file modified: {}", raw_path);
    debug!("Running {} security audit", audit.name);

    let path = engine.resolve(inv, raw_path);
    let dir = path
        .parent()
        .filter(|dir| dir.is_dir())
        .unwrap_or(Path::new("."));

    let mut command = audit.command.clone();
    if audit.append_path {
        command.push(raw_path.to_string());
    }
    let program = command.first().cloned().unwrap_or_default();

    let finding = match engine
        .runner()
        .run(&command, dir, engine.budgets().dependency_audit_timeout())
    {
        Ok(output) if output.succeeded() => Finding::note(
            "deps.clean",
            Severity::Info,
            format!("✅ {}: no vulnerabilities found", audit.name),
        ),
        Ok(output) => {
            let code = output
                .exit_code
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            let mut message = format!("⚠️  Audit found issues (exit code {})", code);
            for tail in [&output.stdout_tail, &output.stderr_tail] {
                let tail = tail.trim();
                if !tail.is_empty() {
                    message.push('\n');
                    message.push_str(tail);
                }
            }
            Finding::note("deps.issues", Severity::Warn, message)
        }
        Err(RunError::NotFound { .. }) => Finding::note(
            "deps.not-installed",
            Severity::Warn,
            format!("⚠️  {} not installed, skipping audit", program),
        ),
        Err(RunError::Timeout { .. }) => Finding::note(
            "deps.timeout",
            Severity::Warn,
            format!("⚠️  {} audit timed out", program),
        ),
        Err(e) => Finding::note(
            "deps.error",
            Severity::Warn,
            format!("⚠️  Error running {}: {}", program, e),
        ),
    };

    Some(vec![finding])
}
