#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(rust_2018_idioms)]
#![warn(rust_2024_compatibility)]
#![warn(deprecated_safe)]

//! Agent action guards.
//!
//! Each guard reads one hook message, matches its payload against the rule
//! catalog, decides whether to block, warn, approve or rewrite, records the
//! evaluation and answers in the shape its host hook expects.

pub mod auditing;
pub mod catalog;
pub mod checks;
pub mod config;
pub mod decision;
pub mod engine;
pub mod guard;
pub mod hook_io;
pub mod matcher;
pub mod response;
pub mod runner;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub use auditing::{AuditRecord, AuditSink, JsonlSink, NullSink};
pub use catalog::{Catalog, Severity};
pub use config::{AuditLevel, Budgets, Config};
pub use decision::{Decision, Finding, Outcome};
pub use engine::{Engine, Evaluation};
pub use guard::GuardKind;
pub use hook_io::Invocation;
pub use response::{EXIT_BLOCK, EXIT_PROCEED, Response};
pub use runner::{ProcessOutput, ProcessRunner, RunError, SystemRunner};

/// Result of running one guard over one hook message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookResult {
    pub evaluation: Evaluation,
    pub response: Response,
}

impl HookResult {
    pub fn exit_code(&self) -> i32 {
        self.response.exit_code
    }
}

/// Counts reported by `validate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogSummary {
    pub rule_sets: usize,
    pub rules: usize,
}

/// Load the config (defaults when `config_path` is `None`) and its catalog.
pub fn load_config(config_path: Option<&Path>) -> Result<(Config, Catalog)> {
    let config = Config::load(config_path).context("Failed to load configuration")?;
    let catalog = config.load_catalog().context("Failed to load rule catalog")?;
    Ok((config, catalog))
}

/// Validate a configuration file and the catalog it points at.
pub fn validate_config(config_path: Option<&Path>) -> Result<CatalogSummary> {
    let (_, catalog) = load_config(config_path)?;
    Ok(CatalogSummary {
        rule_sets: catalog.rule_sets().len(),
        rules: catalog.rule_count(),
    })
}

/// Run one guard over a raw hook message with the real process runner and
/// the JSONL audit log.
pub fn process_hook_input(
    config: &Config,
    catalog: &Catalog,
    kind: GuardKind,
    raw: &str,
) -> HookResult {
    let inv = Invocation::parse(kind, raw);
    let audit_dir = audit_dir_for(config, &inv);
    let sink = JsonlSink::open(
        &audit_dir,
        kind,
        config.audit.audit_level,
        config.budgets.audit_field_chars,
    );
    let runner = SystemRunner::new(
        config.budgets.stdout_tail_chars,
        config.budgets.stderr_tail_chars,
    );
    let engine = Engine::new(catalog, &config.budgets, &runner, &sink);
    process_invocation(&engine, &inv)
}

/// Run a prepared engine over an already parsed invocation.
///
/// Useful for tests that substitute the runner, the sink or the year.
pub fn process_invocation(engine: &Engine<'_>, inv: &Invocation) -> HookResult {
    let evaluation = engine.run(inv);
    let response = engine.respond(inv, &evaluation);
    HookResult {
        evaluation,
        response,
    }
}

/// A relative audit directory lives under the project the host reports.
fn audit_dir_for(config: &Config, inv: &Invocation) -> PathBuf {
    let dir = &config.audit.audit_dir;
    if dir.is_relative() && !inv.cwd.is_empty() {
        Path::new(&inv.cwd).join(dir)
    } else {
        dir.clone()
    }
}
