#![forbid(unsafe_code)]
#![warn(clippy::all)]

use crate::catalog::{PerfTables, Severity, has_extension};
use crate::config::Budgets;
use crate::decision::Finding;
use crate::engine::Engine;
use crate::hook_io::{Invocation, Tool};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

const LARGEST_CHUNKS_SHOWN: usize = 5;

/// Bundle budgets after a build, source hygiene after an edit.
pub fn check(engine: &Engine<'_>, inv: &Invocation) -> Option<Vec<Finding>> {
    if !inv.prior_succeeded() {
        debug!("Prior action failed, skipping performance analysis");
        return None;
    }
    let tables = &engine.catalog().perf;

    match inv.tool.as_ref()? {
        Tool::Bash => {
            let command = inv.params.command.as_deref()?;
            if !tables.build_commands.iter().any(|p| p.is_match(command)) {
                return None;
            }
            let base = engine.resolve(inv, ".");
            Some(analyze_build(tables, engine.budgets(), &base))
        }
        tool if tool.is_file_edit() => analyze_file(engine, inv),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Chunk {
    name: String,
    bytes: u64,
}

impl Chunk {
    fn kb(&self) -> u64 {
        self.bytes / 1024
    }
}

fn find_output_dir(tables: &PerfTables, base: &Path) -> Option<PathBuf> {
    tables
        .output_dirs
        .iter()
        .map(|dir| base.join(dir))
        .find(|dir| dir.is_dir())
}

/// Every `.js` file under `dir`, largest first.
fn js_chunks(dir: &Path) -> Vec<Chunk> {
    let pattern = format!(
        "{}/**/*.js",
        glob::Pattern::escape(&dir.to_string_lossy())
    );
    let paths = match glob::glob(&pattern) {
        Ok(paths) => paths,
        Err(e) => {
            warn!("Bad bundle glob {}: {}", pattern, e);
            return Vec::new();
        }
    };

    let mut chunks: Vec<Chunk> = paths
        .filter_map(Result::ok)
        .filter_map(|path| {
            let meta = fs::metadata(&path).ok().filter(|m| m.is_file())?;
            let name = path.file_name()?.to_string_lossy().into_owned();
            Some(Chunk {
                name,
                bytes: meta.len(),
            })
        })
        .collect();
    chunks.sort_by(|a, b| b.bytes.cmp(&a.bytes).then_with(|| a.name.cmp(&b.name)));
    chunks
}

fn analyze_build(tables: &PerfTables, budgets: &Budgets, base: &Path) -> Vec<Finding> {
    let Some(dir) = find_output_dir(tables, base) else {
        return vec![Finding::note(
            "perf.no-build-output",
            Severity::Warn,
            "❌ No SvelteKit build output found. Run build first.",
        )];
    };
    debug!("Analyzing bundle in {}", dir.display());

    let chunks = js_chunks(&dir);
    let total_kb = chunks.iter().map(|c| c.bytes).sum::<u64>() / 1024;
    let mut findings = Vec::new();

    if total_kb > budgets.bundle_budget_kb {
        findings.push(Finding::note(
            "perf.bundle-over-budget",
            Severity::Error,
            format!(
                "🚨 PERFORMANCE BUDGET EXCEEDED! Current: {}KB, Budget: {}KB, Overage: {}KB",
                total_kb,
                budgets.bundle_budget_kb,
                total_kb - budgets.bundle_budget_kb
            ),
        ));
    } else {
        let remaining = budgets.bundle_budget_kb - total_kb;
        findings.push(Finding::note(
            "perf.bundle-within-budget",
            Severity::Info,
            format!(
                "✅ Bundle within budget: {}KB / {}KB ({}KB remaining)",
                total_kb, budgets.bundle_budget_kb, remaining
            ),
        ));
        if remaining < budgets.bundle_headroom_kb {
            findings.push(Finding::note(
                "perf.low-headroom",
                Severity::Warn,
                format!(
                    "⚠️  Less than {}KB remaining in budget",
                    budgets.bundle_headroom_kb
                ),
            ));
        }
    }

    let largest: Vec<String> = chunks
        .iter()
        .take(LARGEST_CHUNKS_SHOWN)
        .map(|c| format!("{}KB {}", c.kb(), c.name))
        .collect();
    if !largest.is_empty() {
        findings.push(Finding::note(
            "perf.largest-chunks",
            Severity::Info,
            format!("📋 Largest chunks: {}", largest.join(", ")),
        ));
    }

    let oversized = chunks
        .iter()
        .filter(|c| c.kb() > budgets.chunk_budget_kb)
        .count();
    if oversized > 0 {
        findings.push(Finding::note(
            "perf.chunk-over-budget",
            Severity::Warn,
            format!(
                "⚠️  {} chunk(s) exceed {}KB limit - consider code splitting with dynamic imports",
                oversized, budgets.chunk_budget_kb
            ),
        ));
    }

    findings
}

fn analyze_file(engine: &Engine<'_>, inv: &Invocation) -> Option<Vec<Finding>> {
    let tables = &engine.catalog().perf;
    let budgets = engine.budgets();
    let raw_path = inv.params.file_path.as_deref()?;

    if !has_extension(raw_path, &tables.source_extensions)
        || tables
            .skip_fragments
            .iter()
            .any(|fragment| raw_path.contains(fragment.as_str()))
    {
        return None;
    }

    let path = engine.resolve(inv, raw_path);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("Cannot read {}: {}", path.display(), e);
            return None;
        }
    };
    let content = String::from_utf8_lossy(&bytes);
    let size_kb = bytes.len() as u64 / 1024;
    let mut findings = Vec::new();

    if size_kb > budgets.file_size_warn_kb {
        findings.push(Finding::note(
            "perf.large-file",
            Severity::Warn,
            format!(
                "⚠️  Large file: {}KB - consider splitting into smaller components",
                size_kb
            ),
        ));
    }

    let imports = tables.import_pattern.find_iter(&content).count();
    if imports > budgets.max_imports_warn {
        findings.push(Finding::note(
            "perf.many-imports",
            Severity::Info,
            format!(
                "📦 Many imports: {} imports - consider consolidating or lazy loading",
                imports
            ),
        ));
    }

    let matcher = engine.matcher();
    for set in engine.catalog().rule_sets_for(inv.kind) {
        findings.extend(matcher.evaluate_text(set, Some(raw_path), &content));
    }

    Some(findings)
}
