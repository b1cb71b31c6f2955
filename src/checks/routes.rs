#![forbid(unsafe_code)]
#![warn(clippy::all)]

use crate::catalog::{RouteTables, Severity};
use crate::decision::Finding;
use crate::engine::Engine;
use crate::hook_io::Invocation;
use std::path::Path;

pub fn check(engine: &Engine<'_>, inv: &Invocation) -> Option<Vec<Finding>> {
    let mut findings = engine.match_rule_sets(inv)?;

    let tables = &engine.catalog().routes;
    let path = inv.params.file_path.as_deref().unwrap_or("");
    findings.extend(malformed_segments(tables, path));

    let in_routes = tables
        .route_dirs
        .iter()
        .any(|dir| path.contains(dir.as_str()));
    if in_routes && let Some(name) = inv.file_name() {
        findings.extend(unusual_file_name(tables, name));
    }

    Some(findings)
}

/// Route parameter segments such as `[id`, `[ id ]`.
fn malformed_segments(tables: &RouteTables, path: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    for part in Path::new(path).iter().filter_map(|p| p.to_str()) {
        if !(part.contains('[') || part.contains(']')) || tables.segment_pattern.is_match(part) {
            continue;
        }
        if part.matches('[').count() != part.matches(']').count() {
            findings.push(Finding::note(
                "route.mismatched-brackets",
                Severity::Error,
                format!("🚨 Malformed route parameter: {} (mismatched brackets)", part),
            ));
        } else if part.contains("[ ") || part.contains(" ]") {
            findings.push(Finding::note(
                "route.spaced-parameter",
                Severity::Error,
                format!("🚨 Spaces in route parameter: {}", part),
            ));
        }
    }
    findings
}

fn unusual_file_name(tables: &RouteTables, name: &str) -> Option<Finding> {
    if !name.starts_with('+') || tables.valid_files.iter().any(|valid| valid == name) {
        return None;
    }
    // Variations like `+page.svelte.test.ts` are fine.
    if tables.valid_files.iter().any(|valid| name.starts_with(valid.as_str())) {
        return None;
    }

    let mut expected: Vec<&str> = tables.valid_files.iter().map(String::as_str).collect();
    expected.sort_unstable();
    Some(Finding::note(
        "route.unusual-file",
        Severity::Warn,
        format!(
            "⚠️  Unusual route file: {}. Expected one of: {}",
            name,
            expected.join(", ")
        ),
    ))
}
