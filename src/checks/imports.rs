#![forbid(unsafe_code)]
#![warn(clippy::all)]

use crate::catalog::Severity;
use crate::decision::Finding;
use crate::engine::Engine;
use crate::hook_io::Invocation;

pub fn check(engine: &Engine<'_>, inv: &Invocation) -> Option<Vec<Finding>> {
    let mut findings = engine.match_rule_sets(inv)?;

    let tables = &engine.catalog().imports;
    let path = inv.params.file_path.as_deref().unwrap_or("");
    let in_sveltekit_app = tables
        .sveltekit_paths
        .iter()
        .any(|fragment| path.contains(fragment.as_str()));

    if in_sveltekit_app && let Some(content) = inv.params.content.as_deref() {
        let deep = tables
            .relative_import_pattern
            .captures_iter(content)
            .filter_map(|caps| caps.get(1))
            .filter(|specifier| specifier.as_str().matches("..").count() >= tables.deep_relative_depth)
            .count();

        // Skip when a blocking or warning finding already points at $lib.
        let lib_mentioned = findings
            .iter()
            .any(|f| f.severity >= Severity::Warn && f.message.contains("$lib"));

        if deep > 0 && !lib_mentioned {
            findings.push(Finding::note(
                "import.deep-relative",
                Severity::Warn,
                format!(
                    "⚠️  Found {} deep relative import(s). Consider using $lib alias for maintainability.",
                    deep
                ),
            ));
        }
    }

    Some(findings)
}
