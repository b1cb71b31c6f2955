#![forbid(unsafe_code)]
#![warn(clippy::all)]

use crate::catalog::Severity;
use crate::decision::Finding;
use crate::engine::Engine;
use crate::hook_io::Invocation;

/// Destructive SQL and Drizzle schema rules, plus the `NNNN_name.sql`
/// naming convention for migration files.
pub fn check(engine: &Engine<'_>, inv: &Invocation) -> Option<Vec<Finding>> {
    let mut findings = engine.match_rule_sets(inv)?;

    let tables = &engine.catalog().migrations;
    let path = inv.params.file_path.as_deref();
    if tables.migration_files.accepts(path)
        && let Some(name) = inv.file_name()
        && !tables.file_name_pattern.is_match(name)
    {
        findings.push(Finding::note(
            "migration.naming",
            Severity::Warn,
            format!(
                "⚠️  Migration naming: Expected format NNNN_name.sql, got {}",
                name
            ),
        ));
    }

    Some(findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auditing::NullSink;
    use crate::catalog::Catalog;
    use crate::checks::testing::{FakeRunner, invocation};
    use crate::config::Budgets;
    use crate::guard::GuardKind;
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn run(path: &str, content: &str) -> Result<Option<Vec<Finding>>> {
        let catalog = Catalog::builtin()?;
        let budgets = Budgets::default();
        let runner = FakeRunner::exiting(0, "", "");
        let engine = Engine::new(&catalog, &budgets, &runner, &NullSink);
        let inv = invocation(
            GuardKind::Migrations,
            json!({
                "hook_event_name": "PreToolUse",
                "tool_name": "Write",
                "tool_input": {"file_path": path, "content": content}
            }),
        );
        Ok(check(&engine, &inv))
    }

    fn ids(findings: &[Finding]) -> Vec<&str> {
        findings.iter().map(|f| f.rule_id.as_str()).collect()
    }

    #[test]
    fn test_badly_named_migration_warns() -> Result<()> {
        let findings = run("db/migrations/add_users.sql", "CREATE TABLE users (id serial);")?
            .unwrap_or_default();
        assert_eq!(ids(&findings), vec!["migration.naming"]);
        assert!(findings[0].message.contains("add_users.sql"));
        Ok(())
    }

    #[test]
    fn test_schema_drop_table() -> Result<()> {
        let findings = run(
            "packages/db/schema/users.ts",
            "export const x = db.dropTable('users');",
        )?
        .unwrap_or_default();
        assert_eq!(ids(&findings), vec!["schema.drop-table"]);
        Ok(())
    }

    #[test]
    fn test_schema_index_is_out_of_scope() -> Result<()> {
        let found = run("packages/db/schema/index.ts", "db.dropTable('users')")?;
        assert_eq!(found, None);
        Ok(())
    }

    #[test]
    fn test_other_files_are_out_of_scope() -> Result<()> {
        assert_eq!(run("src/app.ts", "DROP TABLE users;")?, None);
        Ok(())
    }
}
