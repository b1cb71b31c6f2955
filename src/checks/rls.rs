#![forbid(unsafe_code)]
#![warn(clippy::all)]

use crate::catalog::{RlsTables, Severity};
use crate::decision::Finding;
use crate::engine::Engine;
use crate::hook_io::Invocation;
use log::debug;
use regex::RegexBuilder;

/// Row-level-security reminders for Drizzle schemas and SQL migrations.
/// Never blocks.
pub fn check(engine: &Engine<'_>, inv: &Invocation) -> Option<Vec<Finding>> {
    let tables = &engine.catalog().rls;
    let path = inv.params.file_path.as_deref()?;
    let content = inv.params.content.as_deref()?;

    if tables.schema_files.accepts(Some(path)) {
        Some(schema_findings(tables, content))
    } else if tables.migration_files.accepts(Some(path)) {
        Some(migration_findings(tables, content))
    } else {
        None
    }
}

fn is_public(tables: &RlsTables, table: &str) -> bool {
    table.starts_with('_') || tables.public_tables.iter().any(|t| t == table)
}

fn has_tenant_column(tables: &RlsTables, content: &str) -> bool {
    tables
        .tenant_columns
        .iter()
        .any(|column| content.contains(column.as_str()))
}

fn schema_findings(tables: &RlsTables, content: &str) -> Vec<Finding> {
    let tenant = has_tenant_column(tables, content);
    let mut findings = Vec::new();

    for caps in tables.schema_table_pattern.captures_iter(content) {
        let Some(table) = caps.get(2).map(|m| m.as_str()) else {
            continue;
        };
        if is_public(tables, table) {
            continue;
        }
        if tenant {
            findings.push(Finding::note(
                "rls.schema-tenant-table",
                Severity::Info,
                format!(
                    "ℹ️  Table '{}' has tenant column - ensure RLS policies exist in Supabase",
                    table
                ),
            ));
        } else if !tables
            .lookup_fragments
            .iter()
            .any(|fragment| table.contains(fragment.as_str()))
        {
            findings.push(Finding::note(
                "rls.schema-missing-tenant",
                Severity::Warn,
                format!(
                    "⚠️  Table '{}' may need organizationId for multi-tenant isolation",
                    table
                ),
            ));
        }
    }

    findings
}

fn migration_findings(tables: &RlsTables, content: &str) -> Vec<Finding> {
    let tenant = has_tenant_column(tables, content);
    let mut findings = Vec::new();

    for caps in tables.migration_table_pattern.captures_iter(content) {
        let Some(table) = caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        if is_public(tables, table) || enables_rls(content, table) {
            continue;
        }

        if tenant {
            findings.push(Finding::note(
                "rls.migration-missing-rls",
                Severity::Warn,
                format!(
                    "⚠️  Table '{}' has tenant column but no RLS enabled in this migration",
                    table
                ),
            ));
            findings.push(Finding::note(
                "rls.enable-hint",
                Severity::Info,
                format!("💡 Add: ALTER TABLE {} ENABLE ROW LEVEL SECURITY;", table),
            ));
            findings.push(Finding::note(
                "rls.policy-hint",
                Severity::Info,
                "💡 Then create policies for SELECT, INSERT, UPDATE, DELETE",
            ));
        } else {
            let lower = table.to_lowercase();
            if tables
                .sensitive_keywords
                .iter()
                .any(|keyword| lower.contains(keyword.as_str()))
            {
                findings.push(Finding::note(
                    "rls.migration-sensitive-table",
                    Severity::Warn,
                    format!("⚠️  Table '{}' may need RLS for data isolation", table),
                ));
            }
        }
    }

    findings
}

fn enables_rls(content: &str, table: &str) -> bool {
    let source = format!(
        r#"ALTER\s+TABLE\s+["']?{}["']?\s+ENABLE\s+ROW\s+LEVEL\s+SECURITY"#,
        regex::escape(table)
    );
    match RegexBuilder::new(&source).case_insensitive(true).build() {
        Ok(re) => re.is_match(content),
        Err(e) => {
            debug!("Could not build RLS pattern for {}: {}", table, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use anyhow::Result;
    use pretty_assertions::assert_eq;

    fn ids(findings: &[Finding]) -> Vec<&str> {
        findings.iter().map(|f| f.rule_id.as_str()).collect()
    }

    #[test]
    fn test_schema_tables() -> Result<()> {
        let catalog = Catalog::builtin()?;
        let content = "export const deals = pgTable('deals', { organizationId: uuid() });";
        assert_eq!(
            ids(&schema_findings(&catalog.rls, content)),
            vec!["rls.schema-tenant-table"]
        );

        let content = "export const notes = pgTable('notes', {});\n\
                       export const dealStatus = pgTable('deal_status', {});\n\
                       export const countries = pgTable('countries', {});";
        assert_eq!(
            ids(&schema_findings(&catalog.rls, content)),
            vec!["rls.schema-missing-tenant"]
        );
        Ok(())
    }

    #[test]
    fn test_migration_without_rls() -> Result<()> {
        let catalog = Catalog::builtin()?;
        let content = "CREATE TABLE \"invoices\" (id uuid, organization_id uuid);";
        assert_eq!(
            ids(&migration_findings(&catalog.rls, content)),
            vec!["rls.migration-missing-rls", "rls.enable-hint", "rls.policy-hint"]
        );

        let enabled = format!("{}\nalter table invoices enable row level security;", content);
        assert!(migration_findings(&catalog.rls, &enabled).is_empty());
        Ok(())
    }

    #[test]
    fn test_migration_sensitive_name() -> Result<()> {
        let catalog = Catalog::builtin()?;
        let findings = migration_findings(
            &catalog.rls,
            "CREATE TABLE IF NOT EXISTS team_members (id uuid);\nCREATE TABLE widgets (id uuid);",
        );
        assert_eq!(ids(&findings), vec!["rls.migration-sensitive-table"]);
        assert!(findings[0].message.contains("team_members"));
        Ok(())
    }
}
