#![forbid(unsafe_code)]
#![warn(clippy::all)]

//! Rule catalog: ordered rule sets, per-guard presentation and the data
//! tables the individual checks read.

use crate::guard::GuardKind;
use anyhow::{Context, Result, bail};
use log::debug;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;

const BUILTIN_CATALOG: &str = include_str!("../catalog.toml");

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        };
        f.write_str(name)
    }
}

/// Which part of the action payload a rule searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    #[default]
    Content,
    Path,
    Command,
    Query,
}

/// Path predicate. An empty list places no constraint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathScope {
    #[serde(default)]
    pub path_contains: Vec<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub path_excludes: Vec<String>,
}

impl PathScope {
    pub fn accepts(&self, path: Option<&str>) -> bool {
        let path = path.unwrap_or("");
        if self
            .path_excludes
            .iter()
            .any(|fragment| path.contains(fragment.as_str()))
        {
            return false;
        }
        if !self.path_contains.is_empty()
            && !self
                .path_contains
                .iter()
                .any(|fragment| path.contains(fragment.as_str()))
        {
            return false;
        }
        self.extensions.is_empty() || has_extension(path, &self.extensions)
    }
}

/// Lowercased extension of `path` including the leading dot.
pub fn extension_of(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
}

pub fn has_extension(path: &str, extensions: &[String]) -> bool {
    extension_of(path).is_some_and(|ext| extensions.iter().any(|e| *e == ext))
}

/// A regex read straight from the catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "String")]
pub struct Pattern(Regex);

impl TryFrom<String> for Pattern {
    type Error = regex::Error;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        Regex::new(&source).map(Pattern)
    }
}

impl std::ops::Deref for Pattern {
    type Target = Regex;

    fn deref(&self) -> &Regex {
        &self.0
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    pub id: String,
    pub pattern: String,
    pub exclude: Option<String>,
    pub severity: Severity,
    pub message: String,
    pub field: Option<Field>,
    pub path_pattern: Option<String>,
    #[serde(default)]
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleSetConfig {
    pub name: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub field: Field,
    #[serde(flatten)]
    pub scope: PathScope,
    #[serde(default)]
    pub redact: bool,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub pattern: Regex,
    pub exclude: Option<Regex>,
    pub severity: Severity,
    pub message: String,
    pub field: Field,
    pub path_pattern: Option<Regex>,
}

#[derive(Debug, Clone)]
pub struct RuleSet {
    pub name: String,
    pub tools: Vec<String>,
    pub scope: PathScope,
    pub redact: bool,
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn compile(config: &RuleSetConfig) -> Result<Self> {
        let rules = config
            .rules
            .iter()
            .map(|rule| {
                compile_rule(rule, config.field)
                    .with_context(|| format!("Invalid rule '{}'", rule.id))
            })
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Failed to compile rule set '{}'", config.name))?;

        Ok(RuleSet {
            name: config.name.clone(),
            tools: config.tools.clone(),
            scope: config.scope.clone(),
            redact: config.redact,
            rules,
        })
    }

    pub fn applies_to_tool(&self, tool: Option<&str>) -> bool {
        self.tools.is_empty() || tool.is_some_and(|name| self.tools.iter().any(|t| t == name))
    }
}

fn compile_rule(config: &RuleConfig, default_field: Field) -> Result<Rule> {
    let build = |source: &str| {
        RegexBuilder::new(source)
            .case_insensitive(!config.case_sensitive)
            .multi_line(true)
            .build()
    };

    let pattern = build(&config.pattern).context("Invalid pattern")?;

    let exclude = config
        .exclude
        .as_deref()
        .map(build)
        .transpose()
        .context("Invalid exclude")?;

    let path_pattern = config
        .path_pattern
        .as_deref()
        .map(Regex::new)
        .transpose()
        .context("Invalid path_pattern")?;

    Ok(Rule {
        id: config.id.clone(),
        pattern,
        exclude,
        severity: config.severity,
        message: config.message.clone(),
        field: config.field.unwrap_or(default_field),
        path_pattern,
    })
}

/// How a guard presents itself and which rule sets it runs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GuardProfile {
    #[serde(default)]
    pub rule_sets: Vec<String>,
    pub block_heading: Option<String>,
    pub warn_heading: Option<String>,
    #[serde(default)]
    pub block_hints: Vec<String>,
    #[serde(default)]
    pub warn_hints: Vec<String>,
}

static EMPTY_PROFILE: GuardProfile = GuardProfile {
    rule_sets: Vec::new(),
    block_heading: None,
    warn_heading: None,
    block_hints: Vec::new(),
    warn_hints: Vec::new(),
};

#[derive(Debug, Clone, Deserialize)]
pub struct MigrationTables {
    pub file_name_pattern: Pattern,
    pub migration_files: PathScope,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportTables {
    pub sveltekit_paths: Vec<String>,
    pub relative_import_pattern: Pattern,
    pub deep_relative_depth: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteTables {
    pub route_dirs: Vec<String>,
    pub valid_files: Vec<String>,
    pub segment_pattern: Pattern,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RlsTables {
    pub tenant_columns: Vec<String>,
    pub public_tables: Vec<String>,
    pub lookup_fragments: Vec<String>,
    pub sensitive_keywords: Vec<String>,
    pub schema_table_pattern: Pattern,
    pub migration_table_pattern: Pattern,
    pub schema_files: PathScope,
    pub migration_files: PathScope,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PermissionTables {
    pub safe_tools: Vec<String>,
    pub safe_bash_prefixes: Vec<String>,
    pub chain_operators: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSearchTables {
    pub year_pattern: Pattern,
    pub temporal_keywords: Vec<String>,
    pub tech_keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Formatter {
    pub name: String,
    pub extensions: Vec<String>,
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormatTables {
    pub skip_fragments: Vec<String>,
    pub formatters: Vec<Formatter>,
}

impl FormatTables {
    pub fn formatter_for(&self, path: &str) -> Option<&Formatter> {
        self.formatters
            .iter()
            .find(|formatter| has_extension(path, &formatter.extensions))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DependencyAudit {
    pub manifest: String,
    pub name: String,
    pub command: Vec<String>,
    #[serde(default)]
    pub append_path: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyCheck {
    pub name: String,
    pub markers: Vec<String>,
    pub command: Vec<String>,
    pub timeout_secs: u64,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyTables {
    pub project_markers: Vec<String>,
    pub checks: Vec<VerifyCheck>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PerfTables {
    pub build_commands: Vec<Pattern>,
    pub output_dirs: Vec<String>,
    pub source_extensions: Vec<String>,
    pub skip_fragments: Vec<String>,
    pub import_pattern: Pattern,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    guards: BTreeMap<String, GuardProfile>,
    #[serde(default)]
    rule_sets: Vec<RuleSetConfig>,
    migrations: MigrationTables,
    imports: ImportTables,
    routes: RouteTables,
    rls: RlsTables,
    permissions: PermissionTables,
    web_search: WebSearchTables,
    format: FormatTables,
    #[serde(default)]
    dependency_audits: Vec<DependencyAudit>,
    verify: VerifyTables,
    perf: PerfTables,
}

/// The compiled catalog. Built once per process and never mutated.
#[derive(Debug, Clone)]
pub struct Catalog {
    rule_sets: Vec<RuleSet>,
    guards: BTreeMap<GuardKind, GuardProfile>,
    pub migrations: MigrationTables,
    pub imports: ImportTables,
    pub routes: RouteTables,
    pub rls: RlsTables,
    pub permissions: PermissionTables,
    pub web_search: WebSearchTables,
    pub format: FormatTables,
    pub dependency_audits: Vec<DependencyAudit>,
    pub verify: VerifyTables,
    pub perf: PerfTables,
}

impl Catalog {
    /// The catalog shipped inside the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_CATALOG).context("Failed to compile built-in catalog")
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;

        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to load catalog: {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(contents).context("Failed to parse TOML catalog")?;

        let mut seen = HashSet::new();
        let mut rule_sets = Vec::with_capacity(file.rule_sets.len());
        for config in &file.rule_sets {
            if !seen.insert(config.name.as_str()) {
                bail!("Duplicate rule set name: {}", config.name);
            }
            rule_sets.push(RuleSet::compile(config)?);
        }

        let mut guards = BTreeMap::new();
        for (name, profile) in file.guards {
            let Some(kind) = GuardKind::from_name(&name) else {
                bail!("Unknown guard in catalog: {}", name);
            };
            if let Some(missing) = profile.rule_sets.iter().find(|n| !seen.contains(n.as_str())) {
                bail!("Guard '{}' references unknown rule set '{}'", name, missing);
            }
            guards.insert(kind, profile);
        }

        debug!(
            "Compiled catalog: {} rule sets, {} guard profiles",
            rule_sets.len(),
            guards.len()
        );

        Ok(Catalog {
            rule_sets,
            guards,
            migrations: file.migrations,
            imports: file.imports,
            routes: file.routes,
            rls: file.rls,
            permissions: file.permissions,
            web_search: file.web_search,
            format: file.format,
            dependency_audits: file.dependency_audits,
            verify: file.verify,
            perf: file.perf,
        })
    }

    pub fn rule_set(&self, name: &str) -> Option<&RuleSet> {
        self.rule_sets.iter().find(|set| set.name == name)
    }

    pub fn rule_sets(&self) -> &[RuleSet] {
        &self.rule_sets
    }

    pub fn rule_count(&self) -> usize {
        self.rule_sets.iter().map(|set| set.rules.len()).sum()
    }

    pub fn profile(&self, kind: GuardKind) -> &GuardProfile {
        self.guards.get(&kind).unwrap_or(&EMPTY_PROFILE)
    }

    /// Rule sets a guard runs, in the order its profile lists them.
    pub fn rule_sets_for(&self, kind: GuardKind) -> Vec<&RuleSet> {
        self.profile(kind)
            .rule_sets
            .iter()
            .filter_map(|name| self.rule_set(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builtin_catalog_compiles() -> Result<()> {
        let catalog = Catalog::builtin()?;
        assert!(catalog.rule_set("destructive-sql").is_some());
        assert!(catalog.rule_count() > 50);

        let names: Vec<&str> = catalog
            .rule_sets_for(GuardKind::Migrations)
            .iter()
            .map(|set| set.name.as_str())
            .collect();
        assert_eq!(names, vec!["destructive-sql", "drizzle-schema"]);
        Ok(())
    }

    #[test]
    fn test_missing_profile_is_empty() -> Result<()> {
        let catalog = Catalog::builtin()?;
        assert!(catalog.rule_sets_for(GuardKind::CommandLog).is_empty());
        assert_eq!(catalog.profile(GuardKind::CommandLog).block_heading, None);
        Ok(())
    }

    #[test]
    fn test_rule_ids_are_unique() -> Result<()> {
        let catalog = Catalog::builtin()?;
        let mut seen = HashSet::new();
        for set in catalog.rule_sets() {
            for rule in &set.rules {
                assert!(seen.insert(rule.id.clone()), "duplicate id {}", rule.id);
            }
        }
        Ok(())
    }

    #[test]
    fn test_compile_rule_flags() -> Result<()> {
        let config = RuleConfig {
            id: "t".to_string(),
            pattern: r"^drop\s+table$".to_string(),
            exclude: None,
            severity: Severity::Error,
            message: "m".to_string(),
            field: None,
            path_pattern: None,
            case_sensitive: false,
        };
        let rule = compile_rule(&config, Field::Content)?;
        assert!(rule.pattern.is_match("select 1;\nDROP TABLE\n"));
        assert_eq!(rule.field, Field::Content);

        let strict = compile_rule(
            &RuleConfig {
                case_sensitive: true,
                ..config
            },
            Field::Command,
        )?;
        assert!(!strict.pattern.is_match("DROP TABLE"));
        assert_eq!(strict.field, Field::Command);
        Ok(())
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let source = BUILTIN_CATALOG.replace(r"'\bTRUNCATE\b'", "'(unclosed'");
        let err = Catalog::from_toml_str(&source).expect_err("pattern should not compile");
        assert!(format!("{:#}", err).contains("sql.truncate"));
    }

    #[test]
    fn test_unknown_rule_set_reference() {
        let source = BUILTIN_CATALOG.replace(
            r#"rule_sets = ["hardcoded-secrets"]"#,
            r#"rule_sets = ["no-such-set"]"#,
        );
        let err = Catalog::from_toml_str(&source).expect_err("reference should fail");
        assert!(err.to_string().contains("no-such-set"));
    }

    #[test]
    fn test_path_scope() {
        let scope = PathScope {
            path_contains: vec!["migrations/".to_string()],
            extensions: vec![".sql".to_string()],
            path_excludes: vec!["index".to_string()],
        };
        assert!(scope.accepts(Some("db/migrations/0001_init.sql")));
        assert!(scope.accepts(Some("db/migrations/0001_INIT.SQL")));
        assert!(!scope.accepts(Some("db/migrations/index.sql")));
        assert!(!scope.accepts(Some("db/schema/0001_init.sql")));
        assert!(!scope.accepts(Some("db/migrations/notes.md")));
        assert!(!scope.accepts(None));

        assert!(PathScope::default().accepts(None));
    }

    #[test]
    fn test_formatter_lookup() -> Result<()> {
        let catalog = Catalog::builtin()?;
        let svelte = catalog.format.formatter_for("src/App.svelte");
        assert_eq!(
            svelte.map(|f| f.command.last().cloned()),
            Some(Some("prettier-plugin-svelte".to_string()))
        );
        assert!(catalog.format.formatter_for("notes.txt").is_none());
        Ok(())
    }
}
