#![forbid(unsafe_code)]
#![warn(clippy::all)]

use crate::catalog::Catalog;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Rule catalog to use instead of the built-in one.
    pub catalog: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub budgets: Budgets,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Controls which evaluations reach the audit log.
#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    /// No audit logging
    Off,
    /// Only evaluations with findings or a non-allow outcome
    Matched,
    /// Every in-scope evaluation (default)
    #[default]
    All,
}

#[derive(Debug, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_audit_dir")]
    pub audit_dir: PathBuf,
    #[serde(default)]
    pub audit_level: AuditLevel,
}

impl Default for AuditConfig {
    fn default() -> Self {
        AuditConfig {
            audit_dir: default_audit_dir(),
            audit_level: AuditLevel::default(),
        }
    }
}

fn default_audit_dir() -> PathBuf {
    PathBuf::from(".claude/logs")
}

/// Numeric limits shared by the matcher, the audit sink and the checks.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Budgets {
    pub max_matches_per_rule: usize,
    pub snippet_chars: usize,
    pub audit_field_chars: usize,
    pub stdout_tail_chars: usize,
    pub stderr_tail_chars: usize,
    pub formatter_timeout_secs: u64,
    pub dependency_audit_timeout_secs: u64,
    pub bundle_budget_kb: u64,
    pub chunk_budget_kb: u64,
    pub bundle_headroom_kb: u64,
    pub file_size_warn_kb: u64,
    pub max_imports_warn: usize,
}

impl Default for Budgets {
    fn default() -> Self {
        Budgets {
            max_matches_per_rule: 3,
            snippet_chars: 80,
            audit_field_chars: 1024,
            stdout_tail_chars: 1000,
            stderr_tail_chars: 500,
            formatter_timeout_secs: 30,
            dependency_audit_timeout_secs: 60,
            bundle_budget_kb: 1000,
            chunk_budget_kb: 100,
            bundle_headroom_kb: 50,
            file_size_warn_kb: 100,
            max_imports_warn: 15,
        }
    }
}

impl Budgets {
    pub fn formatter_timeout(&self) -> Duration {
        Duration::from_secs(self.formatter_timeout_secs)
    }

    pub fn dependency_audit_timeout(&self) -> Duration {
        Duration::from_secs(self.dependency_audit_timeout_secs)
    }
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?;

        // A relative catalog path is relative to the config file.
        if let Some(catalog) = &config.catalog
            && catalog.is_relative()
            && let Some(dir) = path.parent()
        {
            config.catalog = Some(dir.join(catalog));
        }

        Ok(config)
    }

    /// Load `path` when given, otherwise run on defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Config::default()),
        }
    }

    pub fn load_catalog(&self) -> Result<Catalog> {
        match &self.catalog {
            Some(path) => Catalog::load_from_file(path),
            None => Catalog::builtin(),
        }
    }
}
