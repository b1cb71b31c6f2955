#![forbid(unsafe_code)]
#![warn(clippy::all)]

use crate::config::AuditLevel;
use crate::decision::{Finding, Outcome};
use crate::guard::GuardKind;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// One evaluation, as written to the audit log.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub guard: GuardKind,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    pub summary: String,
    pub findings: Vec<Finding>,
    pub outcome: Outcome,
}

/// Destination for audit records. Recording never fails from the caller's
/// point of view.
pub trait AuditSink {
    fn record(&self, record: &AuditRecord);
}

/// Discards every record.
#[derive(Debug, Default)]
pub struct NullSink;

impl AuditSink for NullSink {
    fn record(&self, _record: &AuditRecord) {}
}

/// Appends JSON lines to `<audit_dir>/<guard>.jsonl`.
#[derive(Debug)]
pub struct JsonlSink {
    file: Option<File>,
    level: AuditLevel,
    max_len: usize,
}

impl JsonlSink {
    /// Open the guard's log in append mode. A missing directory or an
    /// unwritable file leaves the sink disabled.
    pub fn open(audit_dir: &Path, guard: GuardKind, level: AuditLevel, max_len: usize) -> Self {
        let file = if level == AuditLevel::Off {
            None
        } else {
            let path = audit_dir.join(format!("{}.jsonl", guard));
            match OpenOptions::new().create(true).append(true).open(&path) {
                Ok(file) => Some(file),
                Err(e) => {
                    warn!("Failed to open audit log {}: {}", path.display(), e);
                    None
                }
            }
        };
        JsonlSink {
            file,
            level,
            max_len,
        }
    }

    fn should_record(&self, record: &AuditRecord) -> bool {
        match self.level {
            AuditLevel::Off => false,
            AuditLevel::Matched => !record.findings.is_empty() || record.outcome != Outcome::Allow,
            AuditLevel::All => true,
        }
    }

    fn try_record(&self, file: &File, record: &AuditRecord) -> anyhow::Result<()> {
        let truncated = truncate_record(record, self.max_len);
        let mut line = serde_json::to_string(&truncated)?;
        line.push('\n');

        // One write per record keeps concurrent appenders from interleaving.
        let mut writer = file;
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        Ok(())
    }
}

impl AuditSink for JsonlSink {
    fn record(&self, record: &AuditRecord) {
        if !self.should_record(record) {
            debug!("Audit level {:?} skips this record", self.level);
            return;
        }
        let Some(file) = &self.file else {
            return;
        };
        if let Err(e) = self.try_record(file, record) {
            warn!("Failed to write audit entry: {}", e);
        }
    }
}

fn truncate_record(record: &AuditRecord, max_len: usize) -> AuditRecord {
    AuditRecord {
        summary: truncate_chars(&record.summary, max_len),
        findings: record
            .findings
            .iter()
            .map(|finding| Finding {
                message: truncate_chars(&finding.message, max_len),
                snippets: finding
                    .snippets
                    .iter()
                    .map(|s| truncate_chars(s, max_len))
                    .collect(),
                ..finding.clone()
            })
            .collect(),
        ..record.clone()
    }
}

/// Truncate strings longer than `max_len` characters.
fn truncate_chars(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len).collect();
        format!("{}… [truncated]", truncated)
    }
}
