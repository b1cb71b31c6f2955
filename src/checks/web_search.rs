#![forbid(unsafe_code)]
#![warn(clippy::all)]

use crate::catalog::WebSearchTables;
use crate::decision::Decision;
use crate::engine::{Engine, Evaluation};
use crate::hook_io::Invocation;
use log::debug;
use serde_json::{Map, Value};

/// Append the current year to technical queries that carry no time context.
pub fn evaluate(engine: &Engine<'_>, inv: &Invocation) -> Evaluation {
    let Some(query) = inv.params.query.as_deref() else {
        return Evaluation::out_of_scope();
    };

    let decision = match enrich_query(query, engine.year(), &engine.catalog().web_search) {
        Some(enriched) => {
            debug!("Enhanced: '{}' -> '{}'", query, enriched);
            let mut params = Map::new();
            params.insert("query".to_string(), Value::String(enriched));
            Decision::rewrite(params)
        }
        None => {
            debug!("Unchanged: '{}'", query);
            Decision::allow()
        }
    };

    Evaluation {
        in_scope: true,
        findings: Vec::new(),
        decision,
    }
}

/// The enriched query, or `None` when the query should pass unchanged.
pub fn enrich_query(query: &str, year: i32, tables: &WebSearchTables) -> Option<String> {
    if tables.year_pattern.is_match(query) {
        return None;
    }
    let lower = query.to_lowercase();
    let contains_any = |keywords: &[String]| keywords.iter().any(|k| lower.contains(k.as_str()));
    if contains_any(&tables.temporal_keywords) || !contains_any(&tables.tech_keywords) {
        return None;
    }
    Some(format!("{} {}", query, year))
}
