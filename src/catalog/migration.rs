//! One-time migration of portfolio tech stacks to the list form
//!
//! Older documents stored `techStack` as a comma-joined string. Reading
//! accepts both shapes; writing only ever produces the list.

use super::models::Portfolio;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

/// `techStack` as found in stored documents
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TechStackField {
    List(Vec<String>),
    Joined(String),
}

impl TechStackField {
    pub fn is_legacy(&self) -> bool {
        matches!(self, TechStackField::Joined(_))
    }

    /// Ordered tags, trimmed, empties dropped
    pub fn into_tags(self) -> Vec<String> {
        let raw: Vec<String> = match self {
            TechStackField::List(items) => items,
            TechStackField::Joined(joined) => joined.split(',').map(str::to_string).collect(),
        };
        raw.into_iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect()
    }
}

/// Outcome of a migration pass
#[derive(Debug, Default)]
pub struct MigrationReport {
    pub records: Vec<Portfolio>,
    /// Documents that used the joined-string form
    pub migrated: usize,
    /// (document index, reason) for documents that could not be read
    pub skipped: Vec<(usize, String)>,
}

/// Convert raw portfolio documents into records with list-form tech stacks.
///
/// A bad document is reported and skipped; the rest still migrate.
pub fn migrate_portfolio_documents(documents: Vec<Value>) -> MigrationReport {
    let mut report = MigrationReport::default();

    for (index, mut document) in documents.into_iter().enumerate() {
        let Some(fields) = document.as_object_mut() else {
            report.skipped.push((index, "document is not an object".to_string()));
            continue;
        };

        let tech_stack = match fields.remove("techStack") {
            None | Some(Value::Null) => None,
            Some(value) => match serde_json::from_value::<TechStackField>(value) {
                Ok(field) => Some(field),
                Err(e) => {
                    warn!(index, error = %e, "unreadable techStack");
                    report.skipped.push((index, format!("techStack: {}", e)));
                    continue;
                }
            },
        };

        let mut portfolio: Portfolio = match serde_json::from_value(document) {
            Ok(p) => p,
            Err(e) => {
                warn!(index, error = %e, "unreadable portfolio document");
                report.skipped.push((index, e.to_string()));
                continue;
            }
        };

        if let Some(field) = tech_stack {
            if field.is_legacy() {
                report.migrated += 1;
            }
            portfolio.tech_stack = field.into_tags();
        }
        report.records.push(portfolio);
    }

    info!(
        total = report.records.len(),
        migrated = report.migrated,
        skipped = report.skipped.len(),
        "portfolio migration finished"
    );
    report
}
