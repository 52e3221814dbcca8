//! JSONL evaluation datasets

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::metric::Metric;
use crate::error::{Error, Result};
use crate::types::conversation::{flatten_history, validate_history, HistoryEntry};
use crate::types::ChatHistory;

/// One evaluation case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalRow {
    pub chat_input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ground_truth: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chat_history: Vec<HistoryEntry>,
}

impl EvalRow {
    /// Row history as ordered turns
    pub fn history(&self) -> ChatHistory {
        flatten_history(self.chat_history.clone())
    }
}

/// Read a JSONL dataset from disk
pub fn load_dataset(path: &Path) -> Result<Vec<EvalRow>> {
    let content = std::fs::read_to_string(path)?;
    parse_jsonl(&content)
}

/// Parse JSONL rows, skipping blank lines
pub fn parse_jsonl(content: &str) -> Result<Vec<EvalRow>> {
    let mut rows = Vec::new();
    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row: EvalRow = serde_json::from_str(line)
            .map_err(|e| Error::input(format!("Dataset line {}: {}", i + 1, e)))?;
        rows.push(row);
    }
    if rows.is_empty() {
        return Err(Error::input("Evaluation dataset has no rows"));
    }
    Ok(rows)
}

/// Check every row carries what the selected metrics need, before any call is made
pub fn validate_rows(rows: &[EvalRow], metrics: &[Metric]) -> Result<()> {
    let needs_truth = metrics.iter().find(|m| m.needs_ground_truth());

    for (i, row) in rows.iter().enumerate() {
        if row.chat_input.trim().is_empty() {
            return Err(Error::input(format!("Row {} has an empty chat_input", i + 1)));
        }
        if let Some(metric) = needs_truth {
            if row.ground_truth.as_deref().map_or(true, |t| t.trim().is_empty()) {
                return Err(Error::input(format!(
                    "Row {} has no ground_truth, required by {}",
                    i + 1,
                    metric
                )));
            }
        }
        validate_history(&row.history())
            .map_err(|e| Error::input(format!("Row {}: {}", i + 1, e)))?;
    }
    Ok(())
}
