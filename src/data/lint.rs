use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use super::model::{ColumnType, ExcelData};
use super::workbook::synthesized_header;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueLevel {
    Info,
    Warning,
}

impl fmt::Display for IssueLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueLevel::Info => f.write_str("info"),
            IssueLevel::Warning => f.write_str("warning"),
        }
    }
}

/// One advisory finding about a parsed sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataIssue {
    pub level: IssueLevel,
    pub message: String,
}

impl DataIssue {
    fn warning(message: String) -> Self {
        DataIssue {
            level: IssueLevel::Warning,
            message,
        }
    }

    fn info(message: String) -> Self {
        DataIssue {
            level: IssueLevel::Info,
            message,
        }
    }
}

impl fmt::Display for DataIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}

/// Advisory checks over a parsed sheet. Never modifies the data.
pub fn validate_data(data: &ExcelData) -> Vec<DataIssue> {
    let mut issues = Vec::new();

    // duplicate headers, compared case-insensitively, reported once each
    let mut seen: HashMap<String, usize> = HashMap::new();
    for header in &data.headers {
        *seen.entry(header.to_lowercase()).or_default() += 1;
    }
    let mut reported = Vec::new();
    for header in &data.headers {
        let key = header.to_lowercase();
        if seen[&key] > 1 && !reported.contains(&key) {
            issues.push(DataIssue::warning(format!(
                "duplicate column header '{header}' appears {} times",
                seen[&key]
            )));
            reported.push(key);
        }
    }

    if data.rows.is_empty() {
        issues.push(DataIssue::warning("sheet has no data rows".to_string()));
    }

    let synthesized: Vec<&str> = data
        .headers
        .iter()
        .enumerate()
        .filter(|(i, h)| **h == synthesized_header(*i))
        .map(|(_, h)| h.as_str())
        .collect();
    if !synthesized.is_empty() {
        issues.push(DataIssue::info(format!(
            "{} column(s) had no header and were named automatically: {}",
            synthesized.len(),
            synthesized.join(", ")
        )));
    }

    if !data.rows.is_empty() {
        for column in &data.metadata.columns {
            if column.null_count >= data.rows.len() {
                issues.push(DataIssue::info(format!(
                    "column '{}' is entirely empty",
                    column.name
                )));
            }
        }
    }

    for column in &data.metadata.columns {
        if column.column_type == ColumnType::Mixed {
            issues.push(DataIssue::info(format!(
                "column '{}' mixes value types",
                column.name
            )));
        }
    }

    issues
}
