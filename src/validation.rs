/// Batch checks for cell records, used by the `validate-cells` tool.

use crate::boundary_builder::{build_hex_feature, check_cell_boundary};
use crate::cell_id::{candidate, parse_cell_token};
use crate::constants::FALLBACK_ROWS;
use serde::Serialize;
use serde_json::{Value, json};

/// How many issues a summary keeps for display.
pub const MAX_REPORTED_ISSUES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellIssue {
    /// Position of the record in the input
    pub index: usize,
    /// The raw id token, when one was present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell: Option<String>,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationSummary {
    pub total: usize,
    pub ok: usize,
    pub closed: usize,
    pub bad: usize,
    /// First issues found, at most [`MAX_REPORTED_ISSUES`]
    pub issues: Vec<CellIssue>,
}

impl ValidationSummary {
    pub fn headline(&self) -> String {
        format!(
            "Validated {} items -> ok={}, closed={}, bad={}",
            self.total, self.ok, self.closed, self.bad
        )
    }
}

/// Check every record's cell id and boundary.
pub fn validate_records(records: &[Value]) -> ValidationSummary {
    let mut summary = ValidationSummary {
        total: records.len(),
        ..ValidationSummary::default()
    };

    for (index, record) in records.iter().enumerate() {
        let outcome = match candidate(record) {
            None => Err((None, "missing-cell")),
            Some(token) => {
                let raw = match token {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                match parse_cell_token(token) {
                    None => Err((Some(raw), "invalid-cell")),
                    Some(cell) => match check_cell_boundary(cell) {
                        Err(issue) => Err((Some(raw), issue.as_str())),
                        Ok(_) => Ok(build_hex_feature(cell, 0.0)
                            .is_some_and(|f| f.ring().is_closed())),
                    },
                }
            }
        };

        match outcome {
            Ok(closed) => {
                summary.ok += 1;
                if closed {
                    summary.closed += 1;
                }
            }
            Err((cell, reason)) => {
                summary.bad += 1;
                if summary.issues.len() < MAX_REPORTED_ISSUES {
                    summary.issues.push(CellIssue { index, cell, reason });
                }
            }
        }
    }
    summary
}

/// Records used when no input file is available.
pub fn sample_records() -> Vec<Value> {
    FALLBACK_ROWS
        .iter()
        .map(|(cell, value)| json!({ "cell": cell, "value": value }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_is_clean() {
        let summary = validate_records(&sample_records());
        assert_eq!(summary.headline(), "Validated 5 items -> ok=5, closed=5, bad=0");
        assert!(summary.issues.is_empty());
    }

    #[test]
    fn test_issues_reported() {
        let records = vec![
            json!({ "value": 1.0 }),
            json!({ "h3": "zzz" }),
            json!({ "index": "8928308280fffff" }),
        ];
        let summary = validate_records(&records);
        assert_eq!((summary.ok, summary.bad), (1, 2));
        assert_eq!(summary.issues[0], CellIssue { index: 0, cell: None, reason: "missing-cell" });
        assert_eq!(summary.issues[1].reason, "invalid-cell");
        assert_eq!(summary.issues[1].cell.as_deref(), Some("zzz"));
    }

    #[test]
    fn test_issue_list_is_capped() {
        let records = vec![json!({}); 25];
        let summary = validate_records(&records);
        assert_eq!(summary.bad, 25);
        assert_eq!(summary.issues.len(), MAX_REPORTED_ISSUES);
    }
}
