//! Report renderer (A7).
//!
//! `--report FILE` renders a self-contained HTML document from a `minijinja` template
//! embedded in the binary: a Job Summary table (one row per table reconciled this invocation)
//! and, per table, `{equal, notEqual, missingSource, missingTarget, elapsedTime,
//! rowsPerSecond}`. In check mode an additional section lists each finding's
//! confirmed/resolved/still_missing outcome.

use std::fs;
use std::path::Path;

use minijinja::{context, Environment};
use serde::Serialize;

use crate::error::PgCompareError;
use crate::model::{RecheckOutcome, RunHistory};
use crate::recheck::RecheckResult;

const TEMPLATE: &str = include_str!("report_template.html.jinja");

/// One table's row in the Job Summary, plus (in check mode) its finding-level detail.
#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub alias: String,
    pub equal: u64,
    pub not_equal: u64,
    pub missing_source: u64,
    pub missing_target: u64,
    pub elapsed_ms: u64,
    pub rows_per_second: f64,
    pub findings: Vec<FindingReport>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FindingReport {
    pub pk: String,
    pub side: String,
    pub outcome: String,
}

impl TableReport {
    /// Build a summary row from a table's alias and its recorded `RunHistory`.
    pub fn new(alias: impl Into<String>, history: &RunHistory) -> Self {
        Self {
            alias: alias.into(),
            equal: history.equal,
            not_equal: history.not_equal,
            missing_source: history.missing_source,
            missing_target: history.missing_target,
            elapsed_ms: history.elapsed_ms,
            rows_per_second: history.rows_per_second(),
            findings: Vec::new(),
            error: None,
        }
    }

    /// Build a row for a table whose Connect/Extract/Load/Map step failed (section 7): the
    /// table is marked failed and the batch continues on to the next one, so the row carries
    /// zeroed counts and the error message instead of a `RunHistory`.
    pub fn failed(alias: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            equal: 0,
            not_equal: 0,
            missing_source: 0,
            missing_target: 0,
            elapsed_ms: 0,
            rows_per_second: 0.0,
            findings: Vec::new(),
            error: Some(message.into()),
        }
    }

    /// Attach check-mode finding detail to this table's row.
    pub fn with_recheck(mut self, outcomes: &[RecheckResult]) -> Self {
        self.findings = outcomes
            .iter()
            .map(|o| FindingReport {
                pk: o.pk.to_string(),
                side: o.side.as_str().to_string(),
                outcome: match o.outcome {
                    RecheckOutcome::Confirmed => "confirmed",
                    RecheckOutcome::Resolved => "resolved",
                    RecheckOutcome::StillMissing => "still_missing",
                }
                .to_string(),
            })
            .collect();
        self
    }
}

/// Everything one invocation's `--report FILE` needs: every table reconciled this run, and
/// whether this was a `check` invocation (which adds the per-finding sections).
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub tables: Vec<TableReport>,
    pub check_mode: bool,
}

/// Render the Job Summary to a self-contained HTML string.
pub fn render(summary: &JobSummary) -> Result<String, PgCompareError> {
    let mut env = Environment::new();
    env.add_template("report", TEMPLATE)
        .map_err(|e| PgCompareError::Report(e.to_string()))?;
    let tmpl = env
        .get_template("report")
        .map_err(|e| PgCompareError::Report(e.to_string()))?;
    tmpl.render(context! { tables => summary.tables, check_mode => summary.check_mode })
        .map_err(|e| PgCompareError::Report(e.to_string()))
}

/// Render and write the Job Summary to `path`.
pub fn write_to_file(summary: &JobSummary, path: &Path) -> Result<(), PgCompareError> {
    let html = render(summary)?;
    fs::write(path, html)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Side;

    fn sample_history() -> RunHistory {
        RunHistory {
            tid: 1,
            batch_nbr: 1,
            equal: 900,
            not_equal: 50,
            missing_source: 25,
            missing_target: 25,
            elapsed_ms: 1000,
        }
    }

    #[test]
    fn test_table_report_from_history() {
        let report = TableReport::new("emp", &sample_history());
        assert_eq!(report.alias, "emp");
        assert_eq!(report.equal, 900);
        assert_eq!(report.rows_per_second, 1000.0);
        assert!(report.findings.is_empty());
    }

    #[test]
    fn test_render_job_summary_contains_alias_and_counts() {
        let summary = JobSummary {
            tables: vec![TableReport::new("emp", &sample_history())],
            check_mode: false,
        };
        let html = render(&summary).unwrap();
        assert!(html.contains("emp"));
        assert!(html.contains("900"));
        assert!(!html.contains("findings"));
    }

    #[test]
    fn test_render_check_mode_lists_findings() {
        let outcomes = vec![RecheckResult {
            side: Side::Source,
            pk: serde_json::json!({"id": "2"}),
            status: crate::model::FindingStatus::NotEqual,
            outcome: RecheckOutcome::Resolved,
        }];
        let summary = JobSummary {
            tables: vec![TableReport::new("emp", &sample_history()).with_recheck(&outcomes)],
            check_mode: true,
        };
        let html = render(&summary).unwrap();
        assert!(html.contains("resolved"));
        assert!(html.contains("emp — findings") || html.contains("emp"));
    }
}
