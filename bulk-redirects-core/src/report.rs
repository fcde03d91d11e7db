//! Uniform report returned by every command.
//!
//! Each stage contributes errors and messages; optional sections carry the data a
//! command produced (rules, invalid rows, diff, publish outcome). A report renders
//! as human-readable text through [`Display`](std::fmt::Display) and as JSON through
//! `serde`.

use serde::Serialize;
use std::fmt;

use crate::contract::RuleEntry;
use crate::process::{InvalidRow, ProcessedRows};
use crate::publish::{PublishOutcome, PublishReport};
use crate::reconcile::RuleDiff;

/// Health/status result as returned by collaborators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub success: bool,
    pub errors: Vec<String>,
    pub messages: Vec<String>,
}

impl StatusReport {
    pub fn ok(message: impl Into<String>) -> Self {
        StatusReport {
            success: true,
            errors: Vec::new(),
            messages: vec![message.into()],
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        StatusReport {
            success: false,
            errors: vec![error.into()],
            messages: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Status,
    List,
    Diff,
    Publish,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Status => "status",
            Command::List => "list",
            Command::Diff => "diff",
            Command::Publish => "publish",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub command: Command,
    pub success: bool,
    pub errors: Vec<String>,
    pub messages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_rules: Option<Vec<RuleEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_rows: Option<Vec<InvalidRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_rules: Option<Vec<RuleEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<RuleDiff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishReport>,
}

impl Report {
    pub fn new(command: Command) -> Self {
        Report {
            command,
            success: true,
            errors: Vec::new(),
            messages: Vec::new(),
            valid_rules: None,
            invalid_rows: None,
            remote_rules: None,
            diff: None,
            publish: None,
        }
    }

    /// Record a failure; the report is no longer successful.
    pub fn error(&mut self, error: impl Into<String>) {
        self.success = false;
        self.errors.push(error.into());
    }

    pub fn message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Fold a collaborator's status into this report, prefixing each line with `stage`.
    pub fn merge_status(&mut self, stage: &str, status: StatusReport) {
        self.success &= status.success;
        self.errors
            .extend(status.errors.into_iter().map(|e| format!("{stage}: {e}")));
        self.messages
            .extend(status.messages.into_iter().map(|m| format!("{stage}: {m}")));
    }

    /// Attach processed spreadsheet rows. Invalid rows fail the report; deleted rows do not.
    pub fn with_rows(&mut self, rows: ProcessedRows) {
        self.message(format!(
            "spreadsheet: {} redirect(s) expanded to {} rule(s), {} deleted row(s) skipped",
            rows.records.len(),
            rows.rules.len(),
            rows.deleted
        ));
        if !rows.invalid_rows.is_empty() {
            self.error(format!(
                "spreadsheet: {} invalid row(s)",
                rows.invalid_rows.len()
            ));
        }
        self.valid_rules = Some(rows.rules);
        self.invalid_rows = Some(rows.invalid_rows);
    }

    pub fn with_diff(&mut self, diff: RuleDiff) {
        self.message(format!(
            "diff: {} rule(s) to add, {} rule(s) to remove",
            diff.added.len(),
            diff.removed.len()
        ));
        self.diff = Some(diff);
    }

    pub fn with_publish(&mut self, publish: PublishReport) {
        match publish.outcome {
            PublishOutcome::Succeeded => self.message(format!(
                "publish: {} rule(s) published in {} batch(es)",
                publish.total_rules,
                publish.batches.len()
            )),
            PublishOutcome::Aborted => self.error(format!(
                "publish: aborted before upload: {}",
                publish.truncate_error.as_deref().unwrap_or("unknown error")
            )),
            outcome => self.error(format!(
                "publish: {outcome}: {} of {} batch(es) failed, {} skipped",
                publish.failed_batches(),
                publish.batches.len() + publish.skipped_batches,
                publish.skipped_batches
            )),
        }
        for batch in &publish.batches {
            for error in &batch.errors {
                self.errors.push(format!("batch {}: {error}", batch.index));
            }
            for message in &batch.messages {
                self.messages.push(format!("batch {}: {message}", batch.index));
            }
        }
        let invalid = publish.invalid_rules().count();
        if invalid > 0 {
            self.message(format!("publish: remote rejected {invalid} rule(s)"));
        }
        self.messages.extend(publish.messages.iter().cloned());
        self.publish = Some(publish);
    }
}

fn write_rule(f: &mut fmt::Formatter<'_>, marker: &str, rule: &RuleEntry) -> fmt::Result {
    writeln!(
        f,
        "  {marker} {} -> {} ({})",
        rule.source_url, rule.target_url, rule.status_code
    )
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.success { "OK" } else { "FAILED" };
        writeln!(f, "{} {verdict}", self.command)?;

        for message in &self.messages {
            writeln!(f, "  - {message}")?;
        }
        for error in &self.errors {
            writeln!(f, "  ! {error}")?;
        }

        if let Some(rows) = &self.invalid_rows {
            if !rows.is_empty() {
                writeln!(f, "Invalid rows:")?;
                for row in rows {
                    let line = row
                        .line
                        .map(|l| l.to_string())
                        .unwrap_or_else(|| "?".to_string());
                    writeln!(
                        f,
                        "  row {line} ({}): {}",
                        row.source.as_deref().unwrap_or("<no source>"),
                        row.reason
                    )?;
                }
            }
        }

        if let Some(diff) = &self.diff {
            writeln!(f, "Added:")?;
            for rule in &diff.added {
                write_rule(f, "+", rule)?;
            }
            writeln!(f, "Removed:")?;
            for rule in &diff.removed {
                write_rule(f, "-", rule)?;
            }
        } else if let Some(rules) = &self.remote_rules {
            writeln!(f, "Remote rules:")?;
            for rule in rules {
                write_rule(f, " ", rule)?;
            }
        } else if let (Command::List, Some(rules)) = (self.command, &self.valid_rules) {
            writeln!(f, "Rules:")?;
            for rule in rules {
                write_rule(f, " ", rule)?;
            }
        }

        if let Some(publish) = &self.publish {
            writeln!(f, "Publish {}:", publish.outcome)?;
            for batch in &publish.batches {
                let status = if batch.success { "ok" } else { "failed" };
                writeln!(
                    f,
                    "  batch {} ({} rules): {status}",
                    batch.index, batch.size
                )?;
                for rule in &batch.invalid_rules {
                    write_rule(f, "x", rule)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::BatchResult;

    fn publish_report(outcome: PublishOutcome, batches: Vec<BatchResult>) -> PublishReport {
        PublishReport {
            outcome,
            total_rules: batches.iter().map(|b| b.size).sum(),
            batches,
            skipped_batches: 0,
            truncate_error: None,
            description_set: true,
            messages: vec![],
        }
    }

    #[test]
    fn merged_failing_status_fails_report() {
        let mut report = Report::new(Command::Status);
        report.merge_status("spreadsheet", StatusReport::ok("reachable"));
        assert!(report.success);
        report.merge_status("bulk list", StatusReport::failed("401 Unauthorized"));
        assert!(!report.success);
        assert_eq!(report.errors, vec!["bulk list: 401 Unauthorized"]);
        assert_eq!(report.messages, vec!["spreadsheet: reachable"]);
    }

    #[test]
    fn deleted_rows_alone_keep_report_successful() {
        let mut report = Report::new(Command::List);
        report.with_rows(ProcessedRows {
            deleted: 3,
            ..ProcessedRows::default()
        });
        assert!(report.success);
        assert_eq!(report.invalid_rows, Some(vec![]));
    }

    #[test]
    fn partial_publish_is_reported_as_failure_with_batch_errors() {
        let mut report = Report::new(Command::Publish);
        report.with_publish(publish_report(
            PublishOutcome::PartiallySucceeded,
            vec![
                BatchResult {
                    index: 1,
                    size: 1000,
                    success: true,
                    ..BatchResult::default()
                },
                BatchResult {
                    index: 2,
                    size: 10,
                    errors: vec!["rate limited".into()],
                    ..BatchResult::default()
                },
            ],
        ));
        assert!(!report.success);
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("partially succeeded")));
        assert!(report.errors.contains(&"batch 2: rate limited".to_string()));
        assert!(report.to_string().contains("batch 2 (10 rules): failed"));
    }

    #[test]
    fn json_omits_empty_sections() {
        let report = Report::new(Command::Status);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["command"], "status");
        assert!(json.get("diff").is_none());
        assert!(json.get("publish").is_none());
    }
}
