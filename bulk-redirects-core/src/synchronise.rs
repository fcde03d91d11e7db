//! High-level pipeline: spreadsheet → rules → {diff | publish} → report.
//!
//! Each public function backs one CLI command and returns a [`Report`]. They never
//! return an error: failures from either collaborator end up in the report's error
//! list, and the report's `success` flag tells the caller whether the run was clean.
//!
//! # Commands
//! - [`status`]: health of the spreadsheet and the bulk list.
//! - [`list`]: the rules the spreadsheet currently produces (or the remote list's rules).
//! - [`diff`]: what a publish would add and remove.
//! - [`publish`]: replace the remote list with the spreadsheet's rules.
//!
//! # Failure handling
//! If the spreadsheet cannot be read, [`publish`] stops before touching the remote
//! list. Everything after that point is delegated to [`crate::publish`].

use tracing::{error, info};

use crate::config::{ExpansionConfig, SyncConfig};
use crate::contract::{BulkListClient, ClientError, RedirectSource};
use crate::process::{process_rows, ProcessedRows};
use crate::publish::PublishOptions;
use crate::reconcile;
use crate::report::{Command, Report};

/// Fetch every row from the source and run it through validation and expansion.
pub async fn load_rules<S>(
    source: &S,
    expansion: &ExpansionConfig,
) -> Result<ProcessedRows, ClientError>
where
    S: RedirectSource + ?Sized,
{
    info!("[SYNC] Fetching redirect rows from spreadsheet");
    let rows = source.fetch_redirect_rows().await.map_err(|e| {
        error!(error = %e, "[SYNC][ERROR] Fetching spreadsheet rows failed");
        e
    })?;
    info!(rows = rows.len(), "[SYNC] Fetched spreadsheet rows");
    Ok(process_rows(&rows, expansion))
}

pub async fn status<S, L>(source: &S, list: &L) -> Report
where
    S: RedirectSource + ?Sized,
    L: BulkListClient + ?Sized,
{
    info!("[SYNC] Checking spreadsheet and bulk list status");
    let mut report = Report::new(Command::Status);
    report.merge_status("spreadsheet", source.check_status().await);
    report.merge_status("bulk list", list.check_status().await);
    report
}

/// List the spreadsheet's rules, or the remote list's rules when `remote` is set.
pub async fn list<S, L>(source: &S, list: &L, config: &SyncConfig, remote: bool) -> Report
where
    S: RedirectSource + ?Sized,
    L: BulkListClient + ?Sized,
{
    let mut report = Report::new(Command::List);

    if remote {
        info!("[SYNC] Listing remote bulk list contents");
        match list.list_items().await {
            Ok(rules) => {
                report.message(format!("bulk list: {} rule(s)", rules.len()));
                report.remote_rules = Some(rules);
            }
            Err(e) => {
                error!(error = %e, "[SYNC][ERROR] Reading bulk list failed");
                report.error(format!("bulk list: could not read rules: {e}"));
            }
        }
        return report;
    }

    match load_rules(source, &config.expansion).await {
        Ok(rows) => report.with_rows(rows),
        Err(e) => report.error(format!("spreadsheet: could not fetch rows: {e}")),
    }
    report
}

pub async fn diff<S, L>(source: &S, list: &L, config: &SyncConfig) -> Report
where
    S: RedirectSource + ?Sized,
    L: BulkListClient + ?Sized,
{
    let mut report = Report::new(Command::Diff);

    let rows = match load_rules(source, &config.expansion).await {
        Ok(rows) => rows,
        Err(e) => {
            report.error(format!("spreadsheet: could not fetch rows: {e}"));
            return report;
        }
    };

    info!("[SYNC] Reading current bulk list for diff");
    let current = match list.list_items().await {
        Ok(current) => current,
        Err(e) => {
            error!(error = %e, "[SYNC][ERROR] Reading bulk list failed");
            report.error(format!("bulk list: could not read rules: {e}"));
            report.with_rows(rows);
            return report;
        }
    };

    let changes = reconcile::diff(&rows.rules, &current);
    info!(
        added = changes.added.len(),
        removed = changes.removed.len(),
        "[SYNC] Computed diff"
    );
    report.with_rows(rows);
    report.with_diff(changes);
    report
}

pub async fn publish<S, L>(
    source: &S,
    list: &L,
    config: &SyncConfig,
    options: &PublishOptions,
) -> Report
where
    S: RedirectSource + ?Sized,
    L: BulkListClient + ?Sized,
{
    let mut report = Report::new(Command::Publish);

    let rows = match load_rules(source, &config.expansion).await {
        Ok(rows) => rows,
        Err(e) => {
            report.error(format!(
                "spreadsheet: could not fetch rows, bulk list left untouched: {e}"
            ));
            return report;
        }
    };

    let published = crate::publish::publish(list, &rows.rules, options).await;
    report.with_rows(rows);
    report.with_publish(published);
    report
}
