//! Batch publisher: replaces the remote bulk list with a new rule set.
//!
//! A publish run walks a fixed sequence of states:
//!
//! ```text
//! Truncating → Uploading(i of N) → AwaitingConfirmation(i)? → … → Done | Failed
//! ```
//!
//! - The list is truncated first. If that fails nothing is uploaded, since uploading
//!   into a non-empty list would merge with stale rules.
//! - Rules are uploaded in order, in batches of at most [`MAX_BATCH_SIZE`], strictly
//!   one at a time to stay within the remote rate limit.
//! - A batch the remote accepts asynchronously is only final once its bulk operation
//!   has been polled to a terminal state, within [`PollPolicy`] bounds.
//! - A failed batch is recorded. Whether later batches still run is decided by
//!   [`BatchFailurePolicy`].
//! - Setting the list description afterwards is best effort.
//!
//! Nothing here retries. The only repeated call is the status poll of a pending
//! bulk operation.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::contract::{BulkListClient, BulkOperationStatus, RuleEntry};

/// Largest batch the remote accepts in a single request.
pub const MAX_BATCH_SIZE: usize = 1000;

/// What to do with the remaining batches after one fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchFailurePolicy {
    /// Keep uploading; the list ends up partially published.
    #[default]
    Continue,
    /// Skip every later batch.
    Stop,
}

/// Upper bound on waiting for an asynchronous bulk operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy {
            max_attempts: 30,
            interval: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    pub batch_size: usize,
    pub on_batch_failure: BatchFailurePolicy,
    pub poll: PollPolicy,
    pub description_prefix: String,
}

impl Default for PublishOptions {
    fn default() -> Self {
        PublishOptions {
            batch_size: MAX_BATCH_SIZE,
            on_batch_failure: BatchFailurePolicy::default(),
            poll: PollPolicy::default(),
            description_prefix: crate::config::DEFAULT_DESCRIPTION_PREFIX.to_string(),
        }
    }
}

/// Where a publish run currently is; logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    Truncating,
    Uploading { batch: usize, of: usize },
    AwaitingConfirmation { batch: usize },
    Done,
    Failed,
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishState::Truncating => f.write_str("truncating"),
            PublishState::Uploading { batch, of } => write!(f, "uploading batch {batch} of {of}"),
            PublishState::AwaitingConfirmation { batch } => {
                write!(f, "awaiting confirmation of batch {batch}")
            }
            PublishState::Done => f.write_str("done"),
            PublishState::Failed => f.write_str("failed"),
        }
    }
}

fn enter(state: PublishState) {
    info!(%state, "[PUBLISH] State transition");
}

/// Outcome of one uploaded batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    /// 1-based position of the batch.
    pub index: usize,
    pub size: usize,
    pub success: bool,
    pub errors: Vec<String>,
    pub messages: Vec<String>,
    pub invalid_rules: Vec<RuleEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bulk_operation_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishOutcome {
    /// Every batch landed.
    Succeeded,
    /// Some batches landed, some did not.
    PartiallySucceeded,
    /// The list was truncated but no batch landed.
    Failed,
    /// Truncation failed; nothing was uploaded.
    Aborted,
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PublishOutcome::Succeeded => "succeeded",
            PublishOutcome::PartiallySucceeded => "partially succeeded",
            PublishOutcome::Failed => "failed",
            PublishOutcome::Aborted => "aborted before upload",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub outcome: PublishOutcome,
    pub total_rules: usize,
    pub batches: Vec<BatchResult>,
    /// Batches never attempted because of [`BatchFailurePolicy::Stop`].
    pub skipped_batches: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncate_error: Option<String>,
    pub description_set: bool,
    pub messages: Vec<String>,
}

impl PublishReport {
    fn aborted(total_rules: usize, error: String) -> Self {
        PublishReport {
            outcome: PublishOutcome::Aborted,
            total_rules,
            batches: Vec::new(),
            skipped_batches: 0,
            truncate_error: Some(error),
            description_set: false,
            messages: Vec::new(),
        }
    }

    pub fn succeeded_batches(&self) -> usize {
        self.batches.iter().filter(|b| b.success).count()
    }

    pub fn failed_batches(&self) -> usize {
        self.batches.len() - self.succeeded_batches()
    }

    pub fn invalid_rules(&self) -> impl Iterator<Item = &RuleEntry> {
        self.batches.iter().flat_map(|b| b.invalid_rules.iter())
    }
}

fn outcome_for(batches: &[BatchResult], skipped: usize) -> PublishOutcome {
    let succeeded = batches.iter().filter(|b| b.success).count();
    if succeeded == batches.len() && skipped == 0 {
        PublishOutcome::Succeeded
    } else if succeeded == 0 {
        PublishOutcome::Failed
    } else {
        PublishOutcome::PartiallySucceeded
    }
}

/// Poll a bulk operation until it reaches a terminal state or the policy runs out.
///
/// Returns `Err` with a human-readable reason on failure, error, or exhaustion.
pub async fn await_bulk_operation<C>(
    client: &C,
    operation_id: &str,
    policy: &PollPolicy,
) -> Result<(), String>
where
    C: BulkListClient + ?Sized,
{
    for attempt in 1..=policy.max_attempts {
        match client
            .get_bulk_operation_status(operation_id.to_string())
            .await
        {
            Ok(BulkOperationStatus::Completed) => {
                info!(operation_id, attempt, "[PUBLISH] Bulk operation completed");
                return Ok(());
            }
            Ok(BulkOperationStatus::Failed(reason)) => {
                error!(operation_id, attempt, %reason, "[PUBLISH] Bulk operation failed");
                return Err(format!("bulk operation {operation_id} failed: {reason}"));
            }
            Ok(status) => {
                info!(
                    operation_id,
                    attempt,
                    ?status,
                    "[PUBLISH] Bulk operation still in progress"
                );
            }
            Err(e) => {
                error!(
                    operation_id,
                    attempt,
                    error = %e,
                    "[PUBLISH] Polling bulk operation failed"
                );
                return Err(format!(
                    "could not read status of bulk operation {operation_id}: {e}"
                ));
            }
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    warn!(
        operation_id,
        attempts = policy.max_attempts,
        "[PUBLISH] Gave up waiting for bulk operation"
    );
    Err(format!(
        "bulk operation {operation_id} did not complete after {} status checks",
        policy.max_attempts
    ))
}

async fn upload_batch<C>(
    client: &C,
    index: usize,
    batch: &[RuleEntry],
    policy: &PollPolicy,
) -> BatchResult
where
    C: BulkListClient + ?Sized,
{
    let mut result = BatchResult {
        index,
        size: batch.len(),
        ..BatchResult::default()
    };

    let response = match client.upload_items(batch.to_vec()).await {
        Ok(response) => response,
        Err(e) => {
            error!(batch = index, error = %e, "[PUBLISH][ERROR] Upload request failed");
            result.errors.push(format!("upload of batch {index} failed: {e}"));
            return result;
        }
    };

    result.errors = response.errors;
    result.messages = response.messages;
    result.invalid_rules = response.invalid_rules;
    result.bulk_operation_id = response.bulk_operation_id;

    if !result.invalid_rules.is_empty() {
        warn!(
            batch = index,
            invalid = result.invalid_rules.len(),
            "[PUBLISH] Remote rejected some rules in batch"
        );
    }

    if !response.success {
        error!(
            batch = index,
            errors = ?result.errors,
            "[PUBLISH][ERROR] Remote reported batch failure"
        );
        return result;
    }

    match result.bulk_operation_id.clone() {
        Some(operation_id) => {
            enter(PublishState::AwaitingConfirmation { batch: index });
            match await_bulk_operation(client, &operation_id, policy).await {
                Ok(()) => result.success = true,
                Err(reason) => result.errors.push(reason),
            }
        }
        None => result.success = true,
    }
    result
}

/// Replace the remote list with `rules`.
///
/// Never returns an error: every failure is captured in the returned report, whose
/// [`PublishOutcome`] separates full success, partial success and an aborted run.
pub async fn publish<C>(client: &C, rules: &[RuleEntry], options: &PublishOptions) -> PublishReport
where
    C: BulkListClient + ?Sized,
{
    let batch_size = options.batch_size.clamp(1, MAX_BATCH_SIZE);
    info!(
        rules = rules.len(),
        batch_size,
        policy = ?options.on_batch_failure,
        "[PUBLISH] Starting publish run"
    );

    enter(PublishState::Truncating);
    let truncated = match client.empty_list().await {
        Ok(Some(operation_id)) => await_bulk_operation(client, &operation_id, &options.poll).await,
        Ok(None) => Ok(()),
        Err(e) => Err(format!("could not empty the list: {e}")),
    };
    if let Err(reason) = truncated {
        error!(%reason, "[PUBLISH][ERROR] Truncate failed, aborting before upload");
        enter(PublishState::Failed);
        return PublishReport::aborted(rules.len(), reason);
    }
    info!("[PUBLISH] Emptied list before upload");

    let batches: Vec<&[RuleEntry]> = rules.chunks(batch_size).collect();
    let total = batches.len();
    let mut results: Vec<BatchResult> = Vec::with_capacity(total);
    let mut skipped = 0;

    for (position, batch) in batches.iter().enumerate() {
        let index = position + 1;
        enter(PublishState::Uploading {
            batch: index,
            of: total,
        });
        let result = upload_batch(client, index, batch, &options.poll).await;
        let failed = !result.success;
        results.push(result);

        if failed && options.on_batch_failure == BatchFailurePolicy::Stop {
            skipped = total - index;
            warn!(batch = index, skipped, "[PUBLISH] Stopping after failed batch");
            break;
        }
    }

    let mut messages = Vec::new();
    if skipped > 0 {
        messages.push(format!("{skipped} batch(es) skipped after a failed batch"));
    }

    let description = format!(
        "{} {} ({} rules)",
        options.description_prefix,
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        rules.len()
    );
    let description_set = match client.set_description(description).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "[PUBLISH] Could not update list description");
            messages.push(format!("list description not updated: {e}"));
            false
        }
    };

    let outcome = outcome_for(&results, skipped);
    enter(if outcome == PublishOutcome::Succeeded {
        PublishState::Done
    } else {
        PublishState::Failed
    });
    info!(
        %outcome,
        batches = results.len(),
        skipped,
        "[PUBLISH] Publish run finished"
    );

    PublishReport {
        outcome,
        total_rules: rules.len(),
        batches: results,
        skipped_batches: skipped,
        truncate_error: None,
        description_set,
        messages,
    }
}
