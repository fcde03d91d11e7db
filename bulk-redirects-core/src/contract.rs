//! # contract: interfaces to the spreadsheet and the remote bulk redirect list
//!
//! This module defines the two collaborator traits the pipeline talks to, plus the
//! plain data types that cross them:
//!
//! - [`RedirectSource`]: where the human-edited redirect rows come from (a spreadsheet).
//! - [`BulkListClient`]: the CDN's bulk redirect list (read, truncate, upload, poll).
//!
//! Both traits are async and annotated for `mockall`, so the orchestration and
//! publishing logic can be tested without network access. Concrete HTTP clients live
//! in the binary crate.
//!
//! ## Errors
//! Implementors convert every transport or API failure into a boxed [`ClientError`].
//! Decisions about whether a failure is fatal are made by the caller, never here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use mockall::automock;

use crate::process::RawRow;
use crate::report::StatusReport;

/// Error crossing a collaborator seam.
pub type ClientError = Box<dyn std::error::Error + Send + Sync>;

/// One redirect rule as it exists on the remote list.
///
/// Identity is the `(source_url, target_url, status_code)` tuple; see [`crate::matcher`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleEntry {
    pub source_url: String,
    pub target_url: String,
    pub status_code: u16,
}

/// Upload wrapper expected by the remote list: `{ "redirect": { ... } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub redirect: RuleEntry,
}

impl From<RuleEntry> for ListItem {
    fn from(redirect: RuleEntry) -> Self {
        ListItem { redirect }
    }
}

/// Response to a single batch submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadResponse {
    pub success: bool,
    pub errors: Vec<String>,
    pub messages: Vec<String>,
    /// Rules the remote refused, typically repeats within the same submission.
    pub invalid_rules: Vec<RuleEntry>,
    /// Present when the remote accepted the batch asynchronously.
    pub bulk_operation_id: Option<String>,
}

/// State of an asynchronous bulk operation on the remote list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkOperationStatus {
    Pending,
    Running,
    Completed,
    Failed(String),
}

impl BulkOperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BulkOperationStatus::Completed | BulkOperationStatus::Failed(_)
        )
    }
}

/// Source of raw redirect rows (the spreadsheet).
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RedirectSource: Send + Sync {
    /// Fetch every data row, loosely typed, in sheet order.
    async fn fetch_redirect_rows(&self) -> Result<Vec<RawRow>, ClientError>;

    /// Cheap reachability/permission check of the sheet.
    async fn check_status(&self) -> StatusReport;
}

/// The remote bulk redirect list.
///
/// Implementors are responsible for authentication, pagination and wire formats;
/// the trait itself only speaks in [`RuleEntry`] values.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait BulkListClient: Send + Sync {
    /// Reachability/permission check of the list.
    async fn check_status(&self) -> StatusReport;

    /// All rules currently on the list, across every page, unwrapped.
    async fn list_items(&self) -> Result<Vec<RuleEntry>, ClientError>;

    /// Remove every rule from the list.
    ///
    /// Returns the bulk operation id when the remote processes the truncate asynchronously.
    async fn empty_list(&self) -> Result<Option<String>, ClientError>;

    /// Submit one batch of rules. Callers keep batches within the remote's request limit.
    async fn upload_items(&self, batch: Vec<RuleEntry>) -> Result<UploadResponse, ClientError>;

    /// Look up the current state of an asynchronous bulk operation.
    async fn get_bulk_operation_status(
        &self,
        operation_id: String,
    ) -> Result<BulkOperationStatus, ClientError>;

    /// Replace the list's human-readable description.
    async fn set_description(&self, description: String) -> Result<(), ClientError>;
}
