#![doc = "Bulk list integration: implements the core `BulkListClient` trait against the Cloudflare Lists API."]
//
//! # Cloudflare bulk redirect list client
//!
//! This module provides the bridge between the core publisher and a real Cloudflare
//! account. [`CloudflareClient`] wraps every endpoint the core needs:
//!
//! - list details (status check) and description updates,
//! - list items, following `result_info.cursors.after` until every page is read,
//! - truncate (`PUT` an empty item array) and batch upload (`POST`),
//! - bulk operation status, for the asynchronous truncate and upload calls.
//!
//! The client makes no decisions. The one exception: Cloudflare rejects a whole
//! submission when a `source_url` repeats, so repeats within one batch are stripped
//! before sending and returned as `invalid_rules`.
//!
//! Construct the client with [`CloudflareClient::new_from_env`]; it reads the API
//! token from `CLOUDFLARE_API_TOKEN`.

use async_trait::async_trait;
use bulk_redirects_core::contract::{
    BulkListClient, BulkOperationStatus, ClientError, ListItem, RuleEntry, UploadResponse,
};
use bulk_redirects_core::report::StatusReport;
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::fmt;

use crate::load_config::CloudflareSection;

pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4/";

/// A message or error entry; Cloudflare sends either objects or bare strings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
enum ApiMessage {
    Detail {
        #[serde(default)]
        code: Option<i64>,
        message: String,
    },
    Text(String),
}

impl fmt::Display for ApiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiMessage::Detail {
                code: Some(code),
                message,
            } => write!(f, "{message} (code {code})"),
            ApiMessage::Detail { code: None, message } => f.write_str(message),
            ApiMessage::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Cursors {
    #[serde(default)]
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    cursors: Option<Cursors>,
}

/// Standard Cloudflare response wrapper.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    #[serde(default)]
    messages: Vec<ApiMessage>,
    result: Option<T>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

impl<T> Envelope<T> {
    fn error_text(&self) -> String {
        if self.errors.is_empty() {
            "request unsuccessful".to_string()
        } else {
            self.errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ")
        }
    }

    fn next_cursor(&self) -> Option<String> {
        self.result_info
            .as_ref()
            .and_then(|info| info.cursors.as_ref())
            .and_then(|cursors| cursors.after.clone())
    }
}

fn default_status_code() -> u16 {
    301
}

#[derive(Debug, Deserialize)]
struct WireRedirect {
    source_url: String,
    target_url: String,
    #[serde(default = "default_status_code")]
    status_code: u16,
}

#[derive(Debug, Deserialize)]
struct WireItem {
    redirect: Option<WireRedirect>,
}

#[derive(Debug, Deserialize)]
struct ListDetails {
    name: String,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    num_items: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OperationRef {
    operation_id: String,
}

#[derive(Debug, Deserialize)]
struct OperationState {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct DescriptionUpdate<'a> {
    description: &'a str,
}

fn operation_status(state: OperationState) -> BulkOperationStatus {
    match state.status.as_str() {
        "completed" => BulkOperationStatus::Completed,
        "failed" => BulkOperationStatus::Failed(
            state
                .error
                .unwrap_or_else(|| "no error detail given".to_string()),
        ),
        "running" => BulkOperationStatus::Running,
        _ => BulkOperationStatus::Pending,
    }
}

/// Split a batch into rules to send and rules whose `source_url` already appeared earlier.
fn split_repeated_sources(batch: Vec<RuleEntry>) -> (Vec<RuleEntry>, Vec<RuleEntry>) {
    let mut seen = HashSet::new();
    batch
        .into_iter()
        .partition(|rule| seen.insert(rule.source_url.clone()))
}

pub struct CloudflareClient {
    http: reqwest::Client,
    base_url: Url,
    account_id: String,
    list_id: String,
    token: String,
}

impl CloudflareClient {
    pub fn new(
        base_url: &str,
        account_id: impl Into<String>,
        list_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Ok(CloudflareClient {
            http: reqwest::Client::new(),
            base_url: Url::parse(base_url)?,
            account_id: account_id.into(),
            list_id: list_id.into(),
            token: token.into(),
        })
    }

    pub fn new_from_env(section: &CloudflareSection) -> Result<Self, ClientError> {
        let token = env::var("CLOUDFLARE_API_TOKEN").map_err(|e| {
            tracing::error!(error = ?e, "CLOUDFLARE_API_TOKEN missing in environment");
            format!("CLOUDFLARE_API_TOKEN: {e}")
        })?;
        tracing::info!(
            account_id = %section.account_id,
            list_id = %section.list_id,
            token_set = !token.is_empty(),
            "Initialized CloudflareClient from environment"
        );
        Self::new(
            CLOUDFLARE_API_BASE,
            section.account_id.clone(),
            section.list_id.clone(),
            token,
        )
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| "Cloudflare base URL cannot have path segments")?
            .pop_if_empty()
            .extend(["accounts", self.account_id.as_str(), "rules", "lists"])
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ClientError> {
        Ok(self
            .http
            .request(method, self.url(segments)?)
            .bearer_auth(&self.token))
    }

    /// Send a request and decode the envelope, whatever the HTTP status.
    async fn call<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Envelope<T>, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        match serde_json::from_str::<Envelope<T>>(&body) {
            Ok(mut envelope) => {
                if !status.is_success() {
                    envelope.success = false;
                }
                Ok(envelope)
            }
            Err(e) => {
                tracing::error!(%status, error = %e, "Unreadable Cloudflare response");
                Err(format!("HTTP {status}: unreadable response body: {e}").into())
            }
        }
    }

    /// Like [`Self::call`], but an unsuccessful envelope becomes an error.
    async fn call_ok<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>, ClientError> {
        let envelope = self.call::<T>(request).await?;
        if envelope.success {
            Ok(envelope.result)
        } else {
            Err(envelope.error_text().into())
        }
    }
}

#[async_trait]
impl BulkListClient for CloudflareClient {
    async fn check_status(&self) -> StatusReport {
        tracing::info!(list_id = %self.list_id, "Checking bulk list status");
        let request = match self.request(Method::GET, &[self.list_id.as_str()]) {
            Ok(request) => request,
            Err(e) => return StatusReport::failed(e.to_string()),
        };
        match self.call::<ListDetails>(request).await {
            Ok(envelope) if envelope.success => {
                let mut report = StatusReport {
                    success: true,
                    errors: Vec::new(),
                    messages: envelope.messages.iter().map(|m| m.to_string()).collect(),
                };
                match envelope.result {
                    Some(list) => {
                        report.messages.push(format!(
                            "list {:?} ({}) holds {} item(s)",
                            list.name,
                            list.kind.as_deref().unwrap_or("unknown kind"),
                            list.num_items.unwrap_or(0)
                        ));
                        if list.kind.as_deref().is_some_and(|kind| kind != "redirect") {
                            report.success = false;
                            report.errors.push("list is not a redirect list".to_string());
                        }
                    }
                    None => report.messages.push("list is reachable".to_string()),
                }
                report
            }
            Ok(envelope) => StatusReport::failed(envelope.error_text()),
            Err(e) => {
                tracing::error!(error = %e, "Bulk list status check failed");
                StatusReport::failed(format!("bulk list is not reachable: {e}"))
            }
        }
    }

    async fn list_items(&self) -> Result<Vec<RuleEntry>, ClientError> {
        let mut rules = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let mut request = self.request(Method::GET, &[self.list_id.as_str(), "items"])?;
            if let Some(after) = &cursor {
                request = request.query(&[("cursor", after.as_str())]);
            }
            let envelope = self.call::<Vec<WireItem>>(request).await?;
            if !envelope.success {
                tracing::error!(
                    page = pages + 1,
                    errors = %envelope.error_text(),
                    "Failed to read list items"
                );
                return Err(envelope.error_text().into());
            }
            pages += 1;
            cursor = envelope.next_cursor();
            rules.extend(
                envelope
                    .result
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|item| item.redirect)
                    .map(|r| RuleEntry {
                        source_url: r.source_url,
                        target_url: r.target_url,
                        status_code: r.status_code,
                    }),
            );
            if cursor.is_none() {
                break;
            }
        }

        tracing::info!(count = rules.len(), pages, "Fetched all rules in bulk list");
        Ok(rules)
    }

    async fn empty_list(&self) -> Result<Option<String>, ClientError> {
        tracing::info!(list_id = %self.list_id, "Emptying bulk list");
        let request = self
            .request(Method::PUT, &[self.list_id.as_str(), "items"])?
            .json(&Vec::<ListItem>::new());
        let operation = self.call_ok::<OperationRef>(request).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to empty bulk list");
            e
        })?;
        Ok(operation.map(|op| op.operation_id))
    }

    async fn upload_items(&self, batch: Vec<RuleEntry>) -> Result<UploadResponse, ClientError> {
        let (unique, repeated) = split_repeated_sources(batch);
        if !repeated.is_empty() {
            tracing::warn!(
                repeated = repeated.len(),
                "Dropping rules whose source_url repeats within the batch"
            );
        }
        tracing::info!(count = unique.len(), "Uploading batch to bulk list");

        let items: Vec<ListItem> = unique.into_iter().map(ListItem::from).collect();
        let request = self
            .request(Method::POST, &[self.list_id.as_str(), "items"])?
            .json(&items);
        let envelope = self.call::<OperationRef>(request).await?;

        let response = UploadResponse {
            success: envelope.success,
            errors: envelope.errors.iter().map(|e| e.to_string()).collect(),
            messages: envelope.messages.iter().map(|m| m.to_string()).collect(),
            invalid_rules: repeated,
            bulk_operation_id: envelope.result.map(|op| op.operation_id),
        };
        if response.success {
            tracing::info!(operation_id = ?response.bulk_operation_id, "Batch accepted");
        } else {
            tracing::error!(errors = ?response.errors, "Batch rejected by bulk list");
        }
        Ok(response)
    }

    async fn get_bulk_operation_status(
        &self,
        operation_id: String,
    ) -> Result<BulkOperationStatus, ClientError> {
        let request =
            self.request(Method::GET, &["bulk_operations", operation_id.as_str()])?;
        let state = self
            .call_ok::<OperationState>(request)
            .await?
            .ok_or("bulk operation response carried no result")?;
        let status = operation_status(state);
        tracing::debug!(%operation_id, ?status, "Fetched bulk operation status");
        Ok(status)
    }

    async fn set_description(&self, description: String) -> Result<(), ClientError> {
        tracing::info!(%description, "Updating bulk list description");
        let request = self
            .request(Method::PUT, &[self.list_id.as_str()])?
            .json(&DescriptionUpdate {
                description: &description,
            });
        self.call_ok::<serde_json::Value>(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(source: &str, target: &str) -> RuleEntry {
        RuleEntry {
            source_url: source.into(),
            target_url: target.into(),
            status_code: 301,
        }
    }

    #[test]
    fn repeated_sources_are_split_off_keeping_first() {
        let (unique, repeated) = split_repeated_sources(vec![
            rule("https://x.test/a", "https://x.test/1"),
            rule("https://x.test/b", "https://x.test/2"),
            rule("https://x.test/a", "https://x.test/3"),
        ]);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].target_url, "https://x.test/1");
        assert_eq!(repeated, vec![rule("https://x.test/a", "https://x.test/3")]);
    }

    #[test]
    fn envelope_decodes_items_and_cursor() {
        let envelope: Envelope<Vec<WireItem>> = serde_json::from_str(
            r#"{
                "success": true,
                "errors": [],
                "messages": [],
                "result": [
                    {"id": "1", "redirect": {"source_url": "example.com/a", "target_url": "https://example.com/b", "status_code": 308, "preserve_query_string": false}},
                    {"id": "2", "redirect": {"source_url": "example.com/c", "target_url": "https://example.com/d"}}
                ],
                "result_info": {"cursors": {"after": "abc"}}
            }"#,
        )
        .unwrap();
        assert_eq!(envelope.next_cursor().as_deref(), Some("abc"));
        let items = envelope.result.unwrap();
        assert_eq!(items[0].redirect.as_ref().unwrap().status_code, 308);
        assert_eq!(items[1].redirect.as_ref().unwrap().status_code, 301);
    }

    #[test]
    fn error_text_joins_api_errors() {
        let envelope: Envelope<OperationRef> = serde_json::from_str(
            r#"{"success": false, "errors": [{"code": 10000, "message": "Authentication error"}, "second"], "messages": [], "result": null}"#,
        )
        .unwrap();
        assert_eq!(
            envelope.error_text(),
            "Authentication error (code 10000); second"
        );
    }

    #[test]
    fn operation_states_map_to_core_status() {
        let state = |status: &str, error: Option<&str>| OperationState {
            status: status.to_string(),
            error: error.map(str::to_string),
        };
        assert_eq!(operation_status(state("pending", None)), BulkOperationStatus::Pending);
        assert_eq!(operation_status(state("running", None)), BulkOperationStatus::Running);
        assert_eq!(
            operation_status(state("completed", None)),
            BulkOperationStatus::Completed
        );
        assert_eq!(
            operation_status(state("failed", Some("duplicate"))),
            BulkOperationStatus::Failed("duplicate".into())
        );
    }

    #[test]
    fn urls_are_scoped_to_account_lists() {
        let client = CloudflareClient::new(CLOUDFLARE_API_BASE, "acct", "list", "t").unwrap();
        let url = client.url(&["list", "items"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.cloudflare.com/client/v4/accounts/acct/rules/lists/list/items"
        );
        let ops = client.url(&["bulk_operations", "op-1"]).unwrap();
        assert!(ops.as_str().ends_with("/rules/lists/bulk_operations/op-1"));
    }
}
