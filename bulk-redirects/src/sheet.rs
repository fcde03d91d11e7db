//! Google Sheets implementation of [`RedirectSource`].
//!
//! Rows are read with `valueRenderOption=UNFORMATTED_VALUE`, so checkboxes arrive as
//! JSON booleans and status codes as numbers. Anything the sheet's users typed by hand
//! arrives as text. The first row is the header; columns are matched by name, in
//! any order and case.

use async_trait::async_trait;
use bulk_redirects_core::contract::{ClientError, RedirectSource};
use bulk_redirects_core::process::RawRow;
use bulk_redirects_core::report::StatusReport;
use bulk_redirects_core::validate::Cell;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::env;

use crate::load_config::SheetSection;

pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/";

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    properties: SpreadsheetProperties,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetProperties {
    title: String,
}

/// Column positions of the five redirect fields within a header row.
#[derive(Debug, Default, PartialEq, Eq)]
struct Columns {
    source: usize,
    destination: usize,
    code: Option<usize>,
    localized: Option<usize>,
    deleted: Option<usize>,
}

fn find_column(header: &[Value], names: &[&str]) -> Option<usize> {
    header.iter().position(|cell| {
        cell.as_str()
            .map(|name| {
                let name = name.trim().to_ascii_lowercase();
                names.iter().any(|candidate| *candidate == name)
            })
            .unwrap_or(false)
    })
}

fn columns(header: &[Value]) -> Result<Columns, ClientError> {
    let source = find_column(header, &["source", "from"])
        .ok_or("spreadsheet header has no 'source' column")?;
    let destination = find_column(header, &["destination", "target", "to"])
        .ok_or("spreadsheet header has no 'destination' column")?;
    Ok(Columns {
        source,
        destination,
        code: find_column(header, &["code", "status", "status code"]),
        localized: find_column(header, &["localized", "localised"]),
        deleted: find_column(header, &["deleted", "delete"]),
    })
}

fn cell(value: &Value) -> Option<Cell> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(Cell::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Cell::Int(i)),
            None => n.as_f64().map(Cell::Float),
        },
        Value::String(s) => Some(Cell::Text(s.clone())),
        other => Some(Cell::Text(other.to_string())),
    }
}

fn at(row: &[Value], index: Option<usize>) -> Option<Cell> {
    index.and_then(|i| row.get(i)).and_then(cell)
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Convert a sheet's value grid into raw rows, skipping blank rows.
///
/// A row is blank when both its source and destination cells are empty. Checkbox
/// columns send `false` for every row, so the other cells are not considered.
/// Line numbers are 1-based sheet rows, so the first data row is line 2.
fn rows_from_values(values: &[Vec<Value>]) -> Result<Vec<RawRow>, ClientError> {
    let Some((header, data)) = values.split_first() else {
        return Ok(Vec::new());
    };
    let columns = columns(header)?;

    Ok(data
        .iter()
        .enumerate()
        .filter(|(_, row)| {
            !(is_blank(row.get(columns.source)) && is_blank(row.get(columns.destination)))
        })
        .map(|(offset, row)| RawRow {
            line: Some(offset + 2),
            source: at(row, Some(columns.source)),
            destination: at(row, Some(columns.destination)),
            code: at(row, columns.code),
            localized: at(row, columns.localized),
            deleted: at(row, columns.deleted),
        })
        .collect())
}

pub struct SheetClient {
    http: reqwest::Client,
    base_url: Url,
    spreadsheet_id: String,
    range: String,
    api_key: String,
}

impl SheetClient {
    pub fn new(
        base_url: &str,
        spreadsheet_id: impl Into<String>,
        range: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Ok(SheetClient {
            http: reqwest::Client::new(),
            base_url: Url::parse(base_url)?,
            spreadsheet_id: spreadsheet_id.into(),
            range: range.into(),
            api_key: api_key.into(),
        })
    }

    /// Reads `GOOGLE_API_KEY` from the environment.
    pub fn new_from_env(section: &SheetSection) -> Result<Self, ClientError> {
        let api_key = env::var("GOOGLE_API_KEY").map_err(|e| {
            tracing::error!(error = ?e, "GOOGLE_API_KEY missing in environment");
            format!("GOOGLE_API_KEY: {e}")
        })?;
        tracing::info!(
            spreadsheet_id = %section.spreadsheet_id,
            range = %section.range,
            "Initialized SheetClient from environment"
        );
        Self::new(
            SHEETS_API_BASE,
            section.spreadsheet_id.clone(),
            section.range.clone(),
            api_key,
        )
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.join("spreadsheets")?;
        url.path_segments_mut()
            .map_err(|_| "sheets base URL cannot have path segments")?
            .push(&self.spreadsheet_id)
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl RedirectSource for SheetClient {
    async fn fetch_redirect_rows(&self) -> Result<Vec<RawRow>, ClientError> {
        let url = self.url(&["values", self.range.as_str()])?;
        tracing::info!(range = %self.range, "Fetching redirect rows from spreadsheet");
        let body: ValueRange = self
            .http
            .get(url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("valueRenderOption", "UNFORMATTED_VALUE"),
                ("majorDimension", "ROWS"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let rows = rows_from_values(&body.values)?;
        tracing::info!(rows = rows.len(), "Fetched redirect rows");
        Ok(rows)
    }

    async fn check_status(&self) -> StatusReport {
        let url = match self.url(&[]) {
            Ok(url) => url,
            Err(e) => return StatusReport::failed(e.to_string()),
        };
        let response = self
            .http
            .get(url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("fields", "properties.title"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status());
        match response {
            Ok(r) => match r.json::<SpreadsheetMeta>().await {
                Ok(meta) => StatusReport::ok(format!(
                    "spreadsheet {:?} is reachable",
                    meta.properties.title
                )),
                Err(e) => StatusReport::failed(format!("unexpected spreadsheet metadata: {e}")),
            },
            Err(e) => {
                tracing::error!(error = %e, "Spreadsheet status check failed");
                StatusReport::failed(format!("spreadsheet is not reachable: {e}"))
            }
        }
    }
}
