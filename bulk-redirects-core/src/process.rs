//! Row processing: raw spreadsheet rows → validated redirects → rule entries.
//!
//! A row either becomes a [`RedirectRecord`] or is rejected with a
//! [`RejectionReason`]. Rows marked deleted are rejected too, but they are an
//! expected outcome and never counted as invalid.
//!
//! Accepted records are expanded into [`RuleEntry`] values: one base entry, plus one
//! entry per non-default locale when the record is localized.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::config::ExpansionConfig;
use crate::contract::RuleEntry;
use crate::validate::{
    is_absolute_url, validate_boolean, validate_code, validate_path, Cell, RedirectCode,
    ValidationError,
};

/// Status code used when a row leaves the code column empty.
pub const DEFAULT_CODE: RedirectCode = RedirectCode::MovedPermanently;

/// One spreadsheet row as fetched, before any validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    /// Sheet row number, when the source knows it.
    #[serde(default)]
    pub line: Option<usize>,
    #[serde(default)]
    pub source: Option<Cell>,
    #[serde(default)]
    pub destination: Option<Cell>,
    #[serde(default)]
    pub code: Option<Cell>,
    #[serde(default)]
    pub localized: Option<Cell>,
    #[serde(default)]
    pub deleted: Option<Cell>,
}

/// A validated redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectRecord {
    pub source: String,
    pub destination: String,
    pub code: RedirectCode,
    pub localized: bool,
    pub deleted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Source,
    Destination,
    Code,
    Localized,
    Deleted,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Source => "source",
            Field::Destination => "destination",
            Field::Code => "code",
            Field::Localized => "localized",
            Field::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// Why a row did not become a [`RedirectRecord`].
#[derive(Debug, Clone, PartialEq)]
pub enum RejectionReason {
    Malformed {
        field: Field,
        error: ValidationError,
    },
    SelfRedirect,
    MarkedDeleted,
}

impl RejectionReason {
    /// Whether the rejection belongs in invalid-row reports.
    pub fn is_invalid(&self) -> bool {
        !matches!(self, RejectionReason::MarkedDeleted)
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::Malformed { field, error } => write!(f, "invalid {field}: {error}"),
            RejectionReason::SelfRedirect => f.write_str("source and destination are identical"),
            RejectionReason::MarkedDeleted => f.write_str("marked deleted"),
        }
    }
}

/// A rejected row kept for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidRow {
    pub line: Option<usize>,
    pub source: Option<String>,
    pub reason: String,
}

/// Result of processing a whole sheet.
#[derive(Debug, Clone, Default)]
pub struct ProcessedRows {
    pub records: Vec<RedirectRecord>,
    pub rules: Vec<RuleEntry>,
    pub invalid_rows: Vec<InvalidRow>,
    pub deleted: usize,
}

fn tag<T: Clone>(
    field: Field,
    result: &Result<T, ValidationError>,
) -> Result<T, (Field, ValidationError)> {
    result.clone().map_err(|error| (field, error))
}

/// Validate one row.
///
/// Source and destination are compared after resolution against `config`, so `/a`
/// and `{domain}/a` count as the same URL.
pub fn process_row(
    raw: &RawRow,
    config: &ExpansionConfig,
) -> Result<RedirectRecord, RejectionReason> {
    let source = validate_path(raw.source.as_ref());
    let destination = validate_path(raw.destination.as_ref());
    let code = validate_code(raw.code.as_ref(), DEFAULT_CODE);
    let localized = validate_boolean(raw.localized.as_ref(), false);
    let deleted = validate_boolean(raw.deleted.as_ref(), false);

    let checked = || -> Result<RedirectRecord, (Field, ValidationError)> {
        Ok(RedirectRecord {
            source: tag(Field::Source, &source)?,
            destination: tag(Field::Destination, &destination)?,
            code: tag(Field::Code, &code)?,
            localized: tag(Field::Localized, &localized)?,
            deleted: tag(Field::Deleted, &deleted)?,
        })
    };

    let record = match checked() {
        Ok(record) => record,
        Err((field, error)) => {
            warn!(
                line = ?raw.line,
                %field,
                %error,
                source = ?source.as_ref().ok(),
                destination = ?destination.as_ref().ok(),
                code = ?code.as_ref().ok(),
                localized = ?localized.as_ref().ok(),
                deleted = ?deleted.as_ref().ok(),
                "[PROCESS] Rejecting malformed row"
            );
            return Err(RejectionReason::Malformed { field, error });
        }
    };

    if resolve(config, &record.source) == resolve(config, &record.destination) {
        warn!(
            line = ?raw.line,
            source = %record.source,
            destination = %record.destination,
            "[PROCESS] Rejecting self-redirect"
        );
        return Err(RejectionReason::SelfRedirect);
    }

    if record.deleted {
        debug!(line = ?raw.line, source = %record.source, "[PROCESS] Skipping row marked deleted");
        return Err(RejectionReason::MarkedDeleted);
    }

    Ok(record)
}

/// Prefix host-relative paths with the configured domain; absolute URLs pass through.
pub fn resolve(config: &ExpansionConfig, path: &str) -> String {
    if is_absolute_url(path) {
        path.to_string()
    } else {
        format!("{}{}", config.domain, path)
    }
}

fn resolve_localized(config: &ExpansionConfig, locale: &str, path: &str) -> String {
    if is_absolute_url(path) {
        path.to_string()
    } else {
        format!("{}/{}{}", config.domain, locale, path)
    }
}

/// Expand a record into its rule entries: the base entry first, then one entry per
/// non-default locale in configured order when the record is localized.
pub fn expand_record(record: &RedirectRecord, config: &ExpansionConfig) -> Vec<RuleEntry> {
    let status_code = record.code.as_u16();
    let mut rules = vec![RuleEntry {
        source_url: resolve(config, &record.source),
        target_url: resolve(config, &record.destination),
        status_code,
    }];

    if record.localized {
        rules.extend(
            config
                .locales
                .iter()
                .filter(|locale| **locale != config.default_locale)
                .map(|locale| RuleEntry {
                    source_url: resolve_localized(config, locale, &record.source),
                    target_url: resolve_localized(config, locale, &record.destination),
                    status_code,
                }),
        );
    }

    rules
}

/// Process every row, expanding accepted records and collecting rejections.
pub fn process_rows(rows: &[RawRow], config: &ExpansionConfig) -> ProcessedRows {
    let mut processed = ProcessedRows::default();

    for (index, raw) in rows.iter().enumerate() {
        match process_row(raw, config) {
            Ok(record) => {
                processed.rules.extend(expand_record(&record, config));
                processed.records.push(record);
            }
            Err(RejectionReason::MarkedDeleted) => processed.deleted += 1,
            Err(reason) => processed.invalid_rows.push(InvalidRow {
                line: raw.line.or(Some(index + 1)),
                source: raw.source.as_ref().map(|cell| match cell {
                    Cell::Text(s) => s.trim().to_string(),
                    other => other.to_string(),
                }),
                reason: reason.to_string(),
            }),
        }
    }

    info!(
        rows = rows.len(),
        records = processed.records.len(),
        rules = processed.rules.len(),
        invalid = processed.invalid_rows.len(),
        deleted = processed.deleted,
        "[PROCESS] Processed spreadsheet rows"
    );
    processed
}
