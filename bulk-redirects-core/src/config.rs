use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::publish::{BatchFailurePolicy, PollPolicy, PublishOptions, MAX_BATCH_SIZE};
use crate::validate::is_absolute_url;

pub const DEFAULT_LOCALES: &[&str] = &[
    "de-de", "en-us", "es-es", "fr-fr", "it-it", "ja-jp", "ko-kr", "pt-br", "zh-cn", "zh-tw",
];
pub const DEFAULT_LOCALE: &str = "en-us";
pub const DEFAULT_DESCRIPTION_PREFIX: &str = "Published from redirect spreadsheet";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("domain {0:?} must be an absolute http(s) URL without a trailing slash")]
    InvalidDomain(String),
    #[error("locale {0:?} is not a valid locale code")]
    InvalidLocale(String),
    #[error("batch size {0} must be between 1 and 1000")]
    InvalidBatchSize(usize),
    #[error("poll.max_attempts must be at least 1")]
    InvalidPollAttempts,
}

/// How accepted records are turned into rule URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionConfig {
    /// Prepended to host-relative paths, e.g. `https://www.example.com`.
    pub domain: String,
    /// Locale prefixes, in expansion order.
    #[serde(default = "default_locales")]
    pub locales: Vec<String>,
    /// Locale that is served unprefixed and never expanded.
    #[serde(default = "default_locale")]
    pub default_locale: String,
}

impl ExpansionConfig {
    pub fn new(domain: impl Into<String>) -> Self {
        ExpansionConfig {
            domain: domain.into(),
            locales: default_locales(),
            default_locale: default_locale(),
        }
    }
}

fn default_locales() -> Vec<String> {
    DEFAULT_LOCALES.iter().map(|l| l.to_string()).collect()
}

fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}

fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}

fn default_description_prefix() -> String {
    DEFAULT_DESCRIPTION_PREFIX.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSection {
    pub max_attempts: u32,
    pub interval_ms: u64,
}

impl Default for PollSection {
    fn default() -> Self {
        let policy = PollPolicy::default();
        PollSection {
            max_attempts: policy.max_attempts,
            interval_ms: policy.interval.as_millis() as u64,
        }
    }
}

/// Settings for one sync run, independent of where rows come from or go to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(flatten)]
    pub expansion: ExpansionConfig,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub poll: PollSection,
    #[serde(default)]
    pub stop_on_batch_failure: bool,
    #[serde(default = "default_description_prefix")]
    pub description_prefix: String,
}

impl SyncConfig {
    pub fn new(expansion: ExpansionConfig) -> Self {
        SyncConfig {
            expansion,
            batch_size: default_batch_size(),
            poll: PollSection::default(),
            stop_on_batch_failure: false,
            description_prefix: default_description_prefix(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let domain = &self.expansion.domain;
        if !is_absolute_url(domain) || domain.ends_with('/') {
            return Err(ConfigError::InvalidDomain(domain.clone()));
        }

        let locale_pattern =
            Regex::new(r"^[a-z]{2,3}(-[a-z0-9]{2,4})?$").expect("locale pattern is valid");
        if let Some(bad) = self
            .expansion
            .locales
            .iter()
            .chain(std::iter::once(&self.expansion.default_locale))
            .find(|locale| !locale_pattern.is_match(locale))
        {
            return Err(ConfigError::InvalidLocale(bad.clone()));
        }

        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }
        if self.poll.max_attempts == 0 {
            return Err(ConfigError::InvalidPollAttempts);
        }
        Ok(())
    }

    pub fn publish_options(&self) -> PublishOptions {
        PublishOptions {
            batch_size: self.batch_size,
            on_batch_failure: if self.stop_on_batch_failure {
                BatchFailurePolicy::Stop
            } else {
                BatchFailurePolicy::Continue
            },
            poll: PollPolicy {
                max_attempts: self.poll.max_attempts,
                interval: Duration::from_millis(self.poll.interval_ms),
            },
            description_prefix: self.description_prefix.clone(),
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            domain = %self.expansion.domain,
            locales = self.expansion.locales.len(),
            default_locale = %self.expansion.default_locale,
            batch_size = self.batch_size,
            stop_on_batch_failure = self.stop_on_batch_failure,
            "Loaded SyncConfig"
        );
        debug!(?self, "SyncConfig loaded (full debug)");
    }
}
