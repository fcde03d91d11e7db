//! `load_config` module: reads the static YAML config and turns it into the typed settings
//! the CLI needs.
//!
//! The YAML file holds no secrets. API credentials come from the environment and are
//! read by the clients themselves (see [`crate::sheet`] and [`crate::bulk_list`]).
//!
//! # Accepted schema
//!
//! ```yaml
//! domain: https://www.example.com
//! locales: [de-de, en-us, es-es]     # optional, expansion order
//! default_locale: en-us              # optional
//! batch_size: 1000                   # optional, at most 1000
//! poll: { max_attempts: 30, interval_ms: 2000 }   # optional
//! stop_on_batch_failure: false       # optional
//! description_prefix: "Published from redirect spreadsheet"  # optional
//! sheet:
//!   spreadsheet_id: 1AbC...
//!   range: Redirects!A:E             # optional
//! cloudflare:
//!   account_id: 0123abcd...
//!   list_id: 4567efgh...
//! ```
//!
//! # Errors
//! All errors use `anyhow::Error` with the file path in context, and are surfaced at
//! the CLI boundary.

use anyhow::{Context, Result};
use bulk_redirects_core::config::SyncConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

pub const DEFAULT_SHEET_RANGE: &str = "Redirects!A:E";

fn default_range() -> String {
    DEFAULT_SHEET_RANGE.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetSection {
    pub spreadsheet_id: String,
    #[serde(default = "default_range")]
    pub range: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloudflareSection {
    pub account_id: String,
    pub list_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    #[serde(flatten)]
    pub sync: SyncConfig,
    pub sheet: SheetSection,
    pub cloudflare: CloudflareSection,
}

/// Loads and validates the YAML config at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let config: CliConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    config
        .sync
        .validate()
        .with_context(|| format!("Invalid configuration in {path_ref:?}"))?;
    config.sync.trace_loaded();

    Ok(config)
}
