///
/// This module implements the CLI interface for bulk-redirects: command parsing,
/// client construction from config and environment, and report output.
///
/// All decision logic (validation, expansion, diffing, publishing) lives in the
/// [`bulk-redirects-core`] crate. This module is glue.
///
/// ## Commands
/// - `status`: health of the spreadsheet and the bulk list.
/// - `list`: the rules the spreadsheet produces (`--remote` for the list's rules).
/// - `diff`: what a publish would add and remove.
/// - `publish`: replace the bulk list with the spreadsheet's rules.
///
/// Every command prints a report to stdout (`--json` for machine-readable output) and
/// fails with a non-zero exit status when the report is not successful.
///
/// [`bulk-redirects-core`]: ../../bulk-redirects-core/
use crate::bulk_list::CloudflareClient;
use crate::load_config::{load_config, CliConfig};
use crate::sheet::SheetClient;
use anyhow::{Context, Result};
use bulk_redirects_core::report::Report;
use bulk_redirects_core::synchronise;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// CLI for bulk-redirects: publish a redirect spreadsheet to a Cloudflare bulk redirect list.
#[derive(Parser)]
#[clap(
    name = "bulk-redirects",
    version,
    about = "Validate a redirect spreadsheet and publish it to a Cloudflare bulk redirect list"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Path to the YAML config file
    #[clap(long)]
    pub config: PathBuf,
    /// Print the report as JSON
    #[clap(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check that the spreadsheet and the bulk list are reachable
    Status {
        #[clap(flatten)]
        common: CommonArgs,
    },
    /// List the rules the spreadsheet produces
    List {
        #[clap(flatten)]
        common: CommonArgs,
        /// List the rules currently on the bulk list instead
        #[clap(long)]
        remote: bool,
    },
    /// Show what a publish would add to and remove from the bulk list
    Diff {
        #[clap(flatten)]
        common: CommonArgs,
    },
    /// Replace the bulk list with the spreadsheet's rules
    Publish {
        #[clap(flatten)]
        common: CommonArgs,
        /// Stop uploading after the first failed batch
        #[clap(long)]
        strict: bool,
    },
}

impl Commands {
    fn common(&self) -> &CommonArgs {
        match self {
            Commands::Status { common }
            | Commands::List { common, .. }
            | Commands::Diff { common }
            | Commands::Publish { common, .. } => common,
        }
    }
}

fn clients(config: &CliConfig) -> Result<(SheetClient, CloudflareClient)> {
    let sheet = SheetClient::new_from_env(&config.sheet)
        .map_err(|e| anyhow::anyhow!("Failed to construct spreadsheet client: {e}"))?;
    let bulk = CloudflareClient::new_from_env(&config.cloudflare)
        .map_err(|e| anyhow::anyhow!("Failed to construct Cloudflare client: {e}"))?;
    Ok((sheet, bulk))
}

fn print_report(report: &Report, json: bool) -> Result<()> {
    if json {
        let rendered =
            serde_json::to_string_pretty(report).context("Failed to serialize report as JSON")?;
        println!("{rendered}");
    } else {
        print!("{report}");
    }
    Ok(())
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let common = cli.command.common().clone();
    let config = load_config(&common.config)?;
    let (sheet, bulk) = clients(&config)?;

    let report = match cli.command {
        Commands::Status { .. } => {
            tracing::info!(command = "status", "Checking collaborators");
            synchronise::status(&sheet, &bulk).await
        }
        Commands::List { remote, .. } => {
            tracing::info!(command = "list", remote, "Listing rules");
            synchronise::list(&sheet, &bulk, &config.sync, remote).await
        }
        Commands::Diff { .. } => {
            tracing::info!(command = "diff", "Computing diff");
            synchronise::diff(&sheet, &bulk, &config.sync).await
        }
        Commands::Publish { strict, .. } => {
            let mut sync = config.sync.clone();
            sync.stop_on_batch_failure |= strict;
            tracing::info!(
                command = "publish",
                stop_on_batch_failure = sync.stop_on_batch_failure,
                "Starting publish"
            );
            synchronise::publish(&sheet, &bulk, &sync, &sync.publish_options()).await
        }
    };

    print_report(&report, common.json)?;

    if report.success {
        tracing::info!(command = %report.command, "Command completed");
        Ok(())
    } else {
        tracing::error!(
            command = %report.command,
            errors = report.errors.len(),
            "Command reported errors"
        );
        anyhow::bail!("{} finished with {} error(s)", report.command, report.errors.len())
    }
}
