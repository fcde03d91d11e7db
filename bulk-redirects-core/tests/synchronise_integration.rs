use std::time::Duration;

use bulk_redirects_core::config::{ExpansionConfig, SyncConfig};
use bulk_redirects_core::contract::{
    MockBulkListClient, MockRedirectSource, RuleEntry, UploadResponse,
};
use bulk_redirects_core::process::RawRow;
use bulk_redirects_core::publish::{PollPolicy, PublishOptions, PublishOutcome};
use bulk_redirects_core::report::{Command, StatusReport};
use bulk_redirects_core::synchronise::{diff, list, publish, status};
use bulk_redirects_core::validate::Cell;

fn config() -> SyncConfig {
    SyncConfig::new(ExpansionConfig {
        domain: "https://www.example.com".to_string(),
        locales: vec!["de-de".into(), "en-us".into()],
        default_locale: "en-us".to_string(),
    })
}

fn options() -> PublishOptions {
    PublishOptions {
        poll: PollPolicy {
            max_attempts: 2,
            interval: Duration::ZERO,
        },
        ..config().publish_options()
    }
}

fn sheet_rows() -> Vec<RawRow> {
    vec![
        RawRow {
            line: Some(2),
            source: Some("/pricing".into()),
            destination: Some("/plans".into()),
            code: Some(Cell::Int(301)),
            localized: Some(Cell::Bool(true)),
            deleted: None,
        },
        RawRow {
            line: Some(3),
            source: Some("/old-blog".into()),
            destination: Some("https://blog.example.org/".into()),
            code: Some("302".into()),
            localized: None,
            deleted: Some(Cell::Bool(true)),
        },
        RawRow {
            line: Some(4),
            source: Some("/loop".into()),
            destination: Some("/loop".into()),
            ..RawRow::default()
        },
    ]
}

fn source_with_rows() -> MockRedirectSource {
    let mut source = MockRedirectSource::new();
    source
        .expect_fetch_redirect_rows()
        .returning(|| Ok(sheet_rows()));
    source
}

fn rule(source: &str, target: &str) -> RuleEntry {
    RuleEntry {
        source_url: source.to_string(),
        target_url: target.to_string(),
        status_code: 301,
    }
}

#[tokio::test]
async fn status_merges_both_health_checks() {
    let mut source = MockRedirectSource::new();
    source
        .expect_check_status()
        .returning(|| StatusReport::ok("sheet reachable"));
    let mut bulk = MockBulkListClient::new();
    bulk.expect_check_status()
        .returning(|| StatusReport::failed("list not found"));

    let report = status(&source, &bulk).await;

    assert_eq!(report.command, Command::Status);
    assert!(!report.success);
    assert_eq!(report.errors, vec!["bulk list: list not found"]);
}

#[tokio::test]
async fn list_reports_rules_and_invalid_rows_but_not_deleted_rows() {
    let source = source_with_rows();
    let bulk = MockBulkListClient::new();

    let report = list(&source, &bulk, &config(), false).await;

    let rules = report.valid_rules.expect("rules should be listed");
    assert_eq!(
        rules,
        vec![
            rule("https://www.example.com/pricing", "https://www.example.com/plans"),
            rule(
                "https://www.example.com/de-de/pricing",
                "https://www.example.com/de-de/plans"
            ),
        ]
    );
    let invalid = report.invalid_rows.expect("invalid rows should be listed");
    assert_eq!(invalid.len(), 1);
    assert_eq!(invalid[0].line, Some(4));
    assert!(!report.success, "invalid rows fail the report");
}

#[tokio::test]
async fn list_remote_reads_bulk_list_only() {
    let mut source = MockRedirectSource::new();
    source.expect_fetch_redirect_rows().never();
    let mut bulk = MockBulkListClient::new();
    bulk.expect_list_items()
        .returning(|| Ok(vec![rule("https://www.example.com/a", "https://www.example.com/b")]));

    let report = list(&source, &bulk, &config(), true).await;

    assert!(report.success);
    assert_eq!(report.remote_rules.map(|r| r.len()), Some(1));
}

#[tokio::test]
async fn diff_compares_sheet_with_remote_list() {
    let source = source_with_rows();
    let mut bulk = MockBulkListClient::new();
    bulk.expect_list_items().returning(|| {
        Ok(vec![
            rule("https://www.example.com/pricing", "https://www.example.com/plans"),
            rule("https://www.example.com/gone", "https://www.example.com/"),
        ])
    });

    let report = diff(&source, &bulk, &config()).await;

    let changes = report.diff.expect("diff should be present");
    assert_eq!(
        changes.added,
        vec![rule(
            "https://www.example.com/de-de/pricing",
            "https://www.example.com/de-de/plans"
        )]
    );
    assert_eq!(
        changes.removed,
        vec![rule("https://www.example.com/gone", "https://www.example.com/")]
    );
}

#[tokio::test]
async fn diff_never_mutates_the_remote_list() {
    let source = source_with_rows();
    let mut bulk = MockBulkListClient::new();
    bulk.expect_list_items().returning(|| Ok(vec![]));
    bulk.expect_empty_list().never();
    bulk.expect_upload_items().never();

    let report = diff(&source, &bulk, &config()).await;
    assert_eq!(report.diff.map(|d| d.added.len()), Some(2));
}

#[tokio::test]
async fn publish_uploads_processed_rules() {
    let source = source_with_rows();
    let mut bulk = MockBulkListClient::new();
    bulk.expect_empty_list().times(1).returning(|| Ok(None));
    bulk.expect_upload_items()
        .times(1)
        .withf(|batch| batch.len() == 2)
        .returning(|_| {
            Ok(UploadResponse {
                success: true,
                ..UploadResponse::default()
            })
        });
    bulk.expect_set_description().returning(|_| Ok(()));

    let report = publish(&source, &bulk, &config(), &options()).await;

    let published = report.publish.expect("publish section should be present");
    assert_eq!(published.outcome, PublishOutcome::Succeeded);
    assert_eq!(published.total_rules, 2);
}

#[tokio::test]
async fn publish_leaves_list_untouched_when_sheet_fetch_fails() {
    let mut source = MockRedirectSource::new();
    source
        .expect_fetch_redirect_rows()
        .returning(|| Err("sheet unavailable".into()));
    let mut bulk = MockBulkListClient::new();
    bulk.expect_empty_list().never();
    bulk.expect_upload_items().never();

    let report = publish(&source, &bulk, &config(), &options()).await;

    assert!(!report.success);
    assert!(report.publish.is_none());
    assert!(report.errors[0].contains("left untouched"));
}
