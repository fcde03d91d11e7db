use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use tempfile::NamedTempFile;

/// Creates a config file that loads, but whose clients cannot reach anything.
fn create_minimal_config() -> NamedTempFile {
    let config = NamedTempFile::new().expect("Creating temp config file failed");
    write(
        config.path(),
        b"domain: https://www.example.com\nsheet:\n  spreadsheet_id: sheet-id\ncloudflare:\n  account_id: acct\n  list_id: list\n",
    )
    .expect("Writing temp config failed");
    config
}

#[test]
fn help_lists_every_subcommand() {
    let mut cmd = Command::cargo_bin("bulk-redirects").expect("Binary exists");
    cmd.arg("--help");
    cmd.assert().success().stdout(
        predicate::str::contains("status")
            .and(predicate::str::contains("list"))
            .and(predicate::str::contains("diff"))
            .and(predicate::str::contains("publish")),
    );
}

#[test]
fn publish_accepts_strict_flag() {
    let mut cmd = Command::cargo_bin("bulk-redirects").expect("Binary exists");
    cmd.args(["publish", "--help"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--strict").and(predicate::str::contains("--json")));
}

#[test]
fn missing_config_file_fails() {
    let mut cmd = Command::cargo_bin("bulk-redirects").expect("Binary exists");
    cmd.args(["status", "--config", "does-not-exist.yaml"]);
    cmd.assert().failure();
}

#[test]
fn missing_api_token_fails_before_any_request() {
    let config = create_minimal_config();
    let mut cmd = Command::cargo_bin("bulk-redirects").expect("Binary exists");
    cmd.arg("diff")
        .arg("--config")
        .arg(config.path())
        .env("GOOGLE_API_KEY", "key")
        .env_remove("CLOUDFLARE_API_TOKEN");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("CLOUDFLARE_API_TOKEN"));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use bulk_redirects::cli::{run, Cli, CommonArgs, Commands};

    let cli = Cli {
        command: Commands::Status {
            common: CommonArgs {
                config: std::path::PathBuf::from("dummy.yaml"),
                json: false,
            },
        },
    };

    let result = run(cli).await;
    assert!(result.is_err(), "dummy config must not load");

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
