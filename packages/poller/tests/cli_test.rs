use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sempwatch() -> Command {
    let mut cmd: Command = cargo_bin_cmd!("sempwatch").into();
    cmd.env("NO_COLOR", "1");
    cmd.env_remove("SEMPWATCH_PASSWORD");
    cmd
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Write a configuration file into a fresh tempdir.
/// The tempdir guard must be kept alive.
fn write_config(contents: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("sempwatch.yaml");
    fs::write(&config, contents).unwrap();
    (tmp, config)
}

// --- Binary startup ---

#[test]
fn binary_runs() {
    sempwatch()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sempwatch"));
}

// --- Monitors ---

#[test]
fn monitors_lists_presets() {
    sempwatch()
        .arg("monitors")
        .assert()
        .success()
        .stdout(predicate::str::contains("queues"))
        .stdout(predicate::str::contains("system-health"))
        .stdout(predicate::str::contains("config-sync"));
}

#[test]
fn monitors_includes_custom() {
    let (_tmp, config) = write_config(
        "broker:\n  host: localhost\n  username: admin\nmonitors:\n  - name: dmq-depth\n    description: Dead message queues\n    request: <rpc><show><queue><name>#DEAD*</name></queue></show></rpc>\n    row_element: queue\n    fields: [name, message-vpn, num-messages-spooled]\n",
    );
    sempwatch()
        .args(["monitors", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("dmq-depth"))
        .stdout(predicate::str::contains("Dead message queues"));
}

// --- Parse ---

#[test]
fn parse_saved_reply_as_json() {
    let output = sempwatch()
        .arg("parse")
        .arg(fixture("show_queue.xml"))
        .args(["--monitor", "queues", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["monitor"], "queues");
    assert_eq!(value["columns"][0], "RowUID");
    assert_eq!(value["rows"].as_array().unwrap().len(), 3);
}

#[test]
fn parse_saved_reply_as_table() {
    sempwatch()
        .arg("parse")
        .arg(fixture("show_queue.xml"))
        .args(["-m", "queues"])
        .assert()
        .success()
        .stdout(predicate::str::contains("RowUID"))
        .stdout(predicate::str::contains("orders.in?trading"))
        .stdout(predicate::str::contains("3 rows"));
}

#[test]
fn parse_flat_reply_as_yaml() {
    sempwatch()
        .arg("parse")
        .arg(fixture("show_system_health.xml"))
        .args(["-m", "system-health", "-f", "yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("monitor: system-health"))
        .stdout(predicate::str::contains("disk-latency-current-value"));
}

#[test]
fn parse_slow_subscribers_reply() {
    let output = sempwatch()
        .arg("parse")
        .arg(fixture("show_client_slow_subscriber.xml"))
        .args(["-m", "slow-subscribers", "-f", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let columns: Vec<&str> = value["columns"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c.as_str().unwrap())
        .collect();
    assert_eq!(columns.len(), 13);
    assert_eq!(columns[0], "RowUID");
    assert!(!columns.contains(&"slow-subscriber"));

    let rows = value["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], "feed-handler/4411/#00000012?trading");
    assert_eq!(rows[1][0], "risk-engine/77/#00000031?risk");

    let description = columns.iter().position(|c| *c == "description").unwrap();
    assert_eq!(rows[0][description], "Market data fan-out");
    assert_eq!(rows[1][description], "");
    assert_eq!(value["mismatches"], 0);
}

#[test]
fn parse_unknown_monitor_fails() {
    sempwatch()
        .arg("parse")
        .arg(fixture("show_queue.xml"))
        .args(["-m", "no-such-monitor"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown monitor 'no-such-monitor'"));
}

#[test]
fn parse_truncated_reply_fails() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("truncated.xml");
    fs::write(&file, "<rpc-reply><rpc><show><queue><queues><queue><name>q").unwrap();

    sempwatch()
        .arg("parse")
        .arg(&file)
        .args(["-m", "queues"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Error:"));
}

// --- Poll ---

#[test]
fn poll_rejects_invalid_host() {
    let (_tmp, config) = write_config("broker:\n  host: 'http://broker'\n  username: admin\n");
    sempwatch()
        .args(["poll", "-m", "queues", "-c"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid broker host"));
}

#[tokio::test(flavor = "multi_thread")]
async fn poll_against_mock_broker() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/SEMP"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(fs::read_to_string(fixture("show_queue.xml")).unwrap()),
        )
        .expect(2)
        .mount(&server)
        .await;

    let (tmp, config) = write_config(&format!(
        "broker:\n  host: 127.0.0.1\n  port: {}\n  username: admin\n  password: admin\n",
        server.address().port()
    ));

    let output = tokio::task::spawn_blocking(move || {
        let output = sempwatch()
            .args(["poll", "-m", "queues", "-f", "json", "-i", "0", "-n", "2", "-c"])
            .arg(&config)
            .output()
            .unwrap();
        drop(tmp);
        output
    })
    .await
    .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.matches("\"monitor\": \"queues\"").count(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn poll_keeps_going_after_failed_round() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/SEMP"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<rpc-reply><rpc><show>"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/SEMP"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(fs::read_to_string(fixture("show_queue.xml")).unwrap()),
        )
        .mount(&server)
        .await;

    let (tmp, config) = write_config(&format!(
        "broker:\n  host: 127.0.0.1\n  port: {}\n  username: admin\n  password: admin\n",
        server.address().port()
    ));

    let output = tokio::task::spawn_blocking(move || {
        let output = sempwatch()
            .args(["poll", "-m", "queues", "-f", "json", "-i", "0", "-n", "3", "-c"])
            .arg(&config)
            .output()
            .unwrap();
        drop(tmp);
        output
    })
    .await
    .unwrap();

    assert!(!output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert_eq!(stdout.matches("\"monitor\": \"queues\"").count(), 2);
    assert!(stderr.contains("poll 1/3"), "stderr: {stderr}");
    assert!(stderr.contains("1 of 3 polls failed"), "stderr: {stderr}");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}
