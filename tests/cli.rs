//! End-to-end tests for the `hsync` binary.
//!
//! Every command runs with `HSYNC_HOME` and `HSYNC_DB` pointed into a temp
//! dir. Stdout is a pipe, so output is JSON.

use assert_cmd::Command;
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HSYNC_VARS: &[&str] = &[
    "HSYNC_SERVER_URL",
    "HSYNC_DEVICE_SECRET",
    "HSYNC_API_KEY",
    "HSYNC_PREFERRED_SOURCE",
    "HSYNC_PROVIDER_DIR",
    "RUST_LOG",
];

fn hsync(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("hsync").unwrap();
    for var in HSYNC_VARS {
        cmd.env_remove(var);
    }
    cmd.env("HSYNC_HOME", home)
        .env("HSYNC_DB", home.join("data").join("healthsync.db"));
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

fn stderr_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stderr).unwrap()
}

#[test]
fn test_version_json() {
    let home = TempDir::new().unwrap();
    let output = hsync(home.path()).arg("version").output().unwrap();

    assert!(output.status.success());
    let body = stdout_json(&output);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["sync_endpoint"], "/api/sync/health-connect");
}

#[test]
fn test_cache_show_without_database() {
    let home = TempDir::new().unwrap();
    let output = hsync(home.path()).args(["cache", "show"]).output().unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert_eq!(stderr_json(&output)["error"]["code"], "NOT_INITIALIZED");
}

#[test]
fn test_cache_get_unknown_metric() {
    let home = TempDir::new().unwrap();
    let output = hsync(home.path())
        .args(["cache", "get", "last_bogus"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(4));
    assert_eq!(stderr_json(&output)["error"]["code"], "UNKNOWN_METRIC");
}

#[test]
fn test_config_set_then_show() {
    let home = TempDir::new().unwrap();

    hsync(home.path())
        .args(["config", "set", "lookback_days", "14"])
        .assert()
        .success();
    hsync(home.path())
        .args(["config", "set-api-key", "hk_live_0123456789"])
        .assert()
        .success();

    let output = hsync(home.path()).args(["config", "show"]).output().unwrap();
    assert!(output.status.success());
    let body = stdout_json(&output);
    assert_eq!(body["lookback_days"], 14);
    assert_eq!(body["sync_interval_minutes"], 15);
    assert_eq!(body["preferred_source"], "com.ouraring.oura");
    assert_eq!(body["api_key"], "hk_l...6789");
    assert!(body["server_url"].is_null());
}

#[test]
fn test_config_set_rejects_unknown_key() {
    let home = TempDir::new().unwrap();
    let output = hsync(home.path())
        .args(["config", "set", "colour", "blue"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(4));
    assert_eq!(stderr_json(&output)["error"]["code"], "INVALID_ARGUMENT");
}

#[test]
fn test_sync_run_requires_server_url() {
    let home = TempDir::new().unwrap();
    let output = hsync(home.path()).args(["sync", "run"]).output().unwrap();

    assert_eq!(output.status.code(), Some(7));
    assert_eq!(stderr_json(&output)["error"]["code"], "CONFIG_ERROR");
}

#[test]
fn test_permissions_reports_missing_grant() {
    let home = TempDir::new().unwrap();
    let export = TempDir::new().unwrap();
    std::fs::write(
        export.path().join("permissions.json"),
        r#"["read:blood_pressure", "read:sleep_session"]"#,
    )
    .unwrap();

    let output = hsync(home.path())
        .arg("permissions")
        .arg("--source")
        .arg(export.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let body = stdout_json(&output);
    assert_eq!(body["all_granted"], false);
    let weight = body["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["permission"] == "read:weight")
        .unwrap();
    assert_eq!(weight["granted"], false);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sync_run_dispatches_and_caches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/sync/health-connect"))
        .and(header("authorization", "Bearer hk_test_key"))
        .and(body_partial_json(json!({
            "device_secret": "dev-secret",
            "data_type": "blood_pressure",
            "records": [{"systolic": 118, "diastolic": 78}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "synced": 1,
            "sync_id": "sync_1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let export = TempDir::new().unwrap();
    let measured = (chrono::Utc::now() - chrono::TimeDelta::hours(1)).to_rfc3339();
    std::fs::write(
        export.path().join("blood_pressure.json"),
        json!([{
            "time": measured,
            "systolic_mmhg": 118.6,
            "diastolic_mmhg": 78.2,
            "metadata": {"data_origin": "com.omron.connect"}
        }])
        .to_string(),
    )
    .unwrap();

    let uri = server.uri();
    let home_path = home.path().to_path_buf();
    let export_path = export.path().to_path_buf();
    let (run, cached) = tokio::task::spawn_blocking(move || {
        let run = hsync(&home_path)
            .env("HSYNC_SERVER_URL", &uri)
            .env("HSYNC_API_KEY", "hk_test_key")
            .env("HSYNC_DEVICE_SECRET", "dev-secret")
            .args(["sync", "run", "--source"])
            .arg(&export_path)
            .output()
            .unwrap();
        let cached = hsync(&home_path)
            .args(["cache", "get", "last_bp_systolic"])
            .output()
            .unwrap();
        (run, cached)
    })
    .await
    .unwrap();

    assert!(
        run.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&run.stderr)
    );
    let report = stdout_json(&run);
    let bp = report["types"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["record_type"] == "blood_pressure")
        .unwrap();
    assert_eq!(bp["read"], 1);
    assert_eq!(bp["dispatch"]["status"], "sent");
    assert_eq!(bp["dispatch"]["synced"], 1);

    assert!(cached.status.success());
    assert_eq!(stdout_json(&cached)["value"], 118);
}
