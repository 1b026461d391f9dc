use std::io::Write;
use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tempfile::{NamedTempFile, TempDir};
use tokio::time::{sleep, timeout};

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Create a minimal valid config with the status server enabled.
///
/// Nothing listens on the subscribe address or the ancillary URL; the runner
/// keeps retrying the former and starts with stale helper files.
fn minimal_config(port: u16, root: &Path) -> String {
    let upstream = get_available_port();
    format!(
        r#"
[runner]
station = "test-station"
working_dir = "{root}/work"

[messaging]
subscribe_addresses = ["127.0.0.1:{upstream}"]
publish_address = "127.0.0.1:0"
reconnect_delay_ms = 100

[paths]
level1b_home = "{root}/level1"
attitude_home = "{root}/att"
ephemeris_home = "{root}/eph"

[executables]
modis_l1a = "/nonexistent/modis_L1A"
modis_geo = "/nonexistent/modis_GEO"
modis_l1b = "/nonexistent/modis_L1B"
spa_home = "/nonexistent/spa"

[ancillary]
dir = "{root}/ancillary"
url = "http://127.0.0.1:9/"
timeout_secs = 1

[server]
enabled = true
host = "127.0.0.1"
port = {port}
"#,
        root = root.display(),
        upstream = upstream,
        port = port
    )
}

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

/// Spawn the runner and return a handle
async fn spawn_runner(config_path: &Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_modis-l1-runner"))
        .env("MODIS_RUNNER_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn runner")
}

/// Wait for the status server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/api/v1/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(100)).await;
    }
    false
}

#[tokio::test]
async fn test_health_endpoint() {
    let root = TempDir::new().unwrap();
    let port = get_available_port();
    let config = write_config(&minimal_config(port, root.path()));

    let mut runner = spawn_runner(config.path()).await;
    assert!(
        wait_for_server(port, 100).await,
        "Runner did not start in time"
    );

    let response = Client::new()
        .get(format!("http://127.0.0.1:{}/api/v1/health", port))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let json: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(json["status"], "ok");
    assert_eq!(json["station"], "test-station");

    runner.kill().await.ok();
}

#[tokio::test]
async fn test_scenes_endpoint_starts_empty() {
    let root = TempDir::new().unwrap();
    let port = get_available_port();
    let config = write_config(&minimal_config(port, root.path()));

    let mut runner = spawn_runner(config.path()).await;
    assert!(
        wait_for_server(port, 100).await,
        "Runner did not start in time"
    );

    let json: serde_json::Value = Client::new()
        .get(format!("http://127.0.0.1:{}/api/v1/scenes", port))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(json["pending"], 0);
    assert_eq!(json["running"], 0);

    runner.kill().await.ok();
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_modis-l1-runner"))
            .env("MODIS_RUNNER_CONFIG", "/nonexistent/modis-runner.toml")
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_missing_executables_section_exits_with_error() {
    let config = write_config(
        r#"
[messaging]
subscribe_addresses = ["127.0.0.1:9000"]

[paths]
level1b_home = "/tmp/level1"
attitude_home = "/tmp/att"
ephemeris_home = "/tmp/eph"

[ancillary]
dir = "/tmp/ancillary"
url = "http://127.0.0.1:9/"
"#,
    );

    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_modis-l1-runner"))
            .env("MODIS_RUNNER_CONFIG", config.path())
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}
