use assert_cmd::prelude::*;
use serde_json::Value;
use std::process::Command;

fn waypoint() -> Command {
    let mut cmd = Command::cargo_bin("waypoint").expect("binary built");
    cmd.env_remove("RUST_LOG")
        .env("BASE_URL", "https://acme.atlassian.net")
        .env("LOGIN_EMAIL", "me@example.com")
        .env("LOGIN_PASSWORD", "hunter2");
    cmd
}

#[test]
fn plan_prints_the_flow_as_json() {
    let assert = waypoint()
        .args(["--output", "json", "plan"])
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(!stdout.contains("hunter2"), "password must never be printed");

    let payload: Value = serde_json::from_str(&stdout).expect("valid JSON flow");
    assert_eq!(payload["name"], "jira-simple");
    assert_eq!(payload["base_url"], "https://acme.atlassian.net");
    assert_eq!(payload["nodes"].as_array().map(Vec::len), Some(10));
}

#[test]
fn missing_password_fails_before_any_step() {
    waypoint()
        .env_remove("LOGIN_PASSWORD")
        .args(["plan"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn demo_with_existing_session_exits_zero() {
    let assert = waypoint()
        .args(["--output", "json", "demo", "--signed-in"])
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    let report: Value = serde_json::from_str(&stdout).expect("valid JSON report");
    assert_eq!(report["outcome"], "succeeded");
    assert_eq!(report["diagnostics"][0]["step"], "Status: To Do");
}

#[test]
fn version_reports_commit_and_build_time() {
    let assert = waypoint().arg("--version").assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
    assert!(stdout.contains(", built "));
    assert!(stdout.contains(" UTC)"));
}
