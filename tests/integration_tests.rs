//! Integration tests for the `hbsdmon` CLI surface.

mod common;

use std::net::TcpListener;

const BASE_CONFIG: &str = r#"
name = "Test Monitor"
token = "app-token"
dest = "user-key"
interval = 30
"#;

#[test]
fn help_command_prints_usage() {
    let result = common::run_cli_case("help_command_prints_usage", &["--help"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("Usage: hbsdmon [OPTIONS] [COMMAND]"),
        "missing help banner; log: {}",
        result.log_path.display()
    );
}

#[test]
fn version_command_prints_version() {
    let result = common::run_cli_case("version_command_prints_version", &["--version"]);
    assert!(result.status.success());
    assert!(
        result.stdout.contains("hbsdmon"),
        "missing version output; log: {}",
        result.log_path.display()
    );
}

#[test]
fn check_summarizes_nodes() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::write_config(
        dir.path(),
        &format!(
            r#"{BASE_CONFIG}
[[nodes]]
host = "10.0.0.5"
method = "tcp"
port = 22

[[nodes]]
host = "www.example.org"
method = "HTTP"
interval = 10

[[nodes]]
host = "10.0.0.9"
disabled = true
"#
        ),
    );
    let config = config.to_str().unwrap();
    let result = common::run_cli_case("check_summarizes_nodes", &["check", "-c", config]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(result.stdout.contains("2 of 3 node(s) enabled"));
    assert!(result.stdout.contains("10.0.0.5"));
    assert!(result.stdout.contains("(disabled)"));
}

#[test]
fn check_json_is_structured_and_omits_token() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::write_config(
        dir.path(),
        &format!(
            r#"{BASE_CONFIG}
[[nodes]]
host = "10.0.0.5"
method = "udp"
port = 53
"#
        ),
    );
    let result = common::run_cli_case(
        "check_json_is_structured_and_omits_token",
        &["check", "--json", "-c", config.to_str().unwrap()],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());

    let payload: serde_json::Value = serde_json::from_str(&result.stdout).unwrap();
    assert_eq!(payload["name"], "Test Monitor");
    assert_eq!(payload["heartbeat_interval_secs"], 21_600);
    let node = &payload["nodes"][0];
    assert_eq!(node["method"], "UDP");
    assert_eq!(node["port"], "53");
    assert_eq!(node["interval_secs"], 30);
    assert!(!result.stdout.contains("app-token"));
}

#[test]
fn missing_config_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let result = common::run_cli_case(
        "missing_config_exits_nonzero",
        &["check", "-c", path.to_str().unwrap()],
    );
    assert_eq!(result.status.code(), Some(1));
    assert!(
        result.stderr.contains("[-] [HBM-1002]"),
        "log: {}",
        result.log_path.display()
    );
}

#[test]
fn invalid_config_exits_nonzero_before_starting() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::write_config(
        dir.path(),
        r#"
token = ""
dest = "user-key"
"#,
    );
    let result = common::run_cli_case(
        "invalid_config_exits_nonzero_before_starting",
        &["daemon", "--dry-run", "-c", config.to_str().unwrap()],
    );
    assert_eq!(result.status.code(), Some(1));
    assert!(result.stderr.contains("[HBM-1001]"));
    assert!(!result.stderr.contains("MONITOR INIT"));
}

#[test]
fn malformed_toml_reports_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::write_config(dir.path(), "token = [unterminated");
    let result = common::run_cli_case(
        "malformed_toml_reports_parse_error",
        &["check", "-c", config.to_str().unwrap()],
    );
    assert_eq!(result.status.code(), Some(1));
    assert!(result.stderr.contains("[HBM-1003]"));
}

#[test]
fn probe_reports_pass_and_fail() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let open_port = listener.local_addr().unwrap().port();
    let closed_port = {
        let probe = TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    };

    let dir = tempfile::tempdir().unwrap();
    let config = common::write_config(
        dir.path(),
        &format!(
            r#"{BASE_CONFIG}
[timing]
probe_timeout_secs = 1

[[nodes]]
host = "127.0.0.1"
method = "tcp"
port = {open_port}

[[nodes]]
host = "127.0.0.1"
method = "tcp"
port = {closed_port}
"#
        ),
    );
    let result = common::run_cli_case(
        "probe_reports_pass_and_fail",
        &["probe", "-c", config.to_str().unwrap()],
    );
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    assert!(result.stdout.contains("PASS 127.0.0.1"));
    assert!(result.stdout.contains("FAIL 127.0.0.1"));
    assert!(result.stderr.contains("1 of 2 node(s) failed"));
    drop(listener);
}

#[test]
fn completions_command_generates_shell_script() {
    let result = common::run_cli_case(
        "completions_command_generates_shell_script",
        &["completions", "bash"],
    );
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("hbsdmon"),
        "expected completion script contents; log: {}",
        result.log_path.display()
    );
}
