//! Shared helpers for driving the `hbsdmon` binary from integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output};

/// Captured result of one CLI invocation. Output is also written to
/// `log_path` so failed assertions can point at it.
pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

#[must_use]
pub fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_hbsdmon"))
}

/// Run the binary with `args` and record the output under `case_name`.
pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    run_cli_case_with_env(case_name, args, &[])
}

pub fn run_cli_case_with_env(case_name: &str, args: &[&str], env: &[(&str, &str)]) -> CmdResult {
    let mut cmd = Command::new(bin_path());
    cmd.args(args).env("NO_COLOR", "1").env_remove("HBSDMON_LOG");
    for (key, value) in env {
        cmd.env(key, value);
    }
    let output = cmd.output().expect("failed to run hbsdmon");
    record(case_name, args, output)
}

fn record(case_name: &str, args: &[&str], output: Output) -> CmdResult {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    let log_dir = std::env::temp_dir().join("hbsdmon-test-logs");
    fs::create_dir_all(&log_dir).expect("create log dir");
    let log_path = log_dir.join(format!("{case_name}.log"));
    let log = format!(
        "args: {args:?}\nstatus: {}\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}\n",
        output.status
    );
    fs::write(&log_path, log).expect("write case log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Write `contents` as `hbsdmon.toml` inside `dir`.
pub fn write_config(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("hbsdmon.toml");
    fs::write(&path, contents).expect("write config");
    path
}
