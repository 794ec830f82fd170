//! Integration tests for the interactive console binary

use std::io::Write;
use std::process::{Command, Stdio};

fn run_console(name: &str, config: &str, input: &str) -> String {
    let path = std::env::temp_dir().join(format!("modpilot-{}-{}.toml", name, std::process::id()));
    std::fs::write(&path, config).unwrap();

    let mut child = Command::new(env!("CARGO_BIN_EXE_modpilot"))
        .arg("--offline")
        .arg("--config")
        .arg(&path)
        .env("RUST_LOG", "off")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(input.as_bytes()).unwrap();
    let output = child.wait_with_output().unwrap();
    let _ = std::fs::remove_file(&path);

    assert!(output.status.success());
    String::from_utf8(output.stdout).unwrap()
}

/// Test 1: A gated request piped in before end of input still gets its outcome
#[test]
fn test_pending_request_reports_after_end_of_input() {
    let stdout = run_console("expiry", "[approval]\nwindow_secs = 1\n", "ban bob for spam\n");

    assert!(stdout.contains("Approval needed"));
    assert!(stdout.contains("\"ban bob for spam\": approval window expired"));
}

/// Test 2: Ungated requests finish before the console exits
#[test]
fn test_requests_complete_before_exit() {
    let stdout = run_console("repeat", "", "send hello 2 times\n");

    assert!(stdout.contains("\"send hello 2 times\": Completed (2/2 steps succeeded)"));
}
