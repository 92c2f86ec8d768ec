#![cfg(feature = "cli")]

use std::process::{Command, Output};

fn xdm(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_xdm"))
        .arg("--log-level")
        .arg("error")
        .args(args)
        .output()
        .expect("xdm should run")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn version_prints_package_version() {
    let output = xdm(&["version"]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output).trim(),
        format!("xdm {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn acl_exit_code_reflects_decision() {
    let allowed = xdm(&["--format", "json", "acl", "http://app.example.com", "-p", "*.example.com"]);
    assert_eq!(allowed.status.code(), Some(0));
    assert!(stdout(&allowed).contains("\"allowed\":true"));

    let denied = xdm(&["--format", "raw", "acl", "http://example.org", "-p", "*.example.com"]);
    assert_eq!(denied.status.code(), Some(50));
    assert_eq!(stdout(&denied).trim(), "denied");
}

#[test]
fn acl_rejects_invalid_regex() {
    let output = xdm(&["acl", "http://a.test", "-p", "^(unclosed"]);
    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("error:"));
}

#[test]
fn origin_resolves_against_base() {
    let output = xdm(&[
        "--format",
        "json",
        "origin",
        "../frames/guest.html",
        "--base",
        "http://host.test/app/index.html",
    ]);
    assert!(output.status.success());
    let record: serde_json::Value =
        serde_json::from_str(stdout(&output).trim()).expect("json output");
    assert_eq!(record["url"], "http://host.test/frames/guest.html");
    assert_eq!(record["origin"], "http://host.test");
}

#[test]
fn frame_encode_and_decode() {
    let encoded = xdm(&["--format", "raw", "frame", "encode", "-c", "chan1", "{\"a\":1}"]);
    assert!(encoded.status.success());
    assert_eq!(stdout(&encoded).trim(), "chan1 {\"a\":1}");

    let decoded = xdm(&["--format", "raw", "frame", "decode", "-c", "chan1", "chan1 {\"a\":1}"]);
    assert!(decoded.status.success());
    assert_eq!(stdout(&decoded).trim(), "{\"a\":1}");

    let foreign = xdm(&["frame", "decode", "-c", "chan1", "chan2 {}"]);
    assert_eq!(foreign.status.code(), Some(60));

    let sentinel = xdm(&["--format", "raw", "frame", "sentinel", "-c", "chan1"]);
    assert_eq!(stdout(&sentinel).trim(), "chan1-ready");
}

#[test]
fn demo_reports_each_call() {
    let output = xdm(&["--format", "json", "demo", "--a", "40", "--b", "2"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let records: Vec<serde_json::Value> = stdout(&output)
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    let by_method = |method: &str| {
        records
            .iter()
            .find(|record| record["method"] == method)
            .unwrap_or_else(|| panic!("no record for {method}"))
            .clone()
    };

    assert_eq!(records.len(), 5);
    assert_eq!(by_method("add")["status"], "ok");
    assert_eq!(by_method("add")["value"], 42);
    assert_eq!(by_method("echo")["value"], "hello");
    assert_eq!(by_method("fail")["status"], "error");
    assert_eq!(by_method("fail")["value"]["code"], -32099);
    assert_eq!(by_method("missing")["value"]["code"], -32601);
    assert_eq!(by_method("log")["status"], "sent");
}

#[test]
fn demo_guest_acl_denial_exits_with_permission_code() {
    let output = xdm(&["demo", "--acl", "*.trusted.test"]);
    assert_eq!(output.status.code(), Some(50));
    assert!(stdout(&output).is_empty());
}
