#![cfg(all(unix, feature = "cli"))]

use std::path::PathBuf;
use std::process::{Command, Output};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "eshim-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn eshim(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_eshim"))
        .env_remove("ESHIM_CONFIG")
        .env_remove("ESHIM_LOG")
        .arg("--log-level")
        .arg("error")
        .args(args)
        .output()
        .expect("eshim should run")
}

fn write_config(tag: &str, body: &str) -> (PathBuf, PathBuf) {
    let dir = unique_temp_dir(tag);
    let path = dir.join("exthw.json");
    std::fs::write(&path, body).expect("config should be writable");
    (dir, path)
}

#[test]
fn version_prints_package_version() {
    let output = eshim(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("eshim {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn version_extended_lists_build_details() {
    let output = eshim(&["version", "--extended"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("name: eshim"));
    assert!(stdout.contains("target_os:"));
}

#[test]
fn decode_reports_status_and_values_as_json() {
    let output = eshim(&[
        "--format",
        "json",
        "decode",
        "5A A5 40 25 01 00 00 00 DE AD 5A A5 40 22 30 00 00 00",
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("decode output should be json");
    let frames = json.as_array().expect("decode output should be an array");
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0]["register"], "status");
    assert_eq!(frames[0]["decoded"], "running, coil: Resistive");
    assert_eq!(frames[1]["register"], "bus_voltage");
    assert_eq!(frames[1]["value"], 48);
}

#[test]
fn decode_in_chinese() {
    let output = eshim(&[
        "--format",
        "json",
        "decode",
        "--language",
        "zh",
        "5AA5401102000000",
    ]);
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(json[0]["register"], "ch2.error");
    assert_eq!(json[0]["decoded"], "过功率");
}

#[test]
fn decode_without_replies_is_data_invalid() {
    let output = eshim(&["decode", "A5 5A 20 25 00 00 00 00"]);
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn status_with_disabled_config_prints_link_fields() {
    let (dir, path) = write_config("disabled", r#"{"eshim":{"enabled":false}}"#);
    let output = eshim(&["--format", "json", "status", "--config", path.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(78));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(json["enabled"], false);
    assert_eq!(json["connected"], false);
    assert_eq!(json.as_object().map(|o| o.len()), Some(3));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn status_with_missing_port_reports_transport_error() {
    let output = eshim(&[
        "--format",
        "json",
        "status",
        "--config",
        "/nonexistent/exthw.json",
        "--port",
        "/nonexistent/ttyESHIM0",
    ]);

    assert_eq!(output.status.code(), Some(3));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(json["enabled"], true);
    assert_eq!(json["connected"], false);
    assert!(!json["lastError"].as_str().unwrap_or_default().is_empty());
}

#[test]
fn set_current_validates_before_config() {
    let output = eshim(&["set-current", "7", "100", "--config", "/nonexistent/exthw.json"]);
    assert_eq!(output.status.code(), Some(64));

    let output = eshim(&["set-current", "1", "6000", "--config", "/nonexistent/exthw.json"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn commands_on_disabled_device_exit_with_config_code() {
    let (dir, path) = write_config("cmds", r#"{"eshim":{"enabled":false}}"#);
    let config = path.to_str().unwrap();

    for args in [
        vec!["set-current", "1", "100", "--config", config],
        vec!["set-limit", "out-voltage", "24", "--config", config],
        vec!["power", "on", "--config", config],
        vec!["clear", "--config", config],
        vec!["monitor", "--count", "1", "--config", config],
    ] {
        let output = eshim(&args);
        assert_eq!(output.status.code(), Some(78), "args: {args:?}");
        assert!(String::from_utf8_lossy(&output.stderr).contains("disabled"));
    }

    let _ = std::fs::remove_dir_all(&dir);
}
