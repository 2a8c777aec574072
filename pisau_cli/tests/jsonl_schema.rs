use assert_cmd::prelude::*;
use rstest::rstest;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

fn last_json_line(stdout: &[u8]) -> serde_json::Value {
    let text = String::from_utf8_lossy(stdout);
    let line = text
        .lines()
        .rev()
        .find(|l| l.trim_start().starts_with('{'))
        .expect("a JSON line on stdout");
    serde_json::from_str(line).expect("valid JSON")
}

/// Validate the JSON summary of a simulated run.
#[rstest]
fn run_summary_schema() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, "[timing]\nstatus_hz = 5\nmotor_tick_ms = 100\n").unwrap();

    let out = Command::cargo_bin("pisau")
        .unwrap()
        .arg("--json")
        .arg("--log-level")
        .arg("warn")
        .arg("--config")
        .arg(&cfg)
        .args(["run", "--seconds", "0.5", "--run-switch", "--preset", "medium"])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let v = last_json_line(&out.stdout);
    assert_eq!(v["machine"], "Running");
    assert_eq!(v["status"], "Cutting Board is Clear");
    for key in ["frames", "skipped_frames", "events", "motor_ticks", "status_polls"] {
        assert!(v[key].is_u64(), "{key} missing or not an integer");
    }
    assert!(v["frames"].as_u64().unwrap() >= 1);
    assert!(v["rpm"].as_f64().unwrap() > 0.0);
    assert!(v["temperature_c"].is_number());
}

/// Errors in --json mode are a single object with reason, exit code and chain.
#[rstest]
fn error_schema() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, "inner_width = 400\nouter_width = 300\n").unwrap();

    let out = Command::cargo_bin("pisau")
        .unwrap()
        .arg("--json")
        .arg("--config")
        .arg(&cfg)
        .args(["config", "check"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));

    let v = last_json_line(&out.stdout);
    assert_eq!(v["reason"], "Config");
    assert_eq!(v["exit_code"], 2);
    assert!(v["message"].as_str().unwrap().starts_with("What happened: Invalid configuration"));
    assert!(v["chain"].is_array());
}

#[rstest]
fn zones_json() {
    let out = Command::cargo_bin("pisau")
        .unwrap()
        .arg("--json")
        .arg("--config")
        .arg("does-not-exist.toml")
        .args(["zones", "--width", "640", "--height", "480"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let v = last_json_line(&out.stdout);
    assert_eq!(v["frame"], serde_json::json!([640, 480]));
    assert_eq!(v["outer"][0], serde_json::json!([120, 390]));
    assert_eq!(v["inner"].as_array().unwrap().len(), 4);
}
