use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[tank]
gallons = 150.0

[schedule]
enabled = true
start_hour = 9
end_hour = 17
every_minutes = 60
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[test]
fn schedule_prints_the_slot_table() {
    let mut cmd = Command::cargo_bin("reefdose").unwrap();
    cmd.args([
        "schedule",
        "--start-hour",
        "9",
        "--end-hour",
        "15",
        "--every-minutes",
        "60",
    ]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("slot 0: 09:00"))
        .stdout(predicate::str::contains("slot 5: 14:00"));
}

#[test]
fn schedule_supports_json_output() {
    let mut cmd = Command::cargo_bin("reefdose").unwrap();
    cmd.args(["--json", "schedule", "--start-hour", "22", "--end-hour", "2"]);
    let out = cmd.assert().success().get_output().stdout.clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    let slots = v["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 4);
    assert_eq!(slots[0], "22:00");
    assert_eq!(slots[2], "00:00");
}

#[test]
fn plan_reports_an_adjustment() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let mut cmd = Command::cargo_bin("reefdose").unwrap();
    cmd.args([
        "--config",
        cfg.to_str().unwrap(),
        "--json",
        "plan",
        "--prev",
        "420,9.0,1440,8.2",
        "--cur",
        "418,8.6,1438,8.2",
        "--gap-days",
        "1",
    ]);
    let out = cmd.assert().success().get_output().stdout.clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v["outcome"], "Applied");
    assert!(v["ml_day"]["kalk"].as_f64().unwrap() > 0.0);
}

#[test]
fn plan_rejects_malformed_tests() {
    let mut cmd = Command::cargo_bin("reefdose").unwrap();
    cmd.args(["plan", "--prev", "420,9.0", "--cur", "418,8.6,1438,8.2"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("exactly 4"));
}

#[test]
fn self_check_passes_on_a_fresh_state_dir() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let state = dir.path().join("state.toml");
    let mut cmd = Command::cargo_bin("reefdose").unwrap();
    cmd.args([
        "--config",
        cfg.to_str().unwrap(),
        "--state",
        state.to_str().unwrap(),
        "self-check",
    ]);
    cmd.assert().success().stdout(predicate::str::contains("ok"));
}

#[test]
fn invalid_config_fails_fast() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cfg.toml");
    fs::write(&path, "[tank]\ngallons = -5.0\n").unwrap();
    let mut cmd = Command::cargo_bin("reefdose").unwrap();
    cmd.args(["--config", path.to_str().unwrap(), "self-check"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("gallons"));
}
