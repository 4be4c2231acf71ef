use std::fs::File;
use std::io::Write;

use reef_config::load_flow_csv;
use reef_traits::Pump;
use rstest::rstest;
use tempfile::tempdir;

fn write_csv(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("flow.csv");
    let mut f = File::create(&path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
    (dir, path)
}

#[rstest]
fn loads_per_pump_rates() {
    let (_dir, path) = write_csv("pump,ml_per_min\nkalk,48.5\nafr,51.2\n");
    let rows = load_flow_csv(&path).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].0, Pump::Kalk);
    assert!((rows[0].1 - 48.5).abs() < 1e-6);
    assert_eq!(rows[1].0, Pump::Afr);
}

#[rstest]
fn rejects_wrong_headers() {
    let (_dir, path) = write_csv("pump,flow\nkalk,48.5\n");
    let err = load_flow_csv(&path).unwrap_err().to_string();
    assert!(err.contains("pump,ml_per_min"));
}

#[rstest]
fn rejects_unknown_pump() {
    let (_dir, path) = write_csv("pump,ml_per_min\nkalkwasser,48.5\n");
    let err = load_flow_csv(&path).unwrap_err().to_string();
    assert!(err.contains("unknown pump"));
}

#[rstest]
fn rejects_duplicate_pump() {
    let (_dir, path) = write_csv("pump,ml_per_min\nkalk,48.5\nkalk,50.0\n");
    let err = load_flow_csv(&path).unwrap_err().to_string();
    assert!(err.contains("duplicate"));
}

#[rstest]
fn rejects_nonpositive_rate() {
    let (_dir, path) = write_csv("pump,ml_per_min\nmg,0.0\n");
    assert!(load_flow_csv(&path).is_err());
}
