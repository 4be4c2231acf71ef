use reef_config::load_toml;

#[test]
fn defaults_validate() {
    let cfg = load_toml("").unwrap();
    cfg.validate().unwrap();
}

#[test]
fn rejects_nonpositive_tank() {
    let cfg = load_toml("[tank]\ngallons = 0.0\n").unwrap();
    let err = cfg.validate().unwrap_err().to_string();
    assert!(err.contains("tank.gallons"));
}

#[test]
fn rejects_kalk_fraction_band_inversion() {
    let cfg = load_toml(
        "[planner]\nkalk_frac_min = 0.9\nkalk_frac_max = 0.7\n",
    )
    .unwrap();
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_backoff_factor_above_one() {
    let cfg = load_toml("[dosing]\nbackoff_factor = 1.5\n").unwrap();
    let err = cfg.validate().unwrap_err().to_string();
    assert!(err.contains("backoff_factor"));
}

#[test]
fn rejects_flow_band_inversion() {
    let cfg = load_toml("[dosing]\nflow_min_ml_min = 6000.0\n").unwrap();
    assert!(cfg.validate().is_err());
}

#[test]
fn partial_override_keeps_other_defaults() {
    let cfg = load_toml("[schedule]\nenabled = true\nstart_hour = 20\n").unwrap();
    assert!(cfg.schedule.enabled);
    assert_eq!(cfg.schedule.start_hour, 20);
    assert_eq!(cfg.schedule.end_hour, 17);
    assert_eq!(cfg.schedule.every_minutes, 60);
    assert_eq!(cfg.safety.max_kalk_ml_day, 8000.0);
}
