#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and flow-calibration parsing for the reef dosing system.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - All empirically tuned knobs (pH bias fractions, rate-limit constants,
//!   daily rate ceilings, sanity bands) live here rather than as code
//!   constants; their defaults are the values proven on the reference
//!   300-gallon system and are intentional tuning, not targets for "fixing".
//! - Flow calibration CSV loader enforces headers and pump-name validity.

use reef_traits::Pump;
use serde::Deserialize;

/// Tank geometry. Chemistry coefficients are specified at `reference_gallons`
/// and rescaled inversely with the actual volume.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TankCfg {
    pub gallons: f32,
    pub reference_gallons: f32,
}

impl Default for TankCfg {
    fn default() -> Self {
        Self {
            gallons: 300.0,
            reference_gallons: 300.0,
        }
    }
}

/// Water chemistry setpoints.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Targets {
    pub alk_dkh: f32,
    pub ca_ppm: f32,
    pub mg_ppm: f32,
    pub ph: f32,
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            alk_dkh: 9.0,
            ca_ppm: 420.0,
            mg_ppm: 1440.0,
            ph: 8.20,
        }
    }
}

/// Per-ml chemical impact of each supplement at the reference tank volume.
/// Ballpark figures for saturated kalkwasser, a two-part balanced solution
/// and a magnesium-only solution; the planner tunes ml/day around them.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ReferenceChemistry {
    pub kalk_dkh_per_ml: f32,
    pub kalk_ca_per_ml: f32,
    pub afr_dkh_per_ml: f32,
    pub afr_ca_per_ml: f32,
    pub afr_mg_per_ml: f32,
    pub mg_mg_per_ml: f32,
}

impl Default for ReferenceChemistry {
    fn default() -> Self {
        Self {
            kalk_dkh_per_ml: 0.000_10,
            kalk_ca_per_ml: 0.000_70,
            afr_dkh_per_ml: 0.005_2,
            afr_ca_per_ml: 0.037,
            afr_mg_per_ml: 0.006,
            mg_mg_per_ml: 0.20,
        }
    }
}

/// Absolute per-pump daily maxima and projected rate-of-change ceilings.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SafetyCfg {
    pub max_kalk_ml_day: f32,
    pub max_afr_ml_day: f32,
    pub max_mg_ml_day: f32,
    pub max_aux_ml_day: f32,
    /// Projected alkalinity swing ceiling (dKH per day).
    pub max_alk_dkh_per_day: f32,
    /// Projected calcium swing ceiling (ppm per day).
    pub max_ca_ppm_per_day: f32,
    /// Projected magnesium swing ceiling (ppm per day).
    pub max_mg_ppm_per_day: f32,
}

impl Default for SafetyCfg {
    fn default() -> Self {
        Self {
            max_kalk_ml_day: 8000.0,
            max_afr_ml_day: 400.0,
            max_mg_ml_day: 80.0,
            max_aux_ml_day: 200.0,
            max_alk_dkh_per_day: 1.0,
            max_ca_ppm_per_day: 20.0,
            max_mg_ppm_per_day: 50.0,
        }
    }
}

/// Planner tuning: pH bias, rate limiting, residual corrections and the
/// physiological sanity bands that reject fat-finger test entries.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PlannerTuning {
    /// Minimum spacing between tests used for planning (fraction of a day).
    pub min_test_gap_days: f32,
    /// pH deadband around the target before the kalk fraction shifts.
    pub ph_deadband: f32,
    pub kalk_frac_default: f32,
    pub kalk_frac_low_ph: f32,
    pub kalk_frac_high_ph: f32,
    pub kalk_frac_min: f32,
    pub kalk_frac_max: f32,
    /// Per-cycle change limit as a fraction of the current ml/day.
    pub rate_limit_frac: f32,
    /// Per-cycle change limit floor in ml.
    pub rate_limit_floor_ml: f32,
    /// Calcium residual (ppm/day) beyond which the two-part volume is nudged.
    pub ca_residual_ppm: f32,
    /// Magnesium excess (ppm/day) beyond which the Mg pump is nudged.
    pub mg_excess_ppm: f32,
    /// Fraction of a residual applied per cycle.
    pub correction_gain: f32,
    // Sanity bands: readings outside these never touch the plan.
    pub ca_min_ppm: f32,
    pub ca_max_ppm: f32,
    pub alk_min_dkh: f32,
    pub alk_max_dkh: f32,
    pub mg_min_ppm: f32,
    pub mg_max_ppm: f32,
    pub ph_min: f32,
    pub ph_max: f32,
}

impl Default for PlannerTuning {
    fn default() -> Self {
        Self {
            min_test_gap_days: 0.25,
            ph_deadband: 0.05,
            kalk_frac_default: 0.80,
            kalk_frac_low_ph: 0.90,
            kalk_frac_high_ph: 0.70,
            kalk_frac_min: 0.60,
            kalk_frac_max: 0.95,
            rate_limit_frac: 0.15,
            rate_limit_floor_ml: 1.0,
            ca_residual_ppm: 5.0,
            mg_excess_ppm: 0.5,
            correction_gain: 0.3,
            ca_min_ppm: 250.0,
            ca_max_ppm: 600.0,
            alk_min_dkh: 4.0,
            alk_max_dkh: 15.0,
            mg_min_ppm: 800.0,
            mg_max_ppm: 2000.0,
            ph_min: 7.0,
            ph_max: 9.0,
        }
    }
}

/// Default dosing window. The persisted schedule, when present, wins.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScheduleCfg {
    pub enabled: bool,
    pub start_hour: u8,
    pub end_hour: u8,
    pub every_minutes: u16,
}

impl Default for ScheduleCfg {
    fn default() -> Self {
        Self {
            enabled: false,
            start_hour: 9,
            end_hour: 17,
            every_minutes: 60,
        }
    }
}

/// Runtime dosing knobs: actuation floor, calibration cap, backoff policy,
/// alert cooldown and flow sanity bounds.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct DosingCfg {
    /// Minimum pump run worth actuating (seconds); shorter amounts carry.
    pub min_run_secs: f32,
    /// Hard cap on a manual calibration run (seconds).
    pub calibrate_cap_secs: f32,
    /// Degrade the plan when no valid test for this many days.
    pub backoff_after_days: f32,
    /// Multiplier applied on each backoff step.
    pub backoff_factor: f32,
    /// Minimum days between consecutive backoff steps.
    pub min_backoff_gap_days: f32,
    /// Per-category alert cooldown (seconds).
    pub alert_cooldown_secs: u64,
    /// Flow assumed when no calibration was ever stored (ml/min).
    pub fallback_flow_ml_min: f32,
    /// Physical sanity bounds for flow calibration (ml/min).
    pub flow_min_ml_min: f32,
    pub flow_max_ml_min: f32,
    /// Bounded history / run-log capacities.
    pub history_capacity: usize,
    pub run_log_capacity: usize,
}

impl Default for DosingCfg {
    fn default() -> Self {
        Self {
            min_run_secs: 2.0,
            calibrate_cap_secs: 120.0,
            backoff_after_days: 5.0,
            backoff_factor: 0.7,
            min_backoff_gap_days: 1.0,
            alert_cooldown_secs: 30 * 60,
            fallback_flow_ml_min: 50.0,
            flow_min_ml_min: 30.0,
            flow_max_ml_min: 5000.0,
            history_capacity: 64,
            run_log_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub tank: TankCfg,
    pub targets: Targets,
    pub chemistry: ReferenceChemistry,
    pub safety: SafetyCfg,
    pub planner: PlannerTuning,
    pub schedule: ScheduleCfg,
    pub dosing: DosingCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Tank
        if !(self.tank.gallons > 0.0) {
            eyre::bail!("tank.gallons must be > 0");
        }
        if !(self.tank.reference_gallons > 0.0) {
            eyre::bail!("tank.reference_gallons must be > 0");
        }

        // Chemistry: strictly non-negative impacts
        let c = &self.chemistry;
        for (name, v) in [
            ("kalk_dkh_per_ml", c.kalk_dkh_per_ml),
            ("kalk_ca_per_ml", c.kalk_ca_per_ml),
            ("afr_dkh_per_ml", c.afr_dkh_per_ml),
            ("afr_ca_per_ml", c.afr_ca_per_ml),
            ("afr_mg_per_ml", c.afr_mg_per_ml),
            ("mg_mg_per_ml", c.mg_mg_per_ml),
        ] {
            if !v.is_finite() || v < 0.0 {
                eyre::bail!("chemistry.{name} must be finite and >= 0");
            }
        }

        // Safety
        let s = &self.safety;
        for (name, v) in [
            ("max_kalk_ml_day", s.max_kalk_ml_day),
            ("max_afr_ml_day", s.max_afr_ml_day),
            ("max_mg_ml_day", s.max_mg_ml_day),
            ("max_aux_ml_day", s.max_aux_ml_day),
        ] {
            if !v.is_finite() || v < 0.0 {
                eyre::bail!("safety.{name} must be finite and >= 0");
            }
        }
        for (name, v) in [
            ("max_alk_dkh_per_day", s.max_alk_dkh_per_day),
            ("max_ca_ppm_per_day", s.max_ca_ppm_per_day),
            ("max_mg_ppm_per_day", s.max_mg_ppm_per_day),
        ] {
            if !v.is_finite() || v <= 0.0 {
                eyre::bail!("safety.{name} must be > 0");
            }
        }

        // Planner tuning: structural sanity only; the values themselves are
        // deliberate home-aquarium heuristics and are not second-guessed.
        let p = &self.planner;
        if !(p.min_test_gap_days > 0.0) {
            eyre::bail!("planner.min_test_gap_days must be > 0");
        }
        if !(p.ph_deadband >= 0.0) {
            eyre::bail!("planner.ph_deadband must be >= 0");
        }
        if !(0.0 < p.kalk_frac_min && p.kalk_frac_min <= p.kalk_frac_max && p.kalk_frac_max <= 1.0)
        {
            eyre::bail!("planner kalk_frac bounds must satisfy 0 < min <= max <= 1");
        }
        if !(p.rate_limit_frac > 0.0 && p.rate_limit_frac < 1.0) {
            eyre::bail!("planner.rate_limit_frac must be in (0, 1)");
        }
        if !(p.rate_limit_floor_ml > 0.0) {
            eyre::bail!("planner.rate_limit_floor_ml must be > 0");
        }
        if !(p.correction_gain > 0.0 && p.correction_gain <= 1.0) {
            eyre::bail!("planner.correction_gain must be in (0, 1]");
        }
        for (name, lo, hi) in [
            ("ca", p.ca_min_ppm, p.ca_max_ppm),
            ("alk", p.alk_min_dkh, p.alk_max_dkh),
            ("mg", p.mg_min_ppm, p.mg_max_ppm),
            ("ph", p.ph_min, p.ph_max),
        ] {
            if !(lo.is_finite() && hi.is_finite() && lo < hi) {
                eyre::bail!("planner sanity band for {name} must satisfy min < max");
            }
        }

        // Schedule
        if self.schedule.start_hour > 23 || self.schedule.end_hour > 23 {
            eyre::bail!("schedule hours must be in [0, 23]");
        }
        if self.schedule.every_minutes == 0 {
            eyre::bail!("schedule.every_minutes must be >= 1");
        }

        // Dosing runtime
        let d = &self.dosing;
        if !(d.min_run_secs > 0.0) {
            eyre::bail!("dosing.min_run_secs must be > 0");
        }
        if !(d.calibrate_cap_secs > 0.0) {
            eyre::bail!("dosing.calibrate_cap_secs must be > 0");
        }
        if !(d.backoff_after_days > 0.0) {
            eyre::bail!("dosing.backoff_after_days must be > 0");
        }
        if !(d.backoff_factor > 0.0 && d.backoff_factor <= 1.0) {
            eyre::bail!("dosing.backoff_factor must be in (0, 1]");
        }
        if !(d.min_backoff_gap_days > 0.0) {
            eyre::bail!("dosing.min_backoff_gap_days must be > 0");
        }
        if !(d.flow_min_ml_min > 0.0 && d.flow_min_ml_min < d.flow_max_ml_min) {
            eyre::bail!("dosing flow bounds must satisfy 0 < min < max");
        }
        if !(d.fallback_flow_ml_min >= d.flow_min_ml_min
            && d.fallback_flow_ml_min <= d.flow_max_ml_min)
        {
            eyre::bail!("dosing.fallback_flow_ml_min must lie within the flow bounds");
        }
        if d.history_capacity == 0 {
            eyre::bail!("dosing.history_capacity must be >= 1");
        }
        if d.run_log_capacity == 0 {
            eyre::bail!("dosing.run_log_capacity must be >= 1");
        }

        Ok(())
    }
}

/// Flow calibration CSV schema.
///
/// Expected headers:
/// pump,ml_per_min
///
/// Example:
/// pump,ml_per_min
/// kalk,48.5
/// afr,51.2
#[derive(Debug, Deserialize, Clone)]
pub struct FlowRow {
    pub pump: String,
    pub ml_per_min: f32,
}

pub fn load_flow_csv(path: &std::path::Path) -> eyre::Result<Vec<(Pump, f32)>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open flow CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["pump", "ml_per_min"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "flow CSV must have headers 'pump,ml_per_min', got: {}",
            actual.join(",")
        );
    }

    let mut out: Vec<(Pump, f32)> = Vec::new();
    for (idx, rec) in rdr.deserialize::<FlowRow>().enumerate() {
        let row = rec.map_err(|e| eyre::eyre!("invalid CSV row {}: {}", idx + 2, e))?;
        let pump = Pump::from_label(row.pump.trim()).ok_or_else(|| {
            eyre::eyre!(
                "row {}: unknown pump '{}' (expected kalk|afr|mg|aux)",
                idx + 2,
                row.pump
            )
        })?;
        if out.iter().any(|(p, _)| *p == pump) {
            eyre::bail!("row {}: duplicate pump '{}'", idx + 2, pump);
        }
        if !row.ml_per_min.is_finite() || row.ml_per_min <= 0.0 {
            eyre::bail!("row {}: ml_per_min must be finite and > 0", idx + 2);
        }
        out.push((pump, row.ml_per_min));
    }
    Ok(out)
}
