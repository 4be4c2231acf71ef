//! Dosing planner: turns a pair of test results into a rate-limited plan.
//!
//! Validation failures never raise errors; each rejection path is a silent
//! no-op on the plan (the caller has already recorded the test in history),
//! which protects the pumps from fat-finger entries and over-frequent tests.

use crate::chemistry::ChemistryCoefficients;
use crate::history::TestPoint;
use crate::plan::{DosingPlan, pump_max_ml_day};
use reef_config::{PlannerTuning, SafetyCfg, Targets};
use reef_traits::{Pump, WallTime};

/// What one planning cycle did with a submitted test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanOutcome {
    /// Plan adjusted; the caller must run the governor and persist.
    Applied,
    /// No previous test to difference against; history only.
    FirstSample,
    /// A reading fell outside the physiological sanity band; history only.
    RejectedOutOfRange,
    /// Less than the minimum spacing since the previous test; history only.
    RejectedTooSoon,
}

impl PlanOutcome {
    pub fn applied(self) -> bool {
        self == PlanOutcome::Applied
    }
}

/// One planning cycle. Mutates `plan` in place only on `Applied`.
pub fn apply_test(
    prev: Option<&TestPoint>,
    cur: &TestPoint,
    plan: &mut DosingPlan,
    coeffs: &ChemistryCoefficients,
    targets: &Targets,
    tuning: &PlannerTuning,
    safety: &SafetyCfg,
) -> PlanOutcome {
    if !in_sanity_band(cur, tuning) {
        tracing::debug!(
            ca = cur.ca_ppm,
            alk = cur.alk_dkh,
            mg = cur.mg_ppm,
            ph = cur.ph,
            "test outside sanity band; plan untouched"
        );
        return PlanOutcome::RejectedOutOfRange;
    }
    let Some(prev) = prev else {
        return PlanOutcome::FirstSample;
    };
    let days = cur.at.days_since(prev.at);
    if days <= tuning.min_test_gap_days {
        tracing::debug!(days, "tests too close together; plan untouched");
        return PlanOutcome::RejectedTooSoon;
    }

    // Consumption per day; positive means the tank used that much.
    let cons_alk = (prev.alk_dkh - cur.alk_dkh) / days;
    let cons_ca = (prev.ca_ppm - cur.ca_ppm) / days;
    let cons_mg = (prev.mg_ppm - cur.mg_ppm) / days;

    // Rising alkalinity is never a deficit.
    let alk_needed = cons_alk.max(0.0);

    // pH bias: favor the high-pH kalk line when pH runs low, the two-part
    // line when it runs high. Deadband keeps the split from flapping.
    let mut kalk_frac = tuning.kalk_frac_default;
    if cur.ph.is_finite() {
        let ph_error = cur.ph - targets.ph;
        if ph_error <= -tuning.ph_deadband {
            kalk_frac = tuning.kalk_frac_low_ph;
        } else if ph_error >= tuning.ph_deadband {
            kalk_frac = tuning.kalk_frac_high_ph;
        }
    }
    kalk_frac = kalk_frac.clamp(tuning.kalk_frac_min, tuning.kalk_frac_max);

    let alk_from_kalk = kalk_frac * alk_needed;
    let alk_from_afr = (1.0 - kalk_frac) * alk_needed;

    let mut suggested_kalk = if coeffs.kalk_dkh_per_ml > 0.0 {
        alk_from_kalk / coeffs.kalk_dkh_per_ml
    } else {
        0.0
    };
    let mut suggested_afr = if coeffs.afr_dkh_per_ml > 0.0 {
        alk_from_afr / coeffs.afr_dkh_per_ml
    } else {
        0.0
    };

    // Calcium the alkalinity split would already contribute.
    let ca_contributed =
        suggested_kalk * coeffs.kalk_ca_per_ml + suggested_afr * coeffs.afr_ca_per_ml;
    let mg_from_afr = suggested_afr * coeffs.afr_mg_per_ml;

    // Nudge the two-part line toward the residual calcium error.
    let ca_error = cons_ca - ca_contributed;
    if ca_error.abs() > tuning.ca_residual_ppm && coeffs.afr_ca_per_ml > 0.0 {
        suggested_afr += (ca_error / coeffs.afr_ca_per_ml) * tuning.correction_gain;
    }

    // Magnesium-only line covers what the two-part does not.
    let mut suggested_mg = plan.get(Pump::Mg);
    if cons_mg > mg_from_afr + tuning.mg_excess_ppm && coeffs.mg_mg_per_ml > 0.0 {
        suggested_mg += ((cons_mg - mg_from_afr) / coeffs.mg_mg_per_ml) * tuning.correction_gain;
    }

    suggested_kalk = suggested_kalk.max(0.0);
    suggested_afr = suggested_afr.max(0.0);
    suggested_mg = suggested_mg.max(0.0);

    // Rate-limit against the current plan, then clamp to the absolute maxima.
    // The rate limit is the load-bearing invariant here: one noisy test can
    // only move each pump by max(15% of current, 1 ml) per cycle.
    for (pump, suggested) in [
        (Pump::Kalk, suggested_kalk),
        (Pump::Afr, suggested_afr),
        (Pump::Mg, suggested_mg),
    ] {
        let limited = rate_limited(plan.get(pump), suggested, tuning);
        plan.set(pump, limited.clamp(0.0, pump_max_ml_day(safety, pump)));
    }

    tracing::info!(
        days,
        cons_alk,
        cons_ca,
        cons_mg,
        kalk_frac,
        kalk_ml_day = plan.get(Pump::Kalk),
        afr_ml_day = plan.get(Pump::Afr),
        mg_ml_day = plan.get(Pump::Mg),
        "dosing plan adjusted"
    );
    PlanOutcome::Applied
}

/// Move `current` toward `suggested` by at most max(frac * |current|, floor).
pub fn rate_limited(current: f32, suggested: f32, tuning: &PlannerTuning) -> f32 {
    let max_change = (current.abs() * tuning.rate_limit_frac).max(tuning.rate_limit_floor_ml);
    current + (suggested - current).clamp(-max_change, max_change)
}

fn in_sanity_band(tp: &TestPoint, t: &PlannerTuning) -> bool {
    (t.ca_min_ppm..=t.ca_max_ppm).contains(&tp.ca_ppm)
        && (t.alk_min_dkh..=t.alk_max_dkh).contains(&tp.alk_dkh)
        && (t.mg_min_ppm..=t.mg_max_ppm).contains(&tp.mg_ppm)
        && (t.ph_min..=t.ph_max).contains(&tp.ph)
}

/// Convenience constructor used by tests and the CLI.
pub fn test_point(at: WallTime, ca: f32, alk: f32, mg: f32, ph: f32, aux: Option<f32>) -> TestPoint {
    TestPoint {
        at,
        ca_ppm: ca,
        alk_dkh: alk,
        mg_ppm: mg,
        ph,
        aux,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reef_config::ReferenceChemistry;

    fn reference_coeffs() -> ChemistryCoefficients {
        ChemistryCoefficients::for_tank(&ReferenceChemistry::default(), 300.0, 300.0)
    }

    fn baseline_plan() -> DosingPlan {
        let mut plan = DosingPlan::zero();
        plan.set(Pump::Kalk, 2000.0);
        plan.set(Pump::Afr, 20.0);
        plan
    }

    #[test]
    fn low_ph_shifts_alkalinity_toward_kalkwasser() {
        // Ca 420 -> 410, alk 9.0 -> 8.5 over two days with pH a deadband
        // below target: 0.25 dKH/day split 90/10, so kalkwasser is asked
        // for 0.225 / 0.0001 = 2250 ml/day, inside the 300 ml rate limit.
        // The two-part share (~4.8 ml/day) pulls afr down by its 3 ml limit.
        let prev = test_point(WallTime::from_day_minute(100, 600), 420.0, 9.0, 1440.0, 8.20, None);
        let cur = test_point(WallTime::from_day_minute(102, 600), 410.0, 8.5, 1440.0, 8.15, None);
        let mut plan = baseline_plan();
        let outcome = apply_test(
            Some(&prev),
            &cur,
            &mut plan,
            &reference_coeffs(),
            &Targets::default(),
            &PlannerTuning::default(),
            &SafetyCfg::default(),
        );
        assert!(outcome.applied());
        assert!((plan.get(Pump::Kalk) - 2250.0).abs() < 1e-3);
        assert!((plan.get(Pump::Afr) - 17.0).abs() < 1e-3);
    }

    #[test]
    fn high_ph_shifts_alkalinity_toward_two_part() {
        // Same alk deficit read with pH well above target: the 70/30 split
        // asks for more of both lines than the rate limit allows, so each
        // pump moves by exactly its per-cycle maximum.
        let prev = test_point(WallTime::from_day_minute(100, 600), 420.0, 9.0, 1440.0, 8.20, None);
        let cur = test_point(WallTime::from_day_minute(101, 600), 420.0, 8.5, 1440.0, 8.30, None);
        let mut plan = baseline_plan();
        let outcome = apply_test(
            Some(&prev),
            &cur,
            &mut plan,
            &reference_coeffs(),
            &Targets::default(),
            &PlannerTuning::default(),
            &SafetyCfg::default(),
        );
        assert!(outcome.applied());
        assert!((plan.get(Pump::Kalk) - 2300.0).abs() < 1e-3);
        assert!((plan.get(Pump::Afr) - 23.0).abs() < 1e-3);
    }

    #[test]
    fn rate_limit_floor_applies_to_small_plans() {
        let t = PlannerTuning::default();
        // 15% of 2 ml is 0.3 ml, below the 1 ml floor.
        let v = rate_limited(2.0, 10.0, &t);
        assert!((v - 3.0).abs() < 1e-6);
        let v = rate_limited(2.0, 0.0, &t);
        assert!((v - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rate_limit_fraction_applies_to_large_plans() {
        let t = PlannerTuning::default();
        let v = rate_limited(2000.0, 5000.0, &t);
        assert!((v - 2300.0).abs() < 1e-3);
        let v = rate_limited(2000.0, 0.0, &t);
        assert!((v - 1700.0).abs() < 1e-3);
    }
}
