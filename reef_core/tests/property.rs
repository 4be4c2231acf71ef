//! Property checks on the planner, governor and slot table.

use proptest::prelude::*;
use reef_config::{Config, PlannerTuning};
use reef_core::{
    ChemistryCoefficients, DoseScheduleCfg, DosingPlan, SlotTable, apply_test, enforce_ceilings,
    projected_rates,
};
use reef_core::planner::rate_limited;
use reef_traits::{Pump, WallTime};

fn reference_coeffs() -> ChemistryCoefficients {
    let cfg = Config::default();
    ChemistryCoefficients::for_tank(&cfg.chemistry, cfg.tank.reference_gallons, cfg.tank.gallons)
}

proptest! {
    #[test]
    fn governor_never_exceeds_ceilings(
        kalk in 0.0f32..20_000.0,
        afr in 0.0f32..2_000.0,
        mg in 0.0f32..500.0,
    ) {
        let cfg = Config::default();
        let coeffs = reference_coeffs();
        let mut plan = DosingPlan::zero();
        plan.set(Pump::Kalk, kalk);
        plan.set(Pump::Afr, afr);
        plan.set(Pump::Mg, mg);
        plan.clamp_to(&cfg.safety);

        enforce_ceilings(&mut plan, &coeffs, &cfg.safety);
        let rates = projected_rates(&plan, &coeffs);
        prop_assert!(rates.alk_dkh_day <= cfg.safety.max_alk_dkh_per_day * 1.001);
        prop_assert!(rates.ca_ppm_day <= cfg.safety.max_ca_ppm_per_day * 1.001);
        prop_assert!(rates.mg_ppm_day <= cfg.safety.max_mg_ppm_per_day * 1.001);
    }

    #[test]
    fn governor_scaling_is_uniform(
        kalk in 1.0f32..8_000.0,
        afr in 1.0f32..400.0,
    ) {
        let cfg = Config::default();
        let coeffs = reference_coeffs();
        let mut plan = DosingPlan::zero();
        plan.set(Pump::Kalk, kalk);
        plan.set(Pump::Afr, afr);
        let before = plan;

        if let Some(scale) = enforce_ceilings(&mut plan, &coeffs, &cfg.safety) {
            prop_assert!(scale < 1.0);
            for p in [Pump::Kalk, Pump::Afr] {
                let expected = before.get(p) * scale;
                prop_assert!((plan.get(p) - expected).abs() <= expected * 1e-3 + 1e-3);
            }
        } else {
            prop_assert_eq!(plan, before);
        }
    }

    #[test]
    fn rate_limit_bounds_every_step(
        current in 0.0f32..8_000.0,
        suggested in 0.0f32..50_000.0,
    ) {
        let tuning = PlannerTuning::default();
        let next = rate_limited(current, suggested, &tuning);
        let allowed = (current * tuning.rate_limit_frac).max(tuning.rate_limit_floor_ml);
        prop_assert!((next - current).abs() <= allowed + 1e-3);
        // The step never overshoots past the suggestion.
        if suggested >= current {
            prop_assert!(next <= suggested + 1e-3);
        } else {
            prop_assert!(next >= suggested - 1e-3);
        }
    }

    #[test]
    fn planner_output_stays_within_absolute_maxima(
        alk0 in 4.0f32..15.0,
        alk1 in 4.0f32..15.0,
        ca0 in 250.0f32..600.0,
        ca1 in 250.0f32..600.0,
        mg0 in 800.0f32..2_000.0,
        mg1 in 800.0f32..2_000.0,
        ph in 7.0f32..9.0,
        gap_days in 1u64..10,
        kalk in 0.0f32..8_000.0,
    ) {
        let cfg = Config::default();
        let coeffs = reference_coeffs();
        let prev = reef_core::planner::test_point(
            WallTime::from_day_minute(100, 0), ca0, alk0, mg0, ph, None,
        );
        let cur = reef_core::planner::test_point(
            WallTime::from_day_minute(100 + gap_days, 0), ca1, alk1, mg1, ph, None,
        );
        let mut plan = DosingPlan::defaults();
        plan.set(Pump::Kalk, kalk);
        apply_test(
            Some(&prev), &cur, &mut plan, &coeffs,
            &cfg.targets, &cfg.planner, &cfg.safety,
        );
        prop_assert!(plan.get(Pump::Kalk) >= 0.0);
        prop_assert!(plan.get(Pump::Kalk) <= cfg.safety.max_kalk_ml_day);
        prop_assert!(plan.get(Pump::Afr) >= 0.0);
        prop_assert!(plan.get(Pump::Afr) <= cfg.safety.max_afr_ml_day);
        prop_assert!(plan.get(Pump::Mg) >= 0.0);
        prop_assert!(plan.get(Pump::Mg) <= cfg.safety.max_mg_ml_day);
    }

    #[test]
    fn slot_tables_are_ordered_and_bounded(
        start in 0u8..=23,
        end in 0u8..=23,
        every in 1u16..=240,
    ) {
        let cfg = DoseScheduleCfg { enabled: true, start_hour: start, end_hour: end, every_minutes: every };
        let t = SlotTable::build(&cfg);
        prop_assert!(!t.is_empty());
        prop_assert!(t.len() <= 96);
        // Offsets from window start increase strictly.
        let start_min = u16::from(start) * 60;
        let offsets: Vec<u16> = t
            .times()
            .iter()
            .map(|m| (m + 1440 - start_min) % 1440)
            .collect();
        for w in offsets.windows(2) {
            prop_assert!(w[0] < w[1]);
        }
        // Rebuild under the same config is a fixpoint.
        let rebuilt = SlotTable::rebuild(&cfg, &t);
        prop_assert_eq!(&rebuilt, &t);
    }

    #[test]
    fn current_index_is_monotone_within_a_window(
        start in 0u8..=23,
        end in 0u8..=23,
        every in 1u16..=240,
    ) {
        let cfg = DoseScheduleCfg { enabled: true, start_hour: start, end_hour: end, every_minutes: every };
        let t = SlotTable::build(&cfg);
        let start_min = u16::from(start) * 60;
        let mut last = None;
        for elapsed in 0u16..1440 {
            let minute = (start_min + elapsed) % 1440;
            let idx = t.current_index(minute);
            if elapsed < t.window_minutes() {
                prop_assert!(idx >= last);
                last = idx;
            } else {
                // Between windows nothing is current.
                prop_assert_eq!(idx, None);
            }
        }
    }
}
