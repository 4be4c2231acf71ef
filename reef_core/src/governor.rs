//! Safety governor: uniform scale-down to daily rate-of-change ceilings.
//!
//! Runs as the terminal step of every path that can change the plan
//! (planner, backoff, reset) so no caller can bypass the ceilings.

use crate::chemistry::{ChemistryCoefficients, projected_rates};
use crate::plan::DosingPlan;
use reef_config::SafetyCfg;

/// Scale the whole plan down so no ion's projected daily change exceeds its
/// ceiling. Returns the applied scale when the plan was shrunk. Never
/// amplifies: the result scale is always <= 1.
pub fn enforce_ceilings(
    plan: &mut DosingPlan,
    coeffs: &ChemistryCoefficients,
    safety: &SafetyCfg,
) -> Option<f32> {
    let rates = projected_rates(plan, coeffs);
    let mut scale = 1.0f32;
    for (projected, ceiling) in [
        (rates.alk_dkh_day, safety.max_alk_dkh_per_day),
        (rates.ca_ppm_day, safety.max_ca_ppm_per_day),
        (rates.mg_ppm_day, safety.max_mg_ppm_per_day),
    ] {
        if ceiling > 0.0 && projected > ceiling {
            scale = scale.min(ceiling / projected);
        }
    }
    if scale < 1.0 {
        plan.scale(scale);
        plan.clamp_to(safety);
        tracing::warn!(
            scale,
            alk_dkh_day = rates.alk_dkh_day,
            ca_ppm_day = rates.ca_ppm_day,
            mg_ppm_day = rates.mg_ppm_day,
            "safety governor scaled plan down"
        );
        Some(scale)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reef_traits::Pump;

    fn coeffs() -> ChemistryCoefficients {
        ChemistryCoefficients {
            kalk_dkh_per_ml: 0.0001,
            kalk_ca_per_ml: 0.0007,
            afr_dkh_per_ml: 0.0052,
            afr_ca_per_ml: 0.037,
            afr_mg_per_ml: 0.006,
            mg_mg_per_ml: 0.2,
        }
    }

    #[test]
    fn in_bounds_plan_is_untouched() {
        let safety = SafetyCfg::default();
        let mut plan = DosingPlan::defaults();
        let before = plan;
        assert!(enforce_ceilings(&mut plan, &coeffs(), &safety).is_none());
        assert_eq!(plan, before);
    }

    #[test]
    fn over_ceiling_plan_is_scaled_to_the_worst_ion() {
        let safety = SafetyCfg::default();
        let mut plan = DosingPlan::zero();
        // 400 ml/day of two-part projects 2.08 dKH/day, over the 1.0 ceiling.
        plan.set(Pump::Afr, 400.0);
        let scale = enforce_ceilings(&mut plan, &coeffs(), &safety)
            .expect("governor must intervene");
        assert!(scale < 1.0);
        let rates = projected_rates(&plan, &coeffs());
        assert!(rates.alk_dkh_day <= safety.max_alk_dkh_per_day + 1e-4);
    }
}
