//! Tank-scaled chemistry model.
//!
//! Reference coefficients describe the per-ml impact of each supplement at
//! the reference tank volume; an actual tank dilutes that impact inversely
//! with volume, so coefficients scale by `reference_gallons / gallons`.

use crate::plan::DosingPlan;
use reef_config::ReferenceChemistry;
use reef_traits::Pump;

/// Per-pump per-ion impact factors for the actual tank. Strictly non-negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChemistryCoefficients {
    pub kalk_dkh_per_ml: f32,
    pub kalk_ca_per_ml: f32,
    pub afr_dkh_per_ml: f32,
    pub afr_ca_per_ml: f32,
    pub afr_mg_per_ml: f32,
    pub mg_mg_per_ml: f32,
}

impl ChemistryCoefficients {
    /// Rescale reference coefficients to the given tank volume.
    pub fn for_tank(reference: &ReferenceChemistry, reference_gallons: f32, gallons: f32) -> Self {
        let k = if gallons > 0.0 {
            (reference_gallons / gallons).max(0.0)
        } else {
            0.0
        };
        Self {
            kalk_dkh_per_ml: reference.kalk_dkh_per_ml * k,
            kalk_ca_per_ml: reference.kalk_ca_per_ml * k,
            afr_dkh_per_ml: reference.afr_dkh_per_ml * k,
            afr_ca_per_ml: reference.afr_ca_per_ml * k,
            afr_mg_per_ml: reference.afr_mg_per_ml * k,
            mg_mg_per_ml: reference.mg_mg_per_ml * k,
        }
    }
}

/// Projected daily concentration change if the plan runs for one full day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedRates {
    pub alk_dkh_day: f32,
    pub ca_ppm_day: f32,
    pub mg_ppm_day: f32,
}

pub fn projected_rates(plan: &DosingPlan, c: &ChemistryCoefficients) -> ProjectedRates {
    let kalk = plan.get(Pump::Kalk);
    let afr = plan.get(Pump::Afr);
    let mg = plan.get(Pump::Mg);
    ProjectedRates {
        alk_dkh_day: kalk * c.kalk_dkh_per_ml + afr * c.afr_dkh_per_ml,
        ca_ppm_day: kalk * c.kalk_ca_per_ml + afr * c.afr_ca_per_ml,
        mg_ppm_day: afr * c.afr_mg_per_ml + mg * c.mg_mg_per_ml,
    }
}
