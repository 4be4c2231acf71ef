//! Daily dosing plan: target ml/day per pump.

use reef_config::SafetyCfg;
use reef_traits::Pump;

/// Per-pump target daily volumes. Mutated only by the planner, the safety
/// governor, the backoff monitor and explicit reset; each field stays in
/// [0, per-pump max] and is persisted write-through after every mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DosingPlan {
    ml_day: [f32; Pump::COUNT],
}

impl DosingPlan {
    pub fn zero() -> Self {
        Self {
            ml_day: [0.0; Pump::COUNT],
        }
    }

    /// Conservative factory plan: 2 L/day kalk, a trickle of two-part,
    /// no magnesium or auxiliary dosing until tests justify it.
    pub fn defaults() -> Self {
        let mut p = Self::zero();
        p.set(Pump::Kalk, 2000.0);
        p.set(Pump::Afr, 20.0);
        p
    }

    #[inline]
    pub fn get(&self, pump: Pump) -> f32 {
        self.ml_day[pump.index()]
    }

    #[inline]
    pub fn set(&mut self, pump: Pump, ml_day: f32) {
        self.ml_day[pump.index()] = ml_day;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Pump, f32)> + '_ {
        Pump::ALL.iter().map(|p| (*p, self.get(*p)))
    }

    /// Multiply every pump's target by `factor`.
    pub fn scale(&mut self, factor: f32) {
        for v in &mut self.ml_day {
            *v *= factor;
        }
    }

    /// Clamp every pump into [0, its absolute daily maximum].
    pub fn clamp_to(&mut self, safety: &SafetyCfg) {
        for p in Pump::ALL {
            let v = self.get(p).clamp(0.0, pump_max_ml_day(safety, p));
            self.set(p, v);
        }
    }
}

/// Absolute daily maximum for one pump.
pub fn pump_max_ml_day(safety: &SafetyCfg, pump: Pump) -> f32 {
    match pump {
        Pump::Kalk => safety.max_kalk_ml_day,
        Pump::Afr => safety.max_afr_ml_day,
        Pump::Mg => safety.max_mg_ml_day,
        Pump::Aux => safety.max_aux_ml_day,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_respects_per_pump_maxima() {
        let safety = SafetyCfg::default();
        let mut plan = DosingPlan::zero();
        plan.set(Pump::Kalk, 1e9);
        plan.set(Pump::Afr, -5.0);
        plan.set(Pump::Mg, 42.0);
        plan.clamp_to(&safety);
        assert_eq!(plan.get(Pump::Kalk), safety.max_kalk_ml_day);
        assert_eq!(plan.get(Pump::Afr), 0.0);
        assert_eq!(plan.get(Pump::Mg), 42.0);
    }

    #[test]
    fn scale_is_uniform() {
        let mut plan = DosingPlan::defaults();
        plan.scale(0.5);
        assert_eq!(plan.get(Pump::Kalk), 1000.0);
        assert_eq!(plan.get(Pump::Afr), 10.0);
    }
}
