//! Per-pump flow calibration (ml per minute).

use reef_traits::Pump;

/// Calibrated pump flow rates. Updates outside the physical sanity band are
/// rejected in favor of the last-known-good value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowCalibration {
    ml_min: [f32; Pump::COUNT],
}

impl FlowCalibration {
    pub fn uniform(ml_min: f32) -> Self {
        Self {
            ml_min: [ml_min; Pump::COUNT],
        }
    }

    #[inline]
    pub fn get(&self, pump: Pump) -> f32 {
        self.ml_min[pump.index()]
    }

    /// Accept a new rate only inside [min, max]; returns whether it applied.
    pub fn try_set(&mut self, pump: Pump, ml_min: f32, min: f32, max: f32) -> bool {
        if ml_min.is_finite() && (min..=max).contains(&ml_min) {
            self.ml_min[pump.index()] = ml_min;
            true
        } else {
            tracing::warn!(
                pump = %pump,
                ml_min,
                "flow calibration outside sane bounds; keeping last-known-good"
            );
            false
        }
    }

    /// Unconditional set for values loaded from the persistent store, which
    /// still get banded: out-of-band persisted values fall back to `fallback`.
    pub fn set_banded(&mut self, pump: Pump, ml_min: f32, min: f32, max: f32, fallback: f32) {
        let v = if ml_min.is_finite() && (min..=max).contains(&ml_min) {
            ml_min
        } else {
            fallback
        };
        self.ml_min[pump.index()] = v;
    }
}
