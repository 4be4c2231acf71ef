#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Host-side implementations of the `reef_traits` seams: simulated pump
//! outputs, the system wall clock, a TOML-backed float store and a
//! log-only alert sink. GPIO relay outputs sit behind the `hardware`
//! feature for Raspberry Pi deployments.

pub mod error;
pub mod store;

pub use error::HwError;
pub use store::TomlStore;

use reef_traits::{AlertSink, Pump, PumpDriver, Severity, WallClock, WallTime};
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall time before this is treated as "clock not yet set" (2020-01-01).
const MIN_PLAUSIBLE_UNIX: u64 = 1_577_836_800;

/// Simulated pump driver: tracks output levels and logs transitions.
#[derive(Default)]
pub struct SimulatedPump {
    active: [bool; Pump::COUNT],
}

impl SimulatedPump {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, pump: Pump) -> bool {
        self.active[pump.index()]
    }
}

impl PumpDriver for SimulatedPump {
    fn set_active(
        &mut self,
        pump: Pump,
        active: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.active[pump.index()] != active {
            tracing::info!(pump = %pump, active, "pump output (simulated)");
        }
        self.active[pump.index()] = active;
        Ok(())
    }
}

/// Real wall clock; reports `None` until system time looks plausible so the
/// scheduler waits out an unsynchronized clock after boot.
#[derive(Default, Clone, Copy)]
pub struct SystemWallClock;

impl WallClock for SystemWallClock {
    fn now(&self) -> Option<WallTime> {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()?
            .as_secs();
        (secs >= MIN_PLAUSIBLE_UNIX).then(|| WallTime::from_unix(secs))
    }
}

/// Alert sink that reports through the tracing pipeline.
#[derive(Default, Clone, Copy)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn send(&mut self, severity: Severity, category: &str, message: &str) {
        match severity {
            Severity::Info => tracing::info!(category, message, "alert"),
            Severity::Warning => tracing::warn!(category, message, "alert"),
            Severity::Critical => tracing::error!(category, message, "alert"),
        }
    }
}

#[cfg(feature = "hardware")]
pub use relay::RelayPumps;

#[cfg(feature = "hardware")]
mod relay {
    use crate::error::HwError;
    use reef_traits::{Pump, PumpDriver};
    use rppal::gpio::{Gpio, OutputPin};

    /// Four relay-driven pump heads on GPIO outputs. Relays are active-high;
    /// construction leaves every output low.
    pub struct RelayPumps {
        pins: [OutputPin; Pump::COUNT],
    }

    impl RelayPumps {
        pub fn new(bcm_pins: [u8; Pump::COUNT]) -> Result<Self, HwError> {
            let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
            let mut out = Vec::with_capacity(Pump::COUNT);
            for pin in bcm_pins {
                let mut p = gpio
                    .get(pin)
                    .map_err(|e| HwError::Gpio(e.to_string()))?
                    .into_output();
                p.set_low();
                out.push(p);
            }
            let pins: [OutputPin; Pump::COUNT] = out
                .try_into()
                .map_err(|_| HwError::Gpio("pin array size mismatch".into()))?;
            Ok(Self { pins })
        }
    }

    impl PumpDriver for RelayPumps {
        fn set_active(
            &mut self,
            pump: Pump,
            active: bool,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            let pin = &mut self.pins[pump.index()];
            if active {
                pin.set_high();
            } else {
                pin.set_low();
            }
            tracing::debug!(pump = %pump, active, "relay output");
            Ok(())
        }
    }

    impl Drop for RelayPumps {
        fn drop(&mut self) {
            for pin in &mut self.pins {
                pin.set_low();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_pump_tracks_levels() {
        let mut p = SimulatedPump::new();
        p.set_active(Pump::Kalk, true).unwrap();
        assert!(p.is_active(Pump::Kalk));
        assert!(!p.is_active(Pump::Afr));
        p.all_off().unwrap();
        assert!(!p.is_active(Pump::Kalk));
    }

    #[test]
    fn system_clock_is_plausible() {
        // CI hosts have NTP; a None here means a badly broken environment.
        let t = SystemWallClock.now();
        assert!(t.is_some());
    }
}
