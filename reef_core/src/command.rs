//! Typed command feed.
//!
//! The remote transport (an HTTP key/value channel) is out of core scope;
//! whatever the boundary deserializer produces arrives here as one of these
//! variants over a crossbeam channel, drained by the controller once per
//! tick. The core never sees raw payload strings.

use crate::schedule::DoseScheduleCfg;
use crossbeam_channel::{Receiver, Sender, unbounded};
use reef_traits::Pump;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Reinitialize the plan to factory defaults; clear history, pending
    /// buckets and the backoff timer.
    ResetAi,
    /// A manually entered water test.
    SubmitTest {
        ca_ppm: f32,
        alk_dkh: f32,
        mg_ppm: f32,
        ph: f32,
        aux: Option<f32>,
    },
    /// One-shot dose of a specific volume, bypassing the schedule but still
    /// subject to the kill switch and flow calibration.
    LiveDose { pump: Pump, ml: f32 },
    /// Run a pump for a fixed duration for manual flow measurement.
    Calibrate { pump: Pump, seconds: f32 },
    /// Replace the dosing window; a no-op when identical to the current one.
    SetSchedule(DoseScheduleCfg),
    /// Rescale chemistry coefficients to a new tank volume.
    SetTankSize { gallons: f32 },
    /// Update one pump's flow calibration (sanity-banded).
    SetFlow { pump: Pump, ml_per_min: f32 },
    /// Emergency stop: true refuses and aborts all actuation immediately.
    KillSwitch(bool),
}

/// Unbounded channel feeding the single control thread.
pub fn command_channel() -> (Sender<Command>, Receiver<Command>) {
    unbounded()
}
