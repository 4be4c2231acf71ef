//! Dose accumulator pieces: pending buckets, the cooperative dose state
//! machine and the bounded run log.
//!
//! The controller drives these; nothing here blocks. A pump run is started
//! by asserting the output and remembering a wall-clock deadline; each tick
//! checks elapsed time and deasserts when due.

use reef_traits::{Pump, WallTime};
use std::collections::VecDeque;

/// Volume credited to each pump but not yet physically dispensed. Carried
/// forward until large enough to actuate; persisted independently of the
/// plan so a crash loses at most the in-flight actuation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingBuckets {
    ml: [f32; Pump::COUNT],
}

impl PendingBuckets {
    pub fn zero() -> Self {
        Self {
            ml: [0.0; Pump::COUNT],
        }
    }

    #[inline]
    pub fn get(&self, pump: Pump) -> f32 {
        self.ml[pump.index()]
    }

    #[inline]
    pub fn set(&mut self, pump: Pump, ml: f32) {
        self.ml[pump.index()] = ml.max(0.0);
    }

    pub fn total(&self) -> f32 {
        self.ml.iter().sum()
    }
}

/// Why a pump run was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunSource {
    /// Slot-due scheduled dose; completion drains the pending bucket.
    Scheduled,
    /// One-shot remote dose, bypassing the schedule.
    Live,
    /// Fixed-duration run for manual flow measurement.
    Calibration,
}

/// Cooperative replacement for a blocking "run pump for N seconds" delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DoseMachine {
    Idle,
    Running {
        pump: Pump,
        /// Volume this run is expected to deliver (informational for
        /// calibration runs).
        ml: f32,
        source: RunSource,
        started: WallTime,
        run_secs: f32,
    },
}

impl DoseMachine {
    pub fn is_idle(&self) -> bool {
        matches!(self, DoseMachine::Idle)
    }

    /// The pump currently being driven, if any.
    pub fn running_pump(&self) -> Option<Pump> {
        match self {
            DoseMachine::Running { pump, .. } => Some(*pump),
            DoseMachine::Idle => None,
        }
    }
}

/// Seconds of pump runtime needed to move `ml` at the calibrated flow.
#[inline]
pub fn run_seconds(ml: f32, flow_ml_min: f32) -> f32 {
    if flow_ml_min > 0.0 {
        ml * 60.0 / flow_ml_min
    } else {
        0.0
    }
}

/// One completed pump run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoseRun {
    pub pump: Pump,
    pub ml: f32,
    pub seconds: f32,
    pub at: WallTime,
    pub source: RunSource,
}

/// Bounded FIFO log of completed runs (remote pruning is out of scope).
#[derive(Debug, Clone)]
pub struct RunLog {
    buf: VecDeque<DoseRun>,
    cap: usize,
}

impl RunLog {
    pub fn new(cap: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(cap.max(1)),
            cap: cap.max(1),
        }
    }

    pub fn push(&mut self, run: DoseRun) {
        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(run);
    }

    pub fn iter(&self) -> impl Iterator<Item = &DoseRun> {
        self.buf.iter()
    }

    pub fn last(&self) -> Option<&DoseRun> {
        self.buf.back()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Total volume delivered by scheduled runs, for accounting checks.
    pub fn scheduled_ml(&self) -> f32 {
        self.buf
            .iter()
            .filter(|r| r.source == RunSource::Scheduled)
            .map(|r| r.ml)
            .sum()
    }
}
