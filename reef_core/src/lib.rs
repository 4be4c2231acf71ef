#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Control core of the reef dosing controller (hardware-agnostic).
//!
//! Converts periodic manual water tests into a continuously adjusted daily
//! dosing plan for up to four supplement pumps and executes that plan against
//! real time with crash-safe accounting. All environment interactions go
//! through `reef_traits` seams (`WallClock`, `FloatStore`, `PumpDriver`,
//! `AlertSink`).
//!
//! ## Architecture
//!
//! - **Planner**: test deltas -> rate-limited ml/day targets (`planner`)
//! - **Governor**: uniform scale-down to daily rate ceilings (`governor`)
//! - **Schedule**: dosing window -> slot table (`schedule`)
//! - **Scheduler**: slot-due bucket credit + cooperative pump runs
//!   (`scheduler`, driven by `controller`)
//! - **Backoff**: stale-test plan degradation (`backoff`)
//! - **Controller**: owns `DoserState`, drains the typed command feed,
//!   ticks everything in order (`controller`)
//!
//! The core is single-threaded and tick-driven; nothing here blocks. Every
//! durable value follows persist-then-apply: the store write must succeed
//! before the in-memory value changes.

pub mod alert;
pub mod backoff;
pub mod chemistry;
pub mod command;
pub mod controller;
pub mod error;
pub mod flow;
pub mod governor;
pub mod history;
pub mod mocks;
pub mod persist;
pub mod plan;
pub mod planner;
pub mod schedule;
pub mod scheduler;

pub use alert::Alerter;
pub use chemistry::{ChemistryCoefficients, ProjectedRates, projected_rates};
pub use command::{Command, command_channel};
pub use controller::{Controller, DoserState};
pub use error::{CoreError, Result};
pub use flow::FlowCalibration;
pub use governor::enforce_ceilings;
pub use history::{TestHistory, TestPoint};
pub use plan::DosingPlan;
pub use planner::{PlanOutcome, apply_test};
pub use schedule::{DoseScheduleCfg, SlotTable};
pub use scheduler::{DoseMachine, DoseRun, PendingBuckets, RunLog, RunSource, run_seconds};
