//! Tick-driven controller owning all mutable dosing state.
//!
//! Single-threaded and cooperative: one `tick()` drains the typed command
//! feed, advances the dose state machine, rolls the dosing window, services
//! the due slot and runs the backoff monitor. Actuation never blocks; a
//! pump run is a wall-clock deadline checked on each tick.

use crate::alert::Alerter;
use crate::backoff;
use crate::chemistry::ChemistryCoefficients;
use crate::command::Command;
use crate::error::CoreError;
use crate::flow::FlowCalibration;
use crate::governor;
use crate::history::{TestHistory, TestPoint};
use crate::persist;
use crate::plan::DosingPlan;
use crate::planner;
use crate::schedule::{DoseScheduleCfg, SlotTable};
use crate::scheduler::{DoseMachine, DoseRun, PendingBuckets, RunLog, RunSource, run_seconds};
use crossbeam_channel::{Receiver, TryRecvError};
use reef_config::Config;
use reef_traits::{AlertSink, FloatStore, Pump, PumpDriver, Severity, WallClock, WallTime};
use std::collections::VecDeque;

/// All long-lived mutable state, owned in one place so components can be
/// exercised against an isolated instance in tests.
#[derive(Debug, Clone)]
pub struct DoserState {
    pub plan: DosingPlan,
    pub buckets: PendingBuckets,
    pub flow: FlowCalibration,
    pub schedule_cfg: DoseScheduleCfg,
    pub slots: SlotTable,
    /// Day ordinal of the window the scheduler last primed for.
    pub anchor_day: Option<u64>,
    pub gallons: f32,
    pub coeffs: ChemistryCoefficients,
    pub history: TestHistory,
    pub last_test: Option<TestPoint>,
    pub run_log: RunLog,
    pub kill_switch: bool,
    /// When a valid test last changed the plan (or boot, whichever is later).
    pub last_plan_update: Option<WallTime>,
    pub last_backoff: Option<WallTime>,
}

pub struct Controller<P, S, C, A>
where
    P: PumpDriver,
    S: FloatStore,
    C: WallClock,
    A: AlertSink,
{
    pumps: P,
    store: S,
    clock: C,
    alerts: Alerter<A>,
    cfg: Config,
    state: DoserState,
    machine: DoseMachine,
    /// Scheduled runs awaiting the (sequential) dose machine.
    queue: VecDeque<(Pump, f32)>,
    rx: Receiver<Command>,
}

impl<P, S, C, A> Controller<P, S, C, A>
where
    P: PumpDriver,
    S: FloatStore,
    C: WallClock,
    A: AlertSink,
{
    /// Validate config, load persisted state (documented defaults for absent
    /// keys) and assemble an unprimed controller.
    pub fn new(
        pumps: P,
        mut store: S,
        clock: C,
        sink: A,
        cfg: Config,
        rx: Receiver<Command>,
    ) -> crate::Result<Self> {
        cfg.validate()?;
        let d = cfg.dosing;

        let mut plan = DosingPlan::defaults();
        for p in Pump::ALL {
            let v = persist::load_or(&mut store, persist::ml_day_key(p), plan.get(p))?;
            plan.set(p, v);
        }
        plan.clamp_to(&cfg.safety);

        let mut flow = FlowCalibration::uniform(d.fallback_flow_ml_min);
        for p in Pump::ALL {
            let v = persist::load_or(&mut store, persist::flow_key(p), d.fallback_flow_ml_min)?;
            flow.set_banded(
                p,
                v,
                d.flow_min_ml_min,
                d.flow_max_ml_min,
                d.fallback_flow_ml_min,
            );
        }

        let mut buckets = PendingBuckets::zero();
        for p in Pump::ALL {
            buckets.set(p, persist::load_or(&mut store, persist::bucket_key(p), 0.0)?);
        }

        let defaults = DoseScheduleCfg::from(&cfg.schedule);
        let loaded = DoseScheduleCfg {
            enabled: persist::load_or(
                &mut store,
                persist::SCHED_ENABLED,
                if defaults.enabled { 1.0 } else { 0.0 },
            )? != 0.0,
            start_hour: persist::load_or(
                &mut store,
                persist::SCHED_START_HOUR,
                f32::from(defaults.start_hour),
            )? as u8,
            end_hour: persist::load_or(
                &mut store,
                persist::SCHED_END_HOUR,
                f32::from(defaults.end_hour),
            )? as u8,
            every_minutes: persist::load_or(
                &mut store,
                persist::SCHED_EVERY_MIN,
                f32::from(defaults.every_minutes),
            )? as u16,
        };
        let schedule_cfg = if loaded.is_valid() { loaded } else { defaults };
        let slots = SlotTable::build(&schedule_cfg);

        let coeffs = ChemistryCoefficients::for_tank(
            &cfg.chemistry,
            cfg.tank.reference_gallons,
            cfg.tank.gallons,
        );

        let state = DoserState {
            plan,
            buckets,
            flow,
            schedule_cfg,
            slots,
            anchor_day: None,
            gallons: cfg.tank.gallons,
            coeffs,
            history: TestHistory::new(d.history_capacity),
            last_test: None,
            run_log: RunLog::new(d.run_log_capacity),
            kill_switch: false,
            last_plan_update: None,
            last_backoff: None,
        };

        Ok(Self {
            pumps,
            store,
            clock,
            alerts: Alerter::new(sink, d.alert_cooldown_secs),
            cfg,
            state,
            machine: DoseMachine::Idle,
            queue: VecDeque::new(),
            rx,
        })
    }

    pub fn state(&self) -> &DoserState {
        &self.state
    }

    pub fn machine(&self) -> DoseMachine {
        self.machine
    }

    pub fn queued_runs(&self) -> usize {
        self.queue.len()
    }

    /// One scheduling tick. Commands are always drained; everything else
    /// needs a valid wall clock and silently waits for one otherwise.
    pub fn tick(&mut self) -> Result<(), CoreError> {
        let now = self.clock.now();
        self.drain_commands(now)?;
        let Some(now) = now else {
            tracing::trace!("wall clock not valid; skipping scheduling tick");
            return Ok(());
        };
        self.advance_machine(now)?;
        self.roll_window(now);
        self.service_slots(now)?;
        self.backoff_check(now)?;
        Ok(())
    }

    /// Force all outputs off; called on host shutdown.
    pub fn shutdown(&mut self) {
        self.queue.clear();
        self.machine = DoseMachine::Idle;
        if let Err(e) = self.pumps.all_off() {
            tracing::error!(error = %e, "failed to force pump outputs off on shutdown");
        }
    }

    fn drain_commands(&mut self, now: Option<WallTime>) -> Result<(), CoreError> {
        loop {
            match self.rx.try_recv() {
                Ok(cmd) => self.handle_command(cmd, now)?,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return Ok(()),
            }
        }
    }

    fn handle_command(&mut self, cmd: Command, now: Option<WallTime>) -> Result<(), CoreError> {
        match cmd {
            Command::ResetAi => self.reset_ai(now),
            Command::SubmitTest {
                ca_ppm,
                alk_dkh,
                mg_ppm,
                ph,
                aux,
            } => self.submit_test(now, ca_ppm, alk_dkh, mg_ppm, ph, aux),
            Command::LiveDose { pump, ml } => self.live_dose(now, pump, ml),
            Command::Calibrate { pump, seconds } => self.calibrate(now, pump, seconds),
            Command::SetSchedule(cfg) => self.set_schedule(cfg),
            Command::SetTankSize { gallons } => {
                self.set_tank_size(gallons);
                Ok(())
            }
            Command::SetFlow { pump, ml_per_min } => self.set_flow(pump, ml_per_min),
            Command::KillSwitch(on) => {
                self.kill_switch(on);
                Ok(())
            }
        }
    }

    fn reset_ai(&mut self, now: Option<WallTime>) -> Result<(), CoreError> {
        let mut plan = DosingPlan::defaults();
        plan.clamp_to(&self.cfg.safety);
        let _ = governor::enforce_ceilings(&mut plan, &self.state.coeffs, &self.cfg.safety);
        self.persist_plan(&plan)?;
        self.state.plan = plan;
        for p in Pump::ALL {
            persist::put(&mut self.store, persist::bucket_key(p), 0.0)?;
            self.state.buckets.set(p, 0.0);
        }
        self.state.history.clear();
        self.state.last_test = None;
        self.state.run_log.clear();
        self.state.last_plan_update = now;
        self.state.last_backoff = None;
        tracing::info!("dosing state reset to factory defaults");
        self.alerts
            .send(Severity::Info, "reset", "dosing plan reset to safe defaults");
        Ok(())
    }

    fn submit_test(
        &mut self,
        now: Option<WallTime>,
        ca_ppm: f32,
        alk_dkh: f32,
        mg_ppm: f32,
        ph: f32,
        aux: Option<f32>,
    ) -> Result<(), CoreError> {
        let Some(now) = now else {
            self.alerts.send(
                Severity::Warning,
                "clock",
                "test dropped: wall clock not yet valid",
            );
            return Ok(());
        };
        let tp = TestPoint {
            at: now,
            ca_ppm,
            alk_dkh,
            mg_ppm,
            ph,
            aux,
        };
        let prev = self.state.last_test;
        self.state.history.push(tp);
        self.state.last_test = Some(tp);

        let mut candidate = self.state.plan;
        let outcome = planner::apply_test(
            prev.as_ref(),
            &tp,
            &mut candidate,
            &self.state.coeffs,
            &self.cfg.targets,
            &self.cfg.planner,
            &self.cfg.safety,
        );
        if outcome.applied() {
            if let Some(scale) =
                governor::enforce_ceilings(&mut candidate, &self.state.coeffs, &self.cfg.safety)
            {
                self.alerts.send(
                    Severity::Warning,
                    "governor",
                    &format!("plan scaled by {scale:.2} to honor daily rate ceilings"),
                );
            }
            self.persist_plan(&candidate)?;
            self.state.plan = candidate;
            self.state.last_plan_update = Some(now);
        } else {
            tracing::debug!(?outcome, "test recorded in history only");
        }
        Ok(())
    }

    fn live_dose(&mut self, now: Option<WallTime>, pump: Pump, ml: f32) -> Result<(), CoreError> {
        let Some(now) = now else {
            self.alerts.send(
                Severity::Warning,
                "clock",
                "live dose refused: wall clock not yet valid",
            );
            return Ok(());
        };
        if !ml.is_finite() || ml <= 0.0 {
            self.alerts
                .send(Severity::Warning, "command", "live dose refused: bad volume");
            return Ok(());
        }
        if self.state.kill_switch {
            self.alerts.send(
                Severity::Warning,
                "kill_switch",
                "live dose refused: emergency stop engaged",
            );
            return Ok(());
        }
        if !self.machine.is_idle() || !self.queue.is_empty() {
            self.alerts.send(
                Severity::Warning,
                "command",
                "live dose refused: a pump run is already active",
            );
            return Ok(());
        }
        let secs = run_seconds(ml, self.state.flow.get(pump));
        if secs < self.cfg.dosing.min_run_secs {
            self.alerts.send(
                Severity::Warning,
                "command",
                "live dose refused: below minimum actuation time",
            );
            return Ok(());
        }
        self.start_run(now, pump, ml, secs, RunSource::Live)
    }

    fn calibrate(
        &mut self,
        now: Option<WallTime>,
        pump: Pump,
        seconds: f32,
    ) -> Result<(), CoreError> {
        let Some(now) = now else {
            self.alerts.send(
                Severity::Warning,
                "clock",
                "calibration refused: wall clock not yet valid",
            );
            return Ok(());
        };
        if !seconds.is_finite() || seconds <= 0.0 {
            self.alerts.send(
                Severity::Warning,
                "command",
                "calibration refused: bad duration",
            );
            return Ok(());
        }
        if self.state.kill_switch {
            self.alerts.send(
                Severity::Warning,
                "kill_switch",
                "calibration refused: emergency stop engaged",
            );
            return Ok(());
        }
        if !self.machine.is_idle() || !self.queue.is_empty() {
            self.alerts.send(
                Severity::Warning,
                "command",
                "calibration refused: a pump run is already active",
            );
            return Ok(());
        }
        let secs = seconds.min(self.cfg.dosing.calibrate_cap_secs);
        // Expected volume is informational; the point is manual measurement.
        let ml = self.state.flow.get(pump) * secs / 60.0;
        self.start_run(now, pump, ml, secs, RunSource::Calibration)
    }

    fn set_schedule(&mut self, cfg: DoseScheduleCfg) -> Result<(), CoreError> {
        if !cfg.is_valid() {
            self.alerts.send(
                Severity::Warning,
                "command",
                "schedule update refused: hours must be 0..=23 and interval >= 1 minute",
            );
            return Ok(());
        }
        if cfg == self.state.schedule_cfg {
            return Ok(()); // idempotent no-op
        }
        persist::put(
            &mut self.store,
            persist::SCHED_ENABLED,
            if cfg.enabled { 1.0 } else { 0.0 },
        )?;
        persist::put(
            &mut self.store,
            persist::SCHED_START_HOUR,
            f32::from(cfg.start_hour),
        )?;
        persist::put(
            &mut self.store,
            persist::SCHED_END_HOUR,
            f32::from(cfg.end_hour),
        )?;
        persist::put(
            &mut self.store,
            persist::SCHED_EVERY_MIN,
            f32::from(cfg.every_minutes),
        )?;
        self.state.schedule_cfg = cfg;
        self.state.slots = SlotTable::rebuild(&cfg, &self.state.slots);
        // The window anchor is deliberately untouched; rollover handles it.
        tracing::info!(
            enabled = cfg.enabled,
            start_hour = cfg.start_hour,
            end_hour = cfg.end_hour,
            every_minutes = cfg.every_minutes,
            slots = self.state.slots.len(),
            "dose schedule replaced"
        );
        Ok(())
    }

    fn set_tank_size(&mut self, gallons: f32) {
        if !gallons.is_finite() || gallons <= 0.0 {
            self.alerts
                .send(Severity::Warning, "command", "tank size refused: bad volume");
            return;
        }
        self.state.gallons = gallons;
        self.state.coeffs = ChemistryCoefficients::for_tank(
            &self.cfg.chemistry,
            self.cfg.tank.reference_gallons,
            gallons,
        );
        tracing::info!(gallons, "chemistry coefficients rescaled for tank size");
    }

    fn set_flow(&mut self, pump: Pump, ml_per_min: f32) -> Result<(), CoreError> {
        let d = self.cfg.dosing;
        if ml_per_min.is_finite() && (d.flow_min_ml_min..=d.flow_max_ml_min).contains(&ml_per_min)
        {
            persist::put(&mut self.store, persist::flow_key(pump), ml_per_min)?;
            self.state
                .flow
                .try_set(pump, ml_per_min, d.flow_min_ml_min, d.flow_max_ml_min);
            tracing::info!(pump = %pump, ml_per_min, "flow calibration updated");
        } else {
            self.alerts.send(
                Severity::Warning,
                "calibration",
                "flow calibration rejected: outside physical bounds",
            );
        }
        Ok(())
    }

    fn kill_switch(&mut self, on: bool) {
        self.state.kill_switch = on;
        if on {
            self.queue.clear();
            if let DoseMachine::Running { pump, .. } = self.machine {
                if let Err(e) = self.pumps.set_active(pump, false) {
                    tracing::error!(pump = %pump, error = %e, "failed to stop pump on kill switch");
                }
                // Bucket stays intact; the aborted remainder is bounded by
                // one slot share and is not re-credited.
                self.machine = DoseMachine::Idle;
            }
            if let Err(e) = self.pumps.all_off() {
                tracing::error!(error = %e, "failed to force outputs off on kill switch");
            }
            self.alerts.send(
                Severity::Critical,
                "kill_switch",
                "emergency stop engaged; all pump outputs forced off",
            );
        } else {
            tracing::info!("emergency stop cleared");
            self.alerts
                .send(Severity::Info, "kill_switch", "emergency stop cleared");
        }
    }

    /// Finish an elapsed run, then start the next queued one if allowed.
    fn advance_machine(&mut self, now: WallTime) -> Result<(), CoreError> {
        if let DoseMachine::Running {
            pump,
            ml,
            source,
            started,
            run_secs,
        } = self.machine
        {
            let elapsed = now.saturating_secs_since(started) as f32;
            if elapsed >= run_secs {
                // Deassert is idempotent; a failed persist below retries the
                // whole completion next tick with the output already off.
                self.pumps
                    .set_active(pump, false)
                    .map_err(|e| CoreError::Pump(e.to_string()))?;
                if source == RunSource::Scheduled {
                    let remaining = (self.state.buckets.get(pump) - ml).max(0.0);
                    persist::put(&mut self.store, persist::bucket_key(pump), remaining)?;
                    self.state.buckets.set(pump, remaining);
                }
                self.state.run_log.push(DoseRun {
                    pump,
                    ml,
                    seconds: run_secs,
                    at: now,
                    source,
                });
                tracing::info!(pump = %pump, ml, run_secs, source = ?source, "pump run complete");
                self.machine = DoseMachine::Idle;
            }
        }
        if self.machine.is_idle()
            && !self.state.kill_switch
            && let Some((pump, ml)) = self.queue.pop_front()
        {
            let secs = run_seconds(ml, self.state.flow.get(pump));
            self.start_run(now, pump, ml, secs, RunSource::Scheduled)?;
        }
        Ok(())
    }

    fn start_run(
        &mut self,
        now: WallTime,
        pump: Pump,
        ml: f32,
        run_secs: f32,
        source: RunSource,
    ) -> Result<(), CoreError> {
        self.pumps
            .set_active(pump, true)
            .map_err(|e| CoreError::Pump(e.to_string()))?;
        self.machine = DoseMachine::Running {
            pump,
            ml,
            source,
            started: now,
            run_secs,
        };
        tracing::info!(pump = %pump, ml, run_secs, source = ?source, "pump run started");
        Ok(())
    }

    /// Re-prime the slot table whenever the window anchor day changes
    /// (boot included). Slots already in the past are marked done without
    /// actuating so a restart never replays the day's volume in a burst.
    fn roll_window(&mut self, now: WallTime) {
        let anchor = self.state.slots.anchor_day(now);
        if self.state.anchor_day != Some(anchor) {
            self.state.slots.reset_done();
            self.state.slots.prime(now.minute_of_day());
            self.state.anchor_day = Some(anchor);
            tracing::info!(
                anchor,
                slots = self.state.slots.len(),
                "dosing window primed"
            );
        }
    }

    /// Exactly-once per slot: credit each pump's pending bucket with its
    /// slot share, then attempt actuation per pump. Deferrals (kill switch,
    /// below-minimum run) keep the bucket for the next due slot.
    fn service_slots(&mut self, now: WallTime) -> Result<(), CoreError> {
        let Some(idx) = self.state.slots.current_index(now.minute_of_day()) else {
            return Ok(());
        };
        if self.state.slots.done(idx) {
            return Ok(());
        }

        let slot_count = self.state.slots.len() as f32;
        let mut staged = self.state.buckets;
        for p in Pump::ALL {
            let credit = self.state.plan.get(p) / slot_count;
            if credit > 0.0 {
                staged.set(p, staged.get(p) + credit);
            }
        }
        // Staged values derive from the in-memory buckets, which change only
        // once every write lands, so a retry after a mid-loop store failure
        // rewrites the same values instead of crediting twice. The failed
        // tick leaves the slot un-done and the whole credit retries.
        for p in Pump::ALL {
            if staged.get(p) != self.state.buckets.get(p) {
                persist::put(&mut self.store, persist::bucket_key(p), staged.get(p))?;
            }
        }
        self.state.buckets = staged;

        for p in Pump::ALL {
            let ml = self.state.buckets.get(p);
            if ml <= 0.0 {
                continue;
            }
            if self.machine.running_pump() == Some(p) || self.queue.iter().any(|(q, _)| *q == p) {
                continue; // already owed a run; bucket keeps accumulating
            }
            if self.state.kill_switch {
                tracing::debug!(pump = %p, ml, "dose deferred: emergency stop engaged");
                continue;
            }
            let secs = run_seconds(ml, self.state.flow.get(p));
            if secs < self.cfg.dosing.min_run_secs {
                tracing::debug!(pump = %p, ml, secs, "dose deferred: below minimum run time");
                continue;
            }
            self.queue.push_back((p, ml));
        }

        // Done regardless of per-pump outcome: deferrals retry at the next
        // slot, not on every tick.
        self.state.slots.mark_done(idx);
        let (h, m) = self.state.slots.slot_time(idx);
        tracing::debug!(slot = idx, hour = h, minute = m, "slot serviced");
        Ok(())
    }

    fn backoff_check(&mut self, now: WallTime) -> Result<(), CoreError> {
        let Some(last_update) = self.state.last_plan_update else {
            // First valid tick after boot starts the staleness timer.
            self.state.last_plan_update = Some(now);
            return Ok(());
        };
        if !backoff::backoff_due(now, last_update, self.state.last_backoff, &self.cfg.dosing) {
            return Ok(());
        }
        let mut plan = self.state.plan;
        plan.scale(self.cfg.dosing.backoff_factor);
        plan.clamp_to(&self.cfg.safety);
        let _ = governor::enforce_ceilings(&mut plan, &self.state.coeffs, &self.cfg.safety);
        self.persist_plan(&plan)?;
        self.state.plan = plan;
        self.state.last_backoff = Some(now);
        tracing::warn!(
            factor = self.cfg.dosing.backoff_factor,
            "no valid test for too long; dosing plan degraded"
        );
        self.alerts.send(
            Severity::Warning,
            "backoff",
            "no recent valid test; dosing plan reduced as a precaution",
        );
        Ok(())
    }

    fn persist_plan(&mut self, plan: &DosingPlan) -> Result<(), CoreError> {
        for p in Pump::ALL {
            persist::put(&mut self.store, persist::ml_day_key(p), plan.get(p))?;
        }
        Ok(())
    }
}
