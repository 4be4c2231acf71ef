//! Test and helper doubles for the core seams.
//!
//! Handles are `Rc`-shared so a test keeps a view after the double moves
//! into the controller; the core is single-threaded by design, so `Rc` is
//! fine here.

use reef_traits::{AlertSink, FloatStore, Pump, PumpDriver, Severity, WallClock, WallTime};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// In-memory float store. Clone handles share the map, so a "restart" test
/// can rebuild a controller over the same persisted state. `fail_writes`
/// simulates a full persistence outage; `fail_key` fails writes to one key
/// while the rest land.
#[derive(Default, Clone)]
pub struct MemStore {
    pub map: Rc<RefCell<HashMap<String, f32>>>,
    pub fail_writes: Rc<Cell<bool>>,
    pub fail_key: Rc<RefCell<Option<String>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<f32> {
        self.map.borrow().get(key).copied()
    }
}

impl FloatStore for MemStore {
    fn load(
        &mut self,
        key: &str,
    ) -> Result<Option<f32>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.map.borrow().get(key).copied())
    }

    fn store(
        &mut self,
        key: &str,
        value: f32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.fail_writes.get() || self.fail_key.borrow().as_deref() == Some(key) {
            return Err(Box::new(std::io::Error::other("simulated store outage")));
        }
        self.map.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }
}

/// Pump spy: records every output transition and the current level per pump.
#[derive(Default, Clone)]
pub struct SpyPump {
    pub active: Rc<RefCell<[bool; Pump::COUNT]>>,
    pub transitions: Rc<RefCell<Vec<(Pump, bool)>>>,
}

impl SpyPump {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, pump: Pump) -> bool {
        self.active.borrow()[pump.index()]
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.borrow().len()
    }
}

impl PumpDriver for SpyPump {
    fn set_active(
        &mut self,
        pump: Pump,
        active: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let was = self.active.borrow()[pump.index()];
        if was != active {
            self.transitions.borrow_mut().push((pump, active));
        }
        self.active.borrow_mut()[pump.index()] = active;
        Ok(())
    }
}

/// Deterministic wall clock whose time is set by the test.
#[derive(Default, Clone)]
pub struct ManualClock {
    now: Rc<Cell<Option<WallTime>>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(t: WallTime) -> Self {
        let c = Self::default();
        c.set(Some(t));
        c
    }

    pub fn set(&self, t: Option<WallTime>) {
        self.now.set(t);
    }

    pub fn advance_secs(&self, secs: u64) {
        if let Some(t) = self.now.get() {
            self.now.set(Some(WallTime::from_unix(t.as_unix() + secs)));
        }
    }
}

impl WallClock for ManualClock {
    fn now(&self) -> Option<WallTime> {
        self.now.get()
    }
}

/// Collects alerts for assertions.
#[derive(Default, Clone)]
pub struct VecSink {
    pub events: Rc<RefCell<Vec<(Severity, String, String)>>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn categories(&self) -> Vec<String> {
        self.events.borrow().iter().map(|e| e.1.clone()).collect()
    }
}

impl AlertSink for VecSink {
    fn send(&mut self, severity: Severity, category: &str, message: &str) {
        self.events
            .borrow_mut()
            .push((severity, category.to_string(), message.to_string()));
    }
}
