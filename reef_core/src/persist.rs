//! Persistent float surface: key names, documented defaults and the
//! persist-then-apply helpers.
//!
//! Absent keys fall back to their documented default, never blindly to
//! zero. A failed write aborts the mutation: the in-memory value changes
//! only after the store acknowledged, so a crash between the two cannot
//! leave durable state ahead of memory.

use crate::error::CoreError;
use reef_traits::{FloatStore, Pump};

pub const SCHED_ENABLED: &str = "sched.enabled";
pub const SCHED_START_HOUR: &str = "sched.start_hour";
pub const SCHED_END_HOUR: &str = "sched.end_hour";
pub const SCHED_EVERY_MIN: &str = "sched.every_min";

pub fn ml_day_key(pump: Pump) -> &'static str {
    match pump {
        Pump::Kalk => "dose.ml_day.kalk",
        Pump::Afr => "dose.ml_day.afr",
        Pump::Mg => "dose.ml_day.mg",
        Pump::Aux => "dose.ml_day.aux",
    }
}

pub fn flow_key(pump: Pump) -> &'static str {
    match pump {
        Pump::Kalk => "flow.ml_min.kalk",
        Pump::Afr => "flow.ml_min.afr",
        Pump::Mg => "flow.ml_min.mg",
        Pump::Aux => "flow.ml_min.aux",
    }
}

pub fn bucket_key(pump: Pump) -> &'static str {
    match pump {
        Pump::Kalk => "bucket.ml.kalk",
        Pump::Afr => "bucket.ml.afr",
        Pump::Mg => "bucket.ml.mg",
        Pump::Aux => "bucket.ml.aux",
    }
}

/// Load a key, falling back to `default` when absent or non-finite.
pub fn load_or<S: FloatStore>(store: &mut S, key: &str, default: f32) -> Result<f32, CoreError> {
    match store.load(key) {
        Ok(Some(v)) if v.is_finite() => Ok(v),
        Ok(_) => Ok(default),
        Err(e) => Err(CoreError::Store(e.to_string())),
    }
}

/// Durable write; the caller applies the value in memory only on Ok.
pub fn put<S: FloatStore>(store: &mut S, key: &str, value: f32) -> Result<(), CoreError> {
    store
        .store(key, value)
        .map_err(|e| CoreError::Store(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MemStore;

    #[test]
    fn absent_key_yields_default() {
        let mut s = MemStore::new();
        assert_eq!(load_or(&mut s, ml_day_key(Pump::Kalk), 2000.0).unwrap(), 2000.0);
    }

    #[test]
    fn non_finite_persisted_value_yields_default() {
        let mut s = MemStore::new();
        s.map.borrow_mut().insert(flow_key(Pump::Mg).into(), f32::NAN);
        assert_eq!(load_or(&mut s, flow_key(Pump::Mg), 50.0).unwrap(), 50.0);
    }

    #[test]
    fn store_failure_surfaces_as_core_error() {
        let mut s = MemStore::new();
        s.fail_writes.set(true);
        assert!(put(&mut s, bucket_key(Pump::Aux), 1.0).is_err());
    }
}
