//! Backoff monitor: degrade the plan when tests go stale.
//!
//! Independent of the scheduler; composes with planner-driven changes and
//! always terminates in the safety governor at the call site.

use reef_config::DosingCfg;
use reef_traits::WallTime;

/// Whether a backoff step is due at `now`, given when the plan last changed
/// from a valid test and when backoff last fired.
pub fn backoff_due(
    now: WallTime,
    last_plan_update: WallTime,
    last_backoff: Option<WallTime>,
    cfg: &DosingCfg,
) -> bool {
    if now.days_since(last_plan_update) < cfg.backoff_after_days {
        return false;
    }
    match last_backoff {
        Some(last) => now.days_since(last) >= cfg.min_backoff_gap_days,
        None => true,
    }
}
