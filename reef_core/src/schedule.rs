//! Schedule builder: dosing window -> ordered slot table.
//!
//! A window is (start hour, end hour) and may wrap past midnight; slots sit
//! every `every_minutes` inside it. With the window disabled a fixed legacy
//! 3-slot schedule applies. The table carries a parallel `done` flag per
//! slot; rebuilding preserves flags for indices that still exist so a config
//! edit mid-window never re-fires an already-dosed slot.

use reef_traits::WallTime;

pub const MAX_SLOTS: usize = 96;
pub const MAX_EVERY_MIN: u16 = 240;
pub const MIN_PER_DAY: u16 = 1440;

/// Legacy fallback: three doses a day at 09:30, 12:30 and 15:30.
const LEGACY_SLOTS: [u16; 3] = [9 * 60 + 30, 12 * 60 + 30, 15 * 60 + 30];

/// Dosing window configuration as received from the command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoseScheduleCfg {
    pub enabled: bool,
    pub start_hour: u8,
    pub end_hour: u8,
    pub every_minutes: u16,
}

impl DoseScheduleCfg {
    pub fn is_valid(&self) -> bool {
        self.start_hour <= 23 && self.end_hour <= 23 && self.every_minutes >= 1
    }
}

impl From<&reef_config::ScheduleCfg> for DoseScheduleCfg {
    fn from(c: &reef_config::ScheduleCfg) -> Self {
        Self {
            enabled: c.enabled,
            start_hour: c.start_hour,
            end_hour: c.end_hour,
            every_minutes: c.every_minutes,
        }
    }
}

/// Derived, non-persistent slot table for the current window.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotTable {
    /// Minute-of-day at which the window (and its anchor day) begins.
    start_min: u16,
    /// Window length in minutes; elapsed times at or past this are between
    /// windows and make no slot current.
    window_min: u16,
    /// Absolute minute-of-day per slot, in window order.
    times: Vec<u16>,
    /// Parallel "credited this window" flags; len always equals times.len().
    done: Vec<bool>,
}

impl SlotTable {
    pub fn build(cfg: &DoseScheduleCfg) -> Self {
        if !cfg.enabled {
            return Self {
                start_min: 0,
                window_min: MIN_PER_DAY,
                times: LEGACY_SLOTS.to_vec(),
                done: vec![false; LEGACY_SLOTS.len()],
            };
        }
        let start = u16::from(cfg.start_hour.min(23)) * 60;
        let end = u16::from(cfg.end_hour.min(23)) * 60;
        // end <= start spans midnight; equal hours means a full day.
        let window = if end > start {
            end - start
        } else {
            MIN_PER_DAY - start + end
        };
        let every = cfg.every_minutes.clamp(1, MAX_EVERY_MIN);
        let count = usize::from(window / every).max(1).min(MAX_SLOTS);
        let times: Vec<u16> = (0..count)
            .map(|i| (start + i as u16 * every) % MIN_PER_DAY)
            .collect();
        let done = vec![false; count];
        Self {
            start_min: start,
            window_min: window,
            times,
            done,
        }
    }

    /// Rebuild for a new config, carrying over `done` flags for slot indices
    /// present in both tables. The window anchor is untouched by design; the
    /// scheduler owns rollover.
    pub fn rebuild(cfg: &DoseScheduleCfg, old: &SlotTable) -> Self {
        let mut next = Self::build(cfg);
        let keep = next.len().min(old.len());
        next.done[..keep].copy_from_slice(&old.done[..keep]);
        next
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Slot time as (hour, minute).
    pub fn slot_time(&self, i: usize) -> (u8, u8) {
        let m = self.times[i];
        ((m / 60) as u8, (m % 60) as u8)
    }

    pub fn times(&self) -> &[u16] {
        &self.times
    }

    pub fn done(&self, i: usize) -> bool {
        self.done[i]
    }

    pub fn mark_done(&mut self, i: usize) {
        self.done[i] = true;
    }

    pub fn reset_done(&mut self) {
        self.done.fill(false);
    }

    /// Minutes into the current window for a given minute-of-day.
    pub fn elapsed_in_window(&self, minute_of_day: u16) -> u16 {
        (minute_of_day + MIN_PER_DAY - self.start_min) % MIN_PER_DAY
    }

    pub fn window_minutes(&self) -> u16 {
        self.window_min
    }

    fn offset(&self, i: usize) -> u16 {
        (self.times[i] + MIN_PER_DAY - self.start_min) % MIN_PER_DAY
    }

    /// Index of the most recent slot whose time has been reached within the
    /// current window, or `None` before the first slot and between windows.
    /// Once the window closes even the final slot stops being current, so a
    /// boot outside the window never fires a slot hours late.
    pub fn current_index(&self, minute_of_day: u16) -> Option<usize> {
        let elapsed = self.elapsed_in_window(minute_of_day);
        if elapsed >= self.window_min {
            return None;
        }
        let mut current = None;
        for i in 0..self.len() {
            if self.offset(i) <= elapsed {
                current = Some(i);
            } else {
                break;
            }
        }
        current
    }

    /// Anti-catch-up priming: mark every slot strictly before the current one
    /// as done without actuating. Between windows the whole table is retired.
    /// Run at boot and at each window rollover so a restart never replays
    /// missed slots in a burst.
    pub fn prime(&mut self, minute_of_day: u16) {
        if self.elapsed_in_window(minute_of_day) >= self.window_min {
            self.done.fill(true);
            return;
        }
        if let Some(current) = self.current_index(minute_of_day) {
            for i in 0..current {
                self.done[i] = true;
            }
        }
    }

    /// The day ordinal of the window containing `now`: the current calendar
    /// day once the window start has passed, otherwise the previous one.
    pub fn anchor_day(&self, now: WallTime) -> u64 {
        if now.minute_of_day() >= self.start_min {
            now.day_ordinal()
        } else {
            now.day_ordinal().saturating_sub(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(start: u8, end: u8, every: u16) -> DoseScheduleCfg {
        DoseScheduleCfg {
            enabled: true,
            start_hour: start,
            end_hour: end,
            every_minutes: every,
        }
    }

    #[test]
    fn disabled_yields_legacy_slots() {
        let t = SlotTable::build(&DoseScheduleCfg {
            enabled: false,
            start_hour: 0,
            end_hour: 0,
            every_minutes: 60,
        });
        assert_eq!(t.len(), 3);
        assert_eq!(t.slot_time(0), (9, 30));
        assert_eq!(t.slot_time(2), (15, 30));
    }

    #[test]
    fn six_hour_window_hourly_gives_six_slots() {
        let t = SlotTable::build(&cfg(9, 15, 60));
        assert_eq!(t.len(), 6);
        assert_eq!(t.slot_time(0), (9, 0));
        assert_eq!(t.slot_time(5), (14, 0));
    }

    #[test]
    fn window_wraps_past_midnight() {
        let t = SlotTable::build(&cfg(22, 2, 60));
        assert_eq!(t.len(), 4);
        assert_eq!(t.slot_time(0), (22, 0));
        assert_eq!(t.slot_time(2), (0, 0));
        assert_eq!(t.slot_time(3), (1, 0));
        // 00:30 is 150 minutes into the 22:00 window.
        assert_eq!(t.elapsed_in_window(30), 150);
        assert_eq!(t.current_index(30), Some(2));
    }

    #[test]
    fn equal_hours_span_a_full_day() {
        let t = SlotTable::build(&cfg(6, 6, 240));
        assert_eq!(t.len(), 6);
        assert_eq!(t.slot_time(0), (6, 0));
        assert_eq!(t.slot_time(5), (2, 0));
    }

    #[test]
    fn slot_count_is_capped() {
        let t = SlotTable::build(&cfg(0, 0, 1));
        assert_eq!(t.len(), MAX_SLOTS);
    }

    #[test]
    fn current_index_is_none_before_first_slot() {
        let t = SlotTable::build(&cfg(9, 15, 60));
        assert_eq!(t.current_index(8 * 60), None);
        assert_eq!(t.current_index(9 * 60), Some(0));
        assert_eq!(t.current_index(11 * 60 + 45), Some(2));
    }

    #[test]
    fn no_slot_is_current_after_the_window_closes() {
        let t = SlotTable::build(&cfg(9, 17, 60));
        assert_eq!(t.current_index(16 * 60 + 59), Some(7));
        assert_eq!(t.current_index(17 * 60), None);
        assert_eq!(t.current_index(23 * 60), None);
        assert_eq!(t.current_index(8 * 60), None);
    }

    #[test]
    fn priming_between_windows_retires_every_slot() {
        let mut t = SlotTable::build(&cfg(9, 17, 60));
        t.prime(23 * 60);
        assert!((0..t.len()).all(|i| t.done(i)));

        let mut t = SlotTable::build(&cfg(9, 17, 60));
        t.prime(8 * 60);
        assert!((0..t.len()).all(|i| t.done(i)));
    }

    #[test]
    fn priming_marks_only_strictly_earlier_slots() {
        // Cold boot at 11:45: slots 09:00 and 10:00 are skipped, 11:00 stays
        // live as the next due slot.
        let mut t = SlotTable::build(&cfg(9, 15, 60));
        t.prime(11 * 60 + 45);
        assert!(t.done(0));
        assert!(t.done(1));
        assert!(!t.done(2));
        assert!(!t.done(3));
    }

    #[test]
    fn rebuild_is_idempotent_and_preserves_done() {
        let c = cfg(9, 15, 60);
        let mut t = SlotTable::build(&c);
        t.mark_done(0);
        t.mark_done(1);
        let rebuilt = SlotTable::rebuild(&c, &t);
        assert_eq!(rebuilt, t);

        // Shrinking the window keeps flags for surviving indices.
        let shrunk = SlotTable::rebuild(&cfg(9, 12, 60), &t);
        assert_eq!(shrunk.len(), 3);
        assert!(shrunk.done(0));
        assert!(shrunk.done(1));
        assert!(!shrunk.done(2));
    }

    #[test]
    fn anchor_rolls_at_window_start() {
        let t = SlotTable::build(&cfg(9, 15, 60));
        let before = WallTime::from_day_minute(1000, 8 * 60);
        let after = WallTime::from_day_minute(1000, 9 * 60);
        assert_eq!(t.anchor_day(before), 999);
        assert_eq!(t.anchor_day(after), 1000);
    }
}
