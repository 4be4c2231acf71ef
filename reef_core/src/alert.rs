//! Rate-limited alert emission.
//!
//! Cooldown state is in-memory only and resets on restart; an accepted,
//! documented limitation of the original system carried over here.

use reef_traits::{AlertSink, Severity};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Wraps an `AlertSink` with a per-category cooldown so a persistently bad
/// condition cannot flood the external channel.
pub struct Alerter<A: AlertSink> {
    sink: A,
    cooldown: Duration,
    last_sent: HashMap<&'static str, Instant>,
}

impl<A: AlertSink> Alerter<A> {
    pub fn new(sink: A, cooldown_secs: u64) -> Self {
        Self {
            sink,
            cooldown: Duration::from_secs(cooldown_secs),
            last_sent: HashMap::new(),
        }
    }

    pub fn send(&mut self, severity: Severity, category: &'static str, message: &str) {
        let now = Instant::now();
        if let Some(last) = self.last_sent.get(category)
            && now.duration_since(*last) < self.cooldown
        {
            tracing::debug!(category, "alert suppressed by cooldown");
            return;
        }
        self.last_sent.insert(category, now);
        self.sink.send(severity, category, message);
    }
}
