pub mod time;

pub use time::{WallClock, WallTime};

/// Dosing channels, one per physical pump head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pump {
    /// Saturated kalkwasser reservoir.
    Kalk,
    /// Two-part balanced solution (all-for-reef style).
    Afr,
    /// Magnesium-only solution.
    Mg,
    /// Auxiliary channel (trace elements, manual use).
    Aux,
}

impl Pump {
    pub const COUNT: usize = 4;
    pub const ALL: [Pump; Pump::COUNT] = [Pump::Kalk, Pump::Afr, Pump::Mg, Pump::Aux];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Pump::Kalk => 0,
            Pump::Afr => 1,
            Pump::Mg => 2,
            Pump::Aux => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Pump::Kalk => "kalk",
            Pump::Afr => "afr",
            Pump::Mg => "mg",
            Pump::Aux => "aux",
        }
    }

    pub fn from_label(s: &str) -> Option<Pump> {
        match s {
            "kalk" => Some(Pump::Kalk),
            "afr" => Some(Pump::Afr),
            "mg" => Some(Pump::Mg),
            "aux" => Some(Pump::Aux),
            _ => None,
        }
    }

    /// One-based pump number as used by the remote command channel.
    pub fn from_number(n: u8) -> Option<Pump> {
        match n {
            1 => Some(Pump::Kalk),
            2 => Some(Pump::Afr),
            3 => Some(Pump::Mg),
            4 => Some(Pump::Aux),
            _ => None,
        }
    }
}

impl core::fmt::Display for Pump {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Pump actuation primitive: assert/deassert one output.
///
/// Implementations must be idempotent for repeated deasserts; the core
/// leans on that when retrying after a failed persistence write.
pub trait PumpDriver {
    fn set_active(
        &mut self,
        pump: Pump,
        active: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Force every output to its inactive state (best effort).
    fn all_off(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        for p in Pump::ALL {
            self.set_active(p, false)?;
        }
        Ok(())
    }
}

/// Persistent key/value store for floats.
///
/// Writes are synchronous: when `store` returns Ok the value is durable.
pub trait FloatStore {
    fn load(&mut self, key: &str)
    -> Result<Option<f32>, Box<dyn std::error::Error + Send + Sync>>;
    fn store(
        &mut self,
        key: &str,
        value: f32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Alert severity, matching the notification records of the remote channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl core::fmt::Display for Severity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        })
    }
}

/// Outbound notification sink. Delivery transport is out of core scope;
/// rate limiting happens before this trait is reached.
pub trait AlertSink {
    fn send(&mut self, severity: Severity, category: &str, message: &str);
}
