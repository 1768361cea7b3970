//! Driver timing and clock settings.

use std::time::Duration;
use crate::bus::MasterConfig;

/// Settings applied to every keypad driver a registry creates.
///
/// The defaults reproduce the behavior of the reference board: a 12 MHz controller clock, a
/// standard mode bus, a settling pause after every read and no limit on how long to wait for the
/// bus to become ready.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct KeypadConfig {
    /// Frequency of the clock feeding the I²C controller.
    pub source_clock_hz: u32,
    /// Master mode settings passed to the bus when the driver is created.
    pub master: MasterConfig,
    /// Pause after reading the button register before the keypad is addressed again.
    pub settle_time: Duration,
    /// Upper bound on the wait for the bus to report ready. `None` waits forever.
    pub ready_timeout: Option<Duration>,
}

impl KeypadConfig {
    pub const DEFAULT_SOURCE_CLOCK_HZ: u32 = 12_000_000;
    /// 10 000 cycles at the default source clock.
    pub const DEFAULT_SETTLE_TIME: Duration = Duration::from_nanos(833_334);

    pub fn with_source_clock_hz(mut self, source_clock_hz: u32) -> Self {
        self.source_clock_hz = source_clock_hz;
        self
    }

    pub fn with_baud_rate_hz(mut self, baud_rate_hz: u32) -> Self {
        self.master.baud_rate_hz = baud_rate_hz;
        self
    }

    pub fn with_settle_time(mut self, settle_time: Duration) -> Self {
        self.settle_time = settle_time;
        self
    }

    pub fn with_ready_timeout(mut self, ready_timeout: Option<Duration>) -> Self {
        self.ready_timeout = ready_timeout;
        self
    }
}

impl Default for KeypadConfig {
    fn default() -> Self {
        KeypadConfig {
            source_clock_hz: Self::DEFAULT_SOURCE_CLOCK_HZ,
            master: MasterConfig::default(),
            settle_time: Self::DEFAULT_SETTLE_TIME,
            ready_timeout: None,
        }
    }
}
