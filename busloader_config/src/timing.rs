use serde::{Deserialize, Serialize};

/// Length of the update window and granularity of the timer supervising it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfiguration {
    pub window_ms: u32,
    pub tick_ms: u32,
}

impl Default for TimingConfiguration {
    fn default() -> Self { Self { window_ms: 5_000, tick_ms: 10 } }
}

impl TimingConfiguration {
    /// Window length in timer ticks, rounded up so the window never
    /// closes earlier than requested.
    pub fn window_ticks(&self) -> u32 {
        if self.tick_ms == 0 {
            return 0;
        }
        (self.window_ms + self.tick_ms - 1) / self.tick_ms
    }
}
