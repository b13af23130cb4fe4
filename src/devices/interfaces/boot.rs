//! The irreversible transfer of control to a firmware image.
use crate::devices::boot_metrics::BootMetrics;

/// Boot selector sink.
pub trait BootSelector {
    /// Returns every peripheral touched during the update window (timer,
    /// bus, clocks) to its reset state, so the image boots into a clean
    /// peripheral state.
    fn restore(&mut self);

    /// Transfers control to the vector table at `location`, leaving
    /// `metrics` behind for the application. Never returns.
    fn jump(&mut self, location: usize, metrics: &BootMetrics) -> !;
}
