use crate::devices::{boot_metrics::BootMetrics, interfaces::boot::BootSelector};

/// Boot selector that panics instead of jumping, so tests can observe
/// the jump through `#[should_panic]`.
#[derive(Default)]
pub struct FakeBootSelector {
    pub restored: bool,
}

impl BootSelector for FakeBootSelector {
    fn restore(&mut self) { self.restored = true; }

    fn jump(&mut self, location: usize, metrics: &BootMetrics) -> ! {
        assert!(self.restored, "Jumped without restoring peripherals");
        panic!("Jump to {:#x} via {:?}", location, metrics.boot_path)
    }
}
