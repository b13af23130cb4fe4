use crate::{
    devices::interfaces::timeout::{ExpiryFlag, TimeoutSupervisor},
    hal::time::Ticks,
};

/// Timer whose periods are advanced by hand. [`FakeTimer::tick`] plays
/// the part of the periodic interrupt.
#[derive(Default)]
pub struct FakeTimer {
    pub armed: bool,
    pub elapsed: u32,
    pub duration: u32,
    pub resets: usize,
    expiry: ExpiryFlag,
}

impl FakeTimer {
    pub fn tick(&mut self) {
        if self.armed {
            self.elapsed += 1;
            if self.elapsed >= self.duration {
                self.expiry.raise();
            }
        }
    }

    /// Ticks left before expiry.
    pub fn remaining(&self) -> u32 { self.duration.saturating_sub(self.elapsed) }
}

impl TimeoutSupervisor for FakeTimer {
    fn arm(&mut self, duration: Ticks) {
        self.expiry.clear();
        self.duration = duration.0;
        self.elapsed = 0;
        self.armed = true;
    }

    fn reset(&mut self) {
        self.elapsed = 0;
        self.resets += 1;
    }

    fn disarm(&mut self) {
        self.armed = false;
        self.expiry.clear();
    }

    fn is_expired(&self) -> bool { self.expiry.is_raised() }
}
