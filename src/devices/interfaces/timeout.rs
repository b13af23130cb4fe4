//! Supervision of the update window.
use crate::hal::time::Ticks;
use core::sync::atomic::{AtomicBool, Ordering};

/// Periodic timer bounding the update window.
///
/// Expiry is raised asynchronously (from the timer interrupt) and must
/// remain observable through [`TimeoutSupervisor::is_expired`] until the
/// supervisor is re-armed or disarmed.
pub trait TimeoutSupervisor {
    /// Starts counting from zero towards `duration`.
    fn arm(&mut self, duration: Ticks);
    /// Restarts the count from zero. Neither the armed state nor an
    /// expiry already raised are affected.
    fn reset(&mut self);
    /// Stops counting and clears any pending expiry.
    fn disarm(&mut self);
    fn is_expired(&self) -> bool;
}

/// Expiry signal shared between the timer interrupt and the main flow.
///
/// Single writer per direction: only the interrupt handler raises it,
/// only the supervisor clears it (on `arm`/`disarm`, outside the
/// interrupt). Plain loads and stores keep it usable on ARMv6-M.
pub struct ExpiryFlag(AtomicBool);

impl ExpiryFlag {
    pub const fn new() -> Self { Self(AtomicBool::new(false)) }

    /// Interrupt context only.
    pub fn raise(&self) { self.0.store(true, Ordering::Release) }

    pub fn is_raised(&self) -> bool { self.0.load(Ordering::Acquire) }

    pub fn clear(&self) { self.0.store(false, Ordering::Release) }
}

impl Default for ExpiryFlag {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hal::{doubles::timer::FakeTimer, time::U32Ext};

    #[test]
    fn expiry_flag_latches_until_cleared() {
        let flag = ExpiryFlag::new();
        assert!(!flag.is_raised());
        flag.raise();
        flag.raise();
        assert!(flag.is_raised());
        flag.clear();
        assert!(!flag.is_raised());
    }

    #[test]
    fn reset_restores_a_full_window() {
        // Given
        let mut timer = FakeTimer::default();
        timer.arm(5.ticks());
        (0..3).for_each(|_| timer.tick());
        assert_eq!(timer.remaining(), 2);

        // When
        timer.reset();

        // Then
        assert_eq!(timer.remaining(), 5);
        assert!(timer.armed);
    }

    #[test]
    fn reset_does_not_clear_a_raised_expiry() {
        let mut timer = FakeTimer::default();
        timer.arm(2.ticks());
        (0..2).for_each(|_| timer.tick());
        assert!(timer.is_expired());

        timer.reset();
        assert!(timer.is_expired());

        timer.disarm();
        assert!(!timer.is_expired());
    }
}
