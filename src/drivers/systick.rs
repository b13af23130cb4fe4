//! Update window supervision on the SysTick timer.
//!
//! The integrator forwards the `SysTick` exception to
//! [`SysTickSupervisor::on_tick`]:
//!
//! ```ignore
//! #[exception]
//! fn SysTick() { SysTickSupervisor::on_tick() }
//! ```
use crate::{
    configuration,
    devices::interfaces::timeout::{ExpiryFlag, TimeoutSupervisor},
    hal::time::{Hertz, Ticks, U32Ext},
};
use core::{
    cmp::min,
    sync::atomic::{AtomicBool, AtomicU32, Ordering},
};
use cortex_m::{interrupt, peripheral::syst::SystClkSource, peripheral::SYST};

const MAX_RELOAD: u32 = 0x00FF_FFFF;

// Written by the main flow inside critical sections, read by the exception.
static ARMED: AtomicBool = AtomicBool::new(false);
static DURATION: AtomicU32 = AtomicU32::new(0);
// Written by the exception, and by the main flow inside critical sections.
static ELAPSED: AtomicU32 = AtomicU32::new(0);
static EXPIRY: ExpiryFlag = ExpiryFlag::new();

pub struct SysTickSupervisor {
    syst: SYST,
}

impl SysTickSupervisor {
    /// Starts SysTick with the period fixed by the build configuration.
    pub fn new(mut syst: SYST, sysclk: Hertz) -> Self {
        let cycles = sysclk.cycles_in(configuration::TICK_PERIOD_MS.ms());
        syst.set_clock_source(SystClkSource::Core);
        syst.set_reload(min(cycles.saturating_sub(1), MAX_RELOAD));
        syst.clear_current();
        syst.enable_interrupt();
        syst.enable_counter();
        Self { syst }
    }

    /// Counts one period. Call from the `SysTick` exception only.
    pub fn on_tick() {
        if !ARMED.load(Ordering::Acquire) {
            return;
        }
        let elapsed = ELAPSED.load(Ordering::Relaxed).saturating_add(1);
        ELAPSED.store(elapsed, Ordering::Relaxed);
        if elapsed >= DURATION.load(Ordering::Relaxed) {
            EXPIRY.raise();
        }
    }

    /// Stops SysTick and releases it.
    pub fn free(mut self) -> SYST {
        self.disarm();
        self.syst.disable_interrupt();
        self.syst.disable_counter();
        self.syst
    }
}

impl TimeoutSupervisor for SysTickSupervisor {
    fn arm(&mut self, duration: Ticks) {
        interrupt::free(|_| {
            DURATION.store(duration.0, Ordering::Relaxed);
            ELAPSED.store(0, Ordering::Relaxed);
            EXPIRY.clear();
            ARMED.store(true, Ordering::Release);
        });
    }

    fn reset(&mut self) { interrupt::free(|_| ELAPSED.store(0, Ordering::Relaxed)); }

    fn disarm(&mut self) {
        interrupt::free(|_| {
            ARMED.store(false, Ordering::Release);
            EXPIRY.clear();
        });
    }

    fn is_expired(&self) -> bool { EXPIRY.is_raised() }
}
