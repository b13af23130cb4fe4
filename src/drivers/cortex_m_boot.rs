//! Transfer of control to a firmware image on Cortex-M.
use crate::devices::{
    boot_metrics::{boot_metrics_mut, BootMetrics},
    interfaces::boot::BootSelector,
};
use core::mem::size_of;
use cortex_m::peripheral::{SCB, SYST};

pub struct CortexMBootSelector {
    ram_end: usize,
    restore_board: fn(),
}

impl CortexMBootSelector {
    /// `ram_end` is one past the last RAM address; boot metrics are left
    /// right below it. `restore_board` returns the bus peripherals used
    /// during the window to their reset state.
    pub fn new(ram_end: usize, restore_board: fn()) -> Self { Self { ram_end, restore_board } }
}

impl BootSelector for CortexMBootSelector {
    fn restore(&mut self) {
        cortex_m::interrupt::disable();
        // NOTE(Safety): Interrupts are off and the supervisor is no longer
        // used, so nothing else touches SysTick from here on.
        unsafe {
            let syst = &*SYST::PTR;
            syst.csr.write(0);
            syst.rvr.write(0);
            syst.cvr.write(0);
        }
        (self.restore_board)();
    }

    fn jump(&mut self, location: usize, metrics: &BootMetrics) -> ! {
        // NOTE(Safety): Thoroughly unsafe operations, for obvious reasons: We are jumping to an
        // entirely different firmware image! We have to assume everything is at the right place,
        // or literally anything could happen here. After the stack pointer is moved, there is
        // no turning back.
        unsafe {
            let initial_stack_pointer = *(location as *const u32);
            let reset_handler_pointer = *((location + size_of::<u32>()) as *const u32) as *const ();
            let reset_handler = core::mem::transmute::<*const (), fn() -> !>(reset_handler_pointer);
            (*SCB::ptr()).vtor.write(location as u32);
            *boot_metrics_mut(self.ram_end) = metrics.clone();
            #[allow(deprecated)]
            cortex_m::register::msp::write(initial_stack_pointer);
            reset_handler()
        }
    }
}
