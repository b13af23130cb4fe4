//! Metrics relayed to the application by the bootloader.
//!
//! Immediately preceding the jump to an image, the bootloader stores a
//! small record at the end of RAM. The application is free to ignore it
//! or to collect it for logging. It must do so early, since the record
//! lives in untracked memory that the stack will soon clobber.
use crate::devices::update::BootDecision;

/// Collection of boot metrics relayed to the booted application.
#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootMetrics {
    /// Must equal [`BOOT_MAGIC_START`] for the record to be valid.
    pub boot_magic_start: u32,
    pub boot_path: BootPath,
    /// Polls spent in the update window before the decision.
    pub window_polls: u32,
    /// Frames received during the window, accepted or not.
    pub frames_received: u32,
    /// Must equal [`BOOT_MAGIC_END`] for the record to be valid.
    pub boot_magic_end: u32,
}

/// Bit pattern that should mark the start of a valid boot metrics struct.
pub const BOOT_MAGIC_START: u32 = 0xDEADBEEF;
/// Bit pattern that should mark the end of a valid boot metrics struct.
pub const BOOT_MAGIC_END: u32 = 0xCAFEBABE;

/// How the booted image came to be selected.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootPath {
    /// The window closed quietly and the installed image booted.
    Direct,
    /// A new image was received, authenticated and committed.
    Updated { version: u32 },
    /// Frames arrived but no image was committed; the installed image booted.
    Recovered { version: u32 },
}

impl Default for BootMetrics {
    fn default() -> Self {
        Self {
            boot_magic_start: BOOT_MAGIC_START,
            boot_path: BootPath::Direct,
            window_polls: 0,
            frames_received: 0,
            boot_magic_end: BOOT_MAGIC_END,
        }
    }
}

impl BootMetrics {
    /// Summarizes a closed window. `version` is the version of the image
    /// about to boot.
    pub fn new(decision: BootDecision, version: u32, polls: u32, frames: u32) -> Self {
        let boot_path = match decision {
            BootDecision::JumpToNew => BootPath::Updated { version },
            _ if frames > 0 => BootPath::Recovered { version },
            _ => BootPath::Direct,
        };
        Self { boot_path, window_polls: polls, frames_received: frames, ..Default::default() }
    }

    /// Checks that metrics read from unstructured RAM have not been clobbered.
    pub fn is_valid(&self) -> bool {
        self.boot_magic_start == BOOT_MAGIC_START && self.boot_magic_end == BOOT_MAGIC_END
    }
}

/// Reinterprets the block right below `ram_end` as a mutable boot metrics struct.
///
/// # Safety
///
/// Returns raw memory at the end of RAM reinterpreted as a struct, and
/// *will* clobber whatever lives there. Only call immediately before
/// jumping into the target application.
pub unsafe fn boot_metrics_mut(ram_end: usize) -> &'static mut BootMetrics {
    &mut *((ram_end - core::mem::size_of::<BootMetrics>()) as *mut BootMetrics)
}

/// Reinterprets the block right below `ram_end` as a boot metrics struct.
///
/// # Safety
///
/// Only meaningful right after boot, before the application had a chance
/// to clobber that memory. Check [`BootMetrics::is_valid`] before trusting it.
pub unsafe fn boot_metrics(ram_end: usize) -> &'static BootMetrics { boot_metrics_mut(ram_end) }

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn boot_path_reflects_the_window_outcome() {
        assert_eq!(BootMetrics::new(BootDecision::JumpToOld, 1, 5, 0).boot_path, BootPath::Direct);
        assert_eq!(
            BootMetrics::new(BootDecision::JumpToOld, 1, 5, 2).boot_path,
            BootPath::Recovered { version: 1 }
        );
        assert_eq!(
            BootMetrics::new(BootDecision::JumpToNew, 2, 3, 4).boot_path,
            BootPath::Updated { version: 2 }
        );
    }

    #[test]
    fn metrics_survive_a_trip_through_raw_memory() {
        // Given
        let mut ram = [0u32; 16];
        let ram_end = ram.as_mut_ptr() as usize + core::mem::size_of_val(&ram);
        let metrics = BootMetrics::new(BootDecision::JumpToNew, 7, 42, 3);

        // When
        unsafe { *boot_metrics_mut(ram_end) = metrics.clone() };

        // Then
        let read = unsafe { boot_metrics(ram_end) };
        assert!(read.is_valid());
        assert_eq!(*read, metrics);
    }
}
