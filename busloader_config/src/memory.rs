use serde::{Deserialize, Serialize};

#[macro_export(local_inner_macros)]
macro_rules! KB {
    ($val:expr) => {
        $val * 1024
    };
}

/// Cortex-M vector tables must be aligned to (at least) this many bytes.
pub const VECTOR_TABLE_ALIGNMENT: u32 = 128;

/// Flash region able to hold one firmware image and its header.
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub start_address: u32,
    pub size_kb: u32,
}

impl Slot {
    pub fn end_address(&self) -> u32 { self.start_address + KB!(self.size_kb) }
    pub fn size(&self) -> usize { KB!(self.size_kb as usize) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfiguration {
    pub flash_start: u32,
    pub flash_size_kb: u32,
    pub slots: [Slot; 2],
}

impl Default for MemoryConfiguration {
    /// 512KB of program flash, the first 64KB reserved to the bootloader.
    fn default() -> Self {
        Self {
            flash_start: 0x0000_0000,
            flash_size_kb: 512,
            slots: [
                Slot { start_address: 0x0001_0000, size_kb: 192 },
                Slot { start_address: 0x0004_0000, size_kb: 192 },
            ],
        }
    }
}

impl MemoryConfiguration {
    pub fn flash_end(&self) -> u32 { self.flash_start + KB!(self.flash_size_kb) }

    pub fn contains(&self, slot: &Slot) -> bool {
        slot.start_address >= self.flash_start && slot.end_address() <= self.flash_end()
    }

    pub fn slots_overlap(&self) -> bool {
        let [a, b] = &self.slots;
        a.start_address < b.end_address() && b.start_address < a.end_address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_slots_are_disjoint_and_inside_flash() {
        let memory = MemoryConfiguration::default();
        assert!(!memory.slots_overlap());
        assert!(memory.slots.iter().all(|s| memory.contains(s)));
        assert_eq!(memory.slots[0].size(), 192 * 1024);
    }

    #[test]
    fn slot_past_flash_end_is_not_contained() {
        let memory = MemoryConfiguration::default();
        let slot = Slot { start_address: 0x0007_0000, size_kb: 128 };
        assert!(!memory.contains(&slot));
    }
}
