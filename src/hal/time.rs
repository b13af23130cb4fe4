//! Time units.

/// Count of timer periods elapsed.
#[derive(Clone, Copy, Debug, PartialOrd, Ord, PartialEq, Eq)]
pub struct Ticks(pub u32);

#[derive(Clone, Copy, Debug, PartialOrd, PartialEq, Eq)]
pub struct Milliseconds(pub u32);

/// Hertz
#[derive(Clone, Copy, Debug, PartialOrd, PartialEq, Eq)]
pub struct Hertz(pub u32);

/// Extension trait that adds convenience methods to the `u32` type
pub trait U32Ext {
    /// Wrap in `Ticks`
    fn ticks(self) -> Ticks;

    /// Wrap in `Milliseconds`
    fn ms(self) -> Milliseconds;

    /// Wrap in `Hertz`
    fn hz(self) -> Hertz;
}

impl U32Ext for u32 {
    fn ticks(self) -> Ticks { Ticks(self) }

    fn ms(self) -> Milliseconds { Milliseconds(self) }

    fn hz(self) -> Hertz { Hertz(self) }
}

impl Hertz {
    /// Number of cycles of this frequency that fit in `period`.
    pub fn cycles_in(self, period: Milliseconds) -> u32 {
        ((self.0 as u64 * period.0 as u64) / 1_000) as u32
    }
}
