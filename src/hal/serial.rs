//! Byte oriented serial interfaces.
use core::fmt;

/// UART read half
pub trait Read {
    type Error: Copy + fmt::Debug;

    /// Reads a single byte, or `WouldBlock` if none is pending.
    fn read(&mut self) -> nb::Result<u8, Self::Error>;
}

/// UART write half
pub trait Write {
    type Error: Copy + fmt::Debug;

    /// Writes a single byte
    fn write(&mut self, byte: u8) -> nb::Result<(), Self::Error>;

    /// Writes a full buffer, blocking on each byte.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        for byte in bytes {
            nb::block!(self.write(*byte))?;
        }
        Ok(())
    }
}
