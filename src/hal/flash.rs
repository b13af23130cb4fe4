use crate::utilities::memory::Address;
use core::fmt;

/// Reads and writes a range of bytes, generic over an address.
///
/// Writes are high level: they abstract away the need to first
/// erase, or to keep writes inside page boundaries.
pub trait ReadWrite {
    type Error: Clone + Copy + fmt::Debug;
    type Address: Address;
    fn read(&mut self, address: Self::Address, bytes: &mut [u8]) -> nb::Result<(), Self::Error>;
    fn write(&mut self, address: Self::Address, bytes: &[u8]) -> nb::Result<(), Self::Error>;
    fn range(&self) -> (Self::Address, Self::Address);

    /// Iterates over the bytes starting at `address`. Iteration
    /// stops at the first read error.
    fn bytes(&mut self, address: Self::Address) -> ReadIterator<'_, Self>
    where
        Self: Sized,
    {
        ReadIterator { flash: self, address, errored: false }
    }
}

pub struct ReadIterator<'a, F: ReadWrite> {
    flash: &'a mut F,
    address: F::Address,
    errored: bool,
}

impl<'a, F: ReadWrite> Iterator for ReadIterator<'a, F> {
    type Item = u8;

    fn next(&mut self) -> Option<Self::Item> {
        if self.errored {
            return None;
        }
        let mut byte = [0u8];
        match nb::block!(self.flash.read(self.address, &mut byte)) {
            Ok(()) => {
                self.address = self.address + 1;
                Some(byte[0])
            }
            Err(_) => {
                self.errored = true;
                None
            }
        }
    }
}
